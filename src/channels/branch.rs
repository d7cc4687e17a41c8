//! Branch and group: fan one operation out to a list of member channels.
//!
//! The same kind is registered as `branch` and as `group`. Writes go to every member in
//! order; a read collects each member's text and joins them with single spaces. Linking
//! a branch links every member to the same target.

use crate::channel::{Call, ChannelId, ChannelKind, Operation, ReturnSlot};
use crate::guard::ShareRegister;
use crate::param::param_to_channel;
use std::sync::Arc;

/// Second name the branch kind is registered under.
pub const GROUP_KIND: &str = "group";

const BRANCH_HELP: &str = "branch/group channel - forward operations to member channels\n\
    create branch newname\n\
    create group newname\n\
    setup newname ch1 ch2 ... : replace the member list (no channels clears it)\n\
    write newname params... : write params to every member in order\n\
    read newname : every member's value, separated by spaces\n\
    link newname target : link every member to target\n";

/// State of one branch.
#[derive(Debug, Default)]
pub struct BranchState {
    members: ShareRegister<Vec<ChannelId>>,
}

impl BranchState {
    /// Current members in order.
    pub fn members(&self) -> Vec<ChannelId> {
        self.members.snapshot()
    }
}

/// Fan-out kind behind `branch` and `group`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchChannel;

impl BranchChannel {
    fn read(state: &BranchState, call: &mut Call<'_>) {
        let mut texts = Vec::new();
        for member in state.members() {
            let mut slot = ReturnSlot::capture();
            call.rt.dispatch(member, Operation::Read, call.params, &mut slot);
            if let Some(value) = slot.take() {
                texts.push(value.to_text());
            }
        }
        call.return_text(texts.join(" "));
    }
}

impl ChannelKind for BranchChannel {
    type State = BranchState;
    const NAME: &'static str = "branch";

    fn dispatch(&self, state: Option<&BranchState>, mut call: Call<'_>) {
        match (call.op, state) {
            (Operation::Help, _) => call.return_text(BRANCH_HELP),
            (Operation::Create, _) => {
                if !call.params.is_empty() {
                    let state = Arc::new(BranchState::default());
                    let id = call
                        .rt
                        .create_channel_param(call.params, 0, BranchChannel, state);
                    call.return_channel(id);
                }
            }
            (Operation::Setup, Some(state)) => {
                let members: Vec<ChannelId> = (0..call.params.len())
                    .map(|i| param_to_channel(call.rt, call.params, i))
                    .collect();
                state.members.replace(members);
            }
            (Operation::Write, Some(state)) => {
                for member in state.members() {
                    call.rt
                        .dispatch(member, Operation::Write, call.params, &mut ReturnSlot::Discard);
                }
            }
            (Operation::Read, Some(state)) => BranchChannel::read(state, &mut call),
            (Operation::Link, Some(state)) => {
                for member in state.members() {
                    call.rt
                        .dispatch(member, Operation::Link, call.params, &mut ReturnSlot::Discard);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Params;
    use crate::runtime::Runtime;
    use crate::testing::attach_recorder;

    #[test]
    fn write_reaches_members_in_order() {
        let rt = Runtime::with_std_channels();
        let (_, a) = attach_recorder(&rt, "a");
        let (_, b) = attach_recorder(&rt, "b");
        let br = rt.create("branch", "br");
        rt.setup(br, &Params::texts(["a", "b"]));
        rt.write_string(br, "go");
        assert_eq!(a.texts(), vec!["go"]);
        assert_eq!(b.texts(), vec!["go"]);
    }

    #[test]
    fn read_joins_member_values() {
        let rt = Runtime::with_std_channels();
        let (x, _) = attach_recorder(&rt, "x");
        let (y, _) = attach_recorder(&rt, "y");
        rt.write_int(x, 1);
        rt.write_float(y, 2.5);
        let g = rt.create("group", "g");
        rt.setup(g, &Params::texts(["x", "y"]));
        assert_eq!(rt.read_string(g), "1 2.5");
    }

    #[test]
    fn setup_replaces_and_empty_setup_clears() {
        let rt = Runtime::with_std_channels();
        let (_, a) = attach_recorder(&rt, "a");
        let (_, b) = attach_recorder(&rt, "b");
        let br = rt.create("branch", "br");
        rt.setup(br, &Params::texts(["a"]));
        rt.setup(br, &Params::texts(["b"]));
        rt.write_string(br, "1");
        rt.setup(br, &Params::empty());
        rt.write_string(br, "2");
        assert!(a.texts().is_empty());
        assert_eq!(b.texts(), vec!["1"]);
    }

    #[test]
    fn link_links_every_member() {
        let rt = Runtime::with_std_channels();
        let b1 = rt.create("buffer", "b1");
        let b2 = rt.create("buffer", "b2");
        let (sink, _) = attach_recorder(&rt, "sink");
        let br = rt.create("branch", "br");
        rt.setup(br, &Params::channels([b1, b2]));
        rt.link(br, sink);
        assert_eq!(rt.resolve_linked(b1), vec![sink]);
        assert_eq!(rt.resolve_linked(b2), vec![sink]);
    }
}
