//! Commander: drive an instrument channel with command templates.
//!
//! A commander wraps one commanded channel (typically a serial port). Writing first
//! passes whatever the commanded channel has read to the commander's linked channel,
//! then renders the write command template with the write's parameters and sends it to
//! the commanded channel, so each write collects the reply to the previous command.
//! Reading sends the read command, then reads the commanded channel directly into the
//! caller's return slot.
//!
//! Linking a commander replaces its target instead of adding one.

use crate::channel::{Call, ChannelId, ChannelKind, LinkMode, Operation, ReturnSlot};
use crate::error::AppResult;
use crate::format::{print_params, Template};
use crate::guard::ShareRegister;
use crate::param::{param_to_channel, Params};
use std::sync::Arc;

const COMMANDER_HELP: &str = "commander channel - send command templates to an instrument\n\
    create commander newname\n\
    setup newname commanded_channel | write_command read_command\n\
    \t write_command is a format string filled from the write parameters\n\
    write newname params... : send write_command, results go to the linked channel\n\
    read newname : send read_command, return what the commanded channel reads\n\
    link newname target : replaces the previous target\n";

#[derive(Debug, Clone, Default)]
struct CommanderConfig {
    commanded: ChannelId,
    write_command: Option<Arc<Template>>,
    read_command: String,
}

/// State of one commander.
#[derive(Debug, Default)]
pub struct CommanderState {
    config: ShareRegister<CommanderConfig>,
}

impl CommanderState {
    fn setup(&self, call: &Call<'_>) {
        let commanded = call
            .params
            .get(0)
            .map(|_| param_to_channel(call.rt, call.params, 0));
        let mut config = self.config.lock();
        if let Some(commanded) = commanded {
            config.commanded = commanded;
        }
        if let Some(text) = call.params.text(1) {
            config.write_command = (!text.is_empty()).then(|| Arc::new(Template::parse(&text)));
        }
        if let Some(text) = call.params.text(2) {
            config.read_command = text;
        }
    }
}

/// Instrument commander kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommanderChannel;

impl CommanderChannel {
    fn write(state: &CommanderState, call: &Call<'_>) -> AppResult<()> {
        let config = state.config.snapshot();
        let mut forward = ReturnSlot::forward(call.rt.resolve_linked(call.id));
        call.rt
            .dispatch(config.commanded, Operation::Read, &Params::empty(), &mut forward);
        if let Some(template) = &config.write_command {
            let command = print_params(call.rt, template, call.params)?;
            call.rt.write_string(config.commanded, &command);
        }
        Ok(())
    }

    fn read(state: &CommanderState, call: &mut Call<'_>) {
        let config = state.config.snapshot();
        if !config.read_command.is_empty() {
            call.rt.write_string(config.commanded, &config.read_command);
        }
        call.rt
            .dispatch(config.commanded, Operation::Read, &Params::empty(), call.ret);
    }
}

impl ChannelKind for CommanderChannel {
    type State = CommanderState;
    const NAME: &'static str = "commander";
    const LINK_MODE: LinkMode = LinkMode::Replace;

    fn dispatch(&self, state: Option<&CommanderState>, mut call: Call<'_>) {
        let (id, op) = (call.id, call.op);
        let result = match (op, state) {
            (Operation::Help, _) => {
                call.return_text(COMMANDER_HELP);
                Ok(())
            }
            (Operation::Create, _) => {
                if !call.params.is_empty() {
                    let state = Arc::new(CommanderState::default());
                    let created = call
                        .rt
                        .create_channel_param(call.params, 0, CommanderChannel, state);
                    call.return_channel(created);
                }
                Ok(())
            }
            (Operation::Setup, Some(state)) => {
                state.setup(&call);
                Ok(())
            }
            (Operation::Write, Some(state)) => CommanderChannel::write(state, &call),
            (Operation::Read, Some(state)) => {
                CommanderChannel::read(state, &mut call);
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            err.report(id, op.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::param::Value;
    use crate::testing::{attach_recorder, Recorded};

    #[test]
    fn write_forwards_previous_reply_then_sends_command() {
        let rt = Runtime::with_std_channels();
        let (_, port_rec) = attach_recorder(&rt, "port");
        let (sink, sink_rec) = attach_recorder(&rt, "sink");
        let cmd = rt.create("commander", "cmd");
        rt.setup(cmd, &Params::texts(["port", "SET %d\r", "GET?\r"]));
        rt.link(cmd, sink);
        rt.write_int(cmd, 42);
        assert_eq!(port_rec.texts(), vec!["SET 42\r"]);
        assert!(sink_rec.texts().is_empty());
        rt.write_int(cmd, 43);
        assert_eq!(port_rec.texts(), vec!["SET 42\r", "SET 43\r"]);
        assert_eq!(sink_rec.texts(), vec!["SET 42\r"]);
    }

    #[test]
    fn read_sends_read_command_first() {
        let rt = Runtime::with_std_channels();
        let (_, port_rec) = attach_recorder(&rt, "port");
        let cmd = rt.create("commander", "cmd");
        rt.setup(cmd, &Params::texts(["port", "", "GET?\r"]));
        assert_eq!(rt.read_string(cmd), "GET?\r");
        assert_eq!(
            port_rec.events(),
            vec![Recorded::Write(vec![Value::Text("GET?\r".into())])]
        );
    }

    #[test]
    fn link_replaces_target() {
        let rt = Runtime::with_std_channels();
        let (a, _) = attach_recorder(&rt, "a");
        let (b, _) = attach_recorder(&rt, "b");
        let cmd = rt.create("commander", "cmd");
        rt.link(cmd, a);
        rt.link(cmd, b);
        assert_eq!(rt.resolve_linked(cmd), vec![b]);
        rt.link(cmd, ChannelId::NONE);
        assert!(rt.resolve_linked(cmd).is_empty());
    }
}
