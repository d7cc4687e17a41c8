//! Dispatch contract tests
//!
//! Checks the behavior every channel relies on, independent of any one kind:
//! - unregistered ids and id 0 are silent no-ops
//! - kind channels create instances and answer help
//! - links append in order (or replace, for kinds that ask for it)
//! - return slots capture, discard or forward
//! - user-defined kinds plug into the same registry

use daq_channels::channels::STD_KINDS;
use daq_channels::testing::{attach_recorder, Recorded};
use daq_channels::{Call, ChannelId, ChannelKind, LinkMode, Operation, Params, ReturnSlot, Runtime, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Doubles integers written to it and keeps a running total.
struct Doubler;

#[derive(Default)]
struct DoublerTotal(AtomicI64);

impl ChannelKind for Doubler {
    type State = DoublerTotal;
    const NAME: &'static str = "doubler";

    fn dispatch(&self, state: Option<&DoublerTotal>, mut call: Call<'_>) {
        match (call.op, state) {
            (Operation::Help, _) => call.return_text("doubler - writes twice the input to linked channels"),
            (Operation::Create, _) => {
                let id = call
                    .rt
                    .create_channel_param(call.params, 0, Doubler, Arc::new(DoublerTotal::default()));
                call.return_channel(id);
            }
            (Operation::Write, Some(total)) => {
                if let Some(value) = call.params.int(0) {
                    total.0.fetch_add(value * 2, Ordering::SeqCst);
                    call.rt.write_linked(call.id, &Params::ints([value * 2]));
                }
            }
            (Operation::Read, Some(total)) => call.return_int(total.0.load(Ordering::SeqCst)),
            _ => {}
        }
    }
}

/// Link target list is replaced, not extended.
struct Exclusive;

impl ChannelKind for Exclusive {
    type State = ();
    const NAME: &'static str = "exclusive";
    const LINK_MODE: LinkMode = LinkMode::Replace;

    fn dispatch(&self, _state: Option<&()>, _call: Call<'_>) {}
}

#[test]
fn every_standard_kind_is_registered_and_documented() {
    let rt = Runtime::with_std_channels();
    for kind in STD_KINDS {
        let id = rt.lookup(kind);
        assert!(!id.is_none(), "kind '{kind}' is not registered");
        let help = rt.help(id).unwrap_or_default();
        assert!(!help.trim().is_empty(), "kind '{kind}' has no help text");
    }
}

#[test]
fn id_zero_and_unknown_ids_do_nothing() {
    let rt = Runtime::with_std_channels();
    let before = rt.channels();

    for op in [
        Operation::Help,
        Operation::Create,
        Operation::Setup,
        Operation::Write,
        Operation::Read,
        Operation::Link,
    ] {
        let mut slot = ReturnSlot::capture();
        rt.dispatch(ChannelId::NONE, op, &Params::texts(["x"]), &mut slot);
        assert_eq!(slot.take(), None);
        rt.dispatch(ChannelId::from_raw(u32::MAX), op, &Params::texts(["x"]), &mut slot);
        assert_eq!(slot.take(), None);
    }

    assert_eq!(rt.channels(), before);
}

#[test]
fn created_channels_report_their_kind() {
    let rt = Runtime::with_std_channels();
    let b = rt.create("buffer", "line");
    let p = rt.create("parser", "scope");

    let infos = rt.channels();
    let kind_of = |id: ChannelId| infos.iter().find(|i| i.id == id).map(|i| (i.kind, i.is_kind));
    assert_eq!(kind_of(b), Some(("buffer", false)));
    assert_eq!(kind_of(p), Some(("parser", false)));

    // Subchannels carry their own kind and point back at the parent
    let length = infos.iter().find(|i| i.name == "line_length");
    assert_eq!(length.map(|i| (i.kind, i.parent)), Some(("buffer_length", Some(b))));
    let stage = infos.iter().find(|i| i.name == "scope_stage");
    assert_eq!(stage.map(|i| i.parent), Some(Some(p)));
}

#[test]
fn duplicate_names_are_refused_across_kinds() {
    let rt = Runtime::with_std_channels();
    assert!(!rt.create("buffer", "x").is_none());
    assert!(rt.create("pattern", "x").is_none());
    // The subchannel name is taken too
    assert!(rt.create("splitter", "x_length").is_none());
}

#[test]
fn user_kind_participates_in_links() {
    let rt = Runtime::with_std_channels();
    rt.create_channel("doubler", Doubler, None);
    let d = rt.create("doubler", "twice");
    let (sink, rec) = attach_recorder(&rt, "sink");
    rt.link(d, sink);

    rt.write_int(d, 4);
    rt.write_string(d, "5 apples");

    assert_eq!(rt.read_int(d), 18);
    assert_eq!(
        rec.events(),
        vec![
            Recorded::Write(vec![Value::Int(8)]),
            Recorded::Write(vec![Value::Int(10)]),
        ]
    );
}

#[test]
fn replace_mode_keeps_only_the_latest_targets() {
    let rt = Runtime::new();
    let e = rt.create_channel("e", Exclusive, Some(()));
    let (a, _) = attach_recorder(&rt, "a");
    let (b, _) = attach_recorder(&rt, "b");

    rt.dispatch(e, Operation::Link, &Params::channels([a, b]), &mut ReturnSlot::Discard);
    assert_eq!(rt.resolve_linked(e), vec![a, b]);

    rt.link(e, b);
    assert_eq!(rt.resolve_linked(e), vec![b]);

    rt.link(e, ChannelId::NONE);
    assert!(rt.resolve_linked(e).is_empty());
}

#[test]
fn links_resolve_names_and_keep_duplicates() {
    let rt = Runtime::with_std_channels();
    let b = rt.create("buffer", "b");
    let (sink, rec) = attach_recorder(&rt, "sink");
    rt.setup(b, &Params::ints([2]));

    rt.dispatch(b, Operation::Link, &Params::texts(["sink", "nowhere", "sink"]), &mut ReturnSlot::Discard);
    assert_eq!(rt.resolve_linked(b), vec![sink, sink]);

    rt.write_string(b, "ok");
    assert_eq!(rec.texts(), vec!["ok", "ok"]);
}

#[test]
fn forwarding_slot_delivers_the_read_value() {
    let rt = Runtime::new();
    let (source, _) = attach_recorder(&rt, "source");
    let (a, ra) = attach_recorder(&rt, "a");
    let (b, rb) = attach_recorder(&rt, "b");
    rt.write_string(source, "reply");

    let mut slot = ReturnSlot::forward(vec![a, b]);
    rt.dispatch(source, Operation::Read, &Params::empty(), &mut slot);

    assert_eq!(ra.texts(), vec!["reply"]);
    assert_eq!(rb.texts(), vec!["reply"]);
}

#[test]
fn discarding_slot_ignores_returns() {
    let rt = Runtime::with_std_channels();
    let b = rt.create("buffer", "b");
    rt.write_string(b, "kept");
    let mut slot = ReturnSlot::Discard;
    rt.dispatch(b, Operation::Read, &Params::empty(), &mut slot);
    assert!(slot.is_discard());
    assert_eq!(rt.read_string(b), "kept");
}

#[test]
fn channels_can_dispatch_to_each_other_while_running() {
    // buffer -> splitter -> buffer: nested dispatch must not contend on the registry
    let rt = Runtime::with_std_channels();
    let line = rt.create("buffer", "line");
    let split = rt.create("splitter", "split");
    let field = rt.create("buffer", "field");
    let (sink, rec) = attach_recorder(&rt, "sink");
    rt.setup(line, &Params::texts(["64", ";"]));
    rt.setup(split, &Params::texts([",", ";", "field"]));
    rt.link(line, split);
    rt.link(field, sink);

    rt.write_string(line, "7,8;");

    assert_eq!(rec.texts(), vec!["7"]);
    assert_eq!(rt.read_int(split), 0);
}
