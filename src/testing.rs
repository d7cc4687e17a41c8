//! Test support: a channel kind that records everything written to it.
//!
//! A recorder is the sink end of a test graph. Link a filter to it and inspect what
//! arrived, in order, including zero-parameter triggers. Reading a recorder returns the
//! last value written to it, which also makes it usable as a settable source for
//! formatters and comparators.

use crate::channel::{Call, ChannelId, ChannelKind, Operation};
use crate::guard::ShareRegister;
use crate::param::Value;
use crate::runtime::Runtime;
use std::sync::Arc;

const RECORDER_HELP: &str = "recorder channel - records every write for inspection\n\
    write recorder data... : append the values\n\
    write recorder : record a trigger\n\
    read recorder : last value written\n";

/// One event seen by a recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// A write carrying values
    Write(Vec<Value>),
    /// A zero-parameter write
    Trigger,
}

/// Events recorded so far.
#[derive(Debug, Default)]
pub struct RecorderState {
    events: ShareRegister<Vec<Recorded>>,
}

impl RecorderState {
    /// Every event, in arrival order.
    pub fn events(&self) -> Vec<Recorded> {
        self.events.snapshot()
    }

    /// First value of every data write, as text.
    pub fn texts(&self) -> Vec<String> {
        self.payloads()
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect()
    }

    /// First value of every data write, as bytes.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Recorded::Write(values) => values.first().map(|v| v.to_bytes().to_vec()),
                Recorded::Trigger => None,
            })
            .collect()
    }

    /// Number of zero-parameter writes.
    pub fn trigger_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, Recorded::Trigger))
            .count()
    }

    fn last_value(&self) -> Option<Value> {
        self.events.lock().iter().rev().find_map(|event| match event {
            Recorded::Write(values) => values.first().cloned(),
            Recorded::Trigger => None,
        })
    }
}

/// Recording sink kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderChannel;

impl ChannelKind for RecorderChannel {
    type State = RecorderState;
    const NAME: &'static str = "recorder";

    fn dispatch(&self, state: Option<&RecorderState>, mut call: Call<'_>) {
        match call.op {
            Operation::Help => call.return_text(RECORDER_HELP),
            Operation::Create => {
                if call.params.is_empty() {
                    return;
                }
                let state = Arc::new(RecorderState::default());
                let id = call
                    .rt
                    .create_channel_param(call.params, 0, RecorderChannel, state);
                call.return_channel(id);
            }
            Operation::Write => {
                if let Some(state) = state {
                    let event = if call.params.is_empty() {
                        Recorded::Trigger
                    } else {
                        Recorded::Write(call.params.values().to_vec())
                    };
                    state.events.lock().push(event);
                }
            }
            Operation::Read => {
                if let Some(value) = state.and_then(RecorderState::last_value) {
                    call.return_value(value);
                }
            }
            Operation::Setup | Operation::Link => {}
        }
    }
}

/// Register a recorder named `name` and hand back its state for inspection.
pub fn attach_recorder(rt: &Runtime, name: &str) -> (ChannelId, Arc<RecorderState>) {
    let state = Arc::new(RecorderState::default());
    let id = rt.create_shared_channel(name, RecorderChannel, Arc::clone(&state));
    (id, state)
}
