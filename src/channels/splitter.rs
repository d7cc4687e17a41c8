//! Splitter: route delimited slices of a stream to positional outputs.
//!
//! Bytes accumulate in a pending slice. On the delimiter the slice goes to the output at
//! the current cursor position, that output is triggered, and the cursor advances. On the
//! reset byte the same happens and the cursor returns to the first output. A slice may
//! span several writes.
//!
//! Positions beyond the output list, and outputs set to 0, swallow their slices.

use crate::channel::{Call, ChannelId, ChannelKind, Operation};
use crate::guard::ShareRegister;
use crate::param::{param_to_channel, Params};
use bytes::Bytes;
use std::sync::Arc;

const SPLITTER_HELP: &str = "splitter channel - route delimited slices to outputs\n\
    create splitter newname\n\
    setup newname | delimiter(' ') reset('\\n') output0 output1 ...\n\
    \t 0 as an output swallows that slice\n\
    write newname data : split data, each slice is written then triggered\n\
    write newname : forward the pending slice and return to the first output\n\
    read newname : current output position\n";

#[derive(Debug)]
struct SplitterScan {
    delimiter: u8,
    reset: u8,
    outputs: Vec<ChannelId>,
    cursor: usize,
    pending: Vec<u8>,
}

impl Default for SplitterScan {
    fn default() -> Self {
        SplitterScan {
            delimiter: b' ',
            reset: b'\n',
            outputs: Vec::new(),
            cursor: 0,
            pending: Vec::new(),
        }
    }
}

/// Something to send once the scan lock is released.
#[derive(Debug)]
enum Emit {
    Slice(ChannelId, Bytes),
    Trigger(ChannelId),
}

impl SplitterScan {
    fn output(&self) -> ChannelId {
        self.outputs.get(self.cursor).copied().unwrap_or(ChannelId::NONE)
    }

    fn close_slice(&mut self, out: &mut Vec<Emit>) {
        let target = self.output();
        let slice = Bytes::from(std::mem::take(&mut self.pending));
        out.push(Emit::Slice(target, slice));
        out.push(Emit::Trigger(target));
    }

    fn split(&mut self, input: &[u8]) -> Vec<Emit> {
        let mut out = Vec::new();
        for &byte in input {
            if byte == self.delimiter {
                self.close_slice(&mut out);
                self.cursor = self.cursor.saturating_add(1);
            } else if byte == self.reset {
                self.close_slice(&mut out);
                self.cursor = 0;
            } else {
                self.pending.push(byte);
            }
        }
        out
    }

    fn flush(&mut self) -> Vec<Emit> {
        let mut out = Vec::new();
        let target = self.output();
        if !self.pending.is_empty() {
            out.push(Emit::Slice(target, Bytes::from(std::mem::take(&mut self.pending))));
        }
        out.push(Emit::Trigger(target));
        self.cursor = 0;
        out
    }
}

/// State of one splitter channel.
#[derive(Debug, Default)]
pub struct SplitterState {
    scan: ShareRegister<SplitterScan>,
}

impl SplitterState {
    /// Current output position.
    pub fn cursor(&self) -> usize {
        self.scan.lock().cursor
    }
}

/// Delimited stream splitter kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitterChannel;

impl SplitterChannel {
    fn setup(state: &SplitterState, call: &Call<'_>) {
        let params = call.params;
        let outputs: Option<Vec<ChannelId>> = (params.len() > 2).then(|| {
            (2..params.len())
                .map(|i| param_to_channel(call.rt, params, i))
                .collect()
        });
        let mut scan = state.scan.lock();
        if let Some(&delimiter) = params.buffer(0).as_deref().and_then(<[u8]>::first) {
            scan.delimiter = delimiter;
        }
        if let Some(&reset) = params.buffer(1).as_deref().and_then(<[u8]>::first) {
            scan.reset = reset;
        }
        if let Some(outputs) = outputs {
            scan.outputs = outputs;
            scan.cursor = 0;
            scan.pending.clear();
        }
    }

    fn write(state: &SplitterState, call: &Call<'_>) {
        let emits = if call.params.is_empty() {
            state.scan.lock().flush()
        } else {
            match call.params.buffer(0) {
                Some(input) => state.scan.lock().split(&input),
                None => Vec::new(),
            }
        };
        for emit in emits {
            match emit {
                Emit::Slice(target, slice) => {
                    call.rt.write(target, &Params::bytes([slice]));
                }
                Emit::Trigger(target) => {
                    call.rt.trigger(target);
                }
            }
        }
    }
}

impl ChannelKind for SplitterChannel {
    type State = SplitterState;
    const NAME: &'static str = "splitter";

    fn dispatch(&self, state: Option<&SplitterState>, mut call: Call<'_>) {
        match (call.op, state) {
            (Operation::Help, _) => call.return_text(SPLITTER_HELP),
            (Operation::Create, _) => {
                if !call.params.is_empty() {
                    let state = Arc::new(SplitterState::default());
                    let id = call
                        .rt
                        .create_channel_param(call.params, 0, SplitterChannel, state);
                    call.return_channel(id);
                }
            }
            (Operation::Setup, Some(state)) => SplitterChannel::setup(state, &call),
            (Operation::Write, Some(state)) => SplitterChannel::write(state, &call),
            (Operation::Read, Some(state)) => {
                let cursor = i64::try_from(state.cursor()).unwrap_or(i64::MAX);
                call.return_int(cursor);
            }
            _ => {}
        }
    }
}
