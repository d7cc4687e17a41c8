//! Pattern extractor: capture the bytes between a start and a stop pattern.
//!
//! The scanner idles until the start pattern shows up, then records until the stop
//! pattern completes. The record (without the stop pattern) is stored as the latest
//! record, readable at any time, and written to every linked channel. A start pattern
//! seen while recording restarts the capture.
//!
//! Records longer than the readout size are cut to the readout size. An empty write
//! returns the scanner to idle.

use super::emit_records;
use crate::channel::{Call, ChannelKind, Operation};
use crate::error::{AppResult, ChannelError};
use crate::guard::ShareRegister;
use crate::param::Params;
use crate::window::PatternWindow;
use bytes::Bytes;
use std::sync::Arc;

const PATTERN_HELP: &str = "pattern channel - extract records between start and stop patterns\n\
    create pattern newname\n\
    setup newname start_pattern stop_pattern | readout_size(20)\n\
    write newname data : scan data, linked channels get every record\n\
    write newname : reset the scanner to idle\n\
    read newname : latest record\n\
    link newname target\n";

/// Readout size of a freshly created extractor.
pub const DEFAULT_READOUT_SIZE: usize = 20;

#[derive(Debug, Default)]
struct PatternScan {
    start: PatternWindow,
    stop: PatternWindow,
    capacity: usize,
    recording: bool,
    capture: Vec<u8>,
    seen: usize,
}

impl PatternScan {
    fn idle(&mut self) {
        self.recording = false;
        self.capture.clear();
        self.seen = 0;
        self.start.reset();
        self.stop.reset();
    }

    fn feed(&mut self, byte: u8) -> AppResult<Option<Bytes>> {
        if self.start.push(byte) {
            self.recording = true;
            self.capture.clear();
            self.seen = 0;
            self.stop.reset();
            return Ok(None);
        }
        if !self.recording {
            return Ok(None);
        }
        self.seen += 1;
        if self.capture.len() < self.capacity {
            self.capture.try_reserve(1)?;
            self.capture.push(byte);
        }
        if self.stop.push(byte) {
            let len = self
                .seen
                .saturating_sub(self.stop.len())
                .min(self.capture.len());
            let record = Bytes::copy_from_slice(&self.capture[..len]);
            self.idle();
            return Ok(Some(record));
        }
        Ok(None)
    }
}

/// State of one pattern extractor.
#[derive(Debug)]
pub struct PatternState {
    scan: ShareRegister<PatternScan>,
    latest: ShareRegister<Bytes>,
}

impl Default for PatternState {
    fn default() -> Self {
        PatternState {
            scan: ShareRegister::new(PatternScan {
                capacity: DEFAULT_READOUT_SIZE,
                ..PatternScan::default()
            }),
            latest: ShareRegister::default(),
        }
    }
}

impl PatternState {
    /// Most recent complete record.
    pub fn latest(&self) -> Bytes {
        self.latest.snapshot()
    }

    fn setup(&self, params: &Params) {
        let mut scan = self.scan.lock();
        if let Some(start) = params.buffer(0) {
            scan.start = PatternWindow::new(start.to_vec());
        }
        if let Some(stop) = params.buffer(1) {
            scan.stop = PatternWindow::new(stop.to_vec());
        }
        if let Some(size) = params.int(2) {
            scan.capacity = usize::try_from(size).unwrap_or(0);
        }
        scan.idle();
    }

    fn scan(&self, input: &[u8], records: &mut Vec<Bytes>) -> AppResult<()> {
        let mut scan = self.scan.lock();
        if !scan.start.is_enabled() || !scan.stop.is_enabled() {
            return Err(ChannelError::DegenerateConfiguration(
                "pattern extractor needs both a start and a stop pattern".into(),
            ));
        }
        for &byte in input {
            if let Some(record) = scan.feed(byte)? {
                self.latest.replace(record.clone());
                records.push(record);
            }
        }
        Ok(())
    }
}

/// Start/stop pattern extractor kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternChannel;

impl PatternChannel {
    fn write(state: &PatternState, call: &mut Call<'_>) -> AppResult<()> {
        if call.params.is_empty() {
            state.scan.lock().idle();
            return Ok(());
        }
        let Some(input) = call.params.buffer(0) else {
            return Ok(());
        };
        let mut records = Vec::new();
        let scanned = state.scan(&input, &mut records);
        emit_records(call.rt, call.id, records, scanned)
    }
}

impl ChannelKind for PatternChannel {
    type State = PatternState;
    const NAME: &'static str = "pattern";

    fn dispatch(&self, state: Option<&PatternState>, mut call: Call<'_>) {
        let (id, op) = (call.id, call.op);
        let result = match (op, state) {
            (Operation::Help, _) => {
                call.return_text(PATTERN_HELP);
                Ok(())
            }
            (Operation::Create, _) => {
                if !call.params.is_empty() {
                    let state = Arc::new(PatternState::default());
                    let created = call
                        .rt
                        .create_channel_param(call.params, 0, PatternChannel, state);
                    call.return_channel(created);
                }
                Ok(())
            }
            (Operation::Setup, Some(state)) => {
                state.setup(call.params);
                Ok(())
            }
            (Operation::Write, Some(state)) => PatternChannel::write(state, &mut call),
            (Operation::Read, Some(state)) => {
                call.return_bytes(state.latest());
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            err.report(id, op.as_str());
        }
    }
}
