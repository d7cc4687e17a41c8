//! Staged stream parser.
//!
//! Walks each byte through five stages:
//!
//! | Stage | Waits for | Advances when |
//! |-------|-----------|---------------|
//! | 0 | start-of-message (`som`) | `som` seen |
//! | 1 | line count (`lin`) | `eol` seen `lin` times |
//! | 2 | column count (`col`) | `cs` seen `col` times |
//! | 3 | keyword (`kw`) | `kw` seen |
//! | 4 | record | `sod` seen: emit, back to stage 0 |
//!
//! A stage whose pattern is empty, or whose count is zero, is skipped and the byte falls
//! through to the next stage. Bytes that complete a stage's pattern are consumed by it.
//! The emitted record excludes the `sod` terminator and is capped at the readout size.
//!
//! A `<name>_stage` subchannel reads the current stage.

use super::emit_records;
use crate::channel::{Call, ChannelKind, Operation};
use crate::error::{AppResult, ChannelError};
use crate::guard::ShareRegister;
use crate::param::Params;
use crate::window::PatternWindow;
use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

const PARSER_HELP: &str = "parser channel - staged extraction from a byte stream\n\
    create parser newname\n\
    setup newname key value [key value ...]\n\
    \t som  start-of-message pattern (default none)\n\
    \t eol  end-of-line pattern (default \\n)\n\
    \t lin  lines to skip after som (default 0)\n\
    \t cs   column separator (default space)\n\
    \t col  columns to skip (default 0)\n\
    \t kw   keyword preceding the data (default none)\n\
    \t sod  end-of-data pattern (default \\n)\n\
    \t buf  readout size (default 20)\n\
    write newname data : parse data, linked channels get every record\n\
    write newname : reset to stage 0\n\
    read newname : latest record\n\
    read newname_stage : current stage\n";

const STAGE_HELP: &str = "parser stage subchannel\n\
    read name_stage : current stage 0..4\n";

/// Readout size of a freshly created parser.
pub const DEFAULT_READOUT_SIZE: usize = 20;

/// Parser stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Waiting for the start-of-message pattern
    #[default]
    WaitStart,
    /// Counting end-of-line patterns
    CountLines,
    /// Counting column separators
    CountColumns,
    /// Waiting for the keyword
    WaitKeyword,
    /// Recording data until end-of-data
    Record,
}

impl Stage {
    /// Stage number 0..4.
    pub const fn index(self) -> i64 {
        match self {
            Stage::WaitStart => 0,
            Stage::CountLines => 1,
            Stage::CountColumns => 2,
            Stage::WaitKeyword => 3,
            Stage::Record => 4,
        }
    }
}

#[derive(Debug)]
struct ParserScan {
    som: PatternWindow,
    eol: PatternWindow,
    cs: PatternWindow,
    kw: PatternWindow,
    sod: PatternWindow,
    lines: usize,
    columns: usize,
    capacity: usize,

    stage: Stage,
    lines_seen: usize,
    columns_seen: usize,
    capture: Vec<u8>,
    seen: usize,
}

impl Default for ParserScan {
    fn default() -> Self {
        ParserScan {
            som: PatternWindow::default(),
            eol: PatternWindow::new(*b"\n"),
            cs: PatternWindow::new(*b" "),
            kw: PatternWindow::default(),
            sod: PatternWindow::new(*b"\n"),
            lines: 0,
            columns: 0,
            capacity: DEFAULT_READOUT_SIZE,
            stage: Stage::WaitStart,
            lines_seen: 0,
            columns_seen: 0,
            capture: Vec::new(),
            seen: 0,
        }
    }
}

impl ParserScan {
    fn restart(&mut self) {
        self.stage = Stage::WaitStart;
        self.lines_seen = 0;
        self.columns_seen = 0;
        self.capture.clear();
        self.seen = 0;
        for window in [&mut self.som, &mut self.eol, &mut self.cs, &mut self.kw, &mut self.sod] {
            window.reset();
        }
    }

    /// Configurations that make a stage unreachable as configured.
    fn degenerate(&self) -> Option<&'static str> {
        if self.lines > 0 && !self.eol.is_enabled() {
            Some("line count set but end-of-line pattern is empty; line stage skipped")
        } else if self.columns > 0 && !self.cs.is_enabled() {
            Some("column count set but column separator is empty; column stage skipped")
        } else if !self.sod.is_enabled() {
            Some("end-of-data pattern is empty; records are never emitted")
        } else {
            None
        }
    }

    fn feed(&mut self, byte: u8) -> AppResult<Option<Bytes>> {
        if self.stage == Stage::WaitStart {
            if self.som.is_enabled() {
                if self.som.push(byte) {
                    self.stage = Stage::CountLines;
                }
                return Ok(None);
            }
            self.stage = Stage::CountLines;
        }
        if self.stage == Stage::CountLines {
            if self.lines > 0 && self.eol.is_enabled() {
                if self.eol.push(byte) {
                    self.lines_seen += 1;
                    if self.lines_seen >= self.lines {
                        self.stage = Stage::CountColumns;
                    }
                }
                return Ok(None);
            }
            self.stage = Stage::CountColumns;
        }
        if self.stage == Stage::CountColumns {
            if self.columns > 0 && self.cs.is_enabled() {
                if self.cs.push(byte) {
                    self.columns_seen += 1;
                    if self.columns_seen >= self.columns {
                        self.stage = Stage::WaitKeyword;
                    }
                }
                return Ok(None);
            }
            self.stage = Stage::WaitKeyword;
        }
        if self.stage == Stage::WaitKeyword {
            if self.kw.is_enabled() {
                if self.kw.push(byte) {
                    self.stage = Stage::Record;
                }
                return Ok(None);
            }
            self.stage = Stage::Record;
        }

        self.seen += 1;
        if self.capture.len() < self.capacity {
            self.capture.try_reserve(1)?;
            self.capture.push(byte);
        }
        if self.sod.push(byte) {
            let len = self
                .seen
                .saturating_sub(self.sod.len())
                .min(self.capture.len());
            let record = Bytes::copy_from_slice(&self.capture[..len]);
            self.restart();
            return Ok(Some(record));
        }
        Ok(None)
    }
}

/// State of one parser channel.
#[derive(Debug, Default)]
pub struct ParserState {
    scan: ShareRegister<ParserScan>,
    latest: ShareRegister<Bytes>,
}

impl ParserState {
    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.scan.lock().stage
    }

    /// Most recent complete record.
    pub fn latest(&self) -> Bytes {
        self.latest.snapshot()
    }

    fn setup(&self, params: &Params) -> AppResult<()> {
        let mut scan = self.scan.lock();
        let mut index = 0;
        while index + 1 < params.len() {
            let key = params.text(index).unwrap_or_default();
            let pattern = || PatternWindow::new(params.buffer(index + 1).unwrap_or_default().to_vec());
            let count = || usize::try_from(params.int(index + 1).unwrap_or(0)).unwrap_or(0);
            match key.trim() {
                "som" => scan.som = pattern(),
                "eol" => scan.eol = pattern(),
                "cs" => scan.cs = pattern(),
                "kw" => scan.kw = pattern(),
                "sod" => scan.sod = pattern(),
                "lin" | "line" | "lines" => scan.lines = count(),
                "col" | "column" | "columns" => scan.columns = count(),
                "buf" | "size" => scan.capacity = count(),
                other => warn!(key = other, "unknown parser setup key ignored"),
            }
            index += 2;
        }
        scan.restart();
        match scan.degenerate() {
            Some(reason) => Err(ChannelError::DegenerateConfiguration(reason.into())),
            None => Ok(()),
        }
    }

    fn parse(&self, input: &[u8], records: &mut Vec<Bytes>) -> AppResult<()> {
        let mut scan = self.scan.lock();
        for &byte in input {
            if let Some(record) = scan.feed(byte)? {
                self.latest.replace(record.clone());
                records.push(record);
            }
        }
        Ok(())
    }
}

/// Staged parser kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserChannel;

impl ParserChannel {
    fn create(mut call: Call<'_>) {
        if call.params.is_empty() {
            return;
        }
        let state = Arc::new(ParserState::default());
        let id = call
            .rt
            .create_channel_param(call.params, 0, ParserChannel, Arc::clone(&state));
        if !id.is_none() {
            call.rt.create_subchannel(id, "_stage", ParserStage, &state);
        }
        call.return_channel(id);
    }

    fn write(state: &ParserState, call: &mut Call<'_>) -> AppResult<()> {
        if call.params.is_empty() {
            state.scan.lock().restart();
            return Ok(());
        }
        let Some(input) = call.params.buffer(0) else {
            return Ok(());
        };
        let mut records = Vec::new();
        let scanned = state.parse(&input, &mut records);
        emit_records(call.rt, call.id, records, scanned)
    }
}

impl ChannelKind for ParserChannel {
    type State = ParserState;
    const NAME: &'static str = "parser";

    fn dispatch(&self, state: Option<&ParserState>, mut call: Call<'_>) {
        let (id, op) = (call.id, call.op);
        let result = match (op, state) {
            (Operation::Help, _) => {
                call.return_text(PARSER_HELP);
                Ok(())
            }
            (Operation::Create, _) => {
                ParserChannel::create(call);
                Ok(())
            }
            (Operation::Setup, Some(state)) => state.setup(call.params),
            (Operation::Write, Some(state)) => ParserChannel::write(state, &mut call),
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

/// `<name>_stage` subchannel kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserStage;

impl ChannelKind for ParserStage {
    type State = ParserState;
    const NAME: &'static str = "parser_stage";

    fn dispatch(&self, state: Option<&ParserState>, mut call: Call<'_>) {
        match (call.op, state) {
            (Operation::Help, _) => call.return_text(STAGE_HELP),
            (Operation::Read, Some(state)) => call.return_int(state.stage().index()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;
    use crate::runtime::Runtime;
    use crate::testing::attach_recorder;

    fn parser(rt: &Runtime, setup: &[&str]) -> ChannelId {
        let id = rt.create("parser", "p");
        rt.setup(id, &Params::texts(setup.iter().copied()));
        id
    }

    #[test]
    fn defaults_emit_each_line() {
        let rt = Runtime::with_std_channels();
        let p = rt.create("parser", "p");
        let (sink, rec) = attach_recorder(&rt, "sink");
        rt.link(p, sink);
        rt.write_string(p, "first\nsecond\n");
        assert_eq!(rec.texts(), vec!["first", "second"]);
    }

    #[test]
    fn skips_lines_and_columns() {
        let rt = Runtime::with_std_channels();
        let p = parser(&rt, &["som", "#", "lin", "1", "col", "2", "sod", ";"]);
        rt.write_string(p, "junk#header\na b 42.5;tail");
        assert_eq!(rt.read_string(p), "42.5");
        assert_eq!(rt.read_int(rt.lookup("p_stage")), 0);
    }

    #[test]
    fn keyword_precedes_data() {
        let rt = Runtime::with_std_channels();
        let p = parser(&rt, &["kw", "T=", "sod", "\r\n"]);
        rt.write_string(p, "P=1 T=21.5\r\n");
        assert_eq!(rt.read_string(p), "21.5");
    }

    #[test]
    fn stage_is_observable_mid_message() {
        let rt = Runtime::with_std_channels();
        let p = parser(&rt, &["som", "$", "kw", "="]);
        let stage = rt.lookup("p_stage");
        assert_eq!(rt.read_int(stage), 0);
        rt.write_string(p, "$");
        assert_eq!(rt.read_int(stage), 1);
        rt.write_string(p, "x");
        assert_eq!(rt.read_int(stage), 3);
        rt.write_string(p, "=12");
        assert_eq!(rt.read_int(stage), 4);
        rt.trigger(p);
        assert_eq!(rt.read_int(stage), 0);
    }

    #[test]
    fn zero_count_stage_falls_through() {
        let rt = Runtime::with_std_channels();
        let p = parser(&rt, &["lin", "0", "eol", ""]);
        rt.write_string(p, "7\n");
        assert_eq!(rt.read_string(p), "7");
    }

    #[test]
    fn unpaired_trailing_key_is_ignored() {
        let rt = Runtime::with_std_channels();
        let p = parser(&rt, &["sod", ";", "kw"]);
        rt.write_string(p, "abc;");
        assert_eq!(rt.read_string(p), "abc");
    }
}
