//! Byte buffer: accumulate a stream, flush on size or on a terminator pattern.
//!
//! Every written byte is appended and shifted into the flush-pattern window. The buffer
//! flushes its contents to every linked channel, then clears, as soon as it holds
//! `capacity` bytes or the window matches. An empty write flushes whatever is held, even
//! nothing, and returns it.
//!
//! A `<name>_length` subchannel reads the number of bytes currently held.

use super::emit_records;
use crate::channel::{Call, ChannelKind, Operation};
use crate::error::{AppResult, ChannelError};
use crate::guard::ShareRegister;
use crate::param::Params;
use crate::window::PatternWindow;
use bytes::Bytes;
use std::sync::Arc;

const BUFFER_HELP: &str = "buffer channel - accumulate bytes and flush them to linked channels\n\
    create buffer newname\n\
    setup newname size | flush_pattern\n\
    \t flush when size bytes are held or when flush_pattern is seen\n\
    \t size 0 flushes every byte\n\
    write newname data : append data\n\
    write newname : flush contents to linked channels and return them\n\
    read newname : current contents\n\
    read newname_length : number of bytes held\n\
    link newname target\n";

const LENGTH_HELP: &str = "buffer length subchannel\n\
    read name_length : number of bytes held by the buffer\n";

/// Flush threshold of a freshly created buffer.
pub const DEFAULT_CAPACITY: usize = 16;

/// Upper bound on the up-front allocation; larger buffers grow on demand.
const PREALLOCATE_LIMIT: usize = 4096;

#[derive(Debug)]
struct BufferScan {
    data: Vec<u8>,
    capacity: usize,
    flush_on: PatternWindow,
}

impl BufferScan {
    fn new(capacity: usize) -> AppResult<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity.min(PREALLOCATE_LIMIT))?;
        Ok(BufferScan {
            data,
            capacity,
            flush_on: PatternWindow::default(),
        })
    }

    fn take(&mut self) -> Bytes {
        let out = Bytes::copy_from_slice(&self.data);
        self.data.clear();
        self.flush_on.reset();
        out
    }

    /// Append `input`, collecting the records it completes into `records`.
    fn append(&mut self, input: &[u8], records: &mut Vec<Bytes>) -> AppResult<()> {
        for &byte in input {
            self.data.try_reserve(1)?;
            self.data.push(byte);
            let matched = self.flush_on.push(byte);
            if matched || self.data.len() >= self.capacity {
                records.push(self.take());
            }
        }
        Ok(())
    }
}

/// State of one buffer channel.
#[derive(Debug)]
pub struct BufferState {
    scan: ShareRegister<BufferScan>,
}

impl BufferState {
    fn new() -> AppResult<Self> {
        Ok(BufferState {
            scan: ShareRegister::new(BufferScan::new(DEFAULT_CAPACITY)?),
        })
    }

    /// Bytes currently held.
    fn held(&self) -> usize {
        self.scan.lock().data.len()
    }

    fn setup(&self, params: &Params) -> AppResult<()> {
        let Some(capacity) = params.int(0) else {
            return Ok(());
        };
        let capacity = usize::try_from(capacity).unwrap_or(0);
        let pattern = params.buffer(1);

        let mut scan = self.scan.lock();
        scan.data.clear();
        scan.data.shrink_to(capacity.min(PREALLOCATE_LIMIT));
        scan.data.try_reserve_exact(capacity.min(PREALLOCATE_LIMIT))?;
        scan.capacity = capacity;
        match pattern {
            Some(pattern) => scan.flush_on = PatternWindow::new(pattern.to_vec()),
            None => scan.flush_on.reset(),
        }
        Ok(())
    }
}

/// Accumulating byte buffer kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferChannel;

impl BufferChannel {
    fn create(mut call: Call<'_>) -> AppResult<()> {
        if call.params.is_empty() {
            return Ok(());
        }
        let state = BufferState::new()
            .map_err(|_| ChannelError::AllocationFailure(call.params.text(0).unwrap_or_default()))?;
        let state = Arc::new(state);
        let id = call
            .rt
            .create_channel_param(call.params, 0, BufferChannel, Arc::clone(&state));
        if !id.is_none() {
            call.rt.create_subchannel(id, "_length", BufferLength, &state);
        }
        call.return_channel(id);
        Ok(())
    }

    fn write(state: &BufferState, call: &mut Call<'_>) -> AppResult<()> {
        if call.params.is_empty() {
            let contents = state.scan.lock().take();
            call.rt.write_linked_buffer(call.id, contents.clone());
            call.return_bytes(contents);
            return Ok(());
        }
        let Some(input) = call.params.buffer(0) else {
            return Ok(());
        };
        let mut records = Vec::new();
        let scanned = state.scan.lock().append(&input, &mut records);
        emit_records(call.rt, call.id, records, scanned)
    }
}

impl ChannelKind for BufferChannel {
    type State = BufferState;
    const NAME: &'static str = "buffer";

    fn dispatch(&self, state: Option<&BufferState>, mut call: Call<'_>) {
        let (id, op) = (call.id, call.op);
        let result = match (op, state) {
            (Operation::Help, _) => {
                call.return_text(BUFFER_HELP);
                Ok(())
            }
            (Operation::Create, _) => BufferChannel::create(call),
            (Operation::Setup, Some(state)) => state.setup(call.params),
            (Operation::Write, Some(state)) => BufferChannel::write(state, &mut call),
            (Operation::Read, Some(state)) => {
                let contents = Bytes::copy_from_slice(&state.scan.lock().data);
                call.return_bytes(contents);
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            err.report(id, op.as_str());
        }
    }
}

/// `<name>_length` subchannel kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferLength;

impl ChannelKind for BufferLength {
    type State = BufferState;
    const NAME: &'static str = "buffer_length";

    fn dispatch(&self, state: Option<&BufferState>, mut call: Call<'_>) {
        match (call.op, state) {
            (Operation::Help, _) => call.return_text(LENGTH_HELP),
            (Operation::Read, Some(state)) => {
                let len = i64::try_from(state.held()).unwrap_or(i64::MAX);
                call.return_int(len);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::testing::attach_recorder;

    #[test]
    fn flushes_at_capacity() {
        let rt = Runtime::with_std_channels();
        let b = rt.create("buffer", "b");
        let (sink, rec) = attach_recorder(&rt, "sink");
        rt.link(b, sink);
        rt.setup(b, &Params::ints([3]));
        rt.write_string(b, "abcdefgh");
        assert_eq!(rec.texts(), vec!["abc", "def"]);
        assert_eq!(rt.read_string(b), "gh");
        assert_eq!(rt.read_int(rt.lookup("b_length")), 2);
    }

    #[test]
    fn flushes_on_terminator() {
        let rt = Runtime::with_std_channels();
        let b = rt.create("buffer", "b");
        let (sink, rec) = attach_recorder(&rt, "sink");
        rt.link(b, sink);
        rt.setup(b, &Params::texts(["100", "\r\n"]));
        rt.write_string(b, "12.5\r\n13");
        assert_eq!(rec.texts(), vec!["12.5\r\n"]);
        assert_eq!(rt.read_string(b), "13");
    }

    #[test]
    fn empty_write_flushes_even_when_empty() {
        let rt = Runtime::with_std_channels();
        let b = rt.create("buffer", "b");
        let (sink, rec) = attach_recorder(&rt, "sink");
        rt.link(b, sink);
        let returned = rt.trigger(b).map(|v| v.to_bytes());
        assert_eq!(returned.as_deref(), Some(&b""[..]));
        assert_eq!(rec.payloads(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn zero_capacity_flushes_every_byte() {
        let rt = Runtime::with_std_channels();
        let b = rt.create("buffer", "b");
        let (sink, rec) = attach_recorder(&rt, "sink");
        rt.link(b, sink);
        rt.setup(b, &Params::ints([0]));
        rt.write_string(b, "xyz");
        assert_eq!(rec.texts(), vec!["x", "y", "z"]);
    }

    #[test]
    fn setup_prefix_keeps_flush_pattern() {
        let rt = Runtime::with_std_channels();
        let b = rt.create("buffer", "b");
        let (sink, rec) = attach_recorder(&rt, "sink");
        rt.link(b, sink);
        rt.setup(b, &Params::texts(["50", ";"]));
        rt.setup(b, &Params::ints([40]));
        rt.write_string(b, "a;b");
        assert_eq!(rec.texts(), vec!["a;"]);
    }

    #[test]
    fn subchannel_reads_parent_state() {
        let rt = Runtime::new();
        let state = Arc::new(BufferState::new().unwrap());
        let parent = rt.create_shared_channel("p", BufferChannel, Arc::clone(&state));
        let length = rt.create_subchannel(parent, "_length", BufferLength, &state);
        rt.write_string(parent, "ab");
        assert_eq!(rt.read_int(length), 2);
        assert_eq!(rt.name(length).as_deref(), Some("p_length"));
    }
}
