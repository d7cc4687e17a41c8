//! Standard channel kinds.
//!
//! | Kind | Module | Role |
//! |------|--------|------|
//! | `buffer` | [`buffer`] | accumulate bytes, flush on size or terminator |
//! | `pattern` | [`pattern`] | extract records between start and stop patterns |
//! | `parser` | [`parser`] | staged line/column/keyword extraction |
//! | `splitter` | [`splitter`] | route delimited slices to positional outputs |
//! | `format` | [`format`] | printf-style rendering from channels and literals |
//! | `commander` | [`commander`] | drive an instrument with command templates |
//! | `branch`, `group` | [`branch`] | fan operations out to a member list |
//! | `compare` | [`compare`] | typed equality test |
//!
//! Each kind is registered once under its name as a stateless kind channel; instances are
//! made with `create <kind> <name>`.

pub mod branch;
pub mod buffer;
pub mod commander;
pub mod compare;
pub mod format;
pub mod parser;
pub mod pattern;
pub mod splitter;

use crate::channel::{ChannelId, ChannelKind};
use crate::error::AppResult;
use crate::runtime::Runtime;
use bytes::Bytes;
use tracing::debug;

pub use branch::BranchChannel;
pub use buffer::{BufferChannel, BufferState};
pub use commander::CommanderChannel;
pub use compare::CompareChannel;
pub use format::{FormatChannel, FormatState};
pub use parser::{ParserChannel, ParserState, Stage};
pub use pattern::{PatternChannel, PatternState};
pub use splitter::{SplitterChannel, SplitterState};

/// Names of the standard kinds, in registration order.
pub const STD_KINDS: &[&str] = &[
    BufferChannel::NAME,
    PatternChannel::NAME,
    ParserChannel::NAME,
    SplitterChannel::NAME,
    FormatChannel::NAME,
    CommanderChannel::NAME,
    BranchChannel::NAME,
    branch::GROUP_KIND,
    CompareChannel::NAME,
];

/// Register every standard kind channel on `rt`.
pub fn register_std_channels(rt: &Runtime) {
    rt.create_channel(BufferChannel::NAME, BufferChannel, None);
    rt.create_channel(PatternChannel::NAME, PatternChannel, None);
    rt.create_channel(ParserChannel::NAME, ParserChannel, None);
    rt.create_channel(SplitterChannel::NAME, SplitterChannel, None);
    rt.create_channel(FormatChannel::NAME, FormatChannel, None);
    rt.create_channel(CommanderChannel::NAME, CommanderChannel, None);
    rt.create_channel(BranchChannel::NAME, BranchChannel, None);
    rt.create_channel(branch::GROUP_KIND, BranchChannel, None);
    rt.create_channel(CompareChannel::NAME, CompareChannel, None);
    debug!(kinds = STD_KINDS.len(), "standard channel kinds registered");
}

/// Send the records a stream filter completed to its linked channels, then surface the
/// error that stopped the scan, if any. Records finished before the failure are kept.
pub(crate) fn emit_records(
    rt: &Runtime,
    id: ChannelId,
    records: Vec<Bytes>,
    scanned: AppResult<()>,
) -> AppResult<()> {
    for record in records {
        rt.write_linked_buffer(id, record);
    }
    scanned
}
