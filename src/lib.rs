//! # DAQ Channels
//!
//! A reactive channel runtime for laboratory instrument control. Everything in a running
//! system is a named channel: serial links, byte-stream filters, formatters, command
//! sequencers and the kinds that create them. Channels answer six operations (help,
//! create, setup, write, read, link) and push their results to the channels they are
//! linked to.
//!
//! ## Crate Structure
//!
//! - **`runtime`**: The [`Runtime`] registry. Names, ids, fan-out lists and dispatch.
//! - **`channel`**: Dispatch vocabulary: [`ChannelId`], [`Operation`], [`ReturnSlot`],
//!   [`Call`] and the [`ChannelKind`] trait every channel kind implements.
//! - **`param`**: Typed parameter lists ([`Params`]) and lenient conversions between them.
//! - **`channels`**: The standard kinds: buffer, pattern, parser, splitter, format,
//!   commander, branch/group and compare.
//! - **`format`**: printf-style templates rendered from literals and channel reads.
//! - **`window`** / **`guard`**: Sliding-window pattern matching and the per-channel
//!   lock that keeps concurrent writers and readers consistent.
//! - **`config`** / **`graph`**: Figment-based configuration and building a channel graph
//!   from it.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: [`ChannelError`], reported at the dispatch boundary.
//! - **`testing`**: A recording channel for asserting what a graph emits.
//!
//! ## Example
//!
//! ```rust
//! use daq_channels::{Params, Runtime};
//! use daq_channels::testing::attach_recorder;
//!
//! let rt = Runtime::with_std_channels();
//! let frames = rt.create("pattern", "frames");
//! rt.setup(frames, &Params::texts(["<", ">"]));
//! let (sink, recorded) = attach_recorder(&rt, "sink");
//! rt.link(frames, sink);
//!
//! rt.write_string(frames, "noise<42>noise");
//! assert_eq!(recorded.texts(), vec!["42"]);
//! ```

pub mod channel;
pub mod channels;
pub mod config;
pub mod error;
pub mod format;
pub mod graph;
pub mod guard;
pub mod logging;
pub mod param;
pub mod runtime;
pub mod testing;
pub mod window;

pub use channel::{Call, ChannelId, ChannelKind, LinkMode, Operation, ReturnSlot};
pub use error::{AppResult, ChannelError};
pub use param::{
    param_to_buffer, param_to_channel, param_to_float, param_to_int, param_to_string, ParamType, Params,
    Value,
};
pub use runtime::{ChannelInfo, Runtime};
