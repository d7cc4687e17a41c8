//! Custom error types for the channel runtime.
//!
//! This module defines the primary error type, `ChannelError`. Using the `thiserror`
//! crate it gives one consistent vocabulary for everything that can go wrong inside a
//! channel invocation, while loading configuration, or while building a channel graph.
//!
//! ## Error Hierarchy
//!
//! - **`AllocationFailure`**: channel state could not be allocated. The `create` that hit
//!   it yields no id.
//! - **`InsufficientParameters`**: fewer parameters than an operation strictly needs. Most
//!   operations apply the available prefix instead of raising this.
//! - **`UnknownChannel`**: a name did not resolve. Writing to id 0 or to an unregistered
//!   id is never an error; this variant only shows up on the configuration surface.
//! - **`BufferGrowth`**: geometric growth of an output or capture buffer failed. The one
//!   operation that needed the space is aborted.
//! - **`DegenerateConfiguration`**: a filter is configured in a way that cannot trigger
//!   (zero-length pattern with a nonzero count and similar). The stage is skipped.
//! - **`Config`** / **`Configuration`** / **`DuplicateName`** / **`Io`**: the ambient
//!   surfaces (figment loading, semantic validation, registry naming, file I/O).
//!
//! ## Propagation
//!
//! Errors never cross the dispatch boundary. A channel kind runs its fallible work in a
//! helper returning [`AppResult`] and hands any error to [`ChannelError::report`], which
//! is the diagnostic sink: it logs and returns, keeping the rest of the dataflow graph
//! alive. Configuration loading and graph building propagate with `?` as usual.

use crate::channel::ChannelId;
use std::collections::TryReserveError;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, ChannelError>;

/// Primary error type of the channel runtime.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Channel state could not be allocated.
    #[error("Could not allocate state for channel '{0}'")]
    AllocationFailure(String),

    /// Fewer parameters were supplied than the operation needs.
    #[error("Operation needs {needed} parameter(s), got {got}")]
    InsufficientParameters {
        /// Minimum parameter count for the operation
        needed: usize,
        /// Parameter count actually supplied
        got: usize,
    },

    /// A channel name or id did not resolve to a registered channel.
    #[error("Unknown channel reference: {0}")]
    UnknownChannel(String),

    /// Growing a buffer to fit an impending write failed.
    #[error("Buffer growth failed: {0}")]
    BufferGrowth(String),

    /// A filter configuration that can never trigger.
    #[error("Degenerate filter configuration: {0}")]
    DegenerateConfiguration(String),

    /// A channel name is already taken (or empty).
    #[error("Channel name '{0}' is empty or already registered")]
    DuplicateName(String),

    /// Configuration file parsing failed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration values parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TryReserveError> for ChannelError {
    fn from(value: TryReserveError) -> Self {
        ChannelError::BufferGrowth(value.to_string())
    }
}

impl ChannelError {
    /// Whether the runtime can keep going after this error without operator action.
    ///
    /// Allocation and growth failures abort a single operation only; configuration
    /// errors need the configuration to be fixed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChannelError::AllocationFailure(_)
            | ChannelError::BufferGrowth(_)
            | ChannelError::InsufficientParameters { .. }
            | ChannelError::DegenerateConfiguration(_)
            | ChannelError::UnknownChannel(_) => true,
            ChannelError::DuplicateName(_)
            | ChannelError::Config(_)
            | ChannelError::Configuration(_)
            | ChannelError::Io(_) => false,
        }
    }

    /// Diagnostic sink for failures inside a channel invocation.
    ///
    /// Logs the error against the channel it happened in and swallows it.
    pub fn report(&self, channel: ChannelId, operation: &'static str) {
        let recoverable = self.is_recoverable();
        match self {
            ChannelError::AllocationFailure(_) | ChannelError::BufferGrowth(_) => {
                error!(%channel, operation, recoverable, error = %self, "channel operation aborted");
            }
            ChannelError::DegenerateConfiguration(_)
            | ChannelError::InsufficientParameters { .. } => {
                debug!(%channel, operation, recoverable, error = %self, "channel operation skipped");
            }
            _ => {
                warn!(%channel, operation, recoverable, error = %self, "channel operation failed");
            }
        }
    }
}
