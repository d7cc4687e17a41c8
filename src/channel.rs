//! Dispatch core: the contract every channel kind implements.
//!
//! A channel is an addressable node in the dataflow graph. Every kind of channel exposes
//! the same six operations through one polymorphic entry point, [`ChannelKind::dispatch`],
//! which receives the channel's private state (absent for kind channels), the operation,
//! the parameter list and a return slot.
//!
//! # Operation contract
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | `Help` | Return a static description. No side effects. |
//! | `Create` | Allocate state, register it under the name in parameter 0, return the id. Fewer than one parameter yields no id. |
//! | `Setup` | Apply the available prefix of the parameter schema. Must tolerate missing state. |
//! | `Write` | Drive the primary action. Zero parameters is a distinct trigger/flush/reset signal. |
//! | `Read` | Produce a value into the return slot without touching linked state. |
//! | `Link` | The runtime has already updated the fan-out list; kinds may react. |
//!
//! Operations may recursively dispatch to other channels. A kind must release its own
//! [`ShareRegister`](crate::guard::ShareRegister) guards before doing so, which keeps a
//! cyclic link graph from deadlocking on itself.

use crate::param::{Params, Value};
use crate::runtime::Runtime;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

// =============================================================================
// Channel Identification
// =============================================================================

/// Numeric channel id. Stable for the life of the process once assigned.
///
/// Id 0 is reserved: it never names a channel, signals a failed `create`, and is a
/// silent no-op target for every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u32);

impl ChannelId {
    /// The reserved "no channel" id.
    pub const NONE: ChannelId = ChannelId(0);

    /// Wrap a raw id.
    pub const fn from_raw(raw: u32) -> Self {
        ChannelId(raw)
    }

    /// The raw numeric id.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved id 0.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ChannelId {
    fn from(raw: u32) -> Self {
        ChannelId(raw)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Operations
// =============================================================================

/// The closed operation set every channel answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Describe the channel kind
    Help,
    /// Allocate and register a new channel
    Create,
    /// (Re)configure
    Setup,
    /// Drive the primary action
    Write,
    /// Produce the current value
    Read,
    /// Fan-out list changed
    Link,
}

impl Operation {
    /// Lowercase operation name, as used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Help => "help",
            Operation::Create => "create",
            Operation::Setup => "setup",
            Operation::Write => "write",
            Operation::Read => "read",
            Operation::Link => "link",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `link` updates a channel's fan-out list. Fixed per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Each link adds a target after the existing ones
    Append,
    /// Each link replaces the whole list
    Replace,
}

// =============================================================================
// Return Slot
// =============================================================================

/// Where an operation's result goes.
#[derive(Debug, Default)]
pub enum ReturnSlot {
    /// Caller does not want a value
    #[default]
    Discard,
    /// Caller receives the value
    Capture(Option<Value>),
    /// The value is written to each of these channels in order
    Forward(Vec<ChannelId>),
}

impl ReturnSlot {
    /// An empty capturing slot.
    pub fn capture() -> Self {
        ReturnSlot::Capture(None)
    }

    /// A slot that writes returned values to `targets`.
    pub fn forward(targets: Vec<ChannelId>) -> Self {
        ReturnSlot::Forward(targets)
    }

    /// Whether anything will observe a returned value.
    pub fn is_discard(&self) -> bool {
        matches!(self, ReturnSlot::Discard)
    }

    /// Deliver a value. A capturing slot keeps the latest value.
    pub fn put(&mut self, rt: &Runtime, value: Value) {
        match self {
            ReturnSlot::Discard => {}
            ReturnSlot::Capture(slot) => *slot = Some(value),
            ReturnSlot::Forward(targets) => {
                let params = Params::from_value(value);
                for target in targets.iter() {
                    rt.write(*target, &params);
                }
            }
        }
    }

    /// Take the captured value, if any.
    pub fn take(&mut self) -> Option<Value> {
        match self {
            ReturnSlot::Capture(slot) => slot.take(),
            _ => None,
        }
    }
}

// =============================================================================
// Call
// =============================================================================

/// One operation invocation as seen by a channel kind.
pub struct Call<'a> {
    /// The runtime the channel lives in
    pub rt: &'a Runtime,
    /// Id the call was addressed to
    pub id: ChannelId,
    /// Operation requested
    pub op: Operation,
    /// Parameters (single type tag for the whole call)
    pub params: &'a Params,
    /// Destination of the result
    pub ret: &'a mut ReturnSlot,
}

impl Call<'_> {
    /// Return an arbitrary value.
    pub fn return_value(&mut self, value: Value) {
        self.ret.put(self.rt, value);
    }

    /// Return text.
    pub fn return_text(&mut self, text: impl Into<String>) {
        self.return_value(Value::Text(text.into()));
    }

    /// Return an integer.
    pub fn return_int(&mut self, value: i64) {
        self.return_value(Value::Int(value));
    }

    /// Return a float.
    pub fn return_float(&mut self, value: f64) {
        self.return_value(Value::Float(value));
    }

    /// Return a byte buffer.
    pub fn return_bytes(&mut self, bytes: Bytes) {
        self.return_value(Value::Bytes(bytes));
    }

    /// Return a channel id. Id 0 returns nothing.
    pub fn return_channel(&mut self, id: ChannelId) {
        if !id.is_none() {
            self.return_value(Value::Channel(id));
        }
    }
}

impl fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id)
            .field("op", &self.op)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ChannelKind Trait
// =============================================================================

/// A kind of channel: one dispatch function switched on the operation.
///
/// The kind value itself is usually zero-sized; per-instance data lives in `State`,
/// which the runtime owns and hands back on every call. Kind channels (the ones named
/// after the kind, used for `create`) are dispatched with `state == None`.
pub trait ChannelKind: Send + Sync + 'static {
    /// Private per-instance state.
    type State: Send + Sync + 'static;

    /// Kind name, e.g. `"buffer"`.
    const NAME: &'static str;

    /// Whether `link` appends to or replaces the fan-out list.
    const LINK_MODE: LinkMode = LinkMode::Append;

    /// Handle one operation.
    fn dispatch(&self, state: Option<&Self::State>, call: Call<'_>);
}

// =============================================================================
// Type-erased binding (registry entries)
// =============================================================================

/// Object-safe view of a kind bound to its state.
pub(crate) trait Dispatch: Send + Sync {
    fn dispatch(&self, call: Call<'_>);
    fn link_mode(&self) -> LinkMode;
    fn kind_name(&self) -> &'static str;
    fn has_state(&self) -> bool;
}

/// How a registry entry reaches its state.
pub(crate) enum StateRef<S> {
    /// Kind channel, no state
    Detached,
    /// The entry owns the state
    Owned(Arc<S>),
    /// Subchannel: non-owning view of the parent's state
    Shared(Weak<S>),
}

pub(crate) struct Bound<K: ChannelKind> {
    pub(crate) kind: K,
    pub(crate) state: StateRef<K::State>,
}

impl<K: ChannelKind> Dispatch for Bound<K> {
    fn dispatch(&self, call: Call<'_>) {
        match &self.state {
            StateRef::Detached => self.kind.dispatch(None, call),
            StateRef::Owned(state) => self.kind.dispatch(Some(state.as_ref()), call),
            StateRef::Shared(parent) => match parent.upgrade() {
                Some(state) => self.kind.dispatch(Some(state.as_ref()), call),
                None => trace!(id = %call.id, op = %call.op, "parent state gone, subchannel call ignored"),
            },
        }
    }

    fn link_mode(&self) -> LinkMode {
        K::LINK_MODE
    }

    fn kind_name(&self) -> &'static str {
        K::NAME
    }

    fn has_state(&self) -> bool {
        !matches!(self.state, StateRef::Detached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_zero_is_none() {
        assert!(ChannelId::NONE.is_none());
        assert!(ChannelId::default().is_none());
        assert!(!ChannelId::from_raw(3).is_none());
        assert_eq!(ChannelId::from(7).get(), 7);
        assert_eq!(ChannelId::from_raw(12).to_string(), "12");
    }

    #[test]
    fn capture_slot_keeps_latest_value() {
        let rt = Runtime::new();
        let mut slot = ReturnSlot::capture();
        slot.put(&rt, Value::Int(1));
        slot.put(&rt, Value::Int(2));
        assert_eq!(slot.take(), Some(Value::Int(2)));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn discard_slot_takes_nothing() {
        let rt = Runtime::new();
        let mut slot = ReturnSlot::default();
        assert!(slot.is_discard());
        slot.put(&rt, Value::Int(1));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::Setup.to_string(), "setup");
        assert_eq!(Operation::Link.as_str(), "link");
    }
}
