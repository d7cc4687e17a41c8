//! Channel runtime: registry, naming, linking and dispatch.
//!
//! The [`Runtime`] is the only place channels are addressed from. It maps ids and names
//! to bound channel kinds, keeps each channel's fan-out list, and routes every operation
//! through [`Runtime::dispatch`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Runtime                              │
//! │  names: "b1" -> 5        entries[id-1]: kind + state + links   │
//! ├────────────────────────────────────────────────────────────────┤
//! │  dispatch(id, op, params, ret)                                 │
//! │    id 0 / unknown  -> no-op                                    │
//! │    op == Link      -> update links (Append | Replace), forward │
//! │    otherwise       -> kind.dispatch(state, call)               │
//! ├────────────────────────────────────────────────────────────────┤
//! │  buffer | pattern | parser | splitter | format | commander ... │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry lock is held only to look an entry up or to change it, never while a
//! channel runs. Channels can therefore dispatch to each other, and to themselves through
//! cyclic links, without the registry getting in the way.
//!
//! # Example
//!
//! ```rust
//! use daq_channels::{Params, Runtime};
//!
//! let rt = Runtime::with_std_channels();
//! let buffer = rt.create("buffer", "b1");
//! rt.setup(buffer, &Params::ints([4]));
//! rt.write_string(buffer, "ab");
//! assert_eq!(rt.read_string(buffer), "ab");
//! ```

use crate::channel::{Bound, Call, ChannelId, ChannelKind, Dispatch, LinkMode, Operation, ReturnSlot, StateRef};
use crate::param::{param_to_channel, Params, Value};
use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

// =============================================================================
// Registry
// =============================================================================

struct Entry {
    name: String,
    dispatch: Arc<dyn Dispatch>,
    links: Vec<ChannelId>,
    parent: Option<ChannelId>,
}

#[derive(Default)]
struct Registry {
    entries: Vec<Entry>,
    names: HashMap<String, ChannelId>,
}

impl Registry {
    fn entry(&self, id: ChannelId) -> Option<&Entry> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.entries.get(index)
    }

    fn entry_mut(&mut self, id: ChannelId) -> Option<&mut Entry> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.entries.get_mut(index)
    }
}

/// Summary of a registered channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    /// Channel id
    pub id: ChannelId,
    /// Unique name
    pub name: String,
    /// Kind name, e.g. `"buffer"`
    pub kind: &'static str,
    /// Whether this is a kind channel (stateless, answers `create`)
    pub is_kind: bool,
    /// Owning channel, for subchannels
    pub parent: Option<ChannelId>,
    /// Fan-out list in order
    pub links: Vec<ChannelId>,
}

/// Channel registry and dispatcher.
pub struct Runtime {
    registry: RwLock<Registry>,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("channels", &self.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// An empty runtime with no kinds registered.
    pub fn new() -> Self {
        Runtime {
            registry: RwLock::new(Registry::default()),
        }
    }

    /// A runtime with every standard channel kind registered.
    pub fn with_std_channels() -> Self {
        let rt = Runtime::new();
        crate::channels::register_std_channels(&rt);
        rt
    }

    // =========================================================================
    // Registration
    // =========================================================================

    fn register(&self, name: &str, dispatch: Arc<dyn Dispatch>, parent: Option<ChannelId>) -> ChannelId {
        let name = name.trim();
        let kind = dispatch.kind_name();
        let mut registry = self.registry.write();
        if name.is_empty() || registry.names.contains_key(name) {
            warn!(name, kind, "channel name is empty or already registered");
            return ChannelId::NONE;
        }
        let Ok(raw) = u32::try_from(registry.entries.len() + 1) else {
            warn!(name, kind, "channel id space exhausted");
            return ChannelId::NONE;
        };
        let id = ChannelId::from_raw(raw);
        registry.entries.push(Entry {
            name: name.to_string(),
            dispatch,
            links: Vec::new(),
            parent,
        });
        registry.names.insert(name.to_string(), id);
        debug!(%id, name, kind, "channel registered");
        id
    }

    /// Register a channel of kind `K`. `None` state makes it a kind channel.
    ///
    /// Returns id 0 when the name is empty or taken.
    pub fn create_channel<K: ChannelKind>(&self, name: &str, kind: K, state: Option<K::State>) -> ChannelId {
        let state = match state {
            Some(state) => StateRef::Owned(Arc::new(state)),
            None => StateRef::Detached,
        };
        self.register(name, Arc::new(Bound { kind, state }), None)
    }

    /// Register a channel whose state the caller keeps a handle to (for subchannels).
    pub fn create_shared_channel<K: ChannelKind>(&self, name: &str, kind: K, state: Arc<K::State>) -> ChannelId {
        let bound = Bound {
            kind,
            state: StateRef::Owned(state),
        };
        self.register(name, Arc::new(bound), None)
    }

    /// Register a channel named by parameter `index`. A missing name yields id 0.
    pub fn create_channel_param<K: ChannelKind>(
        &self,
        params: &Params,
        index: usize,
        kind: K,
        state: Arc<K::State>,
    ) -> ChannelId {
        match params.text(index) {
            Some(name) => self.create_shared_channel(&name, kind, state),
            None => ChannelId::NONE,
        }
    }

    /// Register a subchannel named `<parent name><suffix>`.
    ///
    /// The subchannel holds a non-owning reference to `state`; it never outlives the
    /// parent's state in any observable way, its calls just become no-ops.
    pub fn create_subchannel<K: ChannelKind>(
        &self,
        parent: ChannelId,
        suffix: &str,
        kind: K,
        state: &Arc<K::State>,
    ) -> ChannelId {
        let Some(parent_name) = self.name(parent) else {
            return ChannelId::NONE;
        };
        let bound = Bound {
            kind,
            state: StateRef::Shared(Arc::downgrade(state)),
        };
        self.register(&format!("{parent_name}{suffix}"), Arc::new(bound), Some(parent))
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Id registered under `name`, or id 0.
    pub fn lookup(&self, name: &str) -> ChannelId {
        self.registry
            .read()
            .names
            .get(name)
            .copied()
            .unwrap_or(ChannelId::NONE)
    }

    /// Name of channel `id`.
    pub fn name(&self, id: ChannelId) -> Option<String> {
        self.registry.read().entry(id).map(|e| e.name.clone())
    }

    /// Whether `id` names a registered channel.
    pub fn contains(&self, id: ChannelId) -> bool {
        self.registry.read().entry(id).is_some()
    }

    /// Number of registered channels, kind channels included.
    pub fn len(&self) -> usize {
        self.registry.read().entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every registered channel in id order.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let registry = self.registry.read();
        registry
            .entries
            .iter()
            .zip(1u32..)
            .map(|(entry, raw)| ChannelInfo {
                id: ChannelId::from_raw(raw),
                name: entry.name.clone(),
                kind: entry.dispatch.kind_name(),
                is_kind: !entry.dispatch.has_state(),
                parent: entry.parent,
                links: entry.links.clone(),
            })
            .collect()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn dispatcher(&self, id: ChannelId) -> Option<Arc<dyn Dispatch>> {
        if id.is_none() {
            return None;
        }
        self.registry.read().entry(id).map(|e| Arc::clone(&e.dispatch))
    }

    /// Route one operation to channel `id`.
    ///
    /// Id 0 and unregistered ids are silent no-ops. `Link` updates the fan-out list
    /// before the kind sees the call.
    pub fn dispatch(&self, id: ChannelId, op: Operation, params: &Params, ret: &mut ReturnSlot) {
        let Some(target) = self.dispatcher(id) else {
            trace!(%id, %op, "dispatch to unregistered channel ignored");
            return;
        };
        if op == Operation::Link {
            self.apply_links(id, target.link_mode(), params);
        }
        target.dispatch(Call {
            rt: self,
            id,
            op,
            params,
            ret,
        });
    }

    fn apply_links(&self, id: ChannelId, mode: LinkMode, params: &Params) {
        let targets: Vec<ChannelId> = (0..params.len())
            .map(|i| param_to_channel(self, params, i))
            .filter(|target| !target.is_none())
            .collect();
        let mut registry = self.registry.write();
        if let Some(entry) = registry.entry_mut(id) {
            if mode == LinkMode::Replace {
                entry.links.clear();
            }
            entry.links.extend(targets);
            trace!(%id, links = ?entry.links, "fan-out updated");
        }
    }

    fn call(&self, id: ChannelId, op: Operation, params: &Params) -> Option<Value> {
        let mut ret = ReturnSlot::capture();
        self.dispatch(id, op, params, &mut ret);
        ret.take()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Description of channel `id`'s kind.
    pub fn help(&self, id: ChannelId) -> Option<String> {
        self.call(id, Operation::Help, &Params::empty())
            .map(|v| v.to_text())
    }

    /// Create a channel of kind `kind` named `name` by dispatching to the kind channel.
    pub fn create(&self, kind: &str, name: &str) -> ChannelId {
        let class = self.lookup(kind);
        match self.call(class, Operation::Create, &Params::texts([name])) {
            Some(Value::Channel(id)) => id,
            _ => ChannelId::NONE,
        }
    }

    /// Configure channel `id`.
    pub fn setup(&self, id: ChannelId, params: &Params) -> Option<Value> {
        self.call(id, Operation::Setup, params)
    }

    /// Write to channel `id`.
    pub fn write(&self, id: ChannelId, params: &Params) -> Option<Value> {
        self.call(id, Operation::Write, params)
    }

    /// Zero-parameter write: the trigger/flush/reset signal.
    pub fn trigger(&self, id: ChannelId) -> Option<Value> {
        self.write(id, &Params::empty())
    }

    /// Read channel `id`.
    pub fn read(&self, id: ChannelId) -> Option<Value> {
        self.call(id, Operation::Read, &Params::empty())
    }

    /// Read channel `id` with arguments.
    pub fn read_with(&self, id: ChannelId, params: &Params) -> Option<Value> {
        self.call(id, Operation::Read, params)
    }

    /// Link `target` into `id`'s fan-out list.
    pub fn link(&self, id: ChannelId, target: ChannelId) {
        self.dispatch(id, Operation::Link, &Params::channels([target]), &mut ReturnSlot::Discard);
    }

    /// Current fan-out list of `id`, in order.
    pub fn resolve_linked(&self, id: ChannelId) -> Vec<ChannelId> {
        self.registry
            .read()
            .entry(id)
            .map(|e| e.links.clone())
            .unwrap_or_default()
    }

    /// Write `params` to every channel linked from `id`.
    ///
    /// Every target is tried; one that does nothing does not stop the rest.
    pub fn write_linked(&self, id: ChannelId, params: &Params) {
        for target in self.resolve_linked(id) {
            self.write(target, params);
        }
    }

    /// Write one byte buffer to every channel linked from `id`.
    pub fn write_linked_buffer(&self, id: ChannelId, data: Bytes) {
        self.write_linked(id, &Params::bytes([data]));
    }

    /// Write one text value to every channel linked from `id`.
    pub fn write_linked_string(&self, id: ChannelId, text: &str) {
        self.write_linked(id, &Params::texts([text]));
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    /// Read `id` as an integer, 0 when it returns nothing.
    pub fn read_int(&self, id: ChannelId) -> i64 {
        self.read(id).map_or(0, |v| v.as_int())
    }

    /// Read `id` as a float, 0.0 when it returns nothing.
    pub fn read_float(&self, id: ChannelId) -> f64 {
        self.read(id).map_or(0.0, |v| v.as_float())
    }

    /// Read `id` as text, empty when it returns nothing.
    pub fn read_string(&self, id: ChannelId) -> String {
        self.read(id).map(|v| v.to_text()).unwrap_or_default()
    }

    /// Read `id` as bytes, empty when it returns nothing.
    pub fn read_bytes(&self, id: ChannelId) -> Bytes {
        self.read(id).map(|v| v.to_bytes()).unwrap_or_default()
    }

    /// Write one integer to `id`.
    pub fn write_int(&self, id: ChannelId, value: i64) {
        self.write(id, &Params::ints([value]));
    }

    /// Write one float to `id`.
    pub fn write_float(&self, id: ChannelId, value: f64) {
        self.write(id, &Params::floats([value]));
    }

    /// Write one text value to `id`.
    pub fn write_string(&self, id: ChannelId, text: &str) {
        self.write(id, &Params::texts([text]));
    }

    /// Write one byte buffer to `id`.
    pub fn write_buffer(&self, id: ChannelId, data: impl Into<Bytes>) {
        self.write(id, &Params::bytes([data.into()]));
    }
}
