// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Alerts and observer bookkeeping.
//!
//! Every reactive slot owns an observer table. A mutation builds an
//! [`AlertReason`] and hands it to each observer in registration order. When an
//! alert passes through another reactive layer (a bindable relaying its
//! target, or a cached value being invalidated) that layer prepends its own
//! [`AlertFrame`], so observers see the whole causal chain: the closest cause
//! first and the original mutation last.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::fmt;
use smallvec::SmallVec;

use crate::error::Result;
use crate::object::Object;
use crate::slot::Slot;
use crate::value::ErasedValue;

/// Callback observing a single slot.
///
/// Returning an error stops the remaining fan-out and surfaces the error from
/// the mutating call.
pub type Listener = Rc<dyn Fn(&AlertReason) -> Result<()>>;

/// Callback declared on a class, invoked with the instance it is bound to.
pub type InstanceCallback = Rc<dyn Fn(&Object, &AlertReason) -> Result<()>>;

/// Identifies a registration in an observer table.
///
/// Keys are either chosen by the caller or derived from the identity of the
/// registered callback. Registering a second callback under an existing key
/// replaces the first in place.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKey {
    /// A caller-chosen key.
    Named(&'static str),
    /// A key derived from the address of a shared allocation.
    Identity(usize),
}

impl CallbackKey {
    /// A caller-chosen key.
    #[must_use]
    #[inline]
    pub const fn named(name: &'static str) -> Self {
        Self::Named(name)
    }

    /// A key derived from the identity of `rc`.
    #[must_use]
    #[inline]
    pub fn of<T: ?Sized>(rc: &Rc<T>) -> Self {
        Self::Identity(Rc::as_ptr(rc).cast::<()>().addr())
    }
}

impl fmt::Display for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "key `{name}`"),
            Self::Identity(addr) => write!(f, "key #{addr:#x}"),
        }
    }
}

/// The kind of mutation an [`AlertEvent`] reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// A value was written.
    Set,
    /// A bindable slot changed its binding.
    Bind,
    /// A cached slot dropped its value.
    Invalidate,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Set => "set",
            Self::Bind => "bind",
            Self::Invalidate => "invalidate",
        })
    }
}

/// What a bindable slot reads from.
#[derive(Clone, Debug)]
pub enum BindingState {
    /// A literal value held by the slot itself.
    Unbound(ErasedValue),
    /// Another slot that reads and writes are forwarded to.
    Bound(Slot),
}

impl BindingState {
    /// Returns `true` if reads are forwarded to another slot.
    #[must_use]
    #[inline]
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// Returns the target slot, if bound.
    #[must_use]
    pub fn target(&self) -> Option<&Slot> {
        match self {
            Self::Bound(slot) => Some(slot),
            Self::Unbound(_) => None,
        }
    }
}

/// Payload of one alert frame.
#[derive(Clone, Debug)]
pub enum AlertEvent {
    /// A value was written.
    Set {
        /// Value before the write.
        old: ErasedValue,
        /// Value after the write.
        new: ErasedValue,
    },
    /// A binding changed.
    Bind {
        /// Binding before the change.
        old: BindingState,
        /// Binding after the change.
        new: BindingState,
    },
    /// A cached value was discarded.
    Invalidate {
        /// The discarded value, if one had been computed.
        old: Option<ErasedValue>,
    },
}

impl AlertEvent {
    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> AlertKind {
        match self {
            Self::Set { .. } => AlertKind::Set,
            Self::Bind { .. } => AlertKind::Bind,
            Self::Invalidate { .. } => AlertKind::Invalidate,
        }
    }
}

/// One layer of an [`AlertReason`].
#[derive(Clone, Debug)]
pub struct AlertFrame {
    originator: Slot,
    event: AlertEvent,
}

impl AlertFrame {
    pub(crate) fn new(originator: Slot, event: AlertEvent) -> Self {
        Self { originator, event }
    }

    /// The slot that raised this frame.
    #[must_use]
    #[inline]
    pub fn originator(&self) -> &Slot {
        &self.originator
    }

    /// The event carried by this frame.
    #[must_use]
    #[inline]
    pub fn event(&self) -> &AlertEvent {
        &self.event
    }

    /// Shorthand for `self.event().kind()`.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> AlertKind {
        self.event.kind()
    }

    /// Name of the originating property.
    #[must_use]
    #[inline]
    pub fn property(&self) -> &'static str {
        self.originator.name()
    }
}

/// The causal chain delivered to observers, closest cause first.
///
/// Never empty.
#[derive(Clone, Debug)]
pub struct AlertReason {
    frames: Vec<AlertFrame>,
}

impl AlertReason {
    pub(crate) fn new(frame: AlertFrame) -> Self {
        let mut frames = Vec::with_capacity(1);
        frames.push(frame);
        Self { frames }
    }

    /// `cause` with `frame` prepended.
    pub(crate) fn caused(frame: AlertFrame, cause: &Self) -> Self {
        let mut frames = Vec::with_capacity(cause.frames.len() + 1);
        frames.push(frame);
        frames.extend(cause.frames.iter().cloned());
        Self { frames }
    }

    /// The frame raised by the slot being observed.
    #[must_use]
    #[inline]
    pub fn closest(&self) -> &AlertFrame {
        &self.frames[0]
    }

    /// The frame of the mutation that started the chain.
    #[must_use]
    #[inline]
    pub fn origin(&self) -> &AlertFrame {
        &self.frames[self.frames.len() - 1]
    }

    /// All frames, closest first.
    #[must_use]
    #[inline]
    pub fn frames(&self) -> &[AlertFrame] {
        &self.frames
    }

    /// Number of frames in the chain.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false`; present for symmetry with [`len`](Self::len).
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// ============================================================================
// Observer tables
// ============================================================================

/// How an observer table holds a listener.
///
/// Listeners owned by an instance (descriptor callbacks, relays, invalidators,
/// delayed callbacks) are held weakly so that subscribing never keeps the
/// listening side alive.
#[derive(Clone)]
pub(crate) enum Observer {
    Strong(Listener),
    Weak(Weak<dyn Fn(&AlertReason) -> Result<()>>),
}

impl Observer {
    pub(crate) fn weak(listener: &Listener) -> Self {
        Self::Weak(Rc::downgrade(listener))
    }

    pub(crate) fn upgrade(&self) -> Option<Listener> {
        match self {
            Self::Strong(listener) => Some(listener.clone()),
            Self::Weak(weak) => weak.upgrade(),
        }
    }

    fn is_expired(&self) -> bool {
        match self {
            Self::Strong(_) => false,
            Self::Weak(weak) => weak.strong_count() == 0,
        }
    }
}

pub(crate) type ObserverEntries = SmallVec<[(CallbackKey, Observer); 2]>;

/// Insertion-ordered map from [`CallbackKey`] to [`Observer`].
#[derive(Default)]
pub(crate) struct ObserverTable {
    entries: ObserverEntries,
}

impl ObserverTable {
    /// Adds `observer`, replacing any entry with the same key in place.
    pub(crate) fn insert(&mut self, key: CallbackKey, observer: Observer) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = observer,
            None => self.entries.push((key, observer)),
        }
    }

    pub(crate) fn remove(&mut self, key: CallbackKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.len() != before
    }

    pub(crate) fn contains(&self, key: CallbackKey) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Copy of the current entries, so dispatch can run without a borrow held.
    pub(crate) fn snapshot(&self) -> ObserverEntries {
        self.entries.clone()
    }

    /// Drops entries whose listener has been freed. Returns how many went.
    pub(crate) fn prune_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, observer)| !observer.is_expired());
        before - self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for ObserverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(key, _)| key))
            .finish()
    }
}
