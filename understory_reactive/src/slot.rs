// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-instance property storage.
//!
//! A [`Slot`] is the storage cell backing one property of one object. Slots
//! are shared handles: bindings, cache dependencies and alert frames all refer
//! to slots directly, so a slot keeps working after the path used to find it
//! has changed.
//!
//! The slot variants mirror [`PropertyKind`]:
//!
//! | Kind       | Stores                         | Alerts on                 |
//! |------------|--------------------------------|---------------------------|
//! | Observable | a value                        | never                     |
//! | Reactive   | a value                        | every write               |
//! | Bindable   | a literal or a target slot     | bind, write, target alert |
//! | Cached     | a lazily computed value        | dependency alert          |
//! | Constant   | a fixed value                  | never                     |
//!
//! Names that are not properties resolve to an attribute-reference slot, a
//! non-reactive view onto the object's plain attribute of that name.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, OnceCell, RefCell};
use core::fmt;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::alert::{
    AlertEvent, AlertFrame, AlertReason, BindingState, CallbackKey, Listener, Observer,
    ObserverTable,
};
use crate::descriptor::{Definition, Getter, PropertyDescriptor, PropertyKind};
use crate::error::{Error, Result};
use crate::object::{Object, ObjectInner};
use crate::value::ErasedValue;

/// What [`Slot::bind`] should make a bindable slot read from.
#[derive(Clone, Debug)]
pub enum BindTarget {
    /// Drop any binding and revert to the declared default.
    Default,
    /// Forward reads and writes to another slot.
    Slot(Slot),
    /// Hold a literal value.
    Value(ErasedValue),
}

impl BindTarget {
    /// A literal value target.
    #[must_use]
    pub fn value<T: Clone + 'static>(value: T) -> Self {
        Self::Value(ErasedValue::new(value))
    }
}

impl From<Slot> for BindTarget {
    fn from(slot: Slot) -> Self {
        Self::Slot(slot)
    }
}

impl From<&Slot> for BindTarget {
    fn from(slot: &Slot) -> Self {
        Self::Slot(slot.clone())
    }
}

impl From<Option<Slot>> for BindTarget {
    fn from(slot: Option<Slot>) -> Self {
        slot.map_or(Self::Default, Self::Slot)
    }
}

enum SlotState {
    Observable(ErasedValue),
    Reactive(ErasedValue),
    Bindable {
        default: ErasedValue,
        binding: BindingState,
    },
    Cached {
        getter: Getter,
        valid: bool,
        value: Option<ErasedValue>,
        dependencies: Vec<Slot>,
    },
    Constant(ErasedValue),
    Attribute,
}

struct SlotInner {
    class: &'static str,
    name: &'static str,
    readonly: bool,
    owner: Weak<ObjectInner>,
    state: RefCell<SlotState>,
    observers: RefCell<ObserverTable>,
    initialized: Cell<bool>,
    // Relay (bindable) or invalidator (cached); observed slots hold it weakly.
    upstream: OnceCell<Listener>,
}

/// Shared handle to one property's storage on one object.
#[derive(Clone)]
pub struct Slot(Rc<SlotInner>);

impl Slot {
    pub(crate) fn from_descriptor(
        descriptor: &PropertyDescriptor,
        class: &'static str,
        owner: Weak<ObjectInner>,
    ) -> Self {
        let state = match descriptor.definition() {
            Definition::Observable(value) => SlotState::Observable(value.clone()),
            Definition::Reactive(value) => SlotState::Reactive(value.clone()),
            Definition::Bindable(value) => SlotState::Bindable {
                default: value.clone(),
                binding: BindingState::Unbound(value.clone()),
            },
            Definition::Cached { getter, .. } => SlotState::Cached {
                getter: getter.clone(),
                valid: false,
                value: None,
                dependencies: Vec::new(),
            },
            Definition::Constant(value) => SlotState::Constant(value.clone()),
        };
        Self::with_state(class, descriptor.name(), descriptor.readonly(), owner, state)
    }

    pub(crate) fn attribute(
        class: &'static str,
        name: &'static str,
        owner: Weak<ObjectInner>,
    ) -> Self {
        let slot = Self::with_state(class, name, false, owner, SlotState::Attribute);
        slot.0.initialized.set(true);
        slot
    }

    fn with_state(
        class: &'static str,
        name: &'static str,
        readonly: bool,
        owner: Weak<ObjectInner>,
        state: SlotState,
    ) -> Self {
        Self(Rc::new(SlotInner {
            class,
            name,
            readonly,
            owner,
            state: RefCell::new(state),
            observers: RefCell::default(),
            initialized: Cell::new(false),
            upstream: OnceCell::new(),
        }))
    }

    /// Property name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Name of the class whose instance owns this slot.
    #[must_use]
    #[inline]
    pub fn class_name(&self) -> &'static str {
        self.0.class
    }

    /// The slot's kind, or `None` for an attribute reference.
    #[must_use]
    pub fn kind(&self) -> Option<PropertyKind> {
        match &*self.0.state.borrow() {
            SlotState::Observable(_) => Some(PropertyKind::Observable),
            SlotState::Reactive(_) => Some(PropertyKind::Reactive),
            SlotState::Bindable { .. } => Some(PropertyKind::Bindable),
            SlotState::Cached { .. } => Some(PropertyKind::Cached),
            SlotState::Constant(_) => Some(PropertyKind::Constant),
            SlotState::Attribute => None,
        }
    }

    /// Whether writes are rejected.
    #[must_use]
    #[inline]
    pub fn readonly(&self) -> bool {
        self.0.readonly
    }

    /// The object owning this slot, if it is still alive.
    #[must_use]
    pub fn owner(&self) -> Option<Object> {
        self.0.owner.upgrade().map(Object::from_inner)
    }

    /// Returns `true` if both handles refer to the same slot.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this slot accepts callbacks.
    ///
    /// Bindable slots are reactive while unbound and otherwise inherit the
    /// answer from their target.
    #[must_use]
    pub fn is_reactive(&self) -> bool {
        let target = match &*self.0.state.borrow() {
            SlotState::Observable(_) | SlotState::Attribute => return false,
            SlotState::Reactive(_)
            | SlotState::Cached { .. }
            | SlotState::Constant(_)
            | SlotState::Bindable {
                binding: BindingState::Unbound(_),
                ..
            } => return true,
            SlotState::Bindable {
                binding: BindingState::Bound(target),
                ..
            } => target.clone(),
        };
        target.is_reactive()
    }

    /// Whether a cached slot currently holds a computed value.
    ///
    /// Always `true` for other kinds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match &*self.0.state.borrow() {
            SlotState::Cached { valid, .. } => *valid,
            _ => true,
        }
    }

    /// The current binding of a bindable slot.
    #[must_use]
    pub fn binding(&self) -> Option<BindingState> {
        match &*self.0.state.borrow() {
            SlotState::Bindable { binding, .. } => Some(binding.clone()),
            _ => None,
        }
    }

    /// Number of registered observers, including expired weak ones not yet
    /// pruned.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.0.observers.borrow().len()
    }

    /// Reads the slot.
    ///
    /// Bound slots read their target. Invalid cached slots run their getter
    /// with the owning object and keep the result until a dependency alerts.
    pub fn get(&self) -> Result<ErasedValue> {
        let getter = {
            let state = self.0.state.borrow();
            match &*state {
                SlotState::Observable(value)
                | SlotState::Reactive(value)
                | SlotState::Constant(value)
                | SlotState::Bindable {
                    binding: BindingState::Unbound(value),
                    ..
                } => return Ok(value.clone()),
                SlotState::Cached {
                    valid: true,
                    value: Some(value),
                    ..
                } => return Ok(value.clone()),
                SlotState::Bindable {
                    binding: BindingState::Bound(target),
                    ..
                } => {
                    let target = target.clone();
                    drop(state);
                    return target.get();
                }
                SlotState::Attribute => {
                    drop(state);
                    let owner = self.owner_object()?;
                    return owner.attribute_value(self.0.name).ok_or(Error::UnknownMember {
                        class: self.0.class,
                        name: self.0.name,
                    });
                }
                SlotState::Cached { getter, .. } => getter.clone(),
            }
        };

        let owner = self.owner_object()?;
        trace!(class = self.0.class, property = self.0.name, "evaluating cached property");
        let computed = getter(&owner)?;
        if let SlotState::Cached { valid, value, .. } = &mut *self.0.state.borrow_mut() {
            *valid = true;
            *value = Some(computed.clone());
        }
        Ok(computed)
    }

    /// Writes the slot.
    ///
    /// Reactive and unbound bindable slots alert `(self, set, (old, new))`.
    /// Bound slots forward the write to their target, whose alert reaches
    /// this slot's observers through the relay.
    pub fn set(&self, value: ErasedValue) -> Result<()> {
        if self.0.readonly {
            return Err(Error::ReadonlyViolation {
                class: self.0.class,
                property: self.0.name,
            });
        }
        let old = {
            let mut state = self.0.state.borrow_mut();
            match &mut *state {
                SlotState::Observable(stored) => {
                    self.check_type(stored, &value)?;
                    *stored = value;
                    return Ok(());
                }
                SlotState::Reactive(stored)
                | SlotState::Bindable {
                    binding: BindingState::Unbound(stored),
                    ..
                } => {
                    self.check_type(stored, &value)?;
                    core::mem::replace(stored, value.clone())
                }
                SlotState::Bindable {
                    binding: BindingState::Bound(target),
                    ..
                } => {
                    let target = target.clone();
                    drop(state);
                    return target.set(value);
                }
                SlotState::Attribute => {
                    drop(state);
                    self.owner_object()?.store_attribute(self.0.name, value);
                    return Ok(());
                }
                SlotState::Cached { .. } | SlotState::Constant(_) => {
                    return Err(Error::ReadonlyViolation {
                        class: self.0.class,
                        property: self.0.name,
                    });
                }
            }
        };
        let frame = AlertFrame::new(self.clone(), AlertEvent::Set { old, new: value });
        self.raise_alert(&AlertReason::new(frame))
    }

    /// Changes what a bindable slot reads from.
    ///
    /// Binding to a slot first checks that the target's binding and dependency
    /// chain does not lead back here, then subscribes to the target if it is
    /// reactive. Any previous target is unsubscribed. Every successful call
    /// alerts `(self, bind, (old, new))`.
    pub fn bind(&self, target: impl Into<BindTarget>) -> Result<()> {
        let default = match &*self.0.state.borrow() {
            SlotState::Bindable { default, .. } => default.clone(),
            _ => return Err(self.not_bindable()),
        };
        let new = match target.into() {
            BindTarget::Default => BindingState::Unbound(default),
            BindTarget::Value(value) => {
                self.check_type(&default, &value)?;
                BindingState::Unbound(value)
            }
            BindTarget::Slot(target) => {
                target.check_circular_binding(self)?;
                BindingState::Bound(target)
            }
        };

        let old = {
            let mut state = self.0.state.borrow_mut();
            let SlotState::Bindable { binding, .. } = &mut *state else {
                return Err(self.not_bindable());
            };
            core::mem::replace(binding, new.clone())
        };

        let key = self.upstream_key();
        if let BindingState::Bound(previous) = &old {
            previous.0.observers.borrow_mut().remove(key);
        }
        if let BindingState::Bound(target) = &new
            && target.is_reactive()
        {
            target.subscribe(key, Observer::weak(&self.upstream_listener()))?;
        }
        debug!(
            class = self.0.class,
            property = self.0.name,
            bound = new.is_bound(),
            "binding changed"
        );

        let frame = AlertFrame::new(self.clone(), AlertEvent::Bind { old, new });
        self.raise_alert(&AlertReason::new(frame))
    }

    /// Registers a callback held strongly by this slot.
    ///
    /// Without an explicit key, the key is derived from the callback's
    /// identity. Constant slots accept the registration and never call it.
    pub fn add_callback<F>(&self, callback: F, key: Option<CallbackKey>) -> Result<CallbackKey>
    where
        F: Fn(&AlertReason) -> Result<()> + 'static,
    {
        let listener: Listener = Rc::new(callback);
        let key = key.unwrap_or_else(|| CallbackKey::of(&listener));
        self.subscribe(key, Observer::Strong(listener))
    }

    /// Registers a listener held weakly by this slot.
    ///
    /// The registration lapses once the caller drops every strong reference
    /// to `listener`.
    pub fn add_listener(
        &self,
        listener: &Listener,
        key: Option<CallbackKey>,
    ) -> Result<CallbackKey> {
        let key = key.unwrap_or_else(|| CallbackKey::of(listener));
        self.subscribe(key, Observer::weak(listener))
    }

    /// Removes a registration.
    pub fn del_callback(&self, key: CallbackKey) -> Result<()> {
        if matches!(&*self.0.state.borrow(), SlotState::Constant(_)) {
            return Ok(());
        }
        if self.0.observers.borrow_mut().remove(key) {
            Ok(())
        } else {
            Err(Error::UnknownCallbackKey { key })
        }
    }

    /// Returns `true` if a registration exists under `key`.
    #[must_use]
    pub fn has_callback(&self, key: CallbackKey) -> bool {
        self.0.observers.borrow().contains(key)
    }

    /// Discards a cached value and alerts `(self, invalidate, (old,))`.
    ///
    /// No-op for other kinds.
    pub fn invalidate(&self) -> Result<()> {
        self.invalidate_from(None)
    }

    // ------------------------------------------------------------------------
    // Crate internals
    // ------------------------------------------------------------------------

    pub(crate) fn mark_initialized(&self) -> Result<()> {
        if self.0.initialized.replace(true) {
            return Err(Error::DoubleInitialization {
                class: self.0.class,
                property: self.0.name,
            });
        }
        Ok(())
    }

    /// Subscribes a cached slot to its resolved dependencies.
    pub(crate) fn attach_dependencies(&self, dependencies: Vec<Slot>) -> Result<()> {
        for dependency in &dependencies {
            dependency.check_circular_binding(self)?;
            if !dependency.is_reactive() {
                return Err(Error::NonReactiveDependency {
                    class: self.0.class,
                    property: self.0.name,
                    dependency: dependency.name(),
                });
            }
        }
        let listener = self.upstream_listener();
        let key = self.upstream_key();
        for dependency in &dependencies {
            dependency.subscribe(key, Observer::weak(&listener))?;
        }
        trace!(
            class = self.0.class,
            property = self.0.name,
            dependencies = dependencies.len(),
            "cache dependencies attached"
        );
        if let SlotState::Cached {
            dependencies: slot_dependencies,
            ..
        } = &mut *self.0.state.borrow_mut()
        {
            *slot_dependencies = dependencies;
        }
        Ok(())
    }

    pub(crate) fn subscribe(&self, key: CallbackKey, observer: Observer) -> Result<CallbackKey> {
        if !self.is_reactive() {
            return Err(Error::NotReactive {
                class: self.0.class,
                property: self.0.name,
            });
        }
        if !matches!(&*self.0.state.borrow(), SlotState::Constant(_)) {
            self.0.observers.borrow_mut().insert(key, observer);
        }
        Ok(key)
    }

    /// Removes a registration if present.
    pub(crate) fn unsubscribe(&self, key: CallbackKey) {
        self.0.observers.borrow_mut().remove(key);
    }

    /// Fails if following `self`'s bindings and dependencies reaches `origin`.
    pub(crate) fn check_circular_binding(&self, origin: &Self) -> Result<()> {
        let next: SmallVec<[Self; 4]> = match &*self.0.state.borrow() {
            SlotState::Bindable { binding, .. } => {
                if self.ptr_eq(origin) {
                    return Err(origin.circular());
                }
                binding.target().cloned().into_iter().collect()
            }
            SlotState::Cached { dependencies, .. } => {
                if self.ptr_eq(origin) {
                    return Err(origin.circular());
                }
                dependencies.iter().cloned().collect()
            }
            _ => SmallVec::new(),
        };
        for slot in &next {
            slot.check_circular_binding(origin)?;
        }
        Ok(())
    }

    /// Delivers `reason` to every live observer in registration order.
    fn raise_alert(&self, reason: &AlertReason) -> Result<()> {
        let snapshot = self.0.observers.borrow().snapshot();
        trace!(
            class = self.0.class,
            property = self.0.name,
            kind = %reason.closest().kind(),
            observers = snapshot.len(),
            "dispatching alert"
        );
        let mut expired = false;
        for (_, observer) in &snapshot {
            match observer.upgrade() {
                Some(listener) => listener(reason)?,
                None => expired = true,
            }
        }
        if expired {
            let pruned = self.0.observers.borrow_mut().prune_expired();
            trace!(
                class = self.0.class,
                property = self.0.name,
                pruned,
                "pruned expired observers"
            );
        }
        Ok(())
    }

    fn on_upstream_alert(&self, cause: &AlertReason) -> Result<()> {
        let relay = match &*self.0.state.borrow() {
            SlotState::Bindable { .. } => true,
            SlotState::Cached { .. } => false,
            _ => return Ok(()),
        };
        if relay {
            let frame = AlertFrame::new(self.clone(), cause.closest().event().clone());
            self.raise_alert(&AlertReason::caused(frame, cause))
        } else {
            self.invalidate_from(Some(cause))
        }
    }

    fn invalidate_from(&self, cause: Option<&AlertReason>) -> Result<()> {
        let (old, from_dependency) = {
            let mut state = self.0.state.borrow_mut();
            let SlotState::Cached {
                valid,
                value,
                dependencies,
                ..
            } = &mut *state
            else {
                return Ok(());
            };
            *valid = false;
            let from_dependency = cause.and_then(|cause| {
                let origin = cause.closest().originator();
                dependencies
                    .iter()
                    .any(|dependency| dependency.ptr_eq(origin))
                    .then(|| origin.clone())
            });
            (value.take(), from_dependency)
        };
        if let Some(dependency) = from_dependency
            && !dependency.is_reactive()
        {
            return Err(Error::NonReactiveDependency {
                class: self.0.class,
                property: self.0.name,
                dependency: dependency.name(),
            });
        }
        trace!(class = self.0.class, property = self.0.name, "cached property invalidated");

        let frame = AlertFrame::new(self.clone(), AlertEvent::Invalidate { old });
        let reason = match cause {
            Some(cause) => AlertReason::caused(frame, cause),
            None => AlertReason::new(frame),
        };
        self.raise_alert(&reason)
    }

    fn upstream_key(&self) -> CallbackKey {
        CallbackKey::of(&self.0)
    }

    fn upstream_listener(&self) -> Listener {
        self.0
            .upstream
            .get_or_init(|| {
                let weak = Rc::downgrade(&self.0);
                let listener: Listener = Rc::new(move |reason: &AlertReason| match weak.upgrade() {
                    Some(inner) => Self(inner).on_upstream_alert(reason),
                    None => Ok(()),
                });
                listener
            })
            .clone()
    }

    fn owner_object(&self) -> Result<Object> {
        self.owner().ok_or(Error::Detached {
            class: self.0.class,
        })
    }

    fn check_type(&self, stored: &ErasedValue, value: &ErasedValue) -> Result<()> {
        if stored.same_type(value) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                name: self.0.name,
                expected: stored.type_name(),
            })
        }
    }

    fn circular(&self) -> Error {
        Error::CircularBinding {
            class: self.0.class,
            property: self.0.name,
        }
    }

    fn not_bindable(&self) -> Error {
        Error::NotBindable {
            class: self.0.class,
            property: self.0.name,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `try_borrow` keeps Debug usable from inside a callback.
        let kind = self.0.state.try_borrow().ok().map(|state| match &*state {
            SlotState::Observable(_) => "observable",
            SlotState::Reactive(_) => "reactive",
            SlotState::Bindable { .. } => "bindable",
            SlotState::Cached { .. } => "cached",
            SlotState::Constant(_) => "constant",
            SlotState::Attribute => "attribute",
        });
        f.debug_struct("Slot")
            .field("class", &self.0.class)
            .field("name", &self.0.name)
            .field("kind", &kind)
            .field("observers", &self.0.observers.try_borrow().map(|o| o.len()).ok())
            .finish_non_exhaustive()
    }
}
