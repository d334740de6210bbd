// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Objects: live instances of a [`Class`].
//!
//! An [`Object`] owns one [`Slot`] per property in its class's merged table.
//! Slots are created together on first access; creating them also wires the
//! class-level callbacks, the delayed callbacks anchored on each property and
//! the dependencies of cached properties.
//!
//! Composed members are created on first access as well. A member whose class
//! declares a parent reference gets its owner as parent before its initializer
//! runs, and that link is fixed for the member's lifetime. A free-standing
//! object can instead be attached to a host with [`Object::connect`], which
//! subscribes the callbacks its class left pending above itself, and detached
//! again with [`Object::disconnect`].

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, OnceCell, RefCell};
use core::fmt;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::alert::{AlertReason, CallbackKey, InstanceCallback, Listener};
use crate::class::Class;
use crate::compose::{Composition, DelayedCallback, Factory};
use crate::descriptor::Definition;
use crate::error::{Error, Result};
use crate::id::Property;
use crate::method::{ErasedMethod, Method};
use crate::path::{PathStep, PropertyPath};
use crate::slot::{BindTarget, Slot};
use crate::value::ErasedValue;

#[derive(Clone)]
enum Member {
    Building,
    Object(Object),
    Value(ErasedValue),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Link {
    Detached,
    /// Created as a member of its parent; cannot be disconnected.
    Composed,
    Connected,
}

/// A pending callback subscribed by [`Object::connect`].
struct Connection {
    slot: Slot,
    key: CallbackKey,
    // Keeps the weakly held listener alive while connected.
    _listener: Listener,
}

/// A delayed callback handed down by an owner, waiting for a member of this
/// object to be created.
#[derive(Clone)]
struct Forwarded {
    callback: DelayedCallback,
    anchor: Weak<ObjectInner>,
}

pub(crate) struct ObjectInner {
    class: Class,
    slots: OnceCell<Vec<Slot>>,
    slot_failure: OnceCell<Error>,
    members: RefCell<HashMap<&'static str, Member>>,
    forwarded: RefCell<HashMap<&'static str, Vec<Forwarded>>>,
    parent: RefCell<Option<Weak<ObjectInner>>>,
    link: Cell<Link>,
    attributes: RefCell<HashMap<&'static str, ErasedValue>>,
    listeners: RefCell<Vec<Listener>>,
    connections: RefCell<Vec<Connection>>,
    overrides: RefCell<HashMap<&'static str, ErasedMethod>>,
}

/// Shared handle to a live instance of a [`Class`].
///
/// Cloning an `Object` clones the handle.
///
/// # Example
///
/// ```rust
/// use core::cell::Cell;
/// use std::rc::Rc;
///
/// use understory_reactive::{ClassBuilder, Object, PropertyMetadata, PropertyRegistry};
///
/// let mut props = PropertyRegistry::new();
/// let count = props.reactive("count", PropertyMetadata::new(0_u32));
/// let class = ClassBuilder::new("Counter").registry(props).build().unwrap();
///
/// let object = Object::new(&class).unwrap();
/// let seen = Rc::new(Cell::new(0));
/// let sink = seen.clone();
/// object
///     .add_callback(
///         count,
///         move |_| {
///             sink.set(sink.get() + 1);
///             Ok(())
///         },
///         None,
///     )
///     .unwrap();
///
/// object.set(count, 3).unwrap();
/// assert_eq!(object.get(count).unwrap(), 3);
/// assert_eq!(seen.get(), 1);
/// ```
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    /// Creates an instance of `class` and runs its initializer.
    pub fn new(class: &Class) -> Result<Self> {
        let object = Self::allocate(class);
        object.run_initializer()?;
        debug!(class = class.name(), "object created");
        Ok(object)
    }

    /// The object's class.
    #[must_use]
    #[inline]
    pub fn class(&self) -> &Class {
        &self.0.class
    }

    /// Returns `true` if both handles refer to the same object.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The slot called `name`.
    ///
    /// Names outside the class's property table resolve to a plain attribute
    /// slot, which reads and writes [`attribute`](Self::attribute) storage and
    /// never alerts.
    pub fn slot(&self, name: &'static str) -> Result<Slot> {
        match self.0.class.property_index(name) {
            Some(index) => Ok(self.slots()?[index].clone()),
            None => Ok(Slot::attribute(
                self.0.class.name(),
                name,
                Rc::downgrade(&self.0),
            )),
        }
    }

    /// Reads a property.
    pub fn get<T: Clone + 'static>(&self, property: Property<T>) -> Result<T> {
        let value = self.slot(property.name())?.get()?;
        downcast(property.name(), &value)
    }

    /// Writes a property.
    pub fn set<T: Clone + 'static>(&self, property: Property<T>, value: T) -> Result<()> {
        self.slot(property.name())?.set(ErasedValue::new(value))
    }

    /// Changes what a bindable property reads from.
    pub fn bind<T>(&self, property: Property<T>, target: impl Into<BindTarget>) -> Result<()> {
        self.slot(property.name())?.bind(target)
    }

    /// Registers an instance callback on a property.
    ///
    /// The slot holds `callback` strongly until it is removed.
    pub fn add_callback<T, F>(
        &self,
        property: Property<T>,
        callback: F,
        key: Option<CallbackKey>,
    ) -> Result<CallbackKey>
    where
        F: Fn(&AlertReason) -> Result<()> + 'static,
    {
        self.slot(property.name())?.add_callback(callback, key)
    }

    /// Removes an instance callback.
    pub fn del_callback<T>(&self, property: Property<T>, key: CallbackKey) -> Result<()> {
        self.slot(property.name())?.del_callback(key)
    }

    /// Follows `path` from this object to a slot.
    ///
    /// Member hops create members on demand. A hop named after the object's
    /// parent reference, or an explicit parent hop, climbs to the parent.
    pub fn resolve(&self, path: &PropertyPath) -> Result<Slot> {
        let mut object = self.clone();
        for step in path.steps() {
            object = match *step {
                PathStep::Member(name) if object.0.class.parent_reference() != Some(name) => {
                    object.member(name)?
                }
                _ => object.parent().ok_or(Error::Detached {
                    class: object.0.class.name(),
                })?,
            };
        }
        object.slot(path.property())
    }

    /// Reads the value at the end of `path`.
    pub fn get_path<T: Clone + 'static>(&self, path: impl Into<PropertyPath>) -> Result<T> {
        let path = path.into();
        let value = self.resolve(&path)?.get()?;
        downcast(path.property(), &value)
    }

    /// The composed object member called `name`, created on first access.
    ///
    /// Repeated calls return the same object.
    pub fn member(&self, name: &'static str) -> Result<Self> {
        match self.compose(name)? {
            Member::Object(object) => Ok(object),
            _ => Err(Error::TypeMismatch {
                name,
                expected: "value member",
            }),
        }
    }

    /// The value of an autocreated member, computed on first access.
    ///
    /// Object members can be read this way as `T = Object`.
    pub fn autocreated<T: Clone + 'static>(&self, name: &'static str) -> Result<T> {
        let value = match self.compose(name)? {
            Member::Object(object) => ErasedValue::new(object),
            Member::Value(value) => value,
            Member::Building => {
                return Err(Error::CircularComposition {
                    class: self.0.class.name(),
                    member: name,
                });
            }
        };
        downcast(name, &value)
    }

    /// The object's parent, if it has one and it is alive.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Self)
    }

    /// Attaches a free-standing object to `host`.
    ///
    /// `host` becomes the target of the class's parent reference, and every
    /// callback the class declared on a path through that reference is
    /// subscribed. On failure nothing stays subscribed.
    pub fn connect(&self, host: &Self) -> Result<()> {
        let class = self.0.class.name();
        if self.0.class.parent_reference().is_none() {
            return Err(Error::NoParentReference { class });
        }
        if self.0.link.get() != Link::Detached {
            return Err(Error::AlreadyConnected { class });
        }
        *self.0.parent.borrow_mut() = Some(Rc::downgrade(&host.0));
        self.0.link.set(Link::Connected);

        let mut connections = Vec::new();
        if let Err(error) = self.attach_pending(&mut connections) {
            for connection in &connections {
                connection.slot.unsubscribe(connection.key);
            }
            *self.0.parent.borrow_mut() = None;
            self.0.link.set(Link::Detached);
            return Err(error);
        }
        debug!(
            class,
            host = host.0.class.name(),
            callbacks = connections.len(),
            "object connected"
        );
        *self.0.connections.borrow_mut() = connections;
        Ok(())
    }

    /// Detaches an object attached with [`connect`](Self::connect),
    /// unsubscribing the callbacks it made.
    ///
    /// Members created by composition keep their owner for life.
    pub fn disconnect(&self) -> Result<()> {
        let class = self.0.class.name();
        match self.0.link.get() {
            Link::Detached => Err(Error::NotConnected { class }),
            Link::Composed => Err(Error::ReadonlyComposition {
                class,
                member: self.0.class.parent_reference().unwrap_or_default(),
            }),
            Link::Connected => {
                let connections = core::mem::take(&mut *self.0.connections.borrow_mut());
                for connection in &connections {
                    connection.slot.unsubscribe(connection.key);
                }
                *self.0.parent.borrow_mut() = None;
                self.0.link.set(Link::Detached);
                debug!(class, callbacks = connections.len(), "object disconnected");
                Ok(())
            }
        }
    }

    /// Reads a plain attribute.
    #[must_use]
    pub fn attribute<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        self.0.attributes.borrow().get(name)?.downcast()
    }

    /// Writes a plain attribute.
    ///
    /// Property names are written through their slot. Composed members and
    /// the parent reference cannot be written.
    pub fn set_attribute<T: Clone + 'static>(&self, name: &'static str, value: T) -> Result<()> {
        let class = &self.0.class;
        if class.composition(name).is_some() || class.parent_reference() == Some(name) {
            return Err(Error::ReadonlyComposition {
                class: class.name(),
                member: name,
            });
        }
        if class.property_index(name).is_some() {
            return self.slot(name)?.set(ErasedValue::new(value));
        }
        self.store_attribute(name, ErasedValue::new(value));
        Ok(())
    }

    /// Invokes `method`, preferring this object's override to the class's
    /// implementation.
    pub fn call<A: 'static, R: 'static>(&self, method: Method<A, R>, args: A) -> Result<R> {
        let name = method.name();
        let erased = self
            .0
            .overrides
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| self.0.class.method(name).cloned())
            .ok_or(Error::UnknownMember {
                class: self.0.class.name(),
                name,
            })?;
        let function = erased.downcast::<A, R>().ok_or(Error::TypeMismatch {
            name,
            expected: erased.signature(),
        })?;
        Ok(function(self, args))
    }

    /// Replaces `method` on this object only.
    pub fn override_method<A, R, F>(&self, method: Method<A, R>, function: F)
    where
        A: 'static,
        R: 'static,
        F: Fn(&Self, A) -> R + 'static,
    {
        self.0
            .overrides
            .borrow_mut()
            .insert(method.name(), ErasedMethod::new(function));
    }

    /// Drops this object's override of `method`. Returns `false` if there
    /// was none.
    pub fn restore_method<A, R>(&self, method: Method<A, R>) -> bool {
        self.0.overrides.borrow_mut().remove(method.name()).is_some()
    }

    // ------------------------------------------------------------------------
    // Crate internals
    // ------------------------------------------------------------------------

    pub(crate) fn from_inner(inner: Rc<ObjectInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectInner> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn attribute_value(&self, name: &str) -> Option<ErasedValue> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub(crate) fn store_attribute(&self, name: &'static str, value: ErasedValue) {
        self.0.attributes.borrow_mut().insert(name, value);
    }

    /// Walks down a chain of object members.
    pub(crate) fn descend(&self, path: &[&'static str]) -> Result<Self> {
        path.iter()
            .try_fold(self.clone(), |object, &member| object.member(member))
    }

    /// Keeps a weakly subscribed listener alive for this object's lifetime.
    pub(crate) fn retain(&self, listener: Listener) {
        self.0.listeners.borrow_mut().push(listener);
    }

    fn allocate(class: &Class) -> Self {
        Self(Rc::new(ObjectInner {
            class: class.clone(),
            slots: OnceCell::new(),
            slot_failure: OnceCell::new(),
            members: RefCell::default(),
            forwarded: RefCell::default(),
            parent: RefCell::new(None),
            link: Cell::new(Link::Detached),
            attributes: RefCell::default(),
            listeners: RefCell::default(),
            connections: RefCell::default(),
            overrides: RefCell::default(),
        }))
    }

    fn run_initializer(&self) -> Result<()> {
        match self.0.class.initializer() {
            Some(initializer) => initializer(self),
            None => Ok(()),
        }
    }

    /// The slot table, created and wired on first access.
    ///
    /// If wiring fails the object keeps the error and returns it from every
    /// later access instead of exposing partially wired slots.
    fn slots(&self) -> Result<&[Slot]> {
        if let Some(failure) = self.0.slot_failure.get() {
            return Err(failure.clone());
        }
        let mut fresh = false;
        let slots = self.0.slots.get_or_init(|| {
            fresh = true;
            self.create_slots()
        });
        if fresh && let Err(failure) = self.initialize_slots(slots) {
            debug!(class = self.0.class.name(), %failure, "slot initialization failed");
            let _ = self.0.slot_failure.set(failure.clone());
            return Err(failure);
        }
        Ok(slots)
    }

    fn create_slots(&self) -> Vec<Slot> {
        let class = &self.0.class;
        (0..class.property_count())
            .map(|index| {
                Slot::from_descriptor(class.descriptor_at(index), class.name(), self.downgrade())
            })
            .collect()
    }

    fn initialize_slots(&self, slots: &[Slot]) -> Result<()> {
        let class = &self.0.class;
        for (index, slot) in slots.iter().enumerate() {
            slot.mark_initialized()?;
            let descriptor = class.descriptor_at(index);
            for (key, callback) in descriptor.callbacks() {
                let listener = self.instance_listener(callback);
                slot.add_listener(&listener, Some(*key))?;
                self.retain(listener);
            }
            for delayed in class.anchored_at(index) {
                let listener = delayed.listener(self);
                slot.add_listener(&listener, None)?;
                self.retain(listener);
            }
            if let Definition::Cached { dependencies, .. } = descriptor.definition() {
                let dependencies = dependencies
                    .iter()
                    .map(|path| self.resolve(path))
                    .collect::<Result<Vec<_>>>()?;
                slot.attach_dependencies(dependencies)?;
            }
        }
        trace!(class = class.name(), slots = slots.len(), "slots initialized");
        Ok(())
    }

    /// Wraps a class-level callback so it receives this object.
    fn instance_listener(&self, callback: &InstanceCallback) -> Listener {
        let object = self.downgrade();
        let callback = callback.clone();
        Rc::new(move |reason: &AlertReason| match object.upgrade() {
            Some(inner) => callback(&Self(inner), reason),
            None => Ok(()),
        })
    }

    fn compose(&self, name: &'static str) -> Result<Member> {
        let class = &self.0.class;
        let composition = class.composition(name).ok_or(Error::UnknownMember {
            class: class.name(),
            name,
        })?;
        match self.0.members.borrow_mut().entry(name) {
            Entry::Occupied(entry) => {
                return match entry.get() {
                    Member::Building => Err(Error::CircularComposition {
                        class: class.name(),
                        member: name,
                    }),
                    member => Ok(member.clone()),
                };
            }
            Entry::Vacant(entry) => {
                entry.insert(Member::Building);
            }
        }
        let created = self.create_member(composition);
        if created.is_err() {
            self.0.members.borrow_mut().remove(name);
        }
        created
    }

    fn create_member(&self, composition: &Composition) -> Result<Member> {
        let name = composition.name();
        let child_class = match composition.factory() {
            Factory::Value(factory) => {
                let value = Member::Value(factory(self)?);
                self.0.members.borrow_mut().insert(name, value.clone());
                return Ok(value);
            }
            Factory::Class(class) => class,
        };

        let child = Self::allocate(child_class);
        if child_class.parent_reference().is_some() {
            *child.0.parent.borrow_mut() = Some(self.downgrade());
            child.0.link.set(Link::Composed);
        }
        self.0
            .members
            .borrow_mut()
            .insert(name, Member::Object(child.clone()));
        child.run_initializer()?;
        for delayed in composition.delayed() {
            child.attach_delayed(delayed, self)?;
        }
        let forwarded = self.0.forwarded.borrow().get(name).cloned();
        for entry in forwarded.iter().flatten() {
            if let Some(anchor) = entry.anchor.upgrade() {
                child.attach_delayed(&entry.callback, &Self(anchor))?;
            }
        }
        self.0.forwarded.borrow_mut().remove(name);
        debug!(
            class = self.0.class.name(),
            member = name,
            member_class = child_class.name(),
            delayed = composition.delayed().len(),
            "member composed"
        );
        Ok(Member::Object(child))
    }

    /// Subscribes `delayed`, whose target is relative to this object, on
    /// behalf of `anchor`.
    ///
    /// A target below a member that does not exist yet is handed to this
    /// object for that member, one hop at a time, so members along the path
    /// are still created on first access.
    fn attach_delayed(&self, delayed: &DelayedCallback, anchor: &Self) -> Result<()> {
        let target = delayed.target();
        let Some((&PathStep::Member(first), rest)) = target.steps().split_first() else {
            let slot = self.resolve(target)?;
            let listener = delayed.listener(anchor);
            slot.add_listener(&listener, None)?;
            anchor.retain(listener);
            return Ok(());
        };
        let hops: SmallVec<[&'static str; 4]> = rest
            .iter()
            .filter_map(|step| match step {
                PathStep::Member(name) => Some(*name),
                PathStep::Parent => None,
            })
            .collect();
        let remaining = delayed.rebased(&hops);
        let existing = match self.0.members.borrow().get(first) {
            Some(Member::Object(member)) => Some(member.clone()),
            _ => None,
        };
        match existing {
            Some(member) => member.attach_delayed(&remaining, anchor),
            None => {
                trace!(
                    class = self.0.class.name(),
                    member = first,
                    target = %remaining.target(),
                    "delayed callback forwarded"
                );
                self.0
                    .forwarded
                    .borrow_mut()
                    .entry(first)
                    .or_default()
                    .push(Forwarded {
                        callback: remaining,
                        anchor: anchor.downgrade(),
                    });
                Ok(())
            }
        }
    }

    fn attach_pending(&self, connections: &mut Vec<Connection>) -> Result<()> {
        for delayed in self.0.class.pending() {
            let slot = self.resolve(delayed.target())?;
            let listener = delayed.listener(self);
            let key = slot.add_listener(&listener, None)?;
            connections.push(Connection {
                slot,
                key,
                _listener: listener,
            });
        }
        Ok(())
    }
}

fn downcast<T: Clone + 'static>(name: &'static str, value: &ErasedValue) -> Result<T> {
    value.downcast().ok_or(Error::TypeMismatch {
        name,
        expected: value.type_name(),
    })
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self
            .0
            .members
            .try_borrow()
            .map(|members| members.keys().copied().collect::<Vec<_>>())
            .ok();
        f.debug_struct("Object")
            .field("class", &self.0.class.name())
            .field("link", &self.0.link.get())
            .field("slots", &self.0.slots.get().map(Vec::len))
            .field("members", &members)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::metadata::PropertyMetadata;
    use crate::registry::PropertyRegistry;

    fn counter_class() -> (Class, Property<i32>) {
        let mut props = PropertyRegistry::new();
        let count = props.reactive("count", PropertyMetadata::new(0_i32));
        let class = ClassBuilder::new("Counter").registry(props).build().unwrap();
        (class, count)
    }

    #[test]
    fn property_defaults_and_writes() {
        let (class, count) = counter_class();
        let object = Object::new(&class).unwrap();
        assert_eq!(object.get(count).unwrap(), 0);
        object.set(count, 5).unwrap();
        assert_eq!(object.get(count).unwrap(), 5);
    }

    #[test]
    fn mistyped_handle_is_a_type_mismatch() {
        let (class, _) = counter_class();
        let object = Object::new(&class).unwrap();
        let wrong: Property<u8> = Property::new(crate::PropertyId::new(0), "count");
        assert_eq!(
            object.get(wrong),
            Err(Error::TypeMismatch {
                name: "count",
                expected: "i32"
            })
        );
    }

    #[test]
    fn failed_slot_wiring_is_reported_on_every_access() {
        let mut props = PropertyRegistry::new();
        let plain = props.observable("plain", PropertyMetadata::new(0_i32));
        let _broken = props.cached("broken", [PropertyPath::from(plain)], move |object| {
            object.get(plain)
        });
        let a = props.reactive("a", PropertyMetadata::new(1_i32));
        let x = props.cached("x", [PropertyPath::from(a)], move |object| object.get(a));
        let class = ClassBuilder::new("Broken").registry(props).build().unwrap();

        let object = Object::new(&class).unwrap();
        let failure = Error::NonReactiveDependency {
            class: "Broken",
            property: "broken",
            dependency: "plain",
        };
        assert_eq!(object.get(a), Err(failure.clone()));
        assert_eq!(object.get(a), Err(failure.clone()));
        assert_eq!(object.set(a, 5), Err(failure.clone()));
        assert_eq!(object.get(x), Err(failure));
    }

    #[test]
    fn unknown_names_fall_back_to_attributes() {
        let (class, _) = counter_class();
        let object = Object::new(&class).unwrap();
        assert_eq!(
            object.slot("note").unwrap().get().unwrap_err(),
            Error::UnknownMember {
                class: "Counter",
                name: "note"
            }
        );
        object.set_attribute("note", "hello").unwrap();
        assert_eq!(object.attribute::<&str>("note"), Some("hello"));
        assert!(!object.slot("note").unwrap().is_reactive());
    }

    #[test]
    fn set_attribute_on_property_goes_through_slot() {
        let (class, count) = counter_class();
        let object = Object::new(&class).unwrap();
        let fired = Rc::new(Cell::new(false));
        let sink = fired.clone();
        object
            .add_callback(
                count,
                move |_| {
                    sink.set(true);
                    Ok(())
                },
                None,
            )
            .unwrap();
        object.set_attribute("count", 9_i32).unwrap();
        assert!(fired.get());
        assert_eq!(object.get(count).unwrap(), 9);
    }

    #[test]
    fn class_callbacks_receive_the_instance() {
        let mut props = PropertyRegistry::new();
        let count = props.reactive("count", PropertyMetadata::new(0_i32));
        props
            .add_callback(
                count,
                |object: &Object, _: &AlertReason| {
                    object.set_attribute("seen", true)
                },
                None,
            )
            .unwrap();
        let class = ClassBuilder::new("Watched").registry(props).build().unwrap();
        let a = Object::new(&class).unwrap();
        let b = Object::new(&class).unwrap();
        a.set(count, 1).unwrap();
        assert_eq!(a.attribute::<bool>("seen"), Some(true));
        assert_eq!(b.attribute::<bool>("seen"), None);
    }

    #[test]
    fn initializer_runs_on_creation() {
        let class = ClassBuilder::new("Init")
            .init(|object| object.set_attribute("ready", 1_u8))
            .build()
            .unwrap();
        let object = Object::new(&class).unwrap();
        assert_eq!(object.attribute::<u8>("ready"), Some(1));
    }

    #[test]
    fn members_are_created_once() {
        let (counter, _) = counter_class();
        let class = ClassBuilder::new("Holder")
            .compose("counter", &counter)
            .build()
            .unwrap();
        let object = Object::new(&class).unwrap();
        let first = object.member("counter").unwrap();
        let second = object.member("counter").unwrap();
        assert!(first.ptr_eq(&second));
        // No parent reference declared.
        assert!(first.parent().is_none());
        assert_eq!(
            object.set_attribute("counter", 0_u8),
            Err(Error::ReadonlyComposition {
                class: "Holder",
                member: "counter"
            })
        );
    }

    #[test]
    fn value_member_is_computed_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let class = ClassBuilder::new("Lazy")
            .autocreate("answer", move |_| {
                counter.set(counter.get() + 1);
                Ok(42_i64)
            })
            .build()
            .unwrap();
        let object = Object::new(&class).unwrap();
        assert_eq!(object.autocreated::<i64>("answer").unwrap(), 42);
        assert_eq!(object.autocreated::<i64>("answer").unwrap(), 42);
        assert_eq!(calls.get(), 1);
        assert!(matches!(
            object.member("answer"),
            Err(Error::TypeMismatch { name: "answer", .. })
        ));
    }

    #[test]
    fn self_referencing_factory_is_circular() {
        let class = ClassBuilder::new("Loop")
            .autocreate("again", |object: &Object| object.autocreated::<u8>("again"))
            .build()
            .unwrap();
        let object = Object::new(&class).unwrap();
        assert_eq!(
            object.autocreated::<u8>("again"),
            Err(Error::CircularComposition {
                class: "Loop",
                member: "again"
            })
        );
        // The failed attempt leaves no placeholder behind.
        assert_eq!(
            object.autocreated::<u8>("again"),
            Err(Error::CircularComposition {
                class: "Loop",
                member: "again"
            })
        );
    }

    #[test]
    fn composed_member_cannot_be_disconnected() {
        let child = ClassBuilder::new("Child")
            .parent_reference("owner")
            .build()
            .unwrap();
        let class = ClassBuilder::new("Owner")
            .compose("child", &child)
            .build()
            .unwrap();
        let object = Object::new(&class).unwrap();
        let member = object.member("child").unwrap();
        assert!(member.parent().is_some_and(|p| p.ptr_eq(&object)));
        assert_eq!(
            member.disconnect(),
            Err(Error::ReadonlyComposition {
                class: "Child",
                member: "owner"
            })
        );
        assert_eq!(
            member.connect(&object),
            Err(Error::AlreadyConnected { class: "Child" })
        );
    }

    #[test]
    fn connect_requires_parent_reference() {
        let (class, _) = counter_class();
        let a = Object::new(&class).unwrap();
        let b = Object::new(&class).unwrap();
        assert_eq!(
            a.connect(&b),
            Err(Error::NoParentReference { class: "Counter" })
        );
        assert_eq!(a.disconnect(), Err(Error::NotConnected { class: "Counter" }));
    }

    #[test]
    fn failed_connect_rolls_back() {
        let guest = ClassBuilder::new("Guest")
            .parent_reference("host")
            .on("host.missing", |_, _| Ok(()))
            .build()
            .unwrap();
        let (host_class, _) = counter_class();
        let host = Object::new(&host_class).unwrap();
        let object = Object::new(&guest).unwrap();
        // `missing` resolves to a non-reactive attribute slot on the host.
        assert_eq!(
            object.connect(&host),
            Err(Error::NotReactive {
                class: "Counter",
                property: "missing"
            })
        );
        assert!(object.parent().is_none());
        assert_eq!(object.disconnect(), Err(Error::NotConnected { class: "Guest" }));
    }

    #[test]
    fn methods_dispatch_to_override_first() {
        const SCALE: Method<i32, i32> = Method::new("scale");
        let class = ClassBuilder::new("Scaler")
            .method(SCALE, |_, x: i32| x * 2)
            .build()
            .unwrap();
        let a = Object::new(&class).unwrap();
        let b = Object::new(&class).unwrap();
        a.override_method(SCALE, |_, x| x * 10);
        assert_eq!(a.call(SCALE, 3).unwrap(), 30);
        assert_eq!(b.call(SCALE, 3).unwrap(), 6);
        assert!(a.restore_method(SCALE));
        assert!(!a.restore_method(SCALE));
        assert_eq!(a.call(SCALE, 3).unwrap(), 6);

        const WRONG: Method<i32, u8> = Method::new("scale");
        assert_eq!(
            a.call(WRONG, 1),
            Err(Error::TypeMismatch {
                name: "scale",
                expected: "fn(i32) -> i32"
            })
        );
        const MISSING: Method<(), ()> = Method::new("missing");
        assert_eq!(
            a.call(MISSING, ()),
            Err(Error::UnknownMember {
                class: "Scaler",
                name: "missing"
            })
        );
    }

    #[test]
    fn cached_dependency_on_attribute_is_rejected() {
        let mut props = PropertyRegistry::new();
        props.cached("broken", [PropertyPath::new("plain")], |_| Ok(0_i32));
        props.reactive("other", PropertyMetadata::new(0_i32));
        let class = ClassBuilder::new("Broken").registry(props).build().unwrap();
        let object = Object::new(&class).unwrap();
        assert_eq!(
            object.slot("other").unwrap_err(),
            Error::NonReactiveDependency {
                class: "Broken",
                property: "broken",
                dependency: "plain"
            }
        );
    }
}
