// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Class-level property definitions.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::TypeId;
use core::fmt;
use smallvec::SmallVec;

use crate::alert::{CallbackKey, InstanceCallback};
use crate::error::{Error, Result};
use crate::id::PropertyId;
use crate::object::Object;
use crate::path::PropertyPath;
use crate::value::ErasedValue;

/// The behavior a property's slots have.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Stores a value, never alerts.
    Observable,
    /// Stores a value and alerts observers on every write.
    Reactive,
    /// Holds a literal or forwards to another slot.
    Bindable,
    /// Lazily computed from dependencies, invalidated when they alert.
    Cached,
    /// A fixed value; accepts callbacks but never alerts.
    Constant,
}

impl PropertyKind {
    /// Returns `true` for every kind that accepts callbacks.
    ///
    /// A bindable slot is additionally non-reactive while bound to a
    /// non-reactive target; see [`Slot::is_reactive`](crate::Slot::is_reactive).
    #[must_use]
    #[inline]
    pub fn is_reactive(self) -> bool {
        !matches!(self, Self::Observable)
    }
}

/// Getter of a cached property.
pub(crate) type Getter = Rc<dyn Fn(&Object) -> Result<ErasedValue>>;

#[derive(Clone)]
pub(crate) enum Definition {
    Observable(ErasedValue),
    Reactive(ErasedValue),
    Bindable(ErasedValue),
    Cached {
        dependencies: Vec<PropertyPath>,
        getter: Getter,
    },
    Constant(ErasedValue),
}

/// The immutable definition of a property within a class.
///
/// Descriptors are created by [`PropertyRegistry`](crate::PropertyRegistry)
/// and frozen when the registry is assigned to a class. Each instance gets one
/// [`Slot`](crate::Slot) per descriptor of its class's merged table.
///
/// Cloning a descriptor duplicates its callback table by value.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: &'static str,
    id: PropertyId,
    type_id: TypeId,
    type_name: &'static str,
    readonly: bool,
    definition: Definition,
    callbacks: SmallVec<[(CallbackKey, InstanceCallback); 2]>,
}

impl PropertyDescriptor {
    pub(crate) fn new<T: 'static>(
        name: &'static str,
        readonly: bool,
        definition: Definition,
        callbacks: impl IntoIterator<Item = (CallbackKey, InstanceCallback)>,
    ) -> Self {
        let readonly = readonly
            || matches!(
                definition,
                Definition::Cached { .. } | Definition::Constant(_)
            );
        let mut descriptor = Self {
            name,
            id: PropertyId::new(0),
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            readonly,
            definition,
            callbacks: SmallVec::new(),
        };
        if descriptor.kind() != PropertyKind::Observable {
            descriptor.callbacks.extend(callbacks);
        }
        descriptor
    }

    /// Property name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position within the declaring registry.
    #[must_use]
    #[inline]
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// The property's behavior.
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        match self.definition {
            Definition::Observable(_) => PropertyKind::Observable,
            Definition::Reactive(_) => PropertyKind::Reactive,
            Definition::Bindable(_) => PropertyKind::Bindable,
            Definition::Cached { .. } => PropertyKind::Cached,
            Definition::Constant(_) => PropertyKind::Constant,
        }
    }

    /// Whether writes are rejected. Always `true` for cached and constant
    /// properties.
    #[must_use]
    #[inline]
    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// The default (or, for constants, the fixed) value. `None` for cached
    /// properties.
    #[must_use]
    pub fn default_value(&self) -> Option<&ErasedValue> {
        match &self.definition {
            Definition::Observable(value)
            | Definition::Reactive(value)
            | Definition::Bindable(value)
            | Definition::Constant(value) => Some(value),
            Definition::Cached { .. } => None,
        }
    }

    /// Dependency paths of a cached property, empty for other kinds.
    #[must_use]
    pub fn dependencies(&self) -> &[PropertyPath] {
        match &self.definition {
            Definition::Cached { dependencies, .. } => dependencies,
            _ => &[],
        }
    }

    /// [`TypeId`] of the declared value type.
    #[must_use]
    #[inline]
    pub fn value_type(&self) -> TypeId {
        self.type_id
    }

    /// Name of the declared value type.
    #[must_use]
    #[inline]
    pub fn value_type_name(&self) -> &'static str {
        self.type_name
    }

    /// Keys of the class-level callbacks, in registration order.
    pub fn callback_keys(&self) -> impl Iterator<Item = CallbackKey> + '_ {
        self.callbacks.iter().map(|(key, _)| *key)
    }

    pub(crate) fn definition(&self) -> &Definition {
        &self.definition
    }

    pub(crate) fn callbacks(&self) -> &[(CallbackKey, InstanceCallback)] {
        &self.callbacks
    }

    pub(crate) fn with_id(mut self, id: PropertyId) -> Self {
        self.id = id;
        self
    }

    /// Adds a class-level callback. Constants accept and discard it.
    pub(crate) fn add_callback(
        &mut self,
        class: &'static str,
        key: CallbackKey,
        callback: InstanceCallback,
    ) -> Result<CallbackKey> {
        match self.kind() {
            PropertyKind::Observable => Err(Error::NotReactive {
                class,
                property: self.name,
            }),
            PropertyKind::Constant => Ok(key),
            _ => {
                match self.callbacks.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = callback,
                    None => self.callbacks.push((key, callback)),
                }
                Ok(key)
            }
        }
    }

    pub(crate) fn del_callback(&mut self, key: CallbackKey) -> Result<()> {
        if self.kind() == PropertyKind::Constant {
            return Ok(());
        }
        let before = self.callbacks.len();
        self.callbacks.retain(|(k, _)| *k != key);
        if self.callbacks.len() == before {
            return Err(Error::UnknownCallbackKey { key });
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("type", &self.type_name)
            .field("readonly", &self.readonly)
            .field("dependencies", &self.dependencies())
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}
