// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-class property declarations.
//!
//! A [`PropertyRegistry`] collects the properties one class declares. It is
//! handed to a [`ClassBuilder`](crate::ClassBuilder), which merges it with the
//! registries of the class's ancestors so that a subclass declaration replaces
//! an inherited one of the same name.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::TypeId;
use core::fmt;
use hashbrown::HashMap;

use crate::alert::{AlertReason, CallbackKey, InstanceCallback};
use crate::class::Class;
use crate::descriptor::{Definition, Getter, PropertyDescriptor};
use crate::error::{Error, Result};
use crate::id::{Property, PropertyId};
use crate::metadata::PropertyMetadata;
use crate::object::Object;
use crate::path::PropertyPath;
use crate::value::ErasedValue;

/// The properties declared by one class.
///
/// # Example
///
/// ```rust
/// use understory_reactive::{
///     PropertyKind, PropertyMetadataBuilder, PropertyPath, PropertyRegistry,
/// };
///
/// let mut registry = PropertyRegistry::new();
/// let width = registry.reactive("width", PropertyMetadataBuilder::new(2.0_f64).build());
/// let height = registry.reactive("height", PropertyMetadataBuilder::new(3.0_f64).build());
/// let area = registry.cached(
///     "area",
///     [PropertyPath::from(width), PropertyPath::from(height)],
///     move |object| Ok(object.get(width)? * object.get(height)?),
/// );
///
/// assert_eq!(registry.len(), 3);
/// assert_eq!(registry.by_name("area"), Some(area.id()));
/// assert_eq!(registry.get(area.id()).map(|d| d.kind()), Some(PropertyKind::Cached));
/// ```
#[derive(Default)]
pub struct PropertyRegistry {
    properties: Vec<PropertyDescriptor>,
    by_name: HashMap<&'static str, PropertyId>,
}

impl PropertyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a property that stores a value and never alerts.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already declared in this registry.
    pub fn observable<T: Clone + 'static>(
        &mut self,
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Property<T> {
        let (default, readonly, callbacks) = metadata.into_parts();
        self.register::<T>(
            name,
            readonly,
            Definition::Observable(ErasedValue::new(default)),
            callbacks,
        )
    }

    /// Declares a property that alerts its observers on every write.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already declared in this registry.
    pub fn reactive<T: Clone + 'static>(
        &mut self,
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Property<T> {
        let (default, readonly, callbacks) = metadata.into_parts();
        self.register::<T>(
            name,
            readonly,
            Definition::Reactive(ErasedValue::new(default)),
            callbacks,
        )
    }

    /// Declares a property that can be bound to another slot.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already declared in this registry.
    pub fn bindable<T: Clone + 'static>(
        &mut self,
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Property<T> {
        let (default, readonly, callbacks) = metadata.into_parts();
        self.register::<T>(
            name,
            readonly,
            Definition::Bindable(ErasedValue::new(default)),
            callbacks,
        )
    }

    /// Declares a readonly property computed by `getter` and invalidated
    /// whenever one of `dependencies` alerts.
    ///
    /// Dependency paths are resolved against each instance when its slots are
    /// created; every dependency must be reactive at that point.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already declared in this registry.
    pub fn cached<T, F>(
        &mut self,
        name: &'static str,
        dependencies: impl IntoIterator<Item = PropertyPath>,
        getter: F,
    ) -> Property<T>
    where
        T: Clone + 'static,
        F: Fn(&Object) -> Result<T> + 'static,
    {
        let getter: Getter = Rc::new(move |object: &Object| getter(object).map(ErasedValue::new));
        self.register::<T>(
            name,
            true,
            Definition::Cached {
                dependencies: dependencies.into_iter().collect(),
                getter,
            },
            [],
        )
    }

    /// Declares a fixed value.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already declared in this registry.
    pub fn constant<T: Clone + 'static>(&mut self, name: &'static str, value: T) -> Property<T> {
        self.register::<T>(
            name,
            true,
            Definition::Constant(ErasedValue::new(value)),
            [],
        )
    }

    /// Copies `base`'s descriptor for `property` into this registry.
    ///
    /// The copy carries the base's class-level callbacks by value: callbacks
    /// added to the copy are not seen by instances of `base`, and vice versa.
    ///
    /// # Panics
    ///
    /// Panics if the name is already declared in this registry.
    pub fn inherit<T: Clone + 'static>(
        &mut self,
        base: &Class,
        property: Property<T>,
    ) -> Result<Property<T>> {
        let name = property.name();
        let descriptor = base.descriptor(name).ok_or(Error::UnknownMember {
            class: base.name(),
            name,
        })?;
        if !descriptor.kind().is_reactive() {
            return Err(Error::NotReactive {
                class: base.name(),
                property: name,
            });
        }
        if descriptor.value_type() != TypeId::of::<T>() {
            return Err(Error::TypeMismatch {
                name,
                expected: descriptor.value_type_name(),
            });
        }
        let id = self.insert(descriptor.clone());
        Ok(Property::new(id, name))
    }

    /// Adds a class-level callback to a declared property.
    ///
    /// Every instance created from the class this registry is assigned to
    /// invokes `callback` with itself when the property alerts.
    pub fn add_callback<T, F>(
        &mut self,
        property: Property<T>,
        callback: F,
        key: Option<CallbackKey>,
    ) -> Result<CallbackKey>
    where
        F: Fn(&Object, &AlertReason) -> Result<()> + 'static,
    {
        let callback: InstanceCallback = Rc::new(callback);
        let key = key.unwrap_or_else(|| CallbackKey::of(&callback));
        self.descriptor_mut(property.name())?
            .add_callback("PropertyRegistry", key, callback)
    }

    /// Removes a class-level callback.
    pub fn del_callback<T>(&mut self, property: Property<T>, key: CallbackKey) -> Result<()> {
        self.descriptor_mut(property.name())?.del_callback(key)
    }

    /// Returns the number of declared properties.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<PropertyId> {
        self.by_name.get(name).copied()
    }

    /// Returns the name of a property.
    #[must_use]
    pub fn name(&self, id: PropertyId) -> Option<&'static str> {
        self.get(id).map(PropertyDescriptor::name)
    }

    /// Returns the descriptor of a property.
    #[must_use]
    pub fn get(&self, id: PropertyId) -> Option<&PropertyDescriptor> {
        self.properties.get(id.index() as usize)
    }

    /// Iterates over the declared descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter()
    }

    pub(crate) fn into_descriptors(self) -> Vec<PropertyDescriptor> {
        self.properties
    }

    fn register<T: 'static>(
        &mut self,
        name: &'static str,
        readonly: bool,
        definition: Definition,
        callbacks: impl IntoIterator<Item = (CallbackKey, InstanceCallback)>,
    ) -> Property<T> {
        let id = self.insert(PropertyDescriptor::new::<T>(
            name, readonly, definition, callbacks,
        ));
        Property::new(id, name)
    }

    fn insert(&mut self, descriptor: PropertyDescriptor) -> PropertyId {
        let name = descriptor.name();
        assert!(
            !self.by_name.contains_key(name),
            "Property '{name}' is already declared"
        );
        assert!(
            self.properties.len() < u16::MAX as usize,
            "Too many properties declared (max {})",
            u16::MAX
        );

        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let id = PropertyId::new(self.properties.len() as u16);

        self.properties.push(descriptor.with_id(id));
        self.by_name.insert(name, id);
        id
    }

    fn descriptor_mut(&mut self, name: &'static str) -> Result<&mut PropertyDescriptor> {
        let id = self.by_name(name).ok_or(Error::UnknownMember {
            class: "PropertyRegistry",
            name,
        })?;
        Ok(&mut self.properties[id.index() as usize])
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.properties.iter()).finish()
    }
}
