// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property identification types.
//!
//! [`PropertyId`] is the position of a descriptor inside the registry that
//! declared it. [`Property<T>`] pairs that position with the property name and
//! a phantom value type, and is the handle used for typed reads and writes on
//! an [`Object`](crate::Object).

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Position of a descriptor within its declaring [`PropertyRegistry`](crate::PropertyRegistry).
///
/// ```rust
/// use understory_reactive::PropertyId;
///
/// let id = PropertyId::new(3);
/// assert_eq!(id.index(), 3);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u16);

impl PropertyId {
    /// Creates a property ID from a registry index.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the registry index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

/// A typed handle to a declared property.
///
/// Instances look properties up by name in their class's merged table, so a
/// handle obtained from a base class registry also reaches the override a
/// subclass declares under the same name. The value type is checked when the
/// slot contents are downcast.
///
/// ```rust
/// use understory_reactive::{Property, PropertyMetadataBuilder, PropertyRegistry};
///
/// let mut registry = PropertyRegistry::new();
/// let width: Property<f64> =
///     registry.reactive("width", PropertyMetadataBuilder::new(0.0_f64).build());
/// assert_eq!(width.name(), "width");
/// ```
pub struct Property<T> {
    id: PropertyId,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    /// Creates a typed handle.
    ///
    /// This is normally produced by a [`PropertyRegistry`](crate::PropertyRegistry)
    /// declaration method. A handle whose `T` disagrees with the declared type
    /// yields [`Error::TypeMismatch`](crate::Error::TypeMismatch) on access.
    #[must_use]
    #[inline]
    pub const fn new(id: PropertyId, name: &'static str) -> Self {
        Self {
            id,
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the registry position of the declaring descriptor.
    #[must_use]
    #[inline]
    pub const fn id(self) -> PropertyId {
        self.id
    }

    /// Returns the property name.
    #[must_use]
    #[inline]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

// Manual impls: `T` is phantom and need not be `Clone`, `Eq` or `Hash`.

impl<T> Copy for Property<T> {}

impl<T> Clone for Property<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Property<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl<T> Eq for Property<T> {}

impl<T> Hash for Property<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}
