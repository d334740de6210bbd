// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased slot values.
//!
//! Slots of every kind store their contents as an [`ErasedValue`], so a single
//! slot table can hold properties of unrelated types. Typed access goes through
//! [`Property<T>`](crate::Property) handles, which downcast on the way out.

use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;

/// A clonable value of any `'static` type.
///
/// Alert events carry old and new values as `ErasedValue`s; observers
/// downcast to the property's type to inspect them.
///
/// # Example
///
/// ```rust
/// use understory_reactive::ErasedValue;
///
/// let value = ErasedValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast::<i32>(), Some(42));
/// assert_eq!(value.downcast_ref::<u8>(), None);
/// assert_eq!(value.type_name(), "i32");
/// ```
pub struct ErasedValue {
    inner: Box<dyn CloneAny>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ErasedValue {
    /// Wraps a concrete value.
    #[must_use]
    pub fn new<T: Clone + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    /// Returns the [`TypeId`] of the wrapped value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the wrapped value, for diagnostics.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the wrapped value is a `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns `true` if both values wrap the same type.
    #[must_use]
    #[inline]
    pub fn same_type(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }

    /// Borrows the wrapped value as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref()
    }

    /// Clones the wrapped value out as a `T`, if it is one.
    #[must_use]
    pub fn downcast<T: Clone + 'static>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl Clone for ErasedValue {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

trait CloneAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> Box<dyn CloneAny>;
}

impl<T: Clone + 'static> CloneAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn CloneAny> {
        Box::new(self.clone())
    }
}
