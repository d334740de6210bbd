// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declaration-time property configuration.
//!
//! [`PropertyMetadata`] carries what a stored property needs to know when it is
//! declared: its default value, whether writes are rejected, and the
//! class-level callbacks every instance's slot is wired to.
//! [`PropertyMetadataBuilder`] builds it.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::alert::{AlertReason, CallbackKey, InstanceCallback};
use crate::error::Result;
use crate::object::Object;

/// Configuration for an observable, reactive or bindable property.
///
/// # Example
///
/// ```rust
/// use understory_reactive::PropertyMetadataBuilder;
///
/// let metadata = PropertyMetadataBuilder::new(100.0_f64)
///     .readonly(true)
///     .build();
///
/// assert_eq!(metadata.default_value(), &100.0);
/// assert!(metadata.readonly());
/// ```
pub struct PropertyMetadata<T: Clone + 'static> {
    default_value: T,
    readonly: bool,
    callbacks: Vec<(CallbackKey, InstanceCallback)>,
}

impl<T: Clone + 'static> PropertyMetadata<T> {
    /// Metadata with the given default, writable and without callbacks.
    #[must_use]
    pub fn new(default_value: T) -> Self {
        Self {
            default_value,
            readonly: false,
            callbacks: Vec::new(),
        }
    }

    /// Returns the default value.
    #[must_use]
    #[inline]
    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// Returns whether writes are rejected.
    #[must_use]
    #[inline]
    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// Returns the number of class-level callbacks.
    #[must_use]
    #[inline]
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    pub(crate) fn into_parts(self) -> (T, bool, Vec<(CallbackKey, InstanceCallback)>) {
        (self.default_value, self.readonly, self.callbacks)
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for PropertyMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("default_value", &self.default_value)
            .field("readonly", &self.readonly)
            .field(
                "callbacks",
                &self.callbacks.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`PropertyMetadata`].
///
/// # Example
///
/// ```rust
/// use understory_reactive::{CallbackKey, PropertyMetadataBuilder};
///
/// let metadata = PropertyMetadataBuilder::new(0_i32)
///     .on_alert_keyed(CallbackKey::named("log"), |_object, reason| {
///         assert_eq!(reason.closest().property(), "count");
///         Ok(())
///     })
///     .build();
/// assert_eq!(metadata.callback_count(), 1);
/// ```
pub struct PropertyMetadataBuilder<T: Clone + 'static> {
    metadata: PropertyMetadata<T>,
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for PropertyMetadataBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadataBuilder")
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<T: Clone + 'static> PropertyMetadataBuilder<T> {
    /// Starts a builder with the given default value.
    #[must_use]
    pub fn new(default_value: T) -> Self {
        Self {
            metadata: PropertyMetadata::new(default_value),
        }
    }

    /// Rejects every write with [`Error::ReadonlyViolation`](crate::Error::ReadonlyViolation).
    #[must_use]
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.metadata.readonly = readonly;
        self
    }

    /// Adds a class-level callback, keyed by its identity.
    ///
    /// Each instance's slot invokes it with the instance and the alert chain.
    /// Ignored for observable properties, which never alert.
    #[must_use]
    pub fn on_alert<F>(self, callback: F) -> Self
    where
        F: Fn(&Object, &AlertReason) -> Result<()> + 'static,
    {
        let callback: InstanceCallback = Rc::new(callback);
        let key = CallbackKey::of(&callback);
        self.push(key, callback)
    }

    /// Adds a class-level callback under an explicit key.
    #[must_use]
    pub fn on_alert_keyed<F>(self, key: CallbackKey, callback: F) -> Self
    where
        F: Fn(&Object, &AlertReason) -> Result<()> + 'static,
    {
        self.push(key, Rc::new(callback))
    }

    fn push(mut self, key: CallbackKey, callback: InstanceCallback) -> Self {
        let callbacks = &mut self.metadata.callbacks;
        match callbacks.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = callback,
            None => callbacks.push((key, callback)),
        }
        self
    }

    /// Builds the [`PropertyMetadata`].
    #[must_use]
    pub fn build(self) -> PropertyMetadata<T> {
        self.metadata
    }
}
