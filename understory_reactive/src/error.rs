// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by every fallible operation in this crate.

use crate::alert::CallbackKey;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures raised synchronously by property, binding and composition operations.
///
/// All of these indicate a programming error at the call site. No state is
/// mutated when an operation fails on entry (for example a rejected bind leaves
/// the previous binding in place).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A write was attempted on a readonly, cached or constant property.
    #[error("property `{property}` of `{class}` is readonly")]
    ReadonlyViolation {
        /// Class declaring the property.
        class: &'static str,
        /// Property name.
        property: &'static str,
    },
    /// A slot was initialized a second time.
    #[error("slot `{property}` of `{class}` is already initialized")]
    DoubleInitialization {
        /// Class declaring the property.
        class: &'static str,
        /// Property name.
        property: &'static str,
    },
    /// Committing a binding or cache dependency would close a cycle.
    #[error("circular binding through `{property}` of `{class}`")]
    CircularBinding {
        /// Class declaring the property found on the cycle.
        class: &'static str,
        /// Property found on the cycle.
        property: &'static str,
    },
    /// A cached property depends on a slot that is not (or no longer) reactive.
    #[error("cached `{property}` of `{class}` depends on non-reactive `{dependency}`")]
    NonReactiveDependency {
        /// Class declaring the cached property.
        class: &'static str,
        /// Cached property name.
        property: &'static str,
        /// Name of the offending dependency.
        dependency: &'static str,
    },
    /// A registry, member name or composed class was assigned more than once.
    #[error("`{item}` is already assigned to `{owner}`")]
    DuplicateRegistryAssignment {
        /// What was assigned twice.
        item: &'static str,
        /// The first owner it was assigned to.
        owner: &'static str,
    },
    /// A composed member was written, or its fixed back-reference disconnected.
    #[error("composed member `{member}` of `{class}` is read-only")]
    ReadonlyComposition {
        /// Owning class.
        class: &'static str,
        /// Member name.
        member: &'static str,
    },
    /// A callback key was removed that was never registered.
    #[error("no callback registered under {key}")]
    UnknownCallbackKey {
        /// The key that was looked up.
        key: CallbackKey,
    },
    /// A composed member was read again while it was still being constructed.
    #[error("member `{member}` of `{class}` was accessed during its own construction")]
    CircularComposition {
        /// Owning class.
        class: &'static str,
        /// Member name.
        member: &'static str,
    },
    /// A name did not resolve to a property, member or attribute.
    #[error("`{class}` has no member named `{name}`")]
    UnknownMember {
        /// Class that was searched.
        class: &'static str,
        /// Name that failed to resolve.
        name: &'static str,
    },
    /// A callback was registered on a property that does not dispatch alerts.
    #[error("property `{property}` of `{class}` is not reactive")]
    NotReactive {
        /// Class declaring the property.
        class: &'static str,
        /// Property name.
        property: &'static str,
    },
    /// `bind` was called on a property that is not bindable.
    #[error("property `{property}` of `{class}` is not bindable")]
    NotBindable {
        /// Class declaring the property.
        class: &'static str,
        /// Property name.
        property: &'static str,
    },
    /// A value of the wrong type was read or written.
    #[error("`{name}` holds values of type `{expected}`")]
    TypeMismatch {
        /// Property, member or method name.
        name: &'static str,
        /// Type name of the stored value.
        expected: &'static str,
    },
    /// The class declares no parent reference.
    #[error("`{class}` declares no parent reference")]
    NoParentReference {
        /// Class that was searched.
        class: &'static str,
    },
    /// A parent hop was taken on an object with no live parent, or a slot
    /// outlived its object.
    #[error("`{class}` is not attached to a parent")]
    Detached {
        /// Class of the detached object.
        class: &'static str,
    },
    /// `connect` was called on an object that already has a parent.
    #[error("`{class}` is already connected to a parent")]
    AlreadyConnected {
        /// Class of the connected object.
        class: &'static str,
    },
    /// `disconnect` was called on an object that was never connected.
    #[error("`{class}` is not connected to a parent")]
    NotConnected {
        /// Class of the object.
        class: &'static str,
    },
    /// The base classes admit no consistent linearization.
    #[error("cannot linearize the bases of `{class}`")]
    InconsistentHierarchy {
        /// Class being built.
        class: &'static str,
    },
}
