// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Reactive: observable properties and composed object graphs.
//!
//! This crate provides per-object property slots that notify observers when
//! they change, bindings that forward one slot to another, cached values that
//! recompute lazily after a dependency changes, and classes that compose
//! member objects and wire callbacks across them before any instance exists.
//!
//! ## Core Concepts
//!
//! ### Properties
//!
//! A [`PropertyRegistry`] declares the properties of one class. Each
//! declaration returns a typed [`Property`] handle:
//!
//! - **Observable** - stores a value, never alerts
//! - **Reactive** - alerts `(slot, set, (old, new))` on every write
//! - **Bindable** - reactive, and can be bound to another slot or a literal
//! - **Cached** - readonly, computed on read, invalidated by its dependencies
//! - **Constant** - readonly, fixed
//!
//! ### Alerts
//!
//! Observers receive an [`AlertReason`]: a chain of [`AlertFrame`]s whose
//! first entry is the closest cause and whose last is the original mutation.
//! A bindable relaying its target, or a cached value being invalidated,
//! prepends its own frame. An observer that returns an error stops the
//! remaining fan-out and the error surfaces from the mutating call.
//!
//! ### Classes and Composition
//!
//! A [`ClassBuilder`] combines a registry with base classes, composed
//! members, an initializer, methods and callbacks declared against
//! [`PropertyPath`]s such as `"inner.inner_inner.iip1"` or `"parent.op1"`.
//! Paths are routed when the class is built and subscribed as soon as the
//! objects they name exist.
//!
//! ## Quick Start
//!
//! ```rust
//! use core::cell::Cell;
//! use std::rc::Rc;
//!
//! use understory_reactive::{
//!     AlertKind, ClassBuilder, Object, PropertyMetadata, PropertyPath, PropertyRegistry,
//! };
//!
//! // A member class with a reactive property.
//! let mut inner_props = PropertyRegistry::new();
//! let p2 = inner_props.reactive("p2", PropertyMetadata::new(2_i32));
//! let inner = ClassBuilder::new("C")
//!     .registry(inner_props)
//!     .parent_reference("parent")
//!     .build()
//!     .unwrap();
//!
//! // An owner whose cached value reads through the member.
//! let evaluations = Rc::new(Cell::new(0));
//! let counter = evaluations.clone();
//! let mut props = PropertyRegistry::new();
//! let p1 = props.reactive("p1", PropertyMetadata::new(1_i32));
//! let sum = props.cached(
//!     "x",
//!     [PropertyPath::from(p1), PropertyPath::parse("c.p2")],
//!     move |object| {
//!         counter.set(counter.get() + 1);
//!         Ok(object.get(p1)? + object.get_path::<i32>("c.p2")?)
//!     },
//! );
//!
//! let fired = Rc::new(Cell::new(None));
//! let sink = fired.clone();
//! let outer = ClassBuilder::new("O")
//!     .registry(props)
//!     .compose("c", &inner)
//!     .on("c.p2", move |_owner, reason| {
//!         sink.set(Some(reason.origin().kind()));
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let object = Object::new(&outer).unwrap();
//! assert_eq!(object.get(sum).unwrap(), 3);
//! assert_eq!(object.get(sum).unwrap(), 3);
//! assert_eq!(evaluations.get(), 1);
//!
//! object.member("c").unwrap().set(p2, 10).unwrap();
//! assert_eq!(fired.get(), Some(AlertKind::Set));
//! assert_eq!(object.get(sum).unwrap(), 11);
//! assert_eq!(evaluations.get(), 2);
//! ```
//!
//! ## Ownership
//!
//! | Edge | Strength |
//! |------|----------|
//! | Object → its slots and members | strong |
//! | Member → its parent | weak |
//! | Slot → its object | weak |
//! | Slot → callbacks added with [`Slot::add_callback`] | strong |
//! | Slot → relays, invalidators and class callbacks | weak, kept alive by their owner |
//!
//! Dropping the last handle to a root object drops its whole graph.
//!
//! ## Logging
//!
//! Structural events (class built, member composed, binding changed, object
//! connected) are emitted at `debug` level through [`tracing`]; per-alert
//! dispatch and cache evaluation at `trace` level. No subscriber is installed.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.
//! Objects are single-threaded: handles are `Rc`-based and `!Send`.

#![no_std]

extern crate alloc;

mod alert;
mod class;
mod compose;
mod descriptor;
mod error;
mod id;
mod metadata;
mod method;
mod object;
mod path;
mod registry;
mod slot;
mod value;

pub use alert::{
    AlertEvent, AlertFrame, AlertKind, AlertReason, BindingState, CallbackKey, InstanceCallback,
    Listener,
};
pub use class::{Class, ClassBuilder};
pub use descriptor::{PropertyDescriptor, PropertyKind};
pub use error::{Error, Result};
pub use id::{Property, PropertyId};
pub use metadata::{PropertyMetadata, PropertyMetadataBuilder};
pub use method::Method;
pub use object::Object;
pub use path::{PathStep, PropertyPath};
pub use registry::PropertyRegistry;
pub use slot::{BindTarget, Slot};
pub use value::ErasedValue;
