// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime-replaceable methods.
//!
//! A class declares a default implementation with
//! [`ClassBuilder::method`](crate::ClassBuilder::method). Each object may
//! install its own override, which is consulted first by
//! [`Object::call`](crate::Object::call) until it is restored.

use alloc::rc::Rc;
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;

use crate::object::Object;

/// A typed handle naming a method taking `A` and returning `R`.
///
/// ```rust
/// use understory_reactive::{ClassBuilder, Method, Object};
///
/// const GREET: Method<&'static str, usize> = Method::new("greet");
///
/// let class = ClassBuilder::new("Greeter")
///     .method(GREET, |_object, name: &'static str| name.len())
///     .build()
///     .unwrap();
/// let object = Object::new(&class).unwrap();
/// assert_eq!(object.call(GREET, "ada").unwrap(), 3);
///
/// object.override_method(GREET, |_object, _name| 0);
/// assert_eq!(object.call(GREET, "ada").unwrap(), 0);
/// assert!(object.restore_method(GREET));
/// assert_eq!(object.call(GREET, "ada").unwrap(), 3);
/// ```
pub struct Method<A, R> {
    name: &'static str,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R> Method<A, R> {
    /// Creates a handle for the method called `name`.
    #[must_use]
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Method name.
    #[must_use]
    #[inline]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl<A, R> Copy for Method<A, R> {}

impl<A, R> Clone for Method<A, R> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> fmt::Debug for Method<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("signature", &core::any::type_name::<fn(A) -> R>())
            .finish()
    }
}

type MethodFn<A, R> = Rc<dyn Fn(&Object, A) -> R>;

/// A method implementation with its signature erased.
#[derive(Clone)]
pub(crate) struct ErasedMethod {
    function: Rc<dyn Any>,
    signature: &'static str,
}

impl ErasedMethod {
    pub(crate) fn new<A: 'static, R: 'static, F>(function: F) -> Self
    where
        F: Fn(&Object, A) -> R + 'static,
    {
        let function: MethodFn<A, R> = Rc::new(function);
        Self {
            function: Rc::new(function),
            signature: core::any::type_name::<fn(A) -> R>(),
        }
    }

    pub(crate) fn signature(&self) -> &'static str {
        self.signature
    }

    pub(crate) fn downcast<A: 'static, R: 'static>(&self) -> Option<Rc<dyn Fn(&Object, A) -> R>> {
        self.function.downcast_ref::<MethodFn<A, R>>().cloned()
    }
}
