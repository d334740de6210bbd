// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composed members and delayed callbacks.
//!
//! A class may own members that are created on first access: nested objects
//! (optionally holding a back-reference to their owner) or values computed
//! once from the owner. Callbacks can be declared against paths into such
//! members before any instance exists; a [`DelayedCallback`] records the
//! declaration until both ends of the path are alive.
//!
//! Resolution happens in two phases. When a class is built, each declared
//! path is walked over the class graph and the callback is routed to the
//! property or composition it lands on, or kept pending if it climbs above
//! the class (see [`ClassBuilder::build`](crate::ClassBuilder::build)). When an
//! instance later creates the relevant member or slot, the remaining path is
//! walked on live objects and the subscription is made.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;
use smallvec::SmallVec;

use crate::alert::{AlertReason, InstanceCallback, Listener};
use crate::class::Class;
use crate::error::Result;
use crate::object::Object;
use crate::path::{PathStep, PropertyPath};
use crate::value::ErasedValue;

/// Produces the value of a function member from its owner.
pub(crate) type ValueFactory = Rc<dyn Fn(&Object) -> Result<ErasedValue>>;

#[derive(Clone)]
pub(crate) enum Factory {
    Class(Class),
    Value(ValueFactory),
}

/// A member declared on a class, plus the delayed callbacks waiting for it.
#[derive(Clone)]
pub(crate) struct Composition {
    name: &'static str,
    factory: Factory,
    delayed: Vec<DelayedCallback>,
}

impl Composition {
    pub(crate) fn new(name: &'static str, factory: Factory) -> Self {
        Self {
            name,
            factory,
            delayed: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn factory(&self) -> &Factory {
        &self.factory
    }

    /// The class of an object member.
    pub(crate) fn class(&self) -> Option<&Class> {
        match &self.factory {
            Factory::Class(class) => Some(class),
            Factory::Value(_) => None,
        }
    }

    /// Callbacks to attach once the member exists, with paths relative to it.
    pub(crate) fn delayed(&self) -> &[DelayedCallback] {
        &self.delayed
    }

    pub(crate) fn queue(&mut self, callback: DelayedCallback) {
        self.delayed.push(callback);
    }
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.factory {
            Factory::Class(class) => class.name(),
            Factory::Value(_) => "fn",
        };
        f.debug_struct("Composition")
            .field("name", &self.name)
            .field("factory", &kind)
            .field("delayed", &self.delayed)
            .finish()
    }
}

/// A callback declared against a path, waiting for its target to exist.
///
/// `target` is relative to the object the callback is currently routed to
/// (its anchor). `listener_path` leads from that anchor down to the object
/// that declared the callback, which receives it when it fires.
#[derive(Clone)]
pub(crate) struct DelayedCallback {
    listener_path: SmallVec<[&'static str; 2]>,
    target: PropertyPath,
    callback: InstanceCallback,
}

impl DelayedCallback {
    pub(crate) fn new(target: PropertyPath, callback: InstanceCallback) -> Self {
        Self {
            listener_path: SmallVec::new(),
            target,
            callback,
        }
    }

    pub(crate) fn target(&self) -> &PropertyPath {
        &self.target
    }

    /// Re-expresses a callback pending on a member class from the point of
    /// view of the class composing it under `member`.
    pub(crate) fn lifted(&self, member: &'static str) -> Self {
        let mut listener_path = SmallVec::with_capacity(self.listener_path.len() + 1);
        listener_path.push(member);
        listener_path.extend_from_slice(&self.listener_path);
        Self {
            listener_path,
            target: self.target.prefixed(PathStep::Member(member)),
            callback: self.callback.clone(),
        }
    }

    /// Replaces the target with its canonical route below a composition:
    /// `hops` are the member names left after the composition itself.
    pub(crate) fn rebased(&self, hops: &[&'static str]) -> Self {
        Self {
            listener_path: self.listener_path.clone(),
            target: PropertyPath::from_steps(
                hops.iter().map(|&hop| PathStep::Member(hop)),
                self.target.property(),
            ),
            callback: self.callback.clone(),
        }
    }

    /// Builds the listener to subscribe on behalf of `anchor`.
    ///
    /// The listener holds `anchor` weakly and resolves the declaring object
    /// each time it fires, so member replacement is observed.
    pub(crate) fn listener(&self, anchor: &Object) -> Listener {
        let anchor = anchor.downgrade();
        let listener_path = self.listener_path.clone();
        let callback = self.callback.clone();
        Rc::new(move |reason: &AlertReason| {
            let Some(anchor) = anchor.upgrade().map(Object::from_inner) else {
                return Ok(());
            };
            let listener = anchor.descend(&listener_path)?;
            callback(&listener, reason)
        })
    }
}

impl fmt::Debug for DelayedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedCallback")
            .field("listener_path", &self.listener_path)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
