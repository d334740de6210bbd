// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Symbolic property paths.
//!
//! A [`PropertyPath`] names a property relative to some object: zero or more
//! hops through composed members or parent references, then a property name.
//! Paths are immutable values. Delayed callbacks and cached dependencies are
//! declared with paths before any instance exists and are resolved later, once
//! against the class graph and again against live objects.

use core::fmt;
use smallvec::SmallVec;

use crate::id::Property;

/// One hop of a [`PropertyPath`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Move to the object's parent reference.
    Parent,
    /// Move to the named member.
    ///
    /// A member whose name matches the current class's parent reference is
    /// treated as [`PathStep::Parent`].
    Member(&'static str),
}

/// A property named through a chain of member and parent hops.
///
/// ```rust
/// use understory_reactive::{PathStep, PropertyPath};
///
/// let path = PropertyPath::parse("inner.inner_inner.iip1");
/// assert_eq!(
///     path.steps(),
///     &[PathStep::Member("inner"), PathStep::Member("inner_inner")]
/// );
/// assert_eq!(path.property(), "iip1");
///
/// // `^` spells an explicit parent hop.
/// let up = PropertyPath::parse("^.^.op1");
/// assert_eq!(up.steps(), &[PathStep::Parent, PathStep::Parent]);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    steps: SmallVec<[PathStep; 4]>,
    property: &'static str,
}

impl PropertyPath {
    /// A path naming a property on the object itself.
    #[must_use]
    pub fn new(property: &'static str) -> Self {
        Self {
            steps: SmallVec::new(),
            property,
        }
    }

    /// A path from explicit hops.
    #[must_use]
    pub fn from_steps(steps: impl IntoIterator<Item = PathStep>, property: &'static str) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            property,
        }
    }

    /// Parses a dotted path. The last segment is the property; a `^` segment
    /// is an explicit parent hop, any other segment a member hop.
    #[must_use]
    pub fn parse(dotted: &'static str) -> Self {
        let Some((hops, property)) = dotted.rsplit_once('.') else {
            return Self::new(dotted);
        };
        let steps = hops.split('.').map(|segment| match segment {
            "^" => PathStep::Parent,
            name => PathStep::Member(name),
        });
        Self::from_steps(steps, property)
    }

    /// The hops leading to the property.
    #[must_use]
    #[inline]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// The property name at the end of the path.
    #[must_use]
    #[inline]
    pub fn property(&self) -> &'static str {
        self.property
    }

    /// Returns `true` if the path has no hops.
    #[must_use]
    #[inline]
    pub fn is_local(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns a copy of this path with `step` prepended.
    #[must_use]
    pub fn prefixed(&self, step: PathStep) -> Self {
        let mut steps = SmallVec::with_capacity(self.steps.len() + 1);
        steps.push(step);
        steps.extend_from_slice(&self.steps);
        Self {
            steps,
            property: self.property,
        }
    }
}

impl From<&'static str> for PropertyPath {
    fn from(dotted: &'static str) -> Self {
        Self::parse(dotted)
    }
}

impl<T> From<Property<T>> for PropertyPath {
    fn from(property: Property<T>) -> Self {
        Self::new(property.name())
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                PathStep::Parent => f.write_str("^.")?,
                PathStep::Member(name) => write!(f, "{name}.")?,
            }
        }
        f.write_str(self.property)
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({self})")
    }
}
