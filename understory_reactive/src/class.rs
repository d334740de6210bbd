// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Classes: merged property tables, composition and callback routing.
//!
//! A [`Class`] is built once from a [`ClassBuilder`] and is immutable
//! afterwards. Building does all of the type-level work up front:
//!
//! - the bases are linearized (C3), so every ancestor appears once, most
//!   derived first;
//! - property descriptors, composed members and methods are merged from the
//!   least to the most derived class, later declarations replacing earlier
//!   ones of the same name;
//! - every delayed callback visible to the class (declared on it or an
//!   ancestor, or left pending by a composed member class) is routed by
//!   walking its path over the class graph.
//!
//! Routing cancels a hop into a member that is followed by a hop back to its
//! parent. What is left lands in one of three places: a property of the class
//! itself, a composed member (with the rest of the path relative to it), or
//! above the class, in which case it stays pending until the class is composed
//! into an owner or an instance is connected to a parent.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::alert::{AlertReason, InstanceCallback};
use crate::compose::{Composition, DelayedCallback, Factory, ValueFactory};
use crate::descriptor::PropertyDescriptor;
use crate::error::{Error, Result};
use crate::method::{ErasedMethod, Method};
use crate::object::Object;
use crate::path::{PathStep, PropertyPath};
use crate::registry::PropertyRegistry;
use crate::value::ErasedValue;

/// Runs when an object is created.
pub(crate) type Initializer = Rc<dyn Fn(&Object) -> Result<()>>;

/// An immutable, shareable class definition.
///
/// Cloning a `Class` clones a handle; both refer to the same definition.
#[derive(Clone)]
pub struct Class(Rc<ClassData>);

struct ClassData {
    name: &'static str,
    bases: Vec<Class>,
    ancestors: Vec<Class>,

    own_properties: Vec<Rc<PropertyDescriptor>>,
    own_members: Vec<(&'static str, Factory)>,
    own_parent: Option<&'static str>,
    own_initializer: Option<Initializer>,
    own_methods: Vec<(&'static str, ErasedMethod)>,
    declared: Vec<DelayedCallback>,

    properties: Vec<Rc<PropertyDescriptor>>,
    property_index: HashMap<&'static str, usize>,
    anchored: Vec<SmallVec<[DelayedCallback; 1]>>,
    compositions: Vec<Composition>,
    composition_index: HashMap<&'static str, usize>,
    parent: Option<&'static str>,
    initializer: Option<Initializer>,
    methods: HashMap<&'static str, ErasedMethod>,
    pending: Vec<DelayedCallback>,
}

impl Class {
    /// Class name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Direct bases, in declaration order.
    #[must_use]
    pub fn bases(&self) -> &[Self] {
        &self.0.bases
    }

    /// Every ancestor, linearized, most derived first. Excludes `self`.
    #[must_use]
    pub fn ancestors(&self) -> &[Self] {
        &self.0.ancestors
    }

    /// Returns `true` if `other` is this class or one of its ancestors.
    #[must_use]
    pub fn is_subclass_of(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.ancestors.iter().any(|a| a.ptr_eq(other))
    }

    /// Returns `true` if both handles refer to the same definition.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The merged descriptor for `name`.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.0.property(name).map(|index| &*self.0.properties[index])
    }

    /// Every merged descriptor, in slot order.
    pub fn descriptors(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.0.properties.iter().map(|descriptor| &**descriptor)
    }

    /// Names of the composed members, inherited ones included.
    pub fn members(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.compositions.iter().map(Composition::name)
    }

    /// Name of the parent reference, if the class declares or inherits one.
    #[must_use]
    #[inline]
    pub fn parent_reference(&self) -> Option<&'static str> {
        self.0.parent
    }

    pub(crate) fn property_index(&self, name: &str) -> Option<usize> {
        self.0.property(name)
    }

    pub(crate) fn property_count(&self) -> usize {
        self.0.properties.len()
    }

    pub(crate) fn descriptor_at(&self, index: usize) -> &PropertyDescriptor {
        &self.0.properties[index]
    }

    pub(crate) fn anchored_at(&self, index: usize) -> &[DelayedCallback] {
        &self.0.anchored[index]
    }

    pub(crate) fn composition(&self, name: &str) -> Option<&Composition> {
        self.0.composition(name)
    }

    pub(crate) fn pending(&self) -> &[DelayedCallback] {
        &self.0.pending
    }

    pub(crate) fn initializer(&self) -> Option<&Initializer> {
        self.0.initializer.as_ref()
    }

    pub(crate) fn method(&self, name: &str) -> Option<&ErasedMethod> {
        self.0.methods.get(name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.0.name)
            .field(
                "ancestors",
                &self.0.ancestors.iter().map(Self::name).collect::<Vec<_>>(),
            )
            .field(
                "properties",
                &self.0.properties.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field("compositions", &self.0.compositions)
            .field("parent", &self.0.parent)
            .field("pending", &self.0.pending)
            .finish_non_exhaustive()
    }
}

impl ClassData {
    fn property(&self, name: &str) -> Option<usize> {
        self.property_index.get(name).copied()
    }

    fn composition(&self, name: &str) -> Option<&Composition> {
        self.composition_index
            .get(name)
            .map(|&index| &self.compositions[index])
    }

    /// Sends `callback` where its path lands.
    fn route(&mut self, callback: DelayedCallback) -> Result<()> {
        match classify(self, callback.target())? {
            Route::Above => {
                debug!(class = self.name, target = %callback.target(), "delayed callback pending");
                self.pending.push(callback);
            }
            Route::Local(index) => {
                debug!(class = self.name, target = %callback.target(), "delayed callback anchored");
                self.anchored[index].push(callback);
            }
            Route::Member(hops) => {
                debug!(class = self.name, target = %callback.target(), "delayed callback queued");
                let Some((&first, rest)) = hops.split_first() else {
                    return Ok(());
                };
                if let Some(&index) = self.composition_index.get(first) {
                    self.compositions[index].queue(callback.rebased(rest));
                }
            }
        }
        Ok(())
    }
}

enum Route {
    /// Climbs above the class.
    Above,
    /// A property of the class itself, by slot index.
    Local(usize),
    /// Below the named chain of composed members.
    Member(SmallVec<[&'static str; 4]>),
}

fn classify<'a>(root: &'a ClassData, path: &PropertyPath) -> Result<Route> {
    let mut stack: SmallVec<[(&'a ClassData, &'static str); 4]> = SmallVec::new();
    for step in path.steps() {
        let current = stack.last().map_or(root, |(class, _)| *class);
        match *step {
            PathStep::Member(name) if current.parent != Some(name) => {
                let child = current
                    .composition(name)
                    .and_then(Composition::class)
                    .ok_or(Error::UnknownMember {
                        class: current.name,
                        name,
                    })?;
                stack.push((&*child.0, name));
            }
            _ => {
                if stack.pop().is_none() {
                    return Ok(Route::Above);
                }
            }
        }
    }

    let target = stack.last().map_or(root, |(class, _)| *class);
    let property = path.property();
    let index = target.property(property).ok_or(Error::UnknownMember {
        class: target.name,
        name: property,
    })?;
    if !target.properties[index].kind().is_reactive() {
        return Err(Error::NotReactive {
            class: target.name,
            property,
        });
    }
    if stack.is_empty() {
        Ok(Route::Local(index))
    } else {
        Ok(Route::Member(stack.iter().map(|(_, name)| *name).collect()))
    }
}

/// C3 linearization of `bases`, most derived first.
fn linearize(name: &'static str, bases: &[Class]) -> Result<Vec<Class>> {
    let mut sequences: Vec<Vec<Class>> = bases
        .iter()
        .map(|base| {
            core::iter::once(base.clone())
                .chain(base.0.ancestors.iter().cloned())
                .collect()
        })
        .collect();
    sequences.push(bases.to_vec());
    let mut heads = alloc::vec![0_usize; sequences.len()];
    let mut order = Vec::new();

    loop {
        let in_tail = |class: &Class, heads: &[usize]| {
            sequences
                .iter()
                .zip(heads)
                .any(|(sequence, &head)| {
                    sequence.iter().skip(head + 1).any(|c| c.ptr_eq(class))
                })
        };
        let next = sequences
            .iter()
            .zip(&heads)
            .filter_map(|(sequence, &head)| sequence.get(head))
            .find(|&candidate| !in_tail(candidate, heads.as_slice()))
            .cloned();
        match next {
            Some(next) => {
                for (sequence, head) in sequences.iter().zip(heads.iter_mut()) {
                    if sequence.get(*head).is_some_and(|c| c.ptr_eq(&next)) {
                        *head += 1;
                    }
                }
                order.push(next);
            }
            None if sequences
                .iter()
                .zip(&heads)
                .all(|(sequence, &head)| head >= sequence.len()) =>
            {
                return Ok(order);
            }
            None => return Err(Error::InconsistentHierarchy { class: name }),
        }
    }
}

/// Name-keyed table where a later insert replaces an earlier one in place.
struct Merged<T> {
    items: Vec<T>,
    index: HashMap<&'static str, usize>,
}

impl<T> Merged<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &'static str, item: T) {
        match self.index.get(name) {
            Some(&slot) => self.items[slot] = item,
            None => {
                self.index.insert(name, self.items.len());
                self.items.push(item);
            }
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Declares a [`Class`].
///
/// Misuse (a second registry, a member name used twice) is recorded and
/// reported by [`build`](Self::build), so declarations chain without `?`.
///
/// # Example
///
/// ```rust
/// use understory_reactive::{ClassBuilder, Object, PropertyMetadata, PropertyRegistry};
///
/// let mut inner_props = PropertyRegistry::new();
/// let p2 = inner_props.reactive("p2", PropertyMetadata::new(2_i32));
/// let inner = ClassBuilder::new("Inner")
///     .registry(inner_props)
///     .parent_reference("parent")
///     .build()
///     .unwrap();
///
/// let outer = ClassBuilder::new("Outer").compose("inner", &inner).build().unwrap();
///
/// let object = Object::new(&outer).unwrap();
/// let child = object.member("inner").unwrap();
/// assert!(child.parent().is_some_and(|parent| parent.ptr_eq(&object)));
/// assert_eq!(child.get(p2).unwrap(), 2);
/// ```
pub struct ClassBuilder {
    name: &'static str,
    bases: Vec<Class>,
    registry: Option<PropertyRegistry>,
    members: Vec<(&'static str, Factory)>,
    parent: Option<&'static str>,
    initializer: Option<Initializer>,
    declared: Vec<DelayedCallback>,
    methods: Vec<(&'static str, ErasedMethod)>,
    error: Option<Error>,
}

impl ClassBuilder {
    /// Starts declaring a class called `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            bases: Vec::new(),
            registry: None,
            members: Vec::new(),
            parent: None,
            initializer: None,
            declared: Vec::new(),
            methods: Vec::new(),
            error: None,
        }
    }

    /// Adds a base class. Bases are linearized in the order they are added.
    #[must_use]
    pub fn extends(mut self, base: &Class) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Assigns the class's own property declarations. At most once.
    #[must_use]
    pub fn registry(mut self, registry: PropertyRegistry) -> Self {
        if self.registry.is_some() {
            self.fail(Error::DuplicateRegistryAssignment {
                item: "property registry",
                owner: self.name,
            });
        } else {
            self.registry = Some(registry);
        }
        self
    }

    /// Declares a member object of class `class`, created on first access.
    ///
    /// If `class` has a parent reference, the member's parent is set to the
    /// owning object before the member's initializer runs.
    #[must_use]
    pub fn compose(mut self, member: &'static str, class: &Class) -> Self {
        if self.claim(member) {
            self.members.push((member, Factory::Class(class.clone())));
        }
        self
    }

    /// Declares a member value computed once from the owning object on first
    /// access. The member cannot be written afterwards.
    #[must_use]
    pub fn autocreate<T, F>(mut self, member: &'static str, factory: F) -> Self
    where
        T: Clone + 'static,
        F: Fn(&Object) -> Result<T> + 'static,
    {
        if self.claim(member) {
            let factory: ValueFactory =
                Rc::new(move |object: &Object| factory(object).map(ErasedValue::new));
            self.members.push((member, Factory::Value(factory)));
        }
        self
    }

    /// Declares that instances refer to the object owning them as `member`.
    ///
    /// Paths may name `member` to climb to the owner.
    #[must_use]
    pub fn parent_reference(mut self, member: &'static str) -> Self {
        if self.parent.is_some() {
            self.fail(Error::DuplicateRegistryAssignment {
                item: "parent reference",
                owner: self.name,
            });
        } else if self.claim(member) {
            self.parent = Some(member);
        }
        self
    }

    /// Sets the initializer run by [`Object::new`] and on member creation.
    ///
    /// Replaces any initializer inherited from a base.
    #[must_use]
    pub fn init<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&Object) -> Result<()> + 'static,
    {
        self.initializer = Some(Rc::new(initializer));
        self
    }

    /// Declares a callback on the property at `path`, relative to instances
    /// of this class.
    ///
    /// The callback receives the instance of this class, wherever in the
    /// object graph the alert originated. Paths may descend into composed
    /// members and climb through parent references; wiring completes as the
    /// objects along the path come into existence.
    #[must_use]
    pub fn on<F>(mut self, path: impl Into<PropertyPath>, callback: F) -> Self
    where
        F: Fn(&Object, &AlertReason) -> Result<()> + 'static,
    {
        let callback: InstanceCallback = Rc::new(callback);
        self.declared
            .push(DelayedCallback::new(path.into(), callback));
        self
    }

    /// Provides the default implementation of `method`.
    #[must_use]
    pub fn method<A, R, F>(mut self, method: Method<A, R>, function: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&Object, A) -> R + 'static,
    {
        self.methods
            .push((method.name(), ErasedMethod::new(function)));
        self
    }

    /// Finishes the class.
    ///
    /// Fails with the first recorded declaration error, if the bases cannot
    /// be linearized, or if a delayed callback names a member or property
    /// that does not exist or is not reactive.
    pub fn build(self) -> Result<Class> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let ancestors = linearize(self.name, &self.bases)?;
        let own_properties: Vec<Rc<PropertyDescriptor>> = self
            .registry
            .map(PropertyRegistry::into_descriptors)
            .unwrap_or_default()
            .into_iter()
            .map(Rc::new)
            .collect();
        if let Some(clash) = self
            .members
            .iter()
            .find(|(member, _)| own_properties.iter().any(|d| d.name() == *member))
        {
            return Err(Error::DuplicateRegistryAssignment {
                item: clash.0,
                owner: self.name,
            });
        }

        let mut properties = Merged::new();
        let mut members = Merged::new();
        let mut methods = HashMap::new();
        for class in ancestors.iter().rev() {
            let data = &*class.0;
            for descriptor in &data.own_properties {
                properties.insert(descriptor.name(), descriptor.clone());
            }
            for &(member, ref factory) in &data.own_members {
                members.insert(member, Composition::new(member, factory.clone()));
            }
            for (name, method) in &data.own_methods {
                methods.insert(*name, method.clone());
            }
        }
        for descriptor in &own_properties {
            properties.insert(descriptor.name(), descriptor.clone());
        }
        for &(member, ref factory) in &self.members {
            members.insert(member, Composition::new(member, factory.clone()));
        }
        for (name, method) in &self.methods {
            methods.insert(*name, method.clone());
        }

        let parent = self
            .parent
            .or_else(|| ancestors.iter().find_map(|class| class.0.own_parent));
        let initializer = self.initializer.clone().or_else(|| {
            ancestors
                .iter()
                .find_map(|class| class.0.own_initializer.clone())
        });

        let mut visible: Vec<DelayedCallback> = ancestors
            .iter()
            .rev()
            .flat_map(|class| class.0.declared.iter().cloned())
            .chain(self.declared.iter().cloned())
            .collect();
        for composition in &members.items {
            if let Some(child) = composition.class() {
                visible.extend(
                    child
                        .pending()
                        .iter()
                        .map(|callback| callback.lifted(composition.name())),
                );
            }
        }

        let mut data = ClassData {
            name: self.name,
            bases: self.bases,
            ancestors,
            own_properties,
            own_members: self.members,
            own_parent: self.parent,
            own_initializer: self.initializer,
            own_methods: self.methods,
            declared: self.declared,
            anchored: alloc::vec![SmallVec::new(); properties.items.len()],
            properties: properties.items,
            property_index: properties.index,
            compositions: members.items,
            composition_index: members.index,
            parent,
            initializer,
            methods,
            pending: Vec::new(),
        };
        for callback in visible {
            data.route(callback)?;
        }

        debug!(
            class = data.name,
            ancestors = data.ancestors.len(),
            properties = data.properties.len(),
            members = data.compositions.len(),
            pending = data.pending.len(),
            "class built"
        );
        Ok(Class(Rc::new(data)))
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Reserves a member name; records an error and returns `false` if taken.
    fn claim(&mut self, member: &'static str) -> bool {
        let taken = self.parent == Some(member)
            || self.members.iter().any(|(name, _)| *name == member);
        if taken {
            self.fail(Error::DuplicateRegistryAssignment {
                item: member,
                owner: self.name,
            });
        }
        !taken
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("bases", &self.bases.iter().map(Class::name).collect::<Vec<_>>())
            .field("registry", &self.registry)
            .field(
                "members",
                &self.members.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            )
            .field("parent", &self.parent)
            .field("declared", &self.declared)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
