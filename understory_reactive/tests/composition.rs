// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composed object graphs: lazy members, parent references and callbacks
//! declared against paths that do not exist yet.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use understory_reactive::{
    AlertEvent, AlertReason, Class, ClassBuilder, Error, Object, Property, PropertyMetadata,
    PropertyPath, PropertyRegistry, Result,
};

/// `(label, receiver class, originating property)` per callback invocation.
type Log = Rc<RefCell<Vec<(&'static str, &'static str, &'static str)>>>;

fn record(
    log: &Log,
    label: &'static str,
) -> impl Fn(&Object, &AlertReason) -> Result<()> + 'static {
    let log = log.clone();
    move |receiver: &Object, reason: &AlertReason| {
        log.borrow_mut()
            .push((label, receiver.class().name(), reason.origin().property()));
        Ok(())
    }
}

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

fn bump(runs: &Cell<u32>) {
    runs.set(runs.get() + 1);
}

type Triple = (i32, i32, i32);

/// Three levels: `Outer` owns `inner`, which owns `inner_inner`. Both nested
/// classes refer back to their owner as `parent`.
struct Nested {
    outer: Class,
    op1: Property<i32>,
    op2: Property<Triple>,
    ip1: Property<i32>,
    iip1: Property<i32>,
    iip2: Property<Triple>,
    log: Log,
    op2_runs: Rc<Cell<u32>>,
    iip2_runs: Rc<Cell<u32>>,
    op3_runs: Rc<Cell<u32>>,
    worm_runs: Rc<Cell<u32>>,
}

fn nested() -> Nested {
    let log = Log::default();
    let op2_runs = counter();
    let iip2_runs = counter();
    let op3_runs = counter();
    let worm_runs = counter();

    let mut props = PropertyRegistry::new();
    let iip1 = props.reactive("iip1", PropertyMetadata::new(3_i32));
    let runs = iip2_runs.clone();
    let iip2 = props.cached(
        "iip2",
        ["iip1", "parent.ip1", "parent.parent.op1"].map(PropertyPath::parse),
        move |object| {
            bump(&runs);
            Ok((
                object.get_path::<i32>("iip1")?,
                object.get_path::<i32>("parent.ip1")?,
                object.get_path::<i32>("parent.parent.op1")?,
            ))
        },
    );
    let inner_inner = ClassBuilder::new("InnerInner")
        .registry(props)
        .parent_reference("parent")
        .on("parent.parent.op1", record(&log, "inner_inner_on_op1"))
        .build()
        .unwrap();

    let mut props = PropertyRegistry::new();
    let ip1 = props.reactive("ip1", PropertyMetadata::new(2_i32));
    let runs = worm_runs.clone();
    let inner = ClassBuilder::new("Inner")
        .registry(props)
        .parent_reference("parent")
        .autocreate("worm", move |_| {
            bump(&runs);
            Ok("worm")
        })
        .on("parent.op1", record(&log, "inner_on_op1"))
        .compose("inner_inner", &inner_inner)
        .build()
        .unwrap();

    let mut props = PropertyRegistry::new();
    let op1 = props.reactive("op1", PropertyMetadata::new(1_i32));
    let runs = op2_runs.clone();
    let op2 = props.cached(
        "op2",
        ["op1", "inner.ip1", "inner.inner_inner.iip1"].map(PropertyPath::parse),
        move |object| {
            bump(&runs);
            Ok((
                object.get(op1)?,
                object.get_path::<i32>("inner.ip1")?,
                object.get_path::<i32>("inner.inner_inner.iip1")?,
            ))
        },
    );
    let runs = op3_runs.clone();
    let outer = ClassBuilder::new("Outer")
        .registry(props)
        .compose("inner", &inner)
        .on("inner.ip1", record(&log, "outer_on_ip1"))
        .on(
            "inner.inner_inner.parent.parent.inner.inner_inner.parent.parent.op1",
            record(&log, "in_and_out"),
        )
        .autocreate("op3", move |_| {
            bump(&runs);
            Ok(42_i32)
        })
        .build()
        .unwrap();

    Nested {
        outer,
        op1,
        op2,
        ip1,
        iip1,
        iip2,
        log,
        op2_runs,
        iip2_runs,
        op3_runs,
        worm_runs,
    }
}

#[test]
fn callbacks_on_owner_property_reach_every_level() {
    let n = nested();
    let o = Object::new(&n.outer).unwrap();
    o.set(n.op1, 4).unwrap();
    assert_eq!(
        *n.log.borrow(),
        [
            ("in_and_out", "Outer", "op1"),
            ("inner_on_op1", "Inner", "op1"),
            ("inner_inner_on_op1", "InnerInner", "op1"),
        ]
    );
}

#[test]
fn owner_callback_on_member_property() {
    let n = nested();
    let o = Object::new(&n.outer).unwrap();
    o.member("inner").unwrap().set(n.ip1, 5).unwrap();
    assert_eq!(*n.log.borrow(), [("outer_on_ip1", "Outer", "ip1")]);
}

#[test]
fn member_write_without_observers_is_silent() {
    let n = nested();
    let o = Object::new(&n.outer).unwrap();
    let deepest = o.member("inner").unwrap().member("inner_inner").unwrap();
    deepest.set(n.iip1, 6).unwrap();
    assert!(n.log.borrow().is_empty());
}

#[test]
fn cached_values_track_dependencies_across_members() {
    let n = nested();
    let o = Object::new(&n.outer).unwrap();
    let inner = o.member("inner").unwrap();
    let deepest = inner.member("inner_inner").unwrap();

    assert_eq!(o.get(n.op2).unwrap(), (1, 2, 3));
    assert_eq!(o.get(n.op2).unwrap(), (1, 2, 3));
    assert_eq!(n.op2_runs.get(), 1);

    deepest.set(n.iip1, 6).unwrap();
    assert_eq!(o.get(n.op2).unwrap(), (1, 2, 6));
    assert_eq!(n.op2_runs.get(), 2);

    assert_eq!(deepest.get(n.iip2).unwrap(), (6, 2, 1));
    o.set(n.op1, 4).unwrap();
    inner.set(n.ip1, 5).unwrap();
    assert_eq!(deepest.get(n.iip2).unwrap(), (6, 5, 4));
    assert_eq!(n.iip2_runs.get(), 2);
}

#[test]
fn value_members_are_computed_once() {
    let n = nested();
    let o = Object::new(&n.outer).unwrap();
    assert_eq!(n.op3_runs.get(), 0);
    assert_eq!(o.autocreated::<i32>("op3").unwrap(), 42);
    assert_eq!(o.autocreated::<i32>("op3").unwrap(), 42);
    assert_eq!(n.op3_runs.get(), 1);

    let inner = o.member("inner").unwrap();
    assert_eq!(inner.autocreated::<&str>("worm").unwrap(), "worm");
    assert_eq!(n.worm_runs.get(), 1);
    assert_eq!(
        inner.set_attribute("worm", "moth"),
        Err(Error::ReadonlyComposition {
            class: "Inner",
            member: "worm"
        })
    );
}

#[test]
fn members_are_stable_and_know_their_owner() {
    let n = nested();
    let o = Object::new(&n.outer).unwrap();
    let inner = o.member("inner").unwrap();
    assert!(inner.ptr_eq(&o.member("inner").unwrap()));
    assert!(inner.parent().is_some_and(|parent| parent.ptr_eq(&o)));

    let deepest = inner.member("inner_inner").unwrap();
    let climbed = deepest.parent().and_then(|p| p.parent()).unwrap();
    assert!(climbed.ptr_eq(&o));
    assert_eq!(
        deepest.get_path::<i32>("parent.parent.op1").unwrap(),
        o.get(n.op1).unwrap()
    );
    assert!(o.get_path::<i32>("^.op1").is_err());
}

#[test]
fn dropping_the_root_releases_members() {
    let n = nested();
    let o = Object::new(&n.outer).unwrap();
    let deepest = o.member("inner").unwrap().member("inner_inner").unwrap();
    drop(o);
    assert!(deepest.parent().is_none());
    assert_eq!(
        deepest.get_path::<i32>("parent.ip1"),
        Err(Error::Detached {
            class: "InnerInner"
        })
    );
}

/// `O` owns `P1` and a member `C` owning `P2`; `X` is cached on `(P1, C.P2)`.
#[test]
fn cached_pair_reevaluates_once_per_change() {
    let mut props = PropertyRegistry::new();
    let p2 = props.reactive("P2", PropertyMetadata::new(2_i32));
    let c = ClassBuilder::new("C")
        .registry(props)
        .parent_reference("parent")
        .build()
        .unwrap();

    let runs = counter();
    let getter_runs = runs.clone();
    let mut props = PropertyRegistry::new();
    let p1 = props.reactive("P1", PropertyMetadata::new(1_i32));
    let x = props.cached(
        "X",
        [PropertyPath::from(p1), PropertyPath::parse("C.P2")],
        move |object| {
            bump(&getter_runs);
            Ok((object.get(p1)?, object.get_path::<i32>("C.P2")?))
        },
    );

    let fired: Rc<RefCell<Vec<AlertReason>>> = Rc::default();
    let sink = fired.clone();
    let o_class = ClassBuilder::new("O")
        .registry(props)
        .compose("C", &c)
        .on("C.P2", move |_, reason| {
            sink.borrow_mut().push(reason.clone());
            Ok(())
        })
        .build()
        .unwrap();

    let o = Object::new(&o_class).unwrap();
    assert_eq!(o.get(x).unwrap(), (1, 2));
    assert_eq!(runs.get(), 1);

    o.set(p1, 4).unwrap();
    assert_eq!(o.get(x).unwrap(), (4, 2));
    assert_eq!(runs.get(), 2);

    let member = o.member("C").unwrap();
    member.set(p2, 5).unwrap();
    assert_eq!(o.get(x).unwrap(), (4, 5));
    assert_eq!(o.get(x).unwrap(), (4, 5));
    assert_eq!(runs.get(), 3);

    let fired = fired.borrow();
    assert_eq!(fired.len(), 1);
    let origin = fired[0].origin();
    assert!(origin.originator().ptr_eq(&member.slot("P2").unwrap()));
    match origin.event() {
        AlertEvent::Set { old, new } => {
            assert_eq!(old.downcast::<i32>(), Some(2));
            assert_eq!(new.downcast::<i32>(), Some(5));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn connect_moves_pending_callbacks_to_new_host() {
    let mut props = PropertyRegistry::new();
    let level = props.reactive("level", PropertyMetadata::new(0_u8));
    let host_class = ClassBuilder::new("Host").registry(props).build().unwrap();

    let log = Log::default();
    let guest_class = ClassBuilder::new("Guest")
        .parent_reference("host")
        .on("host.level", record(&log, "guest_on_level"))
        .build()
        .unwrap();

    let first = Object::new(&host_class).unwrap();
    let second = Object::new(&host_class).unwrap();
    let guest = Object::new(&guest_class).unwrap();

    first.set(level, 1).unwrap();
    assert!(log.borrow().is_empty());

    guest.connect(&first).unwrap();
    assert!(guest.parent().is_some_and(|p| p.ptr_eq(&first)));
    first.set(level, 2).unwrap();
    assert_eq!(log.borrow().len(), 1);

    guest.disconnect().unwrap();
    assert!(guest.parent().is_none());
    first.set(level, 3).unwrap();
    assert_eq!(log.borrow().len(), 1);

    guest.connect(&second).unwrap();
    first.set(level, 4).unwrap();
    second.set(level, 1).unwrap();
    assert_eq!(
        *log.borrow(),
        [
            ("guest_on_level", "Guest", "level"),
            ("guest_on_level", "Guest", "level"),
        ]
    );
}

#[test]
fn pending_callbacks_of_members_travel_with_connect() {
    let mut props = PropertyRegistry::new();
    let level = props.reactive("level", PropertyMetadata::new(0_u8));
    let host_class = ClassBuilder::new("Host").registry(props).build().unwrap();

    let log = Log::default();
    let leaf = ClassBuilder::new("Leaf")
        .parent_reference("parent")
        .on("parent.parent.level", record(&log, "leaf_on_level"))
        .build()
        .unwrap();
    let branch = ClassBuilder::new("Branch")
        .parent_reference("parent")
        .compose("leaf", &leaf)
        .build()
        .unwrap();
    assert_eq!(branch.parent_reference(), Some("parent"));

    let host = Object::new(&host_class).unwrap();
    let object = Object::new(&branch).unwrap();
    object.connect(&host).unwrap();
    host.set(level, 9).unwrap();
    assert_eq!(*log.borrow(), [("leaf_on_level", "Leaf", "level")]);
}

#[test]
fn inherited_members_and_callbacks_apply_to_subclasses() {
    let mut props = PropertyRegistry::new();
    let p = props.reactive("p", PropertyMetadata::new(0_i32));
    let part = ClassBuilder::new("Part").registry(props).build().unwrap();

    let log = Log::default();
    let base = ClassBuilder::new("Base")
        .compose("part", &part)
        .on("part.p", record(&log, "base_on_part"))
        .build()
        .unwrap();
    let derived = ClassBuilder::new("Derived").extends(&base).build().unwrap();

    let object = Object::new(&derived).unwrap();
    object.member("part").unwrap().set(p, 1).unwrap();
    assert_eq!(*log.borrow(), [("base_on_part", "Derived", "p")]);
}

#[test]
fn deep_callback_waits_for_each_member() {
    let log = Log::default();
    let leaves_built = counter();
    let mut props = PropertyRegistry::new();
    let depth = props.reactive("depth", PropertyMetadata::new(0_i32));
    let runs = leaves_built.clone();
    let leaf = ClassBuilder::new("Leaf")
        .registry(props)
        .init(move |_| {
            bump(&runs);
            Ok(())
        })
        .build()
        .unwrap();
    let middle = ClassBuilder::new("Middle")
        .compose("leaf", &leaf)
        .build()
        .unwrap();
    let top = ClassBuilder::new("Top")
        .compose("middle", &middle)
        .on("middle.leaf.depth", record(&log, "top_on_depth"))
        .build()
        .unwrap();

    let object = Object::new(&top).unwrap();
    let middle = object.member("middle").unwrap();
    assert_eq!(leaves_built.get(), 0);

    let leaf = middle.member("leaf").unwrap();
    assert_eq!(leaves_built.get(), 1);
    leaf.set(depth, 4).unwrap();
    assert_eq!(*log.borrow(), [("top_on_depth", "Top", "depth")]);
}

#[test]
fn deep_callback_attaches_to_member_built_by_initializer() {
    let log = Log::default();
    let mut props = PropertyRegistry::new();
    let depth = props.reactive("depth", PropertyMetadata::new(0_i32));
    let leaf = ClassBuilder::new("Leaf").registry(props).build().unwrap();
    let middle = ClassBuilder::new("Middle")
        .compose("leaf", &leaf)
        .init(|object| object.member("leaf").map(drop))
        .build()
        .unwrap();
    let top = ClassBuilder::new("Top")
        .compose("middle", &middle)
        .on("middle.leaf.depth", record(&log, "top_on_depth"))
        .build()
        .unwrap();

    let object = Object::new(&top).unwrap();
    let leaf = object.member("middle").unwrap().member("leaf").unwrap();
    leaf.set(depth, 1).unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn initializer_sees_parent_before_callbacks_attach() {
    let seen_parent = Rc::new(Cell::new(false));
    let flag = seen_parent.clone();
    let child = ClassBuilder::new("Child")
        .parent_reference("parent")
        .init(move |object| {
            flag.set(object.parent().is_some());
            Ok(())
        })
        .build()
        .unwrap();
    let owner = ClassBuilder::new("Owner")
        .compose("child", &child)
        .build()
        .unwrap();
    let object = Object::new(&owner).unwrap();
    object.member("child").unwrap();
    assert!(seen_parent.get());
}

#[test]
fn failing_member_initializer_leaves_no_member() {
    let attempts = counter();
    let tries = attempts.clone();
    let child = ClassBuilder::new("Fragile")
        .init(move |_| {
            bump(&tries);
            Err(Error::NoParentReference { class: "Fragile" })
        })
        .build()
        .unwrap();
    let owner = ClassBuilder::new("Owner")
        .compose("child", &child)
        .build()
        .unwrap();
    let object = Object::new(&owner).unwrap();
    assert!(object.member("child").is_err());
    assert!(object.member("child").is_err());
    assert_eq!(attempts.get(), 2);
}
