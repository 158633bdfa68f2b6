// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2024-2026 The typebus Authors. All rights reserved.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! End-to-end scenarios over the public `SubscriptionManager` API, one test
//! per literal scenario.

use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, OnceLock};
use std::thread;

use typebus::{
    BusConfig, DeadMessage, Describe, HandlerDescriptor, Message, MatchPolicy,
    SubscriptionManager, downcast_ref,
};

struct A;
struct B; // extends A

impl Message for A {}
impl Message for B {
    fn supertypes() -> &'static [TypeId] {
        static SUPERS: OnceLock<Vec<TypeId>> = OnceLock::new();
        SUPERS.get_or_init(|| vec![TypeId::of::<A>()])
    }
}

struct Counting {
    calls: AtomicUsize,
}

impl Counting {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A listener over `A`, with `accepts_subtypes`/`enabled` toggled across
/// three separate listener types, since a descriptor's flags are fixed for
/// the lifetime of its declaring type.
struct LaStrict(Counting);
impl Describe for LaStrict {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, A, _>("on_a", |l, _m| {
                l.0.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .accepts_subtypes(false)
            .build(),
        ]
    }
}

struct LaPolymorphic(Counting);
impl Describe for LaPolymorphic {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, A, _>("on_a", |l, _m| {
                l.0.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build(),
        ]
    }
}

struct LaDisabled(Counting);
impl Describe for LaDisabled {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, A, _>("on_a", |l, _m| {
                l.0.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .enabled(false)
            .build(),
        ]
    }
}

struct DeadMessageSaver(Mutex<Vec<DeadMessage>>);
impl Describe for DeadMessageSaver {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, DeadMessage, _>("on_dead", |l, m| {
                let dead = downcast_ref::<DeadMessage>(m).expect("DeadMessage downcast");
                l.0.lock().unwrap().push(dead.clone());
                Ok(())
            })
            .build(),
        ]
    }
}

#[test]
fn exact_mode_does_not_expand_to_subtype() {
    let bus = SubscriptionManager::new(BusConfig::new(MatchPolicy::Exact, 2));
    let la = Arc::new(LaStrict(Counting::new()));
    let dead = Arc::new(DeadMessageSaver(Mutex::new(Vec::new())));
    bus.subscribe(la.clone());
    bus.subscribe(dead.clone());

    bus.publish(&B);

    assert_eq!(la.0.calls(), 0, "LA declared over A must not see a B under Exact mode");
    assert_eq!(dead.0.lock().unwrap().len(), 1, "unmatched B publishes a DeadMessage");
}

#[test]
fn super_type_expansion_invokes_handler_once() {
    let bus = SubscriptionManager::new(BusConfig::new(MatchPolicy::ExactWithSuperTypes, 2));
    let la = Arc::new(LaPolymorphic(Counting::new()));
    bus.subscribe(la.clone());

    bus.publish(&B);

    assert_eq!(la.0.calls(), 1);
}

#[test]
fn disabled_handler_is_never_invoked() {
    let bus = SubscriptionManager::new(BusConfig::new(MatchPolicy::Exact, 2));
    let la = Arc::new(LaDisabled(Counting::new()));
    let dead = Arc::new(DeadMessageSaver(Mutex::new(Vec::new())));
    bus.subscribe(la.clone());
    bus.subscribe(dead.clone());

    bus.publish(&A);

    assert_eq!(la.0.calls(), 0);
    assert_eq!(dead.0.lock().unwrap().len(), 1);
}

struct LabPair(Mutex<Vec<(TypeId, TypeId)>>);
impl Describe for LabPair {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::pair::<Self, A, A, _>("on_pair", |l, m1, m2| {
                l.0.lock()
                    .unwrap()
                    .push(((*m1).type_id(), (*m2).type_id()));
                Ok(())
            })
            .build(),
        ]
    }
}

#[test]
fn multi_arg_pair_is_invoked_with_both_arguments() {
    let bus = SubscriptionManager::new(BusConfig::default());
    let lab = Arc::new(LabPair(Mutex::new(Vec::new())));
    bus.subscribe(lab.clone());

    let (a1, a2) = (A, A);
    bus.publish_pair(&a1, &a2);

    let seen = lab.0.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (TypeId::of::<A>(), TypeId::of::<A>()));
}

struct LVar(Mutex<Vec<usize>>);
impl Describe for LVar {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::vararg::<Self, A, _>("on_many", |l, messages| {
                l.0.lock().unwrap().push(messages.len());
                Ok(())
            })
            .build(),
        ]
    }
}

#[test]
fn homogeneous_triple_fires_vararg_handler_once_with_all_three() {
    let bus = SubscriptionManager::new(BusConfig::new(
        MatchPolicy::ExactWithSuperTypesAndVarArgs,
        2,
    ));
    let lvar = Arc::new(LVar(Mutex::new(Vec::new())));
    bus.subscribe(lvar.clone());

    let (a1, a2, a3) = (A, A, A);
    bus.publish_triple(&a1, &a2, &a3);

    let seen = lvar.0.lock().unwrap();
    assert_eq!(*seen, vec![3], "one call, bundling all three instances");
}

#[test]
fn heterogeneous_pair_fires_once_via_common_supertype() {
    let bus = SubscriptionManager::new(BusConfig::new(
        MatchPolicy::ExactWithSuperTypesAndVarArgs,
        2,
    ));
    let lvar = Arc::new(LVar(Mutex::new(Vec::new())));
    bus.subscribe(lvar.clone());

    let (a1, b1) = (A, B);
    bus.publish_pair(&a1, &b1);

    let seen = lvar.0.lock().unwrap();
    assert_eq!(
        *seen,
        vec![2],
        "A is the common supertype of (A, B), so the A[] handler fires once with both"
    );
}

#[test]
fn no_common_supertype_suppresses_vararg_fan_out() {
    struct Unrelated;
    impl Message for Unrelated {}

    let bus = SubscriptionManager::new(BusConfig::new(
        MatchPolicy::ExactWithSuperTypesAndVarArgs,
        2,
    ));
    let lvar = Arc::new(LVar(Mutex::new(Vec::new())));
    bus.subscribe(lvar.clone());

    let (a1, u1) = (A, Unrelated);
    bus.publish_pair(&a1, &u1);

    assert!(lvar.0.lock().unwrap().is_empty());
}

#[test]
fn concurrent_subscribe_of_many_instances_lands_in_the_index() {
    const PER_CLASS: usize = 5_000;

    struct ClassOne;
    struct ClassTwo;
    struct ClassThree;
    impl Describe for ClassOne {
        fn describe() -> Vec<HandlerDescriptor> {
            vec![HandlerDescriptor::single::<Self, A, _>("on_a", |_, _| Ok(())).build()]
        }
    }
    impl Describe for ClassTwo {
        fn describe() -> Vec<HandlerDescriptor> {
            vec![HandlerDescriptor::single::<Self, A, _>("on_a", |_, _| Ok(())).build()]
        }
    }
    impl Describe for ClassThree {
        fn describe() -> Vec<HandlerDescriptor> {
            vec![HandlerDescriptor::single::<Self, A, _>("on_a", |_, _| Ok(())).build()]
        }
    }

    let bus = Arc::new(SubscriptionManager::new(BusConfig::default()));
    let barrier = Arc::new(Barrier::new(3));

    let handles: Vec<_> = [0usize, 1, 2]
        .into_iter()
        .map(|which| {
            let bus = bus.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..PER_CLASS {
                    match which {
                        0 => bus.subscribe(Arc::new(ClassOne)),
                        1 => bus.subscribe(Arc::new(ClassTwo)),
                        _ => bus.subscribe(Arc::new(ClassThree)),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let subs = bus.get_exact(TypeId::of::<A>());
    let total: usize = subs.iter().map(|s| s.listener_count()).sum();
    assert_eq!(total, 3 * PER_CLASS);
}

#[test]
fn duplicate_subscription_invoked_twice() {
    let bus = SubscriptionManager::new(BusConfig::default());
    let la = Arc::new(LaPolymorphic(Counting::new()));
    bus.subscribe(la.clone());
    bus.subscribe(la.clone());

    bus.publish(&A);

    assert_eq!(la.0.calls(), 2);
}

#[test]
fn unsubscribe_of_never_subscribed_listener_is_a_no_op() {
    let bus = SubscriptionManager::new(BusConfig::default());
    let la = Arc::new(LaPolymorphic(Counting::new()));
    bus.unsubscribe(la.clone());
    bus.publish(&A);
    assert_eq!(la.0.calls(), 0);
}

#[test]
fn subscribe_then_unsubscribe_round_trips_to_never_subscribed() {
    let bus = SubscriptionManager::new(BusConfig::default());
    let la = Arc::new(LaPolymorphic(Counting::new()));
    let dead = Arc::new(DeadMessageSaver(Mutex::new(Vec::new())));
    bus.subscribe(la.clone());
    bus.subscribe(dead.clone());
    bus.unsubscribe(la.clone());

    bus.publish(&A);

    assert_eq!(la.0.calls(), 0);
    assert_eq!(
        dead.0.lock().unwrap().len(),
        1,
        "the emptied subscription still exists in the index, but invoked nobody, so this must \
         behave exactly like the never-subscribed case"
    );
}

#[test]
fn shutdown_is_idempotent() {
    let bus = SubscriptionManager::new(BusConfig::default());
    let la = Arc::new(LaPolymorphic(Counting::new()));
    bus.subscribe(la.clone());

    bus.shutdown();
    bus.shutdown();

    bus.publish(&A);
    assert_eq!(la.0.calls(), 0, "publish after shutdown is a safe no-op");
}
