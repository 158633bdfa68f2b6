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

//! `SubscriberIndex`: the triple index keyed by listener class, single
//! message type, and composite multi-type key.
//!
//! Every mutating method here (`first_subscribe`, `attach`, `detach`) is
//! only ever called while [`SubscriptionManager`](crate::SubscriptionManager)
//! holds its single exclusive writer lock, so the locks in this module
//! exist purely to let publish-path readers proceed without contending with
//! each other, not to guard against concurrent writers, which cannot happen
//! by construction.

use std::any::TypeId;
use std::sync::Arc;
use std::sync::RwLock;

use ahash::{AHashMap, AHashSet};

use crate::class_tree::{ClassTree, CompositeKey};
use crate::descriptor::HandlerDescriptor;
use crate::hierarchy::TypeHierarchyCache;
use crate::listener::{Describe, Listener};
use crate::subscription::Subscription;

#[derive(Default)]
pub struct SubscriberIndex {
    per_listener_class: RwLock<AHashMap<TypeId, Arc<Vec<Arc<Subscription>>>>>,
    per_message_single: RwLock<AHashMap<TypeId, Vec<Arc<Subscription>>>>,
    per_message_multi: RwLock<AHashMap<CompositeKey, Vec<Arc<Subscription>>>>,
    /// Var-arg handlers, keyed directly by their component type rather than
    /// by `arrayOf(component)`: every lookup `VarArgResolver` needs
    /// (`varArgSubs(T)`, `varArgSuperSubs(T)` for `U ∈ supertypes(T)`)
    /// already has the component type in hand, so keying here avoids a
    /// redundant trip through [`TypeHierarchyCache::array_of`] on every
    /// publish. `array_of` is still registered for identity/debugging use.
    per_message_vararg: RwLock<AHashMap<TypeId, Vec<Arc<Subscription>>>>,
    /// Listener classes whose `Describe::describe()` produced no enabled
    /// descriptor; recorded so every later subscribe of that class is a
    /// cheap no-op.
    non_listeners: RwLock<AHashSet<TypeId>>,
}

impl SubscriberIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_non_listener(&self, type_id: TypeId) -> bool {
        self.non_listeners
            .read()
            .expect("SubscriberIndex lock poisoned")
            .contains(&type_id)
    }

    #[must_use]
    pub fn group(&self, type_id: TypeId) -> Option<Arc<Vec<Arc<Subscription>>>> {
        self.per_listener_class
            .read()
            .expect("SubscriberIndex lock poisoned")
            .get(&type_id)
            .cloned()
    }

    /// Builds the subscription group for listener class `L` the first time
    /// any instance of `L` subscribes. Returns the freshly built group, or
    /// `None` if `L` declares no enabled handler and was recorded as a
    /// non-listener.
    ///
    /// Caller must have already checked `group(type_id).is_none()`; this
    /// method re-checks under the write lock so a racing duplicate
    /// first-subscribe call (impossible under the manager's single-writer
    /// discipline, but cheap to guard regardless) is idempotent.
    pub fn first_subscribe<L: Describe + 'static>(
        &self,
        class_tree: &ClassTree,
        hierarchy: &TypeHierarchyCache,
    ) -> Option<Arc<Vec<Arc<Subscription>>>> {
        let type_id = TypeId::of::<L>();
        if let Some(existing) = self.group(type_id) {
            return Some(existing);
        }

        let descriptors: Vec<HandlerDescriptor> =
            L::describe().into_iter().filter(|d| d.enabled).collect();

        if descriptors.is_empty() {
            self.non_listeners
                .write()
                .expect("SubscriberIndex lock poisoned")
                .insert(type_id);
            return None;
        }

        let mut group = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let subscription = Arc::new(Subscription::new(Arc::new(descriptor)));
            self.index_subscription(&subscription, class_tree, hierarchy);
            group.push(subscription);
        }

        let group = Arc::new(group);
        self.per_listener_class
            .write()
            .expect("SubscriberIndex lock poisoned")
            .insert(type_id, group.clone());
        Some(group)
    }

    fn index_subscription(
        &self,
        subscription: &Arc<Subscription>,
        class_tree: &ClassTree,
        hierarchy: &TypeHierarchyCache,
    ) {
        let declared = subscription.descriptor.message_types();
        for d in declared {
            hierarchy.register(d.id.type_id, d.direct_supertypes.to_vec());
        }

        if let Some(array_type) = subscription.descriptor.vararg_array_type {
            hierarchy.register_array_of(declared[0].id.type_id, array_type);
            self.per_message_vararg
                .write()
                .expect("SubscriberIndex lock poisoned")
                .entry(declared[0].id.type_id)
                .or_default()
                .push(subscription.clone());
        } else if declared.len() == 1 {
            self.per_message_single
                .write()
                .expect("SubscriberIndex lock poisoned")
                .entry(declared[0].id.type_id)
                .or_default()
                .push(subscription.clone());
        } else {
            let types: Vec<TypeId> = declared.iter().map(|d| d.id.type_id).collect();
            let key = class_tree.get(&types);
            self.per_message_multi
                .write()
                .expect("SubscriberIndex lock poisoned")
                .entry(key)
                .or_default()
                .push(subscription.clone());
        }
    }

    /// Attaches `listener` to every Subscription in `L`'s existing group.
    pub fn attach(&self, group: &[Arc<Subscription>], listener: Arc<dyn Listener>) {
        for subscription in group {
            subscription.add(listener.clone());
        }
    }

    /// Detaches `listener` from every Subscription in `L`'s group.
    pub fn detach(&self, group: &[Arc<Subscription>], listener: &Arc<dyn Listener>) {
        for subscription in group {
            subscription.remove(listener);
        }
    }

    #[must_use]
    pub fn exact_single(&self, type_id: TypeId) -> Vec<Arc<Subscription>> {
        self.per_message_single
            .read()
            .expect("SubscriberIndex lock poisoned")
            .get(&type_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn exact_multi(&self, key: CompositeKey) -> Vec<Arc<Subscription>> {
        self.per_message_multi
            .read()
            .expect("SubscriberIndex lock poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Var-arg subscriptions declared directly over `component`, i.e.
    /// `arrayOf(component)`, keyed by `component` (see the field doc on
    /// `per_message_vararg`).
    #[must_use]
    pub fn vararg_over(&self, component: TypeId) -> Vec<Arc<Subscription>> {
        self.per_message_vararg
            .read()
            .expect("SubscriberIndex lock poisoned")
            .get(&component)
            .cloned()
            .unwrap_or_default()
    }

    /// Drops every index entry and recorded non-listener class. Called on
    /// manager shutdown.
    pub fn clear(&self) {
        self.per_listener_class
            .write()
            .expect("SubscriberIndex lock poisoned")
            .clear();
        self.per_message_single
            .write()
            .expect("SubscriberIndex lock poisoned")
            .clear();
        self.per_message_multi
            .write()
            .expect("SubscriberIndex lock poisoned")
            .clear();
        self.per_message_vararg
            .write()
            .expect("SubscriberIndex lock poisoned")
            .clear();
        self.non_listeners
            .write()
            .expect("SubscriberIndex lock poisoned")
            .clear();
    }
}
