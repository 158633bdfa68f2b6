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

//! `SubscriptionManager`: the front door. Serialises subscribe/unsubscribe
//! through a single writer lock, exposes the publish-side lookups, and owns
//! cache invalidation.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use smallvec::{SmallVec, smallvec};

use crate::class_tree::ClassTree;
use crate::config::BusConfig;
use crate::error::{BusError, ConsoleErrorHandler, ErrorContext, ErrorHandler};
use crate::hierarchy::TypeHierarchyCache;
use crate::index::SubscriberIndex;
use crate::invoke::Dispatch;
use crate::listener::{Describe, Listener};
use crate::message::{DeadMessage, Message, MessageTypeId};
use crate::resolver::{SuperTypeResolver, VarArgResolver};
use crate::subscription::Subscription;

/// The in-process message bus.
///
/// Cheaply `Clone`-able by wrapping in `Arc<SubscriptionManager>` at the
/// call site; the manager itself holds no unshareable state.
pub struct SubscriptionManager {
    index: SubscriberIndex,
    hierarchy: TypeHierarchyCache,
    class_tree: ClassTree,
    super_resolver: SuperTypeResolver,
    vararg_resolver: VarArgResolver,
    /// Serialises subscribe/unsubscribe against each other only. Publish-path
    /// reads never take this lock; they rely on the fine-grained locks each
    /// structure above already owns.
    writer_lock: Mutex<()>,
    /// Set once at construction; there is no `set_error_handler` since the
    /// manager never needs to swap handlers mid-flight.
    error_handler: Arc<dyn ErrorHandler>,
    config: BusConfig,
    shut_down: AtomicBool,
}

impl SubscriptionManager {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self::with_error_handler(config, Arc::new(ConsoleErrorHandler::new()))
    }

    #[must_use]
    pub fn with_error_handler(config: BusConfig, error_handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            index: SubscriberIndex::new(),
            hierarchy: TypeHierarchyCache::new(),
            class_tree: ClassTree::new(),
            super_resolver: SuperTypeResolver::new(),
            vararg_resolver: VarArgResolver::new(),
            writer_lock: Mutex::new(()),
            error_handler,
            config,
            shut_down: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> BusConfig {
        self.config
    }

    /// Registers `listener`. A `null` listener has no Rust equivalent
    /// (`Arc<L>` is never absent), so there is nothing to guard here.
    pub fn subscribe<L: Listener + Describe>(&self, listener: Arc<L>) {
        let type_id = TypeId::of::<L>();
        if self.index.is_non_listener(type_id) {
            return;
        }

        let _write_guard = self.writer_lock.lock().expect("writer lock poisoned");
        self.invalidate_derived_caches();

        let group = match self.index.group(type_id) {
            Some(group) => group,
            None => match self
                .index
                .first_subscribe::<L>(&self.class_tree, &self.hierarchy)
            {
                Some(group) => group,
                None => return,
            },
        };

        let listener: Arc<dyn Listener> = listener;
        self.index.attach(&group, listener);
    }

    /// Removes `listener` from its listener class's subscription group.
    /// A no-op if `listener`'s class never subscribed, or if this
    /// particular instance was never attached.
    pub fn unsubscribe<L: Listener + Describe>(&self, listener: Arc<L>) {
        let type_id = TypeId::of::<L>();
        let _write_guard = self.writer_lock.lock().expect("writer lock poisoned");

        let Some(group) = self.index.group(type_id) else {
            return;
        };
        self.invalidate_derived_caches();

        let listener: Arc<dyn Listener> = listener;
        self.index.detach(&group, &listener);
    }

    fn invalidate_derived_caches(&self) {
        self.hierarchy.invalidate();
        self.super_resolver.invalidate();
        self.vararg_resolver.invalidate();
    }

    /// Clears every index and cache. Idempotent.
    pub fn shutdown(&self) {
        let _write_guard = self.writer_lock.lock().expect("writer lock poisoned");
        self.shut_down.store(true, Ordering::Release);
        self.index.clear();
        self.hierarchy.clear();
        self.super_resolver.invalidate();
        self.vararg_resolver.invalidate();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// `getExact(T)`: a snapshot the caller may iterate without holding any
    /// lock.
    #[must_use]
    pub fn get_exact(&self, type_id: TypeId) -> Vec<Arc<Subscription>> {
        self.index.exact_single(type_id)
    }

    /// `getExactAndSuper(T)`.
    #[must_use]
    pub fn get_exact_and_super(&self, type_id: TypeId) -> Vec<Arc<Subscription>> {
        let mut result = self.index.exact_single(type_id);
        result.extend(
            self.super_resolver
                .super_subs(type_id, &self.index, &self.hierarchy)
                .iter()
                .cloned(),
        );
        result
    }

    /// Single-argument publish.
    ///
    /// Registers `T`'s declared supertypes eagerly: `T` is statically
    /// known here, which is the one place this crate can call
    /// `T::supertypes()` without reflection, so it is also the natural
    /// point to teach `TypeHierarchyCache` about `T` even if no handler
    /// has ever declared `T` directly.
    pub fn publish<T: Message>(&self, message: &T) {
        if self.is_shut_down() {
            self.report(BusError::ShutdownInProgress, "<publish>", "<dispatcher>", &[]);
            return;
        }

        let type_id = TypeId::of::<T>();
        self.hierarchy.register(type_id, T::supertypes().to_vec());

        let subs = self.resolve_single(type_id);
        let published = [std::any::type_name::<T>()];

        let erased: &dyn Message = message;
        let mut invoked = 0usize;
        for sub in &subs {
            let dispatch = if sub.descriptor.is_vararg {
                Dispatch::Array(std::slice::from_ref(&erased))
            } else {
                Dispatch::One(erased)
            };
            invoked += sub.publish(dispatch, self.error_handler.as_ref(), &published);
        }

        if invoked == 0 {
            self.dispatch_dead_message(smallvec![MessageTypeId::of::<T>()]);
        }
    }

    /// Two-argument publish: consults the composite-key tuple index for
    /// `(T1, T2)` handlers, plus, when the policy includes it, the var-arg
    /// tiers (homogeneous exact, or common-supertype fan-out).
    pub fn publish_pair<T1: Message, T2: Message>(&self, m1: &T1, m2: &T2) {
        if self.is_shut_down() {
            self.report(BusError::ShutdownInProgress, "<publish>", "<dispatcher>", &[]);
            return;
        }

        let (t1, t2) = (TypeId::of::<T1>(), TypeId::of::<T2>());
        self.hierarchy.register(t1, T1::supertypes().to_vec());
        self.hierarchy.register(t2, T2::supertypes().to_vec());

        let subs = self.resolve_multi(&[t1, t2]);
        let published = [std::any::type_name::<T1>(), std::any::type_name::<T2>()];

        let e1: &dyn Message = m1;
        let e2: &dyn Message = m2;
        let bundle = [e1, e2];
        let mut invoked = 0usize;
        for sub in &subs {
            let dispatch = if sub.descriptor.is_vararg {
                Dispatch::Array(&bundle)
            } else {
                Dispatch::Two(e1, e2)
            };
            invoked += sub.publish(dispatch, self.error_handler.as_ref(), &published);
        }

        if invoked == 0 {
            self.dispatch_dead_message(smallvec![
                MessageTypeId::of::<T1>(),
                MessageTypeId::of::<T2>()
            ]);
        }
    }

    /// Three-argument publish.
    pub fn publish_triple<T1: Message, T2: Message, T3: Message>(
        &self,
        m1: &T1,
        m2: &T2,
        m3: &T3,
    ) {
        if self.is_shut_down() {
            self.report(BusError::ShutdownInProgress, "<publish>", "<dispatcher>", &[]);
            return;
        }

        let (t1, t2, t3) = (TypeId::of::<T1>(), TypeId::of::<T2>(), TypeId::of::<T3>());
        self.hierarchy.register(t1, T1::supertypes().to_vec());
        self.hierarchy.register(t2, T2::supertypes().to_vec());
        self.hierarchy.register(t3, T3::supertypes().to_vec());

        let subs = self.resolve_multi(&[t1, t2, t3]);
        let published = [
            std::any::type_name::<T1>(),
            std::any::type_name::<T2>(),
            std::any::type_name::<T3>(),
        ];

        let e1: &dyn Message = m1;
        let e2: &dyn Message = m2;
        let e3: &dyn Message = m3;
        let bundle = [e1, e2, e3];
        let mut invoked = 0usize;
        for sub in &subs {
            let dispatch = if sub.descriptor.is_vararg {
                Dispatch::Array(&bundle)
            } else {
                Dispatch::Three(e1, e2, e3)
            };
            invoked += sub.publish(dispatch, self.error_handler.as_ref(), &published);
        }

        if invoked == 0 {
            self.dispatch_dead_message(smallvec![
                MessageTypeId::of::<T1>(),
                MessageTypeId::of::<T2>(),
                MessageTypeId::of::<T3>()
            ]);
        }
    }

    /// N-ary homogeneous var-arg publish: bundles `messages` (all of the
    /// same declared type `T`) into one `Dispatch::Array` call to every
    /// matching `T[]` handler, exact and super tier alike. There is no
    /// fixed-arity tuple counterpart for `N > 3`, so this entry point only
    /// ever drives the var-arg resolver.
    pub fn publish_many<T: Message>(&self, messages: &[&T]) {
        if self.is_shut_down() {
            self.report(BusError::ShutdownInProgress, "<publish>", "<dispatcher>", &[]);
            return;
        }
        if messages.is_empty() {
            return;
        }

        let type_id = TypeId::of::<T>();
        self.hierarchy.register(type_id, T::supertypes().to_vec());

        let mut subs = self.vararg_resolver.var_arg_subs(type_id, &self.index).to_vec();
        if self.config.publish_mode.includes_var_args() {
            subs.extend(
                self.vararg_resolver
                    .var_arg_super_subs(type_id, &self.index, &self.hierarchy)
                    .iter()
                    .cloned(),
            );
        }

        let published = [std::any::type_name::<T>()];
        let erased: Vec<&dyn Message> = messages.iter().map(|m| *m as &dyn Message).collect();
        let mut invoked = 0usize;
        for sub in &subs {
            invoked += sub.publish(
                Dispatch::Array(&erased),
                self.error_handler.as_ref(),
                &published,
            );
        }

        if invoked == 0 {
            self.dispatch_dead_message(messages.iter().map(|_| MessageTypeId::of::<T>()).collect());
        }
    }

    /// `publish_dyn`: the lower-level, type-erased entry point fed by the
    /// (out-of-scope) async dispatcher, which may legitimately hold an
    /// absent queue slot.
    pub fn publish_dyn(&self, message: Option<&dyn Message>) -> Result<(), BusError> {
        let Some(message) = message else {
            let error = BusError::NullMessage;
            self.report_error(&error, "<publish_dyn>", "<dispatcher>", &[]);
            return Err(error);
        };
        if self.is_shut_down() {
            let error = BusError::ShutdownInProgress;
            self.report_error(&error, "<publish_dyn>", "<dispatcher>", &[]);
            return Err(error);
        }

        // `message`'s concrete type is not known statically here, so this
        // entry point cannot eagerly register supertypes the way the typed
        // `publish`/`publish_pair`/`publish_triple` entry points do; it can
        // only dispatch against whatever has already been registered.
        let type_id = (*message).type_id();
        let subs = self.resolve_single(type_id);

        let mut invoked = 0usize;
        for sub in &subs {
            let dispatch = if sub.descriptor.is_vararg {
                Dispatch::Array(std::slice::from_ref(&message))
            } else {
                Dispatch::One(message)
            };
            invoked += sub.publish(dispatch, self.error_handler.as_ref(), &["<erased>"]);
        }

        if invoked == 0 {
            self.dispatch_dead_message(smallvec![MessageTypeId {
                type_id,
                type_name: "<erased>",
            }]);
        }
        Ok(())
    }

    fn resolve_single(&self, type_id: TypeId) -> Vec<Arc<Subscription>> {
        let mut result = self.index.exact_single(type_id);
        if self.config.publish_mode.includes_super_types() {
            result.extend(
                self.super_resolver
                    .super_subs(type_id, &self.index, &self.hierarchy)
                    .iter()
                    .cloned(),
            );
        }
        if self.config.publish_mode.includes_var_args() {
            result.extend(self.vararg_resolver.var_arg_subs(type_id, &self.index).iter().cloned());
            result.extend(
                self.vararg_resolver
                    .var_arg_super_subs(type_id, &self.index, &self.hierarchy)
                    .iter()
                    .cloned(),
            );
        }
        result
    }

    fn resolve_multi(&self, types: &[TypeId]) -> Vec<Arc<Subscription>> {
        let key = self.class_tree.get(types);
        let mut result = self.index.exact_multi(key);

        if self.config.publish_mode.includes_super_types() {
            result.extend(
                self.super_resolver
                    .super_subs_multi(types, &self.index, &self.hierarchy, &self.class_tree)
                    .iter()
                    .cloned(),
            );
        }

        if self.config.publish_mode.includes_var_args() {
            let homogeneous = types.windows(2).all(|w| w[0] == w[1]);
            if homogeneous {
                result.extend(
                    self.vararg_resolver
                        .var_arg_subs(types[0], &self.index)
                        .iter()
                        .cloned(),
                );
            }
            result.extend(
                self.vararg_resolver
                    .var_arg_super_subs_multi(types, &self.index, &self.hierarchy)
                    .iter()
                    .cloned(),
            );
        }

        result
    }

    /// Dispatches a `DeadMessage` (exact-match only) wrapping `unmatched`,
    /// if any Subscription is registered for it.
    fn dispatch_dead_message(&self, unmatched: SmallVec<[MessageTypeId; 3]>) {
        let dead = DeadMessage::new(unmatched);
        let subs = self.index.exact_single(TypeId::of::<DeadMessage>());
        if subs.is_empty() {
            return;
        }
        let erased: &dyn Message = &dead;
        for sub in &subs {
            sub.publish(
                Dispatch::One(erased),
                self.error_handler.as_ref(),
                &["DeadMessage"],
            );
        }
    }

    fn report(
        &self,
        error: BusError,
        handler_id: &str,
        listener_type: &'static str,
        published: &[&'static str],
    ) {
        self.report_error(&error, handler_id, listener_type, published);
    }

    fn report_error(
        &self,
        error: &BusError,
        handler_id: &str,
        listener_type: &'static str,
        published: &[&'static str],
    ) {
        self.error_handler.handle(
            error,
            &ErrorContext {
                handler_id: handler_id.to_owned(),
                listener_type,
                published_type_names: published.to_vec(),
            },
        );
    }
}
