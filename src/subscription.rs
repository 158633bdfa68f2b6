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

//! `Subscription`: one handler descriptor bound to its live listener set.
//!
//! A `Subscription` is created exactly once per `(declaring type, handler
//! id)` pair and never removed from the index, even once its listener set
//! empties out. That stability is what lets `SubscriberIndex` hand out raw
//! `Arc<Subscription>` clones to readers without any coordination against
//! deletion.

use std::sync::{Arc, Mutex, RwLock};

use crate::descriptor::HandlerDescriptor;
use crate::error::{BusError, ErrorContext, ErrorHandler};
use crate::invoke::Dispatch;
use crate::listener::Listener;

pub struct Subscription {
    pub descriptor: Arc<HandlerDescriptor>,
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
    /// Guards invocation when `descriptor.synchronized` is set. One lock per
    /// subscription rather than per listener instance: serialising at
    /// subscription granularity is the conservative superset of per-listener
    /// mutual exclusion (documented in DESIGN.md).
    invocation_lock: Mutex<()>,
}

impl Subscription {
    #[must_use]
    pub fn new(descriptor: Arc<HandlerDescriptor>) -> Self {
        Self {
            descriptor,
            listeners: RwLock::new(Vec::new()),
            invocation_lock: Mutex::new(()),
        }
    }

    /// Appends `listener`. Always called under the manager's exclusive
    /// writer lock.
    pub fn add(&self, listener: Arc<dyn Listener>) {
        self.listeners
            .write()
            .expect("Subscription lock poisoned")
            .push(listener);
    }

    /// Removes the first entry pointer-equal to `listener`. No effect if
    /// absent.
    pub fn remove(&self, listener: &Arc<dyn Listener>) {
        let mut listeners = self.listeners.write().expect("Subscription lock poisoned");
        if let Some(index) = listeners
            .iter()
            .position(|existing| Arc::ptr_eq(existing, listener))
        {
            listeners.remove(index);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().expect("Subscription lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }

    /// Invokes every current listener, in subscription order, with
    /// `dispatch`, and returns how many listeners were actually invoked.
    /// A snapshot of the listener set is taken under the read lock and then
    /// iterated lock-free, so a concurrent `add`/`remove` elsewhere never
    /// blocks this call and never observes a torn read.
    ///
    /// A listener invocation failure is reported to `error_handler` and
    /// does not stop the remaining listeners from being invoked, and still
    /// counts toward the returned total: the handler did run, it just
    /// failed. The returned count is what callers use to decide whether any
    /// handler ran at all, since an indexed `Subscription` with an empty
    /// listener set (reachable after a subscribe followed by an
    /// unsubscribe) invokes nobody even though it still exists.
    pub fn publish(
        &self,
        dispatch: Dispatch<'_>,
        error_handler: &dyn ErrorHandler,
        published_type_names: &[&'static str],
    ) -> usize {
        let snapshot: Vec<Arc<dyn Listener>> = self
            .listeners
            .read()
            .expect("Subscription lock poisoned")
            .clone();

        let _guard = self
            .descriptor
            .synchronized
            .then(|| self.invocation_lock.lock().expect("Subscription lock poisoned"));

        for listener in &snapshot {
            let outcome = (self.descriptor.invoke)(listener.as_ref(), dispatch);
            if let Err(error) = outcome {
                error_handler.handle(
                    &error,
                    &ErrorContext {
                        handler_id: self.descriptor.handler_id.clone(),
                        listener_type: self.descriptor.declaring_type,
                        published_type_names: published_type_names.to_vec(),
                    },
                );
            }
        }

        snapshot.len()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("descriptor", &self.descriptor)
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ConsoleErrorHandler;
    use crate::message::Message;

    struct CountingListener {
        calls: AtomicUsize,
    }

    struct MsgA;
    impl Message for MsgA {}

    fn descriptor() -> Arc<HandlerDescriptor> {
        Arc::new(
            HandlerDescriptor::single::<CountingListener, MsgA, _>("on_a", |l, _| {
                l.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build(),
        )
    }

    #[test]
    fn add_then_publish_invokes_listener_once() {
        let sub = Subscription::new(descriptor());
        let listener: Arc<dyn Listener> = Arc::new(CountingListener {
            calls: AtomicUsize::new(0),
        });
        sub.add(listener.clone());

        let msg = MsgA;
        let handler = ConsoleErrorHandler::new();
        sub.publish(Dispatch::One(&msg), &handler, &["MsgA"]);

        let concrete = listener.as_any().downcast_ref::<CountingListener>().unwrap();
        assert_eq!(concrete.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_then_publish_invokes_nobody() {
        let sub = Subscription::new(descriptor());
        let listener: Arc<dyn Listener> = Arc::new(CountingListener {
            calls: AtomicUsize::new(0),
        });
        sub.add(listener.clone());
        sub.remove(&listener);
        assert!(sub.is_empty());

        let msg = MsgA;
        let handler = ConsoleErrorHandler::new();
        sub.publish(Dispatch::One(&msg), &handler, &["MsgA"]);

        let concrete = listener.as_any().downcast_ref::<CountingListener>().unwrap();
        assert_eq!(concrete.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_subscription_is_invoked_twice() {
        // Duplicate subscriptions are kept, not deduplicated.
        let sub = Subscription::new(descriptor());
        let listener: Arc<dyn Listener> = Arc::new(CountingListener {
            calls: AtomicUsize::new(0),
        });
        sub.add(listener.clone());
        sub.add(listener.clone());
        assert_eq!(sub.listener_count(), 2);

        let msg = MsgA;
        let handler = ConsoleErrorHandler::new();
        sub.publish(Dispatch::One(&msg), &handler, &["MsgA"]);

        let concrete = listener.as_any().downcast_ref::<CountingListener>().unwrap();
        assert_eq!(concrete.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_of_absent_listener_is_a_no_op() {
        let sub = Subscription::new(descriptor());
        let listener: Arc<dyn Listener> = Arc::new(CountingListener {
            calls: AtomicUsize::new(0),
        });
        sub.remove(&listener);
        assert!(sub.is_empty());
    }
}
