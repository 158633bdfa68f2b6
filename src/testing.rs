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

//! Stub listeners shared by this crate's own tests and by downstream
//! integration tests (gated behind `test-util` so consumers can reuse them
//! without pulling `dev-dependencies`).
//!
//! Unlike a single-threaded reflection stub, every listener here must be
//! `Send + Sync`: `SubscriptionManager::subscribe` takes an `Arc<L>` and
//! publish may run the handler from any thread. State is therefore kept in
//! `Arc<Mutex<_>>`/`AtomicUsize`, not `Rc<RefCell<_>>`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::descriptor::HandlerDescriptor;
use crate::error::BusError;
use crate::listener::Describe;
use crate::message::Message;

/// A listener whose single handler over `T` just counts invocations.
///
/// `subscribe`-side call sites provide the handler id so one process can
/// host several `CallCountingListener<T>` subscriptions and tell them
/// apart in assertions and error reports.
#[derive(Debug, Default)]
pub struct CallCountingListener {
    calls: AtomicUsize,
}

impl CallCountingListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Describe for CallCountingListener {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, CountedMessage, _>("on_counted", |l, _m| {
                l.record();
                Ok(())
            })
            .build(),
        ]
    }
}

/// The message type `CallCountingListener` subscribes to. A dedicated unit
/// struct rather than a generic `T` keeps `Describe::describe` (which has
/// no type parameters to draw on) buildable without extra bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct CountedMessage;
impl Message for CountedMessage {}

/// A listener that records every message of type `T` it is handed, in
/// arrival order, for assertions that need the payloads rather than a
/// bare count.
#[derive(Debug, Default)]
pub struct MessageSavingListener<T> {
    messages: Mutex<Vec<T>>,
}

impl<T: Clone + Send + Sync + 'static> MessageSavingListener<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn saved(&self) -> Vec<T> {
        self.messages
            .lock()
            .expect("MessageSavingListener lock poisoned")
            .clone()
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .expect("MessageSavingListener lock poisoned")
            .clear();
    }

    fn save(&self, message: &T) {
        self.messages
            .lock()
            .expect("MessageSavingListener lock poisoned")
            .push(message.clone());
    }
}

impl<T: Message + Clone> Describe for MessageSavingListener<T> {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, T, _>("on_message", |l, m| {
                let concrete = crate::message::downcast_ref::<T>(m).ok_or_else(|| {
                    BusError::ReflectionFailure {
                        listener_type: std::any::type_name::<Self>(),
                        message: "dispatched message failed to downcast to the declared type"
                            .to_owned(),
                    }
                })?;
                l.save(concrete);
                Ok(())
            })
            .build(),
        ]
    }
}

/// A listener whose handler always fails, for exercising the
/// `HandlerInvocationFailure` error path without a real bug in a real
/// handler.
#[derive(Debug, Default)]
pub struct FailingListener;

impl Describe for FailingListener {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, CountedMessage, _>("on_counted", |_l, _m| {
                Err(BusError::HandlerInvocationFailure {
                    handler_id: "on_counted".to_owned(),
                    listener_type: std::any::type_name::<FailingListener>(),
                    message: "stub failure".to_owned(),
                })
            })
            .build(),
        ]
    }
}

/// A listener whose sole handler declares `enabled = false`, i.e. one that
/// must never be indexed or invoked.
#[derive(Debug, Default)]
pub struct DisabledListener {
    calls: AtomicUsize,
}

impl DisabledListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Describe for DisabledListener {
    fn describe() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor::single::<Self, CountedMessage, _>("on_counted", |l, _m| {
                l.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .enabled(false)
            .build(),
        ]
    }
}
