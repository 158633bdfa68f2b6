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

//! The async dispatcher collaborator: an MPMC thread pool that accepts a
//! bundle of messages and eventually performs the matching synchronous
//! publish on one of its worker threads.
//!
//! This crate owns neither the pool nor its queue; [`SubscriptionManager`]
//! is a passive library that only ever publishes on the calling thread (see
//! `src/manager.rs`). `AsyncDispatcher` exists so a host application can
//! plug an async publish mode in front of the manager without this crate
//! having an opinion on thread-pool sizing, queue backpressure, or
//! scheduling fairness, all of which are explicitly out of scope here.
//!
//! [`SubscriptionManager`]: crate::SubscriptionManager

use crate::manager::SubscriptionManager;
use crate::message::Message;

/// A bundle of up to three messages, or a var-arg slice, submitted together
/// to a dispatcher for later synchronous publish.
pub enum DispatchJob<'a, T: Message> {
    One(&'a T),
    Many(&'a [&'a T]),
}

/// Accepts a dispatch job and arranges for `bus.publish*` to run on a pool
/// worker thread. Implementations own the queue and the pool; `submit`
/// itself must not block the caller waiting for the publish to complete.
///
/// `numberOfThreads` on [`BusConfig`](crate::BusConfig) governs the pool an
/// implementation builds, not anything this trait prescribes; this crate
/// only documents the contract a pool must satisfy to host async publish in
/// front of a [`SubscriptionManager`].
pub trait AsyncDispatcher<T: Message>: Send + Sync {
    fn submit(&self, bus: &SubscriptionManager, job: DispatchJob<'_, T>);
}
