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

//! In-process publish/subscribe message bus with type-hierarchy dispatch.
//!
//! # Architecture
//!
//! The bus is organised as a front door, [`SubscriptionManager`], wrapping
//! three collaborating layers:
//!
//! - An index (`SubscriberIndex`) of every live [`Subscription`], keyed by
//!   listener class, single message type, and composite multi-type key.
//! - Two derived caches (`SuperTypeResolver`, `VarArgResolver`) that expand
//!   an exact query into the supertype and array-fan-out tiers, memoised
//!   per query type and invalidated on every write.
//! - A [`MatchPolicy`] that composes those tiers into the three publish
//!   behaviours a caller can select (`Exact`, `ExactWithSuperTypes`,
//!   `ExactWithSuperTypesAndVarArgs`).
//!
//! # Why two routing tiers (exact vs. supertype)?
//!
//! Exact-type lookup is a single hash-map probe and is the hot path: most
//! publishes target a type with zero or one directly-declared handlers.
//! Supertype expansion requires walking a type's transitive supertype
//! closure (cached, but still a second lookup) and filtering by the
//! `accepts_subtypes` flag, so it is kept as a separate, opt-in tier rather
//! than folded into the exact lookup. Var-arg fan-out is rarer still
//! (requires N scalar publishes of a common type) and is therefore the
//! outermost, most conditional tier.
//!
//! # Concurrency model
//!
//! Subscribe and unsubscribe are serialised through a single writer lock
//! held by [`SubscriptionManager`]; publish-path lookups take the
//! corresponding shared read lock. The derived caches are independent,
//! internally-locked structures so that concurrent readers filling the
//! same cache entry redundantly (rather than blocking each other) is
//! tolerated by design, the computation being pure. See `src/hierarchy.rs`
//! and `src/resolver/` for the cache implementations.
//!
//! Rust has no runtime class reflection, so the message class hierarchy is
//! modelled explicitly: a [`Message`] type opts into the hierarchy by
//! declaring its own direct supertypes; nothing is inferred from the type
//! system itself.

mod class_tree;
mod config;
mod descriptor;
mod dispatch;
mod error;
mod hierarchy;
mod index;
mod invoke;
mod listener;
mod manager;
mod matcher;
mod message;
mod resolver;
mod subscription;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use class_tree::{ClassTree, CompositeKey};
pub use config::BusConfig;
pub use descriptor::{HandlerDescriptor, HandlerDescriptorBuilder};
pub use dispatch::AsyncDispatcher;
pub use error::{BusError, ConsoleErrorHandler, ErrorContext, ErrorHandler};
pub use hierarchy::TypeHierarchyCache;
pub use invoke::Dispatch;
pub use listener::{Describe, Listener};
pub use manager::SubscriptionManager;
pub use matcher::MatchPolicy;
pub use message::{DeadMessage, Message, downcast_ref};
pub use subscription::Subscription;
