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

//! The [`Message`] marker trait and the [`DeadMessage`] fallback type.

use std::any::{Any, TypeId};

use smallvec::{SmallVec, smallvec};

/// A type that can flow through the bus.
///
/// Rust has no runtime class hierarchy, so a message opts into one by
/// naming its own direct supertypes. [`TypeHierarchyCache`](crate::TypeHierarchyCache)
/// computes the transitive closure from these direct declarations the same
/// way the original reflective design walks a superclass chain and
/// interface set.
///
/// The default implementation declares no supertypes, which is correct for
/// any leaf message type.
pub trait Message: Any + Send + Sync {
    /// Direct supertypes of this type, in declaration order.
    ///
    /// Only consulted when a handler subscribes with `accepts_subtypes`;
    /// exact-match dispatch never calls this.
    fn supertypes() -> &'static [TypeId]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Describes the runtime identity of a [`Message`] type without requiring
/// ownership of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageTypeId {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl MessageTypeId {
    #[must_use]
    pub fn of<T: Message>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Emitted when a published message matches no handler in the configured
/// [`MatchPolicy`](crate::MatchPolicy)'s tiers.
///
/// `DeadMessage` is itself a regular message type handlers may subscribe to
/// (exact match only). It carries descriptive metadata about the unmatched
/// publish rather than the original payload: messages flow through
/// `publish` as borrowed `&T` so N handlers can read one copy without
/// cloning, which means there is no owned value left to requeue once the
/// publish call that produced the borrow returns.
#[derive(Debug, Clone)]
pub struct DeadMessage {
    /// Identities of the message(s) that were published and matched nothing.
    pub unmatched: SmallVec<[MessageTypeId; 3]>,
}

impl DeadMessage {
    #[must_use]
    pub fn new(unmatched: impl Into<SmallVec<[MessageTypeId; 3]>>) -> Self {
        Self {
            unmatched: unmatched.into(),
        }
    }

    #[must_use]
    pub fn single(id: MessageTypeId) -> Self {
        Self::new(smallvec![id])
    }
}

impl Message for DeadMessage {}

/// Recovers a concrete `&T` from a type-erased `&dyn Message`.
///
/// Handler closures receive `&dyn Message` uniformly (see
/// [`HandlerDescriptor`](crate::HandlerDescriptor)'s module docs for why),
/// so this is how a handler gets back the concrete type it actually
/// expects once it knows, from its own subscription, which type that is.
#[must_use]
pub fn downcast_ref<T: Message>(message: &dyn Message) -> Option<&T> {
    let any: &dyn Any = message;
    any.downcast_ref::<T>()
}
