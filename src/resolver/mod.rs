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

//! The two derived-cache resolvers layered over [`SubscriberIndex`](crate::index::SubscriberIndex)
//! by the matching policies in `src/matcher.rs`.

mod super_type;
mod vararg;

pub use super_type::SuperTypeResolver;
pub use vararg::VarArgResolver;

/// Builds the deterministic "self plus transitive supertypes" candidate
/// list both resolvers walk: `[type_id] ++ supertypes(type_id)`. Shared
/// here because both resolvers need it and must agree on ordering.
pub(crate) fn candidates(
    type_id: std::any::TypeId,
    hierarchy: &crate::hierarchy::TypeHierarchyCache,
) -> Vec<std::any::TypeId> {
    let mut out = Vec::with_capacity(1 + hierarchy.supertypes(type_id).len());
    out.push(type_id);
    out.extend(hierarchy.supertypes(type_id).iter().copied());
    out
}
