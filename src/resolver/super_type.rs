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

//! `SuperTypeResolver`: flattens a query type's supertype closure into the
//! Subscriptions that opted into subtype dispatch.

use std::any::TypeId;
use std::sync::{Arc, RwLock};

use ahash::{AHashMap, AHashSet};

use crate::hierarchy::TypeHierarchyCache;
use crate::index::SubscriberIndex;
use crate::resolver::candidates;
use crate::subscription::Subscription;

type SubList = Arc<Vec<Arc<Subscription>>>;

#[derive(Default)]
pub struct SuperTypeResolver {
    single_cache: RwLock<AHashMap<TypeId, SubList>>,
    multi_cache: RwLock<AHashMap<Vec<TypeId>, SubList>>,
}

impl SuperTypeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `superSubs(T)`: every Subscription registered under some
    /// `U ∈ supertypes(T)` with `acceptsSubtypes = true`, deduplicated,
    /// order-stable.
    #[must_use]
    pub fn super_subs(
        &self,
        type_id: TypeId,
        index: &SubscriberIndex,
        hierarchy: &TypeHierarchyCache,
    ) -> SubList {
        if let Some(hit) = self
            .single_cache
            .read()
            .expect("SuperTypeResolver lock poisoned")
            .get(&type_id)
        {
            return hit.clone();
        }

        let mut seen = AHashSet::default();
        let mut result = Vec::new();
        for supertype in hierarchy.supertypes(type_id).iter() {
            for sub in index.exact_single(*supertype) {
                if sub.descriptor.accepts_subtypes && seen.insert(Arc::as_ptr(&sub) as usize) {
                    result.push(sub);
                }
            }
        }

        let computed = Arc::new(result);
        self.single_cache
            .write()
            .expect("SuperTypeResolver lock poisoned")
            .insert(type_id, computed.clone());
        computed
    }

    /// `superSubs(T1,…,Tn)` for arity >= 2: walks the cross-product of
    /// `{Ti} ∪ supertypes(Ti)` for each position, excluding the exact tuple
    /// itself, keeping only subscriptions whose handler accepts subtypes.
    #[must_use]
    pub fn super_subs_multi(
        &self,
        types: &[TypeId],
        index: &SubscriberIndex,
        hierarchy: &TypeHierarchyCache,
        class_tree: &crate::class_tree::ClassTree,
    ) -> SubList {
        let cache_key = types.to_vec();
        if let Some(hit) = self
            .multi_cache
            .read()
            .expect("SuperTypeResolver lock poisoned")
            .get(&cache_key)
        {
            return hit.clone();
        }

        let per_position: Vec<Vec<TypeId>> = types
            .iter()
            .map(|&t| candidates(t, hierarchy))
            .collect();

        let mut seen = AHashSet::default();
        let mut result = Vec::new();
        let mut combo = vec![TypeId::of::<()>(); types.len()];
        cross_product(&per_position, 0, &mut combo, &mut |combo| {
            if combo == types {
                return;
            }
            let key = class_tree.get(combo);
            for sub in index.exact_multi(key) {
                if sub.descriptor.accepts_subtypes && seen.insert(Arc::as_ptr(&sub) as usize) {
                    result.push(sub);
                }
            }
        });

        let computed = Arc::new(result);
        self.multi_cache
            .write()
            .expect("SuperTypeResolver lock poisoned")
            .insert(cache_key, computed.clone());
        computed
    }

    /// Clears both memo tables. Called at the start of every
    /// subscribe/unsubscribe.
    pub fn invalidate(&self) {
        self.single_cache
            .write()
            .expect("SuperTypeResolver lock poisoned")
            .clear();
        self.multi_cache
            .write()
            .expect("SuperTypeResolver lock poisoned")
            .clear();
    }
}

/// Visits every element of the cross-product of `positions`, depth-first,
/// writing each candidate combination into `combo` before calling `visit`.
fn cross_product(
    positions: &[Vec<TypeId>],
    depth: usize,
    combo: &mut Vec<TypeId>,
    visit: &mut impl FnMut(&[TypeId]),
) {
    if depth == positions.len() {
        visit(combo);
        return;
    }
    for &candidate in &positions[depth] {
        combo[depth] = candidate;
        cross_product(positions, depth + 1, combo, visit);
    }
}
