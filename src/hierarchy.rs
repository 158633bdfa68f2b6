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

//! `TypeHierarchyCache`: supertype closures and array-of-`T` identities.
//!
//! Two memo tables, both append-only once an entry is installed:
//!
//! - `direct_supertypes`: what each type declared via
//!   [`Message::supertypes`](crate::Message::supertypes), registered the
//!   first time a descriptor mentioning that type is built.
//! - `array_of`: the `TypeId` of `Vec<T>` for each `T` that was ever
//!   registered as a var-arg handler's component type. There is no generic
//!   way to synthesize `TypeId::of::<Vec<T>>()` from a bare runtime
//!   `TypeId`, so this table is populated eagerly at the one point a
//!   concrete `T` is known statically (descriptor construction) rather
//!   than computed lazily like `supertypes`.
//!
//! Writes only happen while the manager holds its writer lock (during
//! subscribe's cache-warming step); `supertypes` reads during publish are
//! lock-free in the sense that they only ever take this cache's own read
//! lock, never the manager's.

use std::any::TypeId;
use std::sync::RwLock;

use ahash::AHashMap;

#[derive(Default)]
pub struct TypeHierarchyCache {
    direct_supertypes: RwLock<AHashMap<TypeId, Vec<TypeId>>>,
    array_of: RwLock<AHashMap<TypeId, TypeId>>,
    supertypes_cache: RwLock<AHashMap<TypeId, std::sync::Arc<Vec<TypeId>>>>,
}

impl TypeHierarchyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `type_id`'s direct supertypes, if not already known.
    ///
    /// First registration wins; direct supertype sets never change for a
    /// given `TypeId` afterwards (mirrors ClassTree nodes: created on
    /// first observation, never evicted except on `clear`).
    pub fn register(&self, type_id: TypeId, direct_supertypes: Vec<TypeId>) {
        let mut map = self
            .direct_supertypes
            .write()
            .expect("TypeHierarchyCache lock poisoned");
        map.entry(type_id).or_insert(direct_supertypes);
    }

    /// Registers that `component` was declared as a var-arg handler's
    /// element type, with `array_type` as the identity of "array of
    /// `component`" (in practice `TypeId::of::<Vec<Component>>()`).
    pub fn register_array_of(&self, component: TypeId, array_type: TypeId) {
        let mut map = self
            .array_of
            .write()
            .expect("TypeHierarchyCache lock poisoned");
        map.entry(component).or_insert(array_type);
    }

    /// The `TypeId` of "array of `component`", if some var-arg handler was
    /// ever registered with `component` as its element type.
    #[must_use]
    pub fn array_of(&self, component: TypeId) -> Option<TypeId> {
        self.array_of
            .read()
            .expect("TypeHierarchyCache lock poisoned")
            .get(&component)
            .copied()
    }

    /// Ordered, transitive, deduplicated closure of `type_id`'s
    /// supertypes, excluding `type_id` itself.
    ///
    /// Traversal order is declaration-order breadth-first over direct
    /// supertypes, which is deterministic for a given registration history
    /// and guards against revisiting a type reachable through more than
    /// one path, as happens with diamond-shaped, interface-like
    /// hierarchies.
    #[must_use]
    pub fn supertypes(&self, type_id: TypeId) -> std::sync::Arc<Vec<TypeId>> {
        if let Some(hit) = self
            .supertypes_cache
            .read()
            .expect("TypeHierarchyCache lock poisoned")
            .get(&type_id)
        {
            return hit.clone();
        }

        let computed = std::sync::Arc::new(self.compute_supertypes(type_id));

        // Redundant concurrent computation is tolerated: the result is
        // deterministic, so whichever writer lands last simply overwrites
        // an equal value.
        let mut cache = self
            .supertypes_cache
            .write()
            .expect("TypeHierarchyCache lock poisoned");
        cache.insert(type_id, computed.clone());
        computed
    }

    fn compute_supertypes(&self, type_id: TypeId) -> Vec<TypeId> {
        let direct = self
            .direct_supertypes
            .read()
            .expect("TypeHierarchyCache lock poisoned");

        let mut visited = ahash::AHashSet::default();
        visited.insert(type_id);
        let mut order = Vec::new();
        let mut queue: std::collections::VecDeque<TypeId> =
            direct.get(&type_id).cloned().unwrap_or_default().into();

        while let Some(next) = queue.pop_front() {
            if !visited.insert(next) {
                continue;
            }
            order.push(next);
            if let Some(parents) = direct.get(&next) {
                queue.extend(parents.iter().copied());
            }
        }

        order
    }

    /// Drops every memoised entry. Called on manager shutdown.
    pub fn clear(&self) {
        self.direct_supertypes
            .write()
            .expect("TypeHierarchyCache lock poisoned")
            .clear();
        self.array_of
            .write()
            .expect("TypeHierarchyCache lock poisoned")
            .clear();
        self.invalidate();
    }

    /// Clears only the derived `supertypes` memo, called at the start of
    /// every subscribe/unsubscribe.
    pub fn invalidate(&self) {
        self.supertypes_cache
            .write()
            .expect("TypeHierarchyCache lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;
    struct D;

    fn tid<T: 'static>() -> TypeId {
        TypeId::of::<T>()
    }

    #[test]
    fn linear_chain_closure() {
        let cache = TypeHierarchyCache::new();
        cache.register(tid::<A>(), vec![]);
        cache.register(tid::<B>(), vec![tid::<A>()]);
        cache.register(tid::<C>(), vec![tid::<B>()]);

        let closure = cache.supertypes(tid::<C>());
        assert_eq!(*closure, vec![tid::<B>(), tid::<A>()]);
    }

    #[test]
    fn diamond_is_deduplicated() {
        // D has parents B and C, both of which have parent A.
        let cache = TypeHierarchyCache::new();
        cache.register(tid::<A>(), vec![]);
        cache.register(tid::<B>(), vec![tid::<A>()]);
        cache.register(tid::<C>(), vec![tid::<A>()]);
        cache.register(tid::<D>(), vec![tid::<B>(), tid::<C>()]);

        let closure = cache.supertypes(tid::<D>());
        let mut seen = ahash::AHashSet::default();
        assert!(closure.iter().all(|t| seen.insert(*t)), "no duplicates");
        assert!(closure.contains(&tid::<A>()));
        assert!(closure.contains(&tid::<B>()));
        assert!(closure.contains(&tid::<C>()));
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn unknown_type_has_empty_closure() {
        let cache = TypeHierarchyCache::new();
        assert!(cache.supertypes(tid::<A>()).is_empty());
    }

    #[test]
    fn invalidate_then_recompute_is_identical() {
        let cache = TypeHierarchyCache::new();
        cache.register(tid::<A>(), vec![]);
        cache.register(tid::<B>(), vec![tid::<A>()]);
        let before = cache.supertypes(tid::<B>());
        cache.invalidate();
        let after = cache.supertypes(tid::<B>());
        assert_eq!(*before, *after);
    }

    #[test]
    fn array_of_is_none_until_registered() {
        let cache = TypeHierarchyCache::new();
        assert_eq!(cache.array_of(tid::<A>()), None);
        cache.register_array_of(tid::<A>(), tid::<B>());
        assert_eq!(cache.array_of(tid::<A>()), Some(tid::<B>()));
    }
}
