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

//! `VarArgResolver`: finds handlers declared over an array type that
//! should receive a bundled fan-out call.

use std::any::TypeId;
use std::sync::{Arc, RwLock};

use ahash::{AHashMap, AHashSet};

use crate::hierarchy::TypeHierarchyCache;
use crate::index::SubscriberIndex;
use crate::resolver::candidates;
use crate::subscription::Subscription;

type SubList = Arc<Vec<Arc<Subscription>>>;

#[derive(Default)]
pub struct VarArgResolver {
    exact_cache: RwLock<AHashMap<TypeId, SubList>>,
    super_cache: RwLock<AHashMap<TypeId, SubList>>,
    super_multi_cache: RwLock<AHashMap<Vec<TypeId>, SubList>>,
}

impl VarArgResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `varArgSubs(T)`: Subscriptions declared exactly as `arrayOf(T)`.
    /// No `acceptsSubtypes` filter: this is the exact tier.
    #[must_use]
    pub fn var_arg_subs(&self, type_id: TypeId, index: &SubscriberIndex) -> SubList {
        if let Some(hit) = self
            .exact_cache
            .read()
            .expect("VarArgResolver lock poisoned")
            .get(&type_id)
        {
            return hit.clone();
        }
        let computed = Arc::new(index.vararg_over(type_id));
        self.exact_cache
            .write()
            .expect("VarArgResolver lock poisoned")
            .insert(type_id, computed.clone());
        computed
    }

    /// `varArgSuperSubs(T)`: Subscriptions declared as `arrayOf(U)` for some
    /// `U ∈ supertypes(T)` with `acceptsSubtypes = true`.
    #[must_use]
    pub fn var_arg_super_subs(
        &self,
        type_id: TypeId,
        index: &SubscriberIndex,
        hierarchy: &TypeHierarchyCache,
    ) -> SubList {
        if let Some(hit) = self
            .super_cache
            .read()
            .expect("VarArgResolver lock poisoned")
            .get(&type_id)
        {
            return hit.clone();
        }

        let mut seen = AHashSet::default();
        let mut result = Vec::new();
        for supertype in hierarchy.supertypes(type_id).iter() {
            for sub in index.vararg_over(*supertype) {
                if sub.descriptor.accepts_subtypes && seen.insert(Arc::as_ptr(&sub) as usize) {
                    result.push(sub);
                }
            }
        }

        let computed = Arc::new(result);
        self.super_cache
            .write()
            .expect("VarArgResolver lock poisoned")
            .insert(type_id, computed.clone());
        computed
    }

    /// The 2/3-arg var-arg-super path: for multi-arg publishes, the
    /// super-variant consults `arrayOf(U)` subscriptions over the set of
    /// types common to every published position's own-or-ancestor set.
    /// `types` need not be identical; when they are, the intersection
    /// always contains that common type itself, which both a homogeneous
    /// triple and a heterogeneous pair resolve correctly through this one
    /// method.
    #[must_use]
    pub fn var_arg_super_subs_multi(
        &self,
        types: &[TypeId],
        index: &SubscriberIndex,
        hierarchy: &TypeHierarchyCache,
    ) -> SubList {
        let cache_key = types.to_vec();
        if let Some(hit) = self
            .super_multi_cache
            .read()
            .expect("VarArgResolver lock poisoned")
            .get(&cache_key)
        {
            return hit.clone();
        }

        let common = common_supertypes(types, hierarchy);
        let mut seen = AHashSet::default();
        let mut result = Vec::new();
        for u in common {
            for sub in index.vararg_over(u) {
                if sub.descriptor.accepts_subtypes && seen.insert(Arc::as_ptr(&sub) as usize) {
                    result.push(sub);
                }
            }
        }

        let computed = Arc::new(result);
        self.super_multi_cache
            .write()
            .expect("VarArgResolver lock poisoned")
            .insert(cache_key, computed.clone());
        computed
    }

    /// Clears every memo table. Called at the start of every
    /// subscribe/unsubscribe, mirroring `SuperTypeResolver::invalidate`.
    pub fn invalidate(&self) {
        self.exact_cache
            .write()
            .expect("VarArgResolver lock poisoned")
            .clear();
        self.super_cache
            .write()
            .expect("VarArgResolver lock poisoned")
            .clear();
        self.super_multi_cache
            .write()
            .expect("VarArgResolver lock poisoned")
            .clear();
    }
}

/// The set of types reachable as "self or ancestor" from every position in
/// `types`, i.e. `⋂ᵢ ({typesᵢ} ∪ supertypes(typesᵢ))`, excluding the
/// degenerate case where every position is the very same type `T`: that
/// case is already served by `var_arg_subs(T)` (the exact tier), so
/// including `T` here too would invoke the same `T[]` handler twice for a
/// homogeneous publish. A heterogeneous tuple can never trip this
/// exclusion, since it requires every element of `types` to equal the
/// candidate.
fn common_supertypes(types: &[TypeId], hierarchy: &TypeHierarchyCache) -> Vec<TypeId> {
    let Some((first, rest)) = types.split_first() else {
        return Vec::new();
    };
    let mut common: AHashSet<TypeId> = candidates(*first, hierarchy).into_iter().collect();
    for &type_id in rest {
        let this_set: AHashSet<TypeId> = candidates(type_id, hierarchy).into_iter().collect();
        common.retain(|candidate| this_set.contains(candidate));
    }
    // Preserve the deterministic order of the first position's candidate
    // list rather than the arbitrary hash-set iteration order.
    candidates(*first, hierarchy)
        .into_iter()
        .filter(|c| common.contains(c) && !types.iter().all(|t| t == c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_tree::ClassTree;
    use crate::descriptor::HandlerDescriptor;
    use crate::index::SubscriberIndex;
    use crate::listener::Describe;
    use crate::message::Message;

    struct A;
    struct B;
    impl Message for A {}
    impl Message for B {
        fn supertypes() -> &'static [TypeId] {
            static SUPERS: std::sync::OnceLock<Vec<TypeId>> = std::sync::OnceLock::new();
            SUPERS.get_or_init(|| vec![TypeId::of::<A>()])
        }
    }

    struct VarListener;
    impl Describe for VarListener {
        fn describe() -> Vec<HandlerDescriptor> {
            vec![HandlerDescriptor::vararg::<VarListener, A, _>("on_many", |_, _| Ok(())).build()]
        }
    }

    fn setup() -> (SubscriberIndex, TypeHierarchyCache, ClassTree) {
        let index = SubscriberIndex::new();
        let hierarchy = TypeHierarchyCache::new();
        let tree = ClassTree::new();
        index.first_subscribe::<VarListener>(&tree, &hierarchy);
        hierarchy.register(TypeId::of::<B>(), B::supertypes().to_vec());
        (index, hierarchy, tree)
    }

    #[test]
    fn exact_vararg_lookup_finds_handler_over_component_type() {
        let (index, _hierarchy, _tree) = setup();
        let resolver = VarArgResolver::new();
        let found = resolver.var_arg_subs(TypeId::of::<A>(), &index);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn super_vararg_lookup_finds_handler_over_ancestor_component_type() {
        let (index, hierarchy, _tree) = setup();
        let resolver = VarArgResolver::new();
        let found = resolver.var_arg_super_subs(TypeId::of::<B>(), &index, &hierarchy);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn common_supertype_path_handles_heterogeneous_pair() {
        let (index, hierarchy, _tree) = setup();
        let resolver = VarArgResolver::new();
        let found = resolver.var_arg_super_subs_multi(
            &[TypeId::of::<A>(), TypeId::of::<B>()],
            &index,
            &hierarchy,
        );
        assert_eq!(
            found.len(),
            1,
            "A is the common supertype of (A, B), so the A[] handler fires"
        );
    }

    #[test]
    fn homogeneous_tuple_excludes_self_from_super_multi_tier() {
        let (index, hierarchy, _tree) = setup();
        let resolver = VarArgResolver::new();
        let found = resolver.var_arg_super_subs_multi(
            &[TypeId::of::<A>(), TypeId::of::<A>(), TypeId::of::<A>()],
            &index,
            &hierarchy,
        );
        assert!(
            found.is_empty(),
            "a homogeneous tuple's own type is served by var_arg_subs, not the super-multi tier"
        );
    }

    #[test]
    fn no_common_supertype_yields_no_fan_out() {
        struct Unrelated;
        impl Message for Unrelated {}

        let (index, hierarchy, _tree) = setup();
        hierarchy.register(TypeId::of::<Unrelated>(), vec![]);
        let resolver = VarArgResolver::new();
        let found = resolver.var_arg_super_subs_multi(
            &[TypeId::of::<Unrelated>(), TypeId::of::<B>()],
            &index,
            &hierarchy,
        );
        assert!(found.is_empty());
    }
}
