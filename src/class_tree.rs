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

//! `ClassTree`: interns ordered type-id tuples into a stable composite key.
//!
//! Equal tuples (by `TypeId`, order-sensitive) always resolve to the same
//! [`CompositeKey`], which is what `SubscriberIndex`'s multi-arg map is
//! keyed by. The tree never shrinks except on `clear` (manager shutdown).
//!
//! No locking is specified at node granularity in the source design;
//! `ClassTree` instead does its own fine-grained locking so it is safe to
//! call from both the writer path (subscribe registering a new tuple) and
//! the reader path (publish looking up an existing tuple) without routing
//! through the manager's outer lock.

use std::any::TypeId;
use std::sync::RwLock;

use ahash::AHashMap;

/// Stable identity for an interned, ordered tuple of message `TypeId`s.
///
/// Tuples of length 1 never need interning (the `TypeId` itself is the
/// key); `CompositeKey` exists for arity >= 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeKey(usize);

#[derive(Default)]
struct Node {
    children: AHashMap<TypeId, usize>,
    key: Option<CompositeKey>,
}

/// Trie keyed by `TypeId` at each level, interning tuples of arity >= 2.
#[derive(Default)]
pub struct ClassTree {
    nodes: RwLock<Vec<Node>>,
}

impl ClassTree {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(vec![Node::default()]),
        }
    }

    /// Returns the stable [`CompositeKey`] for `types`, creating trie nodes
    /// as needed.
    ///
    /// # Panics
    ///
    /// Panics if `types` is empty: `get()` with zero arguments is not
    /// legal.
    pub fn get(&self, types: &[TypeId]) -> CompositeKey {
        assert!(
            !types.is_empty(),
            "ClassTree::get() requires at least one type"
        );

        // Fast path: every node on the path already exists.
        if let Some(key) = self.try_get(types) {
            return key;
        }

        // Slow path: create missing nodes under the write lock. Another
        // writer may have raced us to the same tuple; walking from the
        // root again is idempotent so we simply continue from wherever
        // the fast path left off.
        let mut nodes = self.nodes.write().expect("ClassTree lock poisoned");
        let mut current = 0usize;
        for type_id in types {
            current = match nodes[current].children.get(type_id) {
                Some(&next) => next,
                None => {
                    nodes.push(Node::default());
                    let next = nodes.len() - 1;
                    nodes[current].children.insert(*type_id, next);
                    next
                }
            };
        }
        if nodes[current].key.is_none() {
            let key = CompositeKey(current);
            nodes[current].key = Some(key);
        }
        nodes[current].key.expect("key just installed")
    }

    fn try_get(&self, types: &[TypeId]) -> Option<CompositeKey> {
        let nodes = self.nodes.read().expect("ClassTree lock poisoned");
        let mut current = 0usize;
        for type_id in types {
            current = *nodes[current].children.get(type_id)?;
        }
        nodes[current].key
    }

    /// Drops every interned tuple. Called on manager shutdown.
    pub fn clear(&self) {
        let mut nodes = self.nodes.write().expect("ClassTree lock poisoned");
        nodes.clear();
        nodes.push(Node::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tuples_intern_to_the_same_key() {
        let tree = ClassTree::new();
        let a = TypeId::of::<u8>();
        let b = TypeId::of::<u16>();
        let k1 = tree.get(&[a, b]);
        let k2 = tree.get(&[a, b]);
        assert_eq!(k1, k2);
    }

    #[test]
    fn order_sensitive() {
        let tree = ClassTree::new();
        let a = TypeId::of::<u8>();
        let b = TypeId::of::<u16>();
        let k1 = tree.get(&[a, b]);
        let k2 = tree.get(&[b, a]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn distinct_tuples_get_distinct_keys() {
        let tree = ClassTree::new();
        let a = TypeId::of::<u8>();
        let b = TypeId::of::<u16>();
        let c = TypeId::of::<u32>();
        let k1 = tree.get(&[a, b]);
        let k2 = tree.get(&[a, c]);
        assert_ne!(k1, k2);
    }

    #[test]
    #[should_panic(expected = "at least one type")]
    fn zero_arity_is_illegal() {
        let tree = ClassTree::new();
        tree.get(&[]);
    }

    #[test]
    fn clear_drops_all_interned_tuples_but_tree_remains_usable() {
        let tree = ClassTree::new();
        let a = TypeId::of::<u8>();
        let b = TypeId::of::<u16>();
        let before = tree.get(&[a, b]);
        tree.clear();
        let after = tree.get(&[a, b]);
        // Not required to differ, but the tree must not panic or deadlock.
        let _ = before;
        let _ = after;
    }
}
