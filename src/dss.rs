//! Concurrent disjoint-set (union-find) structure.
//!
//! Parents and set sizes live in paged atomic arrays. `find` compresses paths by
//! halving with compare-and-swap and never blocks. `union` locks the stripes of the
//! two current roots, re-checks that both are still roots and links the smaller set
//! under the larger one (equal sizes: the lower id becomes the root).

use std::sync::{Mutex, MutexGuard};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::paged::HugeAtomicU64Array;

const LOCK_STRIPES: usize = 1 << 10;

#[derive(Debug)]
pub struct DisjointSetStruct {
    parent: HugeAtomicU64Array,
    size: HugeAtomicU64Array,
    locks: Box<[Mutex<()>]>,
}

impl DisjointSetStruct {
    /// Creates `node_count` singleton sets.
    pub fn new(node_count: u64) -> Self {
        Self {
            parent: HugeAtomicU64Array::from_fn(node_count, |node| node),
            size: HugeAtomicU64Array::from_fn(node_count, |_| 1),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn len(&self) -> u64 {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set containing `node`.
    ///
    /// Halves the path on the way up; safe to call while other threads union.
    pub fn find(&self, node: u64) -> u64 {
        let mut current = node;
        loop {
            let parent = self.parent.get(current);
            if parent == current {
                return current;
            }
            let grand_parent = self.parent.get(parent);
            if grand_parent != parent {
                // Losing the race is fine: another thread shortened the path already.
                let _ = self.parent.compare_exchange(current, parent, grand_parent);
            }
            current = grand_parent;
        }
    }

    /// Set id of `node`: the representative of its set.
    pub fn set_id_of(&self, node: u64) -> u64 {
        self.find(node)
    }

    fn lock_stripe(&self, stripe: usize) -> MutexGuard<'_, ()> {
        self.locks[stripe]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Merges the sets of `a` and `b`.
    ///
    /// # Returns
    /// * `true` - Two different sets were merged
    /// * `false` - Both nodes were already in the same set
    pub fn union(&self, a: u64, b: u64) -> bool {
        loop {
            let root_a = self.find(a);
            let root_b = self.find(b);
            if root_a == root_b {
                return false;
            }

            let stripe_a = root_a as usize % LOCK_STRIPES;
            let stripe_b = root_b as usize % LOCK_STRIPES;
            let (first, second) = (stripe_a.min(stripe_b), stripe_a.max(stripe_b));
            let _first = self.lock_stripe(first);
            let _second = (first != second).then(|| self.lock_stripe(second));

            if self.parent.get(root_a) != root_a || self.parent.get(root_b) != root_b {
                continue;
            }
            let size_a = self.size.get(root_a);
            let size_b = self.size.get(root_b);
            let (root, child) = match size_a.cmp(&size_b) {
                std::cmp::Ordering::Greater => (root_a, root_b),
                std::cmp::Ordering::Less => (root_b, root_a),
                std::cmp::Ordering::Equal => (root_a.min(root_b), root_a.max(root_b)),
            };
            self.size.set(root, size_a + size_b);
            self.parent.set(child, root);
            return true;
        }
    }

    /// Whether `a` and `b` are in the same set.
    pub fn same_set(&self, a: u64, b: u64) -> bool {
        loop {
            let root_a = self.find(a);
            let root_b = self.find(b);
            if root_a == root_b {
                return true;
            }
            if self.parent.get(root_a) == root_a {
                return false;
            }
        }
    }

    /// Number of nodes in the set of `node`.
    pub fn set_size(&self, node: u64) -> u64 {
        self.size.get(self.find(node))
    }

    /// Representative of every node, computed in parallel.
    pub fn to_communities(&self) -> Vec<u64> {
        (0..self.len()).into_par_iter().map(|node| self.set_id_of(node)).collect()
    }

    /// Number of distinct sets.
    pub fn set_count(&self) -> u64 {
        (0..self.len())
            .into_par_iter()
            .filter(|&node| self.parent.get(node) == node)
            .count() as u64
    }

    /// Dense set ids `0..set_count`, numbered by first appearance in ascending node order.
    pub fn consecutive_ids(&self) -> Vec<u64> {
        consecutive(&self.to_communities())
    }
}

/// Renumbers arbitrary ids densely by first appearance.
pub fn consecutive(ids: &[u64]) -> Vec<u64> {
    let mut mapping = FxHashMap::<u64, u64>::default();
    ids.iter()
        .map(|id| {
            let next = mapping.len() as u64;
            *mapping.entry(*id).or_insert(next)
        })
        .collect()
}
