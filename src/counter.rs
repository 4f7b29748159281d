//! Concurrent per-key totals.
//!
//! [`GroupCounter`] is shared by every worker thread. Each key owns a single
//! `AtomicI64` cell: adding to an existing key is one atomic add under a
//! shard read lock, and only the first add for a key takes the shard write
//! lock to insert the cell.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Running totals grouped by key.
#[derive(Debug)]
pub struct GroupCounter<K: Eq + Hash = String> {
    cells: DashMap<K, AtomicI64>,
}

impl<K: Eq + Hash + Clone> GroupCounter<K> {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: DashMap::with_capacity(capacity),
        }
    }

    /// Add `amount` to `key`, returning the key's total after the add.
    pub fn add<Q>(&self, key: &Q, amount: i64) -> i64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        // Fast path: the cell exists, no allocation for the key.
        if let Some(cell) = self.cells.get(key) {
            return cell.fetch_add(amount, Ordering::Relaxed) + amount;
        }

        // Insert race: whoever loses adds into the winner's cell.
        match self.cells.entry(key.to_owned()) {
            Entry::Occupied(entry) => entry.get().fetch_add(amount, Ordering::Relaxed) + amount,
            Entry::Vacant(entry) => {
                entry.insert(AtomicI64::new(amount));
                amount
            }
        }
    }

    /// Current total for `key`; 0 if it was never added to.
    pub fn get<Q>(&self, key: &Q) -> i64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cells
            .get(key)
            .map(|cell| cell.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cells.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy of every (key, total) pair, in no particular order.
    pub fn snapshot(&self) -> Vec<(K, i64)> {
        self.cells
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Sum over all keys.
    pub fn total(&self) -> i64 {
        self.cells
            .iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    pub fn to_map(&self) -> HashMap<K, i64> {
        self.snapshot().into_iter().collect()
    }
}

impl<K: Eq + Hash + Clone + Ord> GroupCounter<K> {
    /// Entries by descending total; equal totals sort by key.
    pub fn sorted_by_total(&self) -> Vec<(K, i64)> {
        let mut entries = self.snapshot();
        entries.sort_by(|(ka, va), (kb, vb)| vb.cmp(va).then_with(|| ka.cmp(kb)));
        entries
    }

    /// The `n` keys with the largest totals.
    pub fn top(&self, n: usize) -> Vec<(K, i64)> {
        let mut entries = self.sorted_by_total();
        entries.truncate(n);
        entries
    }
}

impl<K: Eq + Hash + Clone> Default for GroupCounter<K> {
    fn default() -> Self {
        Self::new()
    }
}
