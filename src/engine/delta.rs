//! Delta filter: bounded dedup cache for listings across polling cycles.
//!
//! A listing is "new" if it has never been seen, or was seen at a
//! different price. Entries are content hashes of (item_id, price), so
//! a price change produces a fresh entry and the listing is re-analyzed.

use rust_decimal::Decimal;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::types::ListingSnapshot;

/// Default capacity of the filter.
pub const DEFAULT_MAX_SIZE: usize = 100_000;

/// Fraction of entries dropped when the filter is full (1/5 = 20%).
const EVICTION_DIVISOR: usize = 5;

/// Bounded set of listing content hashes.
///
/// Eviction is arbitrary (hash-set iteration order), not LRU. Forgetting
/// an entry only costs one redundant re-analysis.
#[derive(Debug)]
pub struct DeltaFilter {
    seen: HashSet<u64>,
    max_size: usize,
}

impl Default for DeltaFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl DeltaFilter {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            seen: HashSet::with_capacity(max_size.min(DEFAULT_MAX_SIZE)),
            max_size,
        }
    }

    /// Record the listing and report whether it was new.
    pub fn is_new(&mut self, listing: &ListingSnapshot) -> bool {
        if self.contains(listing) {
            return false;
        }
        self.insert(listing);
        true
    }

    /// Whether this exact (item, price) has been recorded. Does not record.
    pub fn contains(&self, listing: &ListingSnapshot) -> bool {
        self.seen
            .contains(&Self::content_hash(&listing.item_id, listing.price))
    }

    /// Record the listing, evicting first if the filter is full.
    pub fn insert(&mut self, listing: &ListingSnapshot) {
        let key = Self::content_hash(&listing.item_id, listing.price);
        if self.seen.contains(&key) {
            return;
        }
        if self.seen.len() >= self.max_size {
            self.evict();
        }
        self.seen.insert(key);
    }

    /// Drop the entry for this exact (item, price), so the listing is
    /// analyzed again next time it is seen.
    pub fn forget(&mut self, listing: &ListingSnapshot) {
        self.seen.remove(&Self::content_hash(&listing.item_id, listing.price));
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn evict(&mut self) {
        let count = (self.seen.len() / EVICTION_DIVISOR).max(1);
        let victims: Vec<u64> = self.seen.iter().take(count).copied().collect();
        for key in &victims {
            self.seen.remove(key);
        }
        debug!(evicted = count, remaining = self.seen.len(), "Delta filter evicted entries");
    }

    /// Hash of item id and price rounded to cents, so `10.5` and `10.50`
    /// collide but `10.50` and `10.51` do not.
    fn content_hash(item_id: &str, price: Decimal) -> u64 {
        let normalized = price.round_dp(2).normalize();
        let mut hasher = DefaultHasher::new();
        item_id.hash(&mut hasher);
        normalized.to_string().hash(&mut hasher);
        hasher.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
