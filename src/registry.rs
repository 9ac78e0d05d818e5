// 🪪 Identity Registry - Stable integer ids for tickets and counters
//
// Two independent namespaces:
// - tickets:  show name, trimmed, case-SENSITIVE ("Wax Museum" != "wax museum")
// - counters: counter name, trimmed + lower-cased, case-INSENSITIVE
//
// Ids are handed out from a per-namespace cursor in first-seen order, so the
// same input stream always produces the same ids. Lookups never fail: a miss
// allocates. Only exact equality after normalization reconciles two names.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// NAME MAP
// ============================================================================

/// Insertion-ordered name → id map with its own allocation cursor
#[derive(Debug, Clone)]
pub struct NameMap {
    ids: IndexMap<String, i64>,
    next_id: i64,

    /// Keys loaded from the target store rather than allocated here
    seeded: HashSet<String>,
}

impl NameMap {
    pub fn new(first_id: i64) -> Self {
        NameMap {
            ids: IndexMap::new(),
            next_id: first_id,
            seeded: HashSet::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.ids.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ids.contains_key(key)
    }

    /// Returns the id for `key` and whether it was just allocated
    pub fn resolve_or_insert(&mut self, key: &str) -> (i64, bool) {
        if let Some(id) = self.ids.get(key) {
            return (*id, false);
        }

        let id = self.next_id;
        self.ids.insert(key.to_string(), id);
        self.next_id += 1;
        (id, true)
    }

    /// Record a pre-assigned id without touching the cursor
    fn insert_existing(&mut self, key: String, id: i64) {
        self.seeded.insert(key.clone());
        self.ids.insert(key, id);
    }

    pub fn is_seeded(&self, key: &str) -> bool {
        self.seeded.contains(key)
    }

    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    fn set_next_id(&mut self, next_id: i64) {
        self.next_id = next_id;
    }

    pub fn max_id(&self) -> Option<i64> {
        self.ids.values().copied().max()
    }

    /// (name, id) pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.ids.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// IDENTITY REGISTRY
// ============================================================================

pub fn ticket_key(show_name: &str) -> String {
    show_name.trim().to_string()
}

pub fn counter_key(counter_name: &str) -> String {
    counter_name.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    tickets: NameMap,
    counters: NameMap,

    /// Counters below this id already exist in the target store
    reserved_threshold: i64,
}

impl IdentityRegistry {
    /// Empty registry. Ticket ids start at 1, counter ids at `reserved_threshold`.
    pub fn new(reserved_threshold: i64) -> Self {
        IdentityRegistry {
            tickets: NameMap::new(1),
            counters: NameMap::new(reserved_threshold),
            reserved_threshold,
        }
    }

    /// Load counters that already exist in the target store.
    ///
    /// The counter cursor moves to one past the highest seeded id, but never
    /// below the reserved threshold, so a new counter is never mistaken for a
    /// pre-existing one at emission time.
    pub fn seed<I, S>(&mut self, existing: I)
    where
        I: IntoIterator<Item = (i64, S)>,
        S: AsRef<str>,
    {
        for (id, name) in existing {
            let key = counter_key(name.as_ref());
            if key.is_empty() {
                continue;
            }
            debug!(counter = %key, id, "seeded existing counter");
            self.counters.insert_existing(key, id);
        }

        let floor = self.reserved_threshold;
        let next = self
            .counters
            .max_id()
            .map(|max| (max + 1).max(floor))
            .unwrap_or(floor);
        self.counters.set_next_id(next);
    }

    pub fn resolve_or_create_ticket(&mut self, show_name: &str) -> i64 {
        let key = ticket_key(show_name);
        let (id, created) = self.tickets.resolve_or_insert(&key);
        if created {
            debug!(ticket = %key, id, "discovered ticket");
        }
        id
    }

    pub fn resolve_or_create_counter(&mut self, counter_name: &str) -> i64 {
        let key = counter_key(counter_name);
        let (id, created) = self.counters.resolve_or_insert(&key);
        if created {
            debug!(counter = %key, id, "discovered counter");
        }
        id
    }

    /// Make sure the fallback counter exists, allocating it if needed
    pub fn ensure_default_counter(&mut self, default_name: &str) -> i64 {
        self.resolve_or_create_counter(default_name)
    }

    pub fn has_counter(&self, counter_name: &str) -> bool {
        self.counters.contains(&counter_key(counter_name))
    }

    pub fn ticket_id(&self, show_name: &str) -> Option<i64> {
        self.tickets.get(&ticket_key(show_name))
    }

    pub fn counter_id(&self, counter_name: &str) -> Option<i64> {
        self.counters.get(&counter_key(counter_name))
    }

    pub fn tickets(&self) -> &NameMap {
        &self.tickets
    }

    pub fn counters(&self) -> &NameMap {
        &self.counters
    }

    pub fn reserved_threshold(&self) -> i64 {
        self.reserved_threshold
    }

    /// Counters allocated by this run: never seeded, id at or above the reserved threshold
    pub fn new_counters(&self) -> impl Iterator<Item = (&str, i64)> {
        let threshold = self.reserved_threshold;
        let counters = &self.counters;
        counters
            .iter()
            .filter(move |(name, id)| *id >= threshold && !counters.is_seeded(name))
    }
}

// ============================================================================
// TESTS
// ============================================================================
