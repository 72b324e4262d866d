use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

/// Bounded set of keys that expire after a fixed time.
///
/// When full, expired keys are dropped first, then the oldest insertion.
#[derive(Debug)]
pub(crate) struct TtlSet<K> {
    entries: HashMap<K, Instant>,
    ttl: Duration,
    capacity: usize,
}

impl<K: Hash + Eq + Clone> TtlSet<K> {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity,
        }
    }

    /// Returns `true` if the key is present and not expired.
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|inserted| inserted.elapsed() < self.ttl)
    }

    /// Insert a key, returning `false` if it was already present and live.
    pub(crate) fn insert(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }
        if self.capacity == 0 {
            return true;
        }
        if self.entries.len() >= self.capacity {
            let ttl = self.ttl;
            self.entries.retain(|_, inserted| inserted.elapsed() < ttl);
        }
        if self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, inserted)| **inserted)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, Instant::now());
        true
    }

    #[cfg(test)]
    fn remove(&mut self, key: &K) {
        self.entries.remove(key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_new_keys_once() {
        let mut set = TtlSet::new(4, Duration::from_secs(60));
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
        assert!(set.contains(&"a"));
        set.remove(&"a");
        assert!(set.insert("a"));
    }

    #[test]
    fn expired_keys_are_new_again() {
        let mut set = TtlSet::new(4, Duration::ZERO);
        assert!(set.insert("a"));
        assert!(!set.contains(&"a"));
        assert!(set.insert("a"));
    }

    #[test]
    fn stays_within_capacity() {
        let mut set = TtlSet::new(2, Duration::from_secs(60));
        set.insert(1);
        set.insert(2);
        set.insert(3);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&3));
    }
}
