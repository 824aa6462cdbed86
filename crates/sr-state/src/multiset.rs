use std::collections::HashMap;
use sr_types::Key;

/// A counted multiset of keys. Zero-count entries are removed eagerly so
/// `len()`/`contains_key` agree with "is this key present at all".
#[derive(Debug, Clone, Default)]
pub struct Multiset {
    counts: HashMap<Key, i64>,
}

impl Multiset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Key) -> i64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn add(&mut self, key: Key, n: i64) {
        if n == 0 {
            return;
        }
        let entry = self.counts.entry(key.clone()).or_insert(0);
        *entry += n;
        if *entry <= 0 {
            self.counts.remove(&key);
        }
    }

    /// Remove up to `n` occurrences of `key`, returning how many were
    /// actually removed (bounded by the current count).
    pub fn drain(&mut self, key: &Key, n: i64) -> i64 {
        let available = self.get(key);
        let taken = available.min(n).max(0);
        if taken == 0 {
            return 0;
        }
        let remaining = available - taken;
        if remaining == 0 {
            self.counts.remove(key);
        } else {
            self.counts.insert(key.clone(), remaining);
        }
        taken
    }

    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &i64)> {
        self.counts.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.counts.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<Key> for Multiset {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        let mut m = Multiset::new();
        for k in iter {
            m.add(k, 1);
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(ts: i64) -> Key {
        Key {
            timestamp_ns: ts,
            event_type: "t".into(),
            ticker: "T".into(),
            price: 1,
            quantity: 1,
            exchange: "X".into(),
            conditions: "".into(),
        }
    }

    #[test]
    fn add_and_drain_roundtrip() {
        let mut m = Multiset::new();
        m.add(k(1), 3);
        assert_eq!(m.get(&k(1)), 3);
        assert_eq!(m.drain(&k(1), 2), 2);
        assert_eq!(m.get(&k(1)), 1);
        assert_eq!(m.drain(&k(1), 5), 1);
        assert_eq!(m.get(&k(1)), 0);
        assert!(m.is_empty());
    }

    #[test]
    fn from_iter_counts_duplicates() {
        let m: Multiset = vec![k(1), k(1), k(2)].into_iter().collect();
        assert_eq!(m.get(&k(1)), 2);
        assert_eq!(m.get(&k(2)), 1);
        assert_eq!(m.total(), 3);
    }
}
