//! Eviction Module
//!
//! Victim selection used when a store (or file cache) has to make room.

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::cache::Timestamp;

// == Candidate ==
/// Read-only view of a live entry offered to an eviction strategy.
#[derive(Debug)]
pub struct Candidate<'a, K> {
    pub key: &'a K,
    pub last_access: Timestamp,
    pub access_count: u64,
    /// Insertion order within the store, lower is older
    pub seq: u64,
    pub weight: usize,
}

// == On Full ==
/// What a full store does when its strategy declines to name a victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFull {
    /// Insert anyway, exceeding capacity until entries expire or are removed
    Overflow,
    /// Refuse the insert with `CacheError::CapacityExceeded`
    Fail,
}

// == Eviction Strategy ==
/// Picks which live entry to drop when a new key must be admitted.
pub trait EvictionStrategy<K>: Debug + Send + Sync {
    /// Returns the key to evict, or None to decline.
    fn select_victim(&self, candidates: &[Candidate<'_, K>]) -> Option<K>;

    /// Policy applied when `select_victim` declines.
    fn on_decline(&self) -> OnFull {
        OnFull::Overflow
    }
}

// == Built-in Strategies ==
/// The strategies shipped with the crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Eviction {
    /// Never evict; inserts into a full store fail
    Reject,
    /// Evict the entry accessed longest ago
    #[default]
    OldestByAccess,
    /// Evict the entry read the fewest times
    LowestAccessCount,
}

impl<K: Clone> EvictionStrategy<K> for Eviction {
    fn select_victim(&self, candidates: &[Candidate<'_, K>]) -> Option<K> {
        let victim = match self {
            Eviction::Reject => None,
            Eviction::OldestByAccess => candidates.iter().min_by(|a, b| by_recency(a, b)),
            Eviction::LowestAccessCount => candidates.iter().min_by(|a, b| by_frequency(a, b)),
        };
        victim.map(|c| c.key.clone())
    }

    fn on_decline(&self) -> OnFull {
        match self {
            Eviction::Reject => OnFull::Fail,
            _ => OnFull::Overflow,
        }
    }
}

fn by_recency<K>(a: &Candidate<'_, K>, b: &Candidate<'_, K>) -> Ordering {
    a.last_access
        .cmp(&b.last_access)
        .then(a.access_count.cmp(&b.access_count))
        .then(a.seq.cmp(&b.seq))
}

fn by_frequency<K>(a: &Candidate<'_, K>, b: &Candidate<'_, K>) -> Ordering {
    a.access_count
        .cmp(&b.access_count)
        .then(a.last_access.cmp(&b.last_access))
        .then(a.seq.cmp(&b.seq))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn candidate<'a>(
        key: &'a &'static str,
        last_access: u64,
        access_count: u64,
        seq: u64,
    ) -> Candidate<'a, &'static str> {
        Candidate {
            key,
            last_access,
            access_count,
            seq,
            weight: 0,
        }
    }

    #[test]
    fn test_reject_never_selects() {
        let a = "a";
        let candidates = vec![candidate(&a, 0, 0, 0)];

        assert_eq!(Eviction::Reject.select_victim(&candidates), None);
        assert_eq!(
            EvictionStrategy::<&str>::on_decline(&Eviction::Reject),
            OnFull::Fail
        );
    }

    #[test]
    fn test_oldest_by_access_picks_min_last_access() {
        let (a, b, c) = ("a", "b", "c");
        let candidates = vec![
            candidate(&a, 300, 0, 0),
            candidate(&b, 100, 9, 1),
            candidate(&c, 200, 0, 2),
        ];

        assert_eq!(Eviction::OldestByAccess.select_victim(&candidates), Some("b"));
    }

    #[test]
    fn test_oldest_by_access_tie_breaks() {
        let (a, b, c) = ("a", "b", "c");

        // Same last access: fewer reads loses
        let candidates = vec![candidate(&a, 100, 3, 0), candidate(&b, 100, 1, 1)];
        assert_eq!(Eviction::OldestByAccess.select_victim(&candidates), Some("b"));

        // Same last access and reads: inserted first loses
        let candidates = vec![candidate(&c, 100, 1, 7), candidate(&a, 100, 1, 2)];
        assert_eq!(Eviction::OldestByAccess.select_victim(&candidates), Some("a"));
    }

    #[test]
    fn test_lowest_access_count_picks_min_count() {
        let (a, b, c) = ("a", "b", "c");
        let candidates = vec![
            candidate(&a, 100, 5, 0),
            candidate(&b, 900, 1, 1),
            candidate(&c, 50, 2, 2),
        ];

        assert_eq!(Eviction::LowestAccessCount.select_victim(&candidates), Some("b"));
    }

    #[test]
    fn test_lowest_access_count_tie_breaks() {
        let (a, b, c) = ("a", "b", "c");
        let candidates = vec![
            candidate(&a, 200, 1, 0),
            candidate(&b, 100, 1, 2),
            candidate(&c, 100, 1, 1),
        ];

        assert_eq!(Eviction::LowestAccessCount.select_victim(&candidates), Some("c"));
    }

    #[test]
    fn test_empty_candidates() {
        let candidates: Vec<Candidate<'_, &str>> = Vec::new();

        assert_eq!(Eviction::OldestByAccess.select_victim(&candidates), None);
        assert_eq!(Eviction::LowestAccessCount.select_victim(&candidates), None);
    }

    #[test]
    fn test_default_is_oldest_by_access() {
        assert_eq!(Eviction::default(), Eviction::OldestByAccess);
    }
}
