use std::{
    fmt, time::{Duration, Instant}
};

use serde::Serialize;

/// The kind of interaction that last touched a cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEventKind {
    Hit,
    Miss,
    Inserted,
    /// A graph was offered for a key that was already resident.
    DuplicateInsert,
    Evicted,
    Released,
}

impl fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => f.write_str("hit"),
            Self::Miss => f.write_str("miss"),
            Self::Inserted => f.write_str("inserted"),
            Self::DuplicateInsert => f.write_str("duplicate-insert"),
            Self::Evicted => f.write_str("evicted"),
            Self::Released => f.write_str("released"),
        }
    }
}

/// Summary of the most recent cache interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub key_hash: u64,
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:#018x}", self.kind, self.key_hash)
    }
}

/// Per-entry bookkeeping kept next to each cached graph.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EntryMetadata {
    pub(crate) created_at: Instant,
    pub(crate) last_used_at: Instant,
    pub(crate) reuse_count: u64,
}

impl EntryMetadata {
    #[inline]
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            created_at: now,
            last_used_at: now,
            reuse_count: 0,
        }
    }

    #[inline]
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_used_at = now;
        self.reuse_count = self.reuse_count.saturating_add(1);
    }
}

/// Counters updated under the owning cache's lock.
#[derive(Clone, Debug, Default)]
pub(crate) struct CacheCounters {
    lookups: u64,
    hits: u64,
    misses: u64,
    insertions: u64,
    evictions: u64,
    destroy_failures: u64,
    last_key_hash: Option<u64>,
    last_key_hits: u64,
    last_event: Option<CacheEvent>,
}

impl CacheCounters {
    /// Record a lookup. Hits for the same key accumulate in `last_key_hits`
    /// until a lookup for a different key resets it.
    pub(crate) fn record_lookup(&mut self, key_hash: u64, hit: bool) {
        self.lookups = self.lookups.saturating_add(1);
        if hit {
            self.hits = self.hits.saturating_add(1);
        } else {
            self.misses = self.misses.saturating_add(1);
        }
        if self.last_key_hash != Some(key_hash) {
            self.last_key_hash = Some(key_hash);
            self.last_key_hits = 0;
        }
        if hit {
            self.last_key_hits = self.last_key_hits.saturating_add(1);
        }
        let kind = if hit { CacheEventKind::Hit } else { CacheEventKind::Miss };
        self.last_event = Some(CacheEvent { kind, key_hash });
    }

    pub(crate) fn record_insert(&mut self, key_hash: u64, duplicate: bool) {
        let kind = if duplicate {
            CacheEventKind::DuplicateInsert
        } else {
            self.insertions = self.insertions.saturating_add(1);
            CacheEventKind::Inserted
        };
        self.last_event = Some(CacheEvent { kind, key_hash });
    }

    pub(crate) fn record_eviction(&mut self, key_hash: u64, destroyed: bool) {
        self.evictions = self.evictions.saturating_add(1);
        self.record_destroy(destroyed);
        self.last_event = Some(CacheEvent {
            kind: CacheEventKind::Evicted,
            key_hash,
        });
    }

    pub(crate) fn record_release(&mut self, key_hash: u64, destroyed: bool) {
        self.record_destroy(destroyed);
        self.last_event = Some(CacheEvent {
            kind: CacheEventKind::Released,
            key_hash,
        });
    }

    pub(crate) fn record_destroy(&mut self, destroyed: bool) {
        if !destroyed {
            self.destroy_failures = self.destroy_failures.saturating_add(1);
        }
    }

    pub(crate) fn lookups(&self) -> u64 {
        self.lookups
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses
    }

    pub(crate) fn evictions(&self) -> u64 {
        self.evictions
    }
}

/// Snapshot of one per-context cache. Diagnostic only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    pub capacity: usize,
    pub resident: usize,
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub destroy_failures: u64,
    /// Hash of the key passed to the most recent lookup.
    pub last_key_hash: Option<u64>,
    /// Hits accumulated by `last_key_hash` since it became the most recent key.
    pub last_key_hits: u64,
    pub last_event: Option<CacheEvent>,
    pub oldest_entry_age: Option<Duration>,
    pub longest_idle: Option<Duration>,
    pub max_entry_reuse_count: Option<u64>,
}

impl CacheStatistics {
    pub(crate) fn from_parts<'a>(capacity: usize, counters: &CacheCounters, entries: impl Iterator<Item = &'a EntryMetadata>) -> Self {
        let now = Instant::now();
        let mut stats = Self {
            capacity,
            lookups: counters.lookups,
            hits: counters.hits,
            misses: counters.misses,
            insertions: counters.insertions,
            evictions: counters.evictions,
            destroy_failures: counters.destroy_failures,
            last_key_hash: counters.last_key_hash,
            last_key_hits: counters.last_key_hits,
            last_event: counters.last_event,
            ..Self::default()
        };
        for meta in entries {
            stats.resident += 1;
            let age = now.saturating_duration_since(meta.created_at);
            let idle = now.saturating_duration_since(meta.last_used_at);
            stats.oldest_entry_age = Some(stats.oldest_entry_age.map_or(age, |current| current.max(age)));
            stats.longest_idle = Some(stats.longest_idle.map_or(idle, |current| current.max(idle)));
            stats.max_entry_reuse_count = Some(stats.max_entry_reuse_count.map_or(meta.reuse_count, |c| c.max(meta.reuse_count)));
        }
        stats
    }

    /// Fraction of lookups that hit, or `None` before the first lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        (self.lookups > 0).then(|| self.hits as f64 / self.lookups as f64)
    }
}
