//! Lock-free transposition table.
//!
//! A fixed array of 4-way buckets shared by every search worker. Entries
//! are protected by a per-entry seqlock: the version counter is bumped to
//! odd before a write and back to even after, and `key` is published last.
//! A reader accepts a snapshot only when it saw the same even version on
//! both sides of the field loads; anything else is treated as a miss.
//!
//! The table may lose writes under contention. Correctness never depends on
//! an entry being present, only on never observing a torn one.
//!
//! `clear` does not zero the array: every key mixes in a process-wide salt,
//! and bumping the salt invalidates all stale entries at once.

use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, AtomicU8, Ordering};

use once_cell::sync::Lazy;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use hexxagon_core::zobrist;
use hexxagon_core::{Board, CellState};

/// Number of buckets; must be a power of two.
pub const TT_BUCKETS: usize = 1 << 21;

/// Entries per bucket.
pub const TT_WAYS: usize = 4;

const TT_MASK: u64 = (TT_BUCKETS - 1) as u64;

/// Kind of score stored in an entry, relative to the window the search ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    Exact = 0,
    Lower = 1,
    Upper = 2,
}

impl Bound {
    #[inline]
    fn from_u8(v: u8) -> Bound {
        match v {
            1 => Bound::Lower,
            2 => Bound::Upper,
            _ => Bound::Exact,
        }
    }
}

#[derive(Default)]
struct Entry {
    /// Seqlock counter: even = stable, odd = write in progress.
    version: AtomicU32,
    score: AtomicI32,
    depth: AtomicI32,
    flag: AtomicU8,
    best_idx: AtomicU8,
    has_best: AtomicU8,
    /// Published last on write.
    key: AtomicU64,
}

struct Table {
    entries: Vec<Entry>,
    salt: AtomicU64,
    probes: AtomicU64,
    hits: AtomicU64,
}

static TT: Lazy<Table> = Lazy::new(|| {
    let mut rng = ChaCha20Rng::seed_from_u64(0x7472_616e_7370_6f73);
    Table {
        entries: (0..TT_BUCKETS * TT_WAYS).map(|_| Entry::default()).collect(),
        // Nonzero so an all-zero entry can never match a live key.
        salt: AtomicU64::new(rng.next_u64() | 1),
        probes: AtomicU64::new(0),
        hits: AtomicU64::new(0),
    }
});

#[inline]
fn bucket(key: u64) -> &'static [Entry] {
    let base = ((key & TT_MASK) as usize) * TT_WAYS;
    &TT.entries[base..base + TT_WAYS]
}

/// Table key for a position and side to move.
#[inline]
pub fn tt_key(b: &Board, side: CellState) -> u64 {
    b.hash() ^ zobrist::side_key(side) ^ TT.salt.load(Ordering::Acquire)
}

/// Invalidate every entry by bumping the salt. Much cheaper than zeroing
/// 8M entries and safe to call while searches are running: in-flight
/// probes simply stop matching.
pub fn clear_tt() {
    TT.salt.fetch_add(2, Ordering::AcqRel);
    TT.probes.store(0, Ordering::Relaxed);
    TT.hits.store(0, Ordering::Relaxed);
}

/// Look up `key`, requiring a stored depth of at least `need_depth`.
pub fn probe(key: u64, need_depth: i32) -> Option<(i32, Bound)> {
    TT.probes.fetch_add(1, Ordering::Relaxed);
    for e in bucket(key) {
        loop {
            let v1 = e.version.load(Ordering::Acquire);
            if v1 & 1 == 1 {
                break; // writer in progress, try the next way
            }
            if e.key.load(Ordering::Acquire) != key {
                break;
            }
            let score = e.score.load(Ordering::Relaxed);
            let depth = e.depth.load(Ordering::Relaxed);
            let flag = Bound::from_u8(e.flag.load(Ordering::Relaxed));
            let v2 = e.version.load(Ordering::Acquire);
            if v1 == v2 && v2 & 1 == 0 {
                if depth >= need_depth {
                    TT.hits.fetch_add(1, Ordering::Relaxed);
                    return Some((score, flag));
                }
                break;
            }
            // Version moved while reading: retry this way.
        }
    }
    None
}

/// Store a search result. Prefers the way already holding `key`, otherwise
/// evicts the shallowest entry in the bucket.
pub fn store(key: u64, depth: i32, score: i32, flag: Bound) {
    let ways = bucket(key);
    let mut slot = 0;
    let mut min_depth = i32::MAX;
    for (w, e) in ways.iter().enumerate() {
        if e.key.load(Ordering::Acquire) == key {
            slot = w;
            break;
        }
        let d = e.depth.load(Ordering::Relaxed);
        if d < min_depth {
            min_depth = d;
            slot = w;
        }
    }

    let e = &ways[slot];
    e.version.fetch_add(1, Ordering::AcqRel); // odd: writers in
    e.score.store(score, Ordering::Relaxed);
    e.depth.store(depth, Ordering::Relaxed);
    e.flag.store(flag as u8, Ordering::Relaxed);
    e.has_best.store(0, Ordering::Relaxed);
    e.key.store(key, Ordering::Release);
    e.version.fetch_add(1, Ordering::Release); // even: published
}

/// Best-move index recorded for `key`, for move ordering.
pub fn probe_best_idx(key: u64) -> Option<u8> {
    for e in bucket(key) {
        loop {
            let v1 = e.version.load(Ordering::Acquire);
            if v1 & 1 == 1 {
                break;
            }
            if e.key.load(Ordering::Acquire) != key {
                break;
            }
            let has = e.has_best.load(Ordering::Relaxed);
            let idx = e.best_idx.load(Ordering::Relaxed);
            let v2 = e.version.load(Ordering::Acquire);
            if v1 == v2 && v2 & 1 == 0 {
                if has != 0 {
                    return Some(idx);
                }
                break;
            }
        }
    }
    None
}

/// Record the best-move index for an existing entry. A plain field write:
/// ordering hints only ever improve or degrade move ordering, never
/// correctness, so no seqlock round-trip is needed on the write side.
pub fn store_best_idx(key: u64, idx: u8) {
    for e in bucket(key) {
        if e.key.load(Ordering::Acquire) == key {
            e.best_idx.store(idx, Ordering::Relaxed);
            e.has_best.store(1, Ordering::Release);
            return;
        }
    }
}

/// Probe/hit counters since the last [`clear_tt`].
#[derive(Debug, Clone, Copy)]
pub struct TtStats {
    pub probes: u64,
    pub hits: u64,
}

impl TtStats {
    pub fn hit_rate(&self) -> f64 {
        if self.probes == 0 {
            0.0
        } else {
            self.hits as f64 / self.probes as f64
        }
    }
}

pub fn stats() -> TtStats {
    TtStats {
        probes: TT.probes.load(Ordering::Relaxed),
        hits: TT.hits.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Mutex, MutexGuard};

    // The table is process-wide: serialize tests that clear it so a clear
    // in one test cannot invalidate keys another test just stored.
    static TT_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn lock() -> MutexGuard<'static, ()> {
        TT_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn store_then_probe_roundtrip() {
        let _g = lock();
        clear_tt();
        let key = 0xDEAD_BEEF_0000_0001;
        store(key, 5, 120, Bound::Exact);
        assert_eq!(probe(key, 5), Some((120, Bound::Exact)));
        assert_eq!(probe(key, 4), Some((120, Bound::Exact)));
    }

    #[test]
    fn shallow_entries_do_not_satisfy_deeper_probes() {
        let _g = lock();
        clear_tt();
        let key = 0xDEAD_BEEF_0000_0002;
        store(key, 3, 7, Bound::Lower);
        assert_eq!(probe(key, 4), None);
        assert_eq!(probe(key, 3), Some((7, Bound::Lower)));
    }

    #[test]
    fn clear_invalidates_via_salt() {
        let _g = lock();
        clear_tt();
        let mut b = Board::new();
        b.set_coord(hexxagon_core::HexCoord::new(0, 0), CellState::PlayerA);
        let key = tt_key(&b, CellState::PlayerA);
        store(key, 2, -40, Bound::Upper);
        assert!(probe(key, 2).is_some());

        clear_tt();
        let key_after = tt_key(&b, CellState::PlayerA);
        assert_ne!(key, key_after);
        assert_eq!(probe(key_after, 0), None);
    }

    #[test]
    fn best_idx_rides_along() {
        let _g = lock();
        clear_tt();
        let key = 0xDEAD_BEEF_0000_0003;
        assert_eq!(probe_best_idx(key), None);
        store(key, 6, 0, Bound::Exact);
        assert_eq!(probe_best_idx(key), None);
        store_best_idx(key, 11);
        assert_eq!(probe_best_idx(key), Some(11));
        // A fresh store for the same key resets the hint.
        store(key, 7, 1, Bound::Exact);
        assert_eq!(probe_best_idx(key), None);
    }

    #[test]
    fn same_bucket_eviction_prefers_shallowest() {
        let _g = lock();
        clear_tt();
        // Keys colliding into one bucket: identical low bits, distinct
        // high bits.
        let k = |i: u64| 0x1357 | (i << 40);
        store(k(1), 9, 1, Bound::Exact);
        store(k(2), 3, 2, Bound::Exact);
        store(k(3), 8, 3, Bound::Exact);
        store(k(4), 7, 4, Bound::Exact);
        // Bucket full; a fifth key must evict the depth-3 entry.
        store(k(5), 5, 5, Bound::Exact);
        assert_eq!(probe(k(2), 0), None);
        assert_eq!(probe(k(1), 9), Some((1, Bound::Exact)));
        assert_eq!(probe(k(5), 5), Some((5, Bound::Exact)));
    }

    #[test]
    fn concurrent_readers_never_see_torn_entries() {
        let _g = lock();
        clear_tt();
        let key = 0xDEAD_BEEF_0000_0004;
        let stop = AtomicBool::new(false);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while !stop.load(Ordering::Relaxed) {
                        if let Some((score, _)) = probe(key, 0) {
                            // Writers only ever publish score == depth * 10;
                            // any other pairing would be a torn read.
                            assert_eq!(score % 10, 0);
                        }
                    }
                });
            }
            for t in 0..2 {
                s.spawn(move || {
                    for i in 0..20_000i32 {
                        let d = (i + t) % 32;
                        store(key, d, d * 10, Bound::Exact);
                    }
                });
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
            stop.store(true, Ordering::Relaxed);
        });
    }
}
