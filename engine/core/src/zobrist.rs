//! Zobrist hashing.
//!
//! One random 64-bit key per (cell, state) pair plus one key per side to
//! move. The board hash covers cell contents only; the side key is mixed in
//! where a position key is actually consumed (transposition-table lookups).
//! Keys come from a fixed-seed ChaCha20 stream so hashes are reproducible
//! across processes and test runs.

use once_cell::sync::Lazy;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::board::{Board, CellState, BOARD_N};

const ZOBRIST_SEED: u64 = 0x4845_5858_4147_4f4e; // "HEXXAGON"

struct ZobristKeys {
    cell: [[u64; 4]; BOARD_N],
    side: [u64; 2],
    empty_board: u64,
}

static KEYS: Lazy<ZobristKeys> = Lazy::new(|| {
    let mut rng = ChaCha20Rng::seed_from_u64(ZOBRIST_SEED);
    let mut cell = [[0u64; 4]; BOARD_N];
    for keys in cell.iter_mut() {
        keys[CellState::Empty.zobrist_index()] = rng.next_u64();
        // Blocked never participates: obstacles are immutable once placed.
        keys[CellState::Blocked.zobrist_index()] = 0;
        keys[CellState::PlayerA.zobrist_index()] = rng.next_u64();
        keys[CellState::PlayerB.zobrist_index()] = rng.next_u64();
    }
    let side = [rng.next_u64(), rng.next_u64()];
    let empty_board = cell
        .iter()
        .fold(0u64, |h, keys| h ^ keys[CellState::Empty.zobrist_index()]);
    ZobristKeys {
        cell,
        side,
        empty_board,
    }
});

/// Key contribution of cell `i` holding state `s`.
#[inline]
pub fn cell_key(i: usize, s: CellState) -> u64 {
    KEYS.cell[i][s.zobrist_index()]
}

/// Side-to-move key, indexed 0 for PlayerA, 1 for PlayerB.
#[inline]
pub fn side_key(side: CellState) -> u64 {
    KEYS.side[side_index(side)]
}

#[inline]
pub fn side_index(side: CellState) -> usize {
    match side {
        CellState::PlayerB => 1,
        _ => 0,
    }
}

/// Hash of the all-empty board; the starting point for incremental updates.
#[inline]
pub(crate) fn empty_board_hash() -> u64 {
    KEYS.empty_board
}

/// Full recomputation of a board hash from scratch. The board maintains its
/// hash incrementally; this exists for consistency checks.
pub fn recompute_hash(b: &Board) -> u64 {
    let mut h = 0u64;
    for i in 0..BOARD_N {
        h ^= cell_key(i, b.get(i));
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_key_is_zero() {
        for i in 0..BOARD_N {
            assert_eq!(cell_key(i, CellState::Blocked), 0);
        }
    }

    #[test]
    fn keys_are_stable_across_calls() {
        assert_eq!(cell_key(0, CellState::PlayerA), cell_key(0, CellState::PlayerA));
        assert_ne!(side_key(CellState::PlayerA), side_key(CellState::PlayerB));
    }

    #[test]
    fn new_board_hash_matches_recomputation() {
        let b = Board::new();
        assert_eq!(b.hash(), recompute_hash(&b));
    }
}
