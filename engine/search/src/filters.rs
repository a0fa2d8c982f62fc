//! Heuristic move filtering.
//!
//! A pipeline of cheap, pure predicates applied to a generated move list
//! before search, at the root and at interior nodes alike. Every stage
//! falls back to its input if it would otherwise empty the list, so the
//! pipeline can only produce an empty list from an empty input.

use hexxagon_core::{
    index_of, jumps, neighbor_mask, neighbors, preview_infected, Board, CellState, Move,
};

/// Board emptiness above which the isolated-clone filter is active; late
/// positions produce too many false positives.
const ISOLATED_CLONE_RATIO: f64 = 0.65;

/// Retain moves matching `pred`, in place; keep the input untouched when
/// nothing would survive.
fn retain_or_keep(moves: &mut Vec<Move>, pred: impl Fn(&Move) -> bool) {
    let survivors = moves.iter().filter(|&m| pred(m)).count();
    if survivors > 0 && survivors < moves.len() {
        moves.retain(pred);
    }
}

/// Stage 1: drop jumps when the caller forbids them. If only jumps exist
/// they are kept, otherwise a stuck position could not move at all.
pub fn filter_jumps_by_flag(moves: &mut Vec<Move>, allow_jump: bool) {
    if allow_jump {
        return;
    }
    retain_or_keep(moves, |m| m.is_clone());
}

/// Whether the infection phase has started: some stone was just infected,
/// or two opposite-colour stones already touch anywhere on the board.
pub fn infection_unlocked(b: &Board) -> bool {
    if b.last_infect > 0 {
        return true;
    }
    let enemy = b.bit_b();
    let mut own = b.bit_a();
    while own != 0 {
        let i = own.trailing_zeros() as usize;
        own &= own - 1;
        if neighbor_mask(i) & enemy != 0 {
            return true;
        }
    }
    false
}

/// Stage 2: before the infection phase starts, restrict to clones that stay
/// on the outer ring. Keeps the opening from drifting into the centre where
/// the first contact costs material.
pub fn filter_opening_edge(b: &Board, moves: &mut Vec<Move>) {
    if infection_unlocked(b) {
        return;
    }
    retain_or_keep(moves, |m| {
        m.is_clone() && on_outer(m.from) && on_outer(m.to)
    });
}

#[inline]
fn on_outer(c: hexxagon_core::HexCoord) -> bool {
    index_of(c).is_some_and(hexxagon_core::is_outer)
}

/// Stage 3: drop jumps that infect nothing; a zero-infect jump spends a
/// stone for no material. Falls back to clones, then to the input.
pub fn filter_zero_infect_jumps(b: &Board, side: CellState, moves: &mut Vec<Move>) {
    let survivors = moves
        .iter()
        .filter(|m| !(m.is_jump() && preview_infected(b, **m, side) == 0))
        .count();
    if survivors > 0 {
        if survivors < moves.len() {
            moves.retain(|m| !(m.is_jump() && preview_infected(b, *m, side) == 0));
        }
        return;
    }
    retain_or_keep(moves, |m| m.is_clone());
}

/// Can `op` occupy empty cell `dst` on its next move, by cloning from an
/// adjacent stone or jumping from a distance-2 one?
pub fn opponent_can_reach_next(b: &Board, op: CellState, dst: usize) -> bool {
    if b.get(dst) != CellState::Empty {
        return false;
    }
    if neighbor_mask(dst) & b.side_mask(op) != 0 {
        return true;
    }
    jumps(dst).iter().any(|&j| b.get(j) == op)
}

/// Shared-neighbour indices of two cells.
fn shared_neighbors(a: usize, c: usize) -> impl Iterator<Item = usize> {
    let mut mask = neighbor_mask(a) & neighbor_mask(c);
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let i = mask.trailing_zeros() as usize;
        mask &= mask - 1;
        Some(i)
    })
}

/// Stage 4: drop a jump that grabs exactly one stone `x` when the opponent
/// can land next move on an empty cell touching both the landing square and
/// `x`, taking both right back. The stone `x` itself does not count as a
/// recapture source: it belongs to the mover once the jump resolves.
pub fn filter_dangerous_recapture_jumps(b: &Board, side: CellState, moves: &mut Vec<Move>) {
    let op = side.opponent();
    retain_or_keep(moves, |m| {
        if !m.is_jump() || preview_infected(b, *m, side) != 1 {
            return true;
        }
        let Some(to) = index_of(m.to) else {
            return true;
        };
        // The single stone this jump would infect.
        let Some(x) = neighbors(to).iter().copied().find(|&j| b.get(j) == op) else {
            return true;
        };
        !shared_neighbors(to, x).any(|y| {
            b.get(y) == CellState::Empty
                && (neighbor_mask(y) & b.side_mask(op) & !(1u64 << x) != 0
                    || jumps(y).iter().any(|&j| b.get(j) == op))
        })
    });
}

/// Stage 5: drop a clone that infects nothing when an empty cell adjacent
/// to both its origin and destination is opponent-reachable; the reply
/// infects both stones at once.
pub fn filter_vulnerable_clones(b: &Board, side: CellState, moves: &mut Vec<Move>) {
    let op = side.opponent();
    retain_or_keep(moves, |m| {
        if !m.is_clone() || preview_infected(b, *m, side) != 0 {
            return true;
        }
        let (Some(from), Some(to)) = (index_of(m.from), index_of(m.to)) else {
            return true;
        };
        !shared_neighbors(from, to).any(|y| opponent_can_reach_next(b, op, y))
    });
}

/// Stage 6: early in the game, drop a clone from a stone with no friendly
/// neighbour when the opponent can land between origin and destination.
pub fn filter_dangerous_isolated_clones(b: &Board, side: CellState, moves: &mut Vec<Move>) {
    if b.empty_ratio() < ISOLATED_CLONE_RATIO {
        return;
    }
    let op = side.opponent();
    let own = b.side_mask(side);
    retain_or_keep(moves, |m| {
        if !m.is_clone() {
            return true;
        }
        let (Some(from), Some(to)) = (index_of(m.from), index_of(m.to)) else {
            return true;
        };
        if neighbor_mask(from) & own != 0 {
            return true; // not isolated
        }
        !shared_neighbors(from, to).any(|y| opponent_can_reach_next(b, op, y))
    });
}

/// The full pipeline, in order. Output is empty only if the input was.
pub fn filter_pipeline(b: &Board, side: CellState, moves: &mut Vec<Move>, allow_jump: bool) {
    filter_jumps_by_flag(moves, allow_jump);
    filter_opening_edge(b, moves);
    filter_zero_infect_jumps(b, side, moves);
    if allow_jump {
        filter_dangerous_recapture_jumps(b, side, moves);
    }
    filter_vulnerable_clones(b, side, moves);
    filter_dangerous_isolated_clones(b, side, moves);
}
