//! Recursive alpha-beta with transposition table.
//!
//! The search keeps `alpha`/`beta` and every returned score in the ROOT
//! player's (`original`) perspective: nodes where `current == original`
//! maximise, the others minimise. The transposition table instead stores
//! scores in the perspective of the side to move at that node, so every
//! probe negates back and every store negates forward whenever
//! `current != original`. Bound flags are classified against the window the
//! node was entered with, which lives in `original`'s perspective.

use hexxagon_core::{generate_moves, Board, CellState};

use crate::eval::evaluate;
use crate::filters::filter_pipeline;
use crate::tt;

/// Scores are always well inside this bound.
pub const SCORE_INF: i32 = 1 << 30;

/// Alpha-beta over `b`, returning the minimax value in `original`'s
/// perspective. `b` is restored to its entry state before returning.
pub fn alpha_beta(
    b: &mut Board,
    current: CellState,
    original: CellState,
    depth: i32,
    mut alpha: i32,
    mut beta: i32,
    allow_jump: bool,
) -> i32 {
    if depth <= 0 {
        return evaluate(b, original);
    }

    let key = tt::tt_key(b, current);
    if let Some((stored, flag)) = tt::probe(key, depth) {
        let val = if current == original { stored } else { -stored };
        match flag {
            tt::Bound::Exact => return val,
            tt::Bound::Lower => alpha = alpha.max(val),
            tt::Bound::Upper => beta = beta.min(val),
        }
        if alpha >= beta {
            return val;
        }
    }
    let alpha0 = alpha;
    let beta0 = beta;

    let mut moves = generate_moves(b, current);
    filter_pipeline(b, current, &mut moves, allow_jump);
    if moves.is_empty() {
        return evaluate(b, original);
    }

    if let Some(idx) = tt::probe_best_idx(key) {
        let idx = idx as usize;
        if idx < moves.len() {
            moves.swap(0, idx);
        }
    }

    let next = current.opponent();
    let maximising = current == original;
    let mut best = if maximising { -SCORE_INF } else { SCORE_INF };
    let mut best_idx = 0u8;

    for (i, &mv) in moves.iter().enumerate() {
        let undo = b.make(mv, current);
        let score = alpha_beta(b, next, original, depth - 1, alpha, beta, allow_jump);
        b.unmake(undo);

        if maximising {
            if score > best {
                best = score;
                best_idx = i as u8;
            }
            alpha = alpha.max(score);
        } else {
            if score < best {
                best = score;
                best_idx = i as u8;
            }
            beta = beta.min(score);
        }
        if alpha >= beta {
            break;
        }
    }

    let flag = if best <= alpha0 {
        tt::Bound::Upper
    } else if best >= beta0 {
        tt::Bound::Lower
    } else {
        tt::Bound::Exact
    };
    let stored = if maximising { best } else { -best };
    tt::store(key, depth, stored, flag);
    tt::store_best_idx(key, best_idx);

    best
}

/// Reference twin of [`alpha_beta`] that never touches the transposition
/// table. Exists so the table can be validated against it; see the search
/// equivalence tests.
pub fn alpha_beta_no_tt(
    b: &mut Board,
    current: CellState,
    original: CellState,
    depth: i32,
    mut alpha: i32,
    mut beta: i32,
    allow_jump: bool,
) -> i32 {
    if depth <= 0 {
        return evaluate(b, original);
    }

    let mut moves = generate_moves(b, current);
    filter_pipeline(b, current, &mut moves, allow_jump);
    if moves.is_empty() {
        return evaluate(b, original);
    }

    let next = current.opponent();
    let maximising = current == original;
    let mut best = if maximising { -SCORE_INF } else { SCORE_INF };

    for &mv in &moves {
        let undo = b.make(mv, current);
        let score = alpha_beta_no_tt(b, next, original, depth - 1, alpha, beta, allow_jump);
        b.unmake(undo);

        if maximising {
            best = best.max(score);
            alpha = alpha.max(score);
        } else {
            best = best.min(score);
            beta = beta.min(score);
        }
        if alpha >= beta {
            break;
        }
    }
    best
}
