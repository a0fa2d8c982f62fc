//! Root move selection: parallel alpha-beta over the root moves, immediate
//! win detection, and iterative deepening.
//!
//! The root differs from interior nodes in three ways: moves are pre-scored
//! and sorted before the deep searches, the deep searches run on a worker
//! pool with every worker holding its own board clone, and jumps carry a
//! small score penalty so the engine prefers growing over hopping when the
//! outcome is close. Near-ties at the root are broken uniformly at random
//! through an injected RNG to vary play between games.

use std::sync::{Arc, Mutex};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{debug, trace};

use hexxagon_core::{
    generate_moves, index_of, is_outer, preview_infected, Board, CellState, Move,
};

use crate::alphabeta::{alpha_beta, SCORE_INF};
use crate::eval::evaluate;
use crate::filters::filter_pipeline;
use crate::predict::{policy_prune_root, Predictor};

/// Score deducted from jump moves at the root only.
pub const JUMP_MOVE_PENALTY: i32 = 25;

/// Empty-ratio above which the root restricts itself to outer-ring clones.
const EARLY_CLONE_RATIO: f64 = 0.84;

/// Score gap under which tied root moves are drawn at random.
const TIE_BREAK_MARGIN: i32 = 3;

/// Tunables for the root search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Worker pool width; 0 picks the hardware parallelism.
    pub workers: usize,
    /// Extend the nominal depth in nearly-full positions.
    pub endgame_extension: bool,
    /// Seed for the tie-break RNG.
    pub seed: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            endgame_extension: false,
            seed: 0,
        }
    }
}

impl SearchOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_endgame_extension(mut self, on: bool) -> Self {
        self.endgame_extension = on;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Root searcher. Holds the options, the tie-break RNG and an optional
/// policy predictor used to prune root moves.
pub struct AbSearch {
    opts: SearchOptions,
    rng: ChaCha20Rng,
    predictor: Option<Arc<Mutex<dyn Predictor + Send>>>,
}

impl AbSearch {
    pub fn new(opts: SearchOptions) -> Self {
        let rng = ChaCha20Rng::seed_from_u64(opts.seed);
        Self {
            opts,
            rng,
            predictor: None,
        }
    }

    /// Attach a policy predictor. Root pruning silently disables itself
    /// whenever the predictor errors.
    pub fn with_predictor(mut self, p: Arc<Mutex<dyn Predictor + Send>>) -> Self {
        self.predictor = Some(p);
        self
    }

    /// Best move at a fixed depth. `None` iff no legal filtered move
    /// exists.
    pub fn find_best_move_at_depth(
        &mut self,
        b: &Board,
        player: CellState,
        depth: i32,
        allow_jump: bool,
    ) -> Option<Move> {
        self.root_search(b, player, depth, allow_jump).map(|(m, _)| m)
    }

    /// Iterative deepening up to `max_depth`, reseeding move ordering from
    /// the transposition table between iterations.
    pub fn iterative_deepening(
        &mut self,
        b: &Board,
        player: CellState,
        max_depth: i32,
        allow_jump: bool,
    ) -> Option<(Move, i32)> {
        let mut best = None;
        for depth in 1..=max_depth {
            let depth = if self.opts.endgame_extension {
                extend_endgame_depth(b, depth)
            } else {
                depth
            };
            match self.root_search(b, player, depth, allow_jump) {
                Some(found) => best = Some(found),
                None => break,
            }
            trace!(depth, best = ?best, "iteration complete");
        }
        best
    }

    fn root_search(
        &mut self,
        b: &Board,
        player: CellState,
        depth: i32,
        allow_jump: bool,
    ) -> Option<(Move, i32)> {
        if let Some(mv) = find_immediate_win_only(b, player) {
            debug!(?mv, "immediate win at the root");
            return Some((mv, SCORE_INF));
        }

        let mut moves = generate_moves(b, player);
        if moves.is_empty() {
            return None;
        }

        // Very early opening: stay on the outer ring, clones only.
        if b.empty_ratio() >= EARLY_CLONE_RATIO {
            let edge_clones: Vec<Move> = moves
                .iter()
                .copied()
                .filter(|m| m.is_clone() && index_of(m.to).is_some_and(is_outer))
                .collect();
            if !edge_clones.is_empty() {
                moves = edge_clones;
            }
        }

        filter_pipeline(b, player, &mut moves, allow_jump);
        if moves.is_empty() {
            return None;
        }

        if let Some(predictor) = &self.predictor {
            moves = policy_prune_root(b, player, moves, predictor.as_ref());
        }

        // Shallow pre-score for ordering: static eval after the move, a
        // light infection bonus, and the root jump penalty.
        let mut scratch = b.clone();
        let mut order: Vec<(Move, i32)> = moves
            .iter()
            .map(|&m| {
                let infected = preview_infected(b, m, player) as i32;
                let undo = scratch.make(m, player);
                let mut s = evaluate(&scratch, player) + 2 * infected;
                scratch.unmake(undo);
                if m.is_jump() {
                    s -= JUMP_MOVE_PENALTY;
                }
                (m, s)
            })
            .collect();
        order.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.0.is_clone().cmp(&a.0.is_clone()))
        });

        let workers = self.worker_count(order.len());
        let results: Vec<(Move, i32)> = if workers <= 1 {
            let mut nb = b.clone();
            order
                .iter()
                .map(|&(mv, _)| (mv, deep_score(&mut nb, mv, player, depth, allow_jump)))
                .collect()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| {
                    order
                        .par_iter()
                        .map(|&(mv, _)| {
                            let mut nb = b.clone();
                            (mv, deep_score(&mut nb, mv, player, depth, allow_jump))
                        })
                        .collect()
                }),
                Err(e) => {
                    debug!(error = %e, "falling back to sequential root search");
                    let mut nb = b.clone();
                    order
                        .iter()
                        .map(|&(mv, _)| (mv, deep_score(&mut nb, mv, player, depth, allow_jump)))
                        .collect()
                }
            }
        };

        // Aggregate: best score, its ties, and the runner-up score.
        let mut best_score = -SCORE_INF;
        let mut second_score = -SCORE_INF;
        let mut best_moves: Vec<Move> = Vec::new();
        for &(mv, score) in &results {
            if score > best_score {
                second_score = best_score;
                best_score = score;
                best_moves.clear();
                best_moves.push(mv);
            } else if score == best_score {
                best_moves.push(mv);
            } else if score > second_score {
                second_score = score;
            }
        }
        let mut choice = *best_moves.first()?;
        if best_moves.len() > 1 && best_score - second_score < TIE_BREAK_MARGIN {
            choice = best_moves[self.rng.gen_range(0..best_moves.len())];
        }
        debug!(?choice, best_score, candidates = results.len(), "root search done");
        Some((choice, best_score))
    }

    fn worker_count(&self, moves: usize) -> usize {
        let hw = if self.opts.workers > 0 {
            self.opts.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        hw.min(moves).max(1)
    }
}

fn deep_score(nb: &mut Board, mv: Move, player: CellState, depth: i32, allow_jump: bool) -> i32 {
    let undo = nb.make(mv, player);
    let mut score = alpha_beta(
        nb,
        player.opponent(),
        player,
        depth - 1,
        -SCORE_INF,
        SCORE_INF,
        allow_jump,
    );
    nb.unmake(undo);
    if mv.is_jump() {
        score -= JUMP_MOVE_PENALTY;
    }
    score
}

/// A move that ends the game in the mover's favour on the spot: afterwards
/// the opponent either has no reply (all empties fall to the mover) or the
/// board is full, and the resulting count favours the mover.
pub fn find_immediate_win_only(b: &Board, player: CellState) -> Option<Move> {
    let op = player.opponent();
    let mut nb = b.clone();
    for mv in generate_moves(b, player) {
        let undo = nb.make(mv, player);
        let empties = nb.count_empty() as u32;
        let opponent_stuck = generate_moves(&nb, op).is_empty();
        let my = nb.count_pieces(player);
        let his = nb.count_pieces(op);
        let winning = if opponent_stuck {
            my + empties > his
        } else {
            empties == 0 && my > his
        };
        nb.unmake(undo);
        if winning {
            return Some(mv);
        }
    }
    None
}

/// Endgame depth extension: nearly-full boards are cheap to search, so look
/// further ahead when few empties remain.
fn extend_endgame_depth(b: &Board, base: i32) -> i32 {
    match b.count_empty() {
        0..=6 => base + 4,
        7..=10 => base + 2,
        _ => base,
    }
}
