//! Policy/value predictor seam and root move pruning.
//!
//! An external policy-value network can advise the search, but the engine
//! must never depend on it: every consumer treats a predictor error as "no
//! advice" and proceeds with the plain heuristics. The predictor is
//! single-entrant, so callers share it behind a mutex.

use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use hexxagon_core::{axial_to_index, preview_infected, Board, CellState, Move};

/// Policy slots: the 81 grid cells plus one pass slot.
pub const POLICY_LEN: usize = 82;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("predictor unavailable: {0}")]
    Unavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// One inference result: a masked softmax policy over the destination grid
/// and a value in `[-1, 1]` for the queried side.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub policy: Vec<f32>,
    pub value: f32,
}

/// A policy-value oracle. `selected` is a grid slot for two-stage policies
/// that condition on an already-chosen piece.
pub trait Predictor {
    fn predict(
        &mut self,
        b: &Board,
        me: CellState,
        selected: Option<usize>,
    ) -> Result<Prediction, PredictError>;
}

/// Uniform policy, neutral value. Stands in for a network in tests.
#[derive(Debug, Default)]
pub struct UniformPredictor;

impl Predictor for UniformPredictor {
    fn predict(
        &mut self,
        _b: &Board,
        _me: CellState,
        _selected: Option<usize>,
    ) -> Result<Prediction, PredictError> {
        Ok(Prediction {
            policy: vec![1.0 / POLICY_LEN as f32; POLICY_LEN],
            value: 0.0,
        })
    }
}

// Pruning parameters. `keep = clamp(len * KEEP_RATIO, MIN_KEEP, MAX_KEEP)`,
// stretched upward until the kept probability mass reaches the coverage
// target.
const KEEP_RATIO: f64 = 0.6;
const MIN_KEEP: usize = 6;
const MAX_KEEP: usize = 8;
const COVER_BASE: f64 = 0.90;
const COVER_HIGH: f64 = 0.96;
const ENTROPY_HIGH: f64 = 2.2;

/// Prune root moves by predictor prior. Moves with an immediate infection
/// of three or more are always kept, and at least one clone and one jump
/// survive so the search never loses a whole move class to the network.
/// Returns the input unchanged whenever the predictor declines to help.
pub fn policy_prune_root(
    b: &Board,
    player: CellState,
    moves: Vec<Move>,
    predictor: &Mutex<dyn Predictor + Send>,
) -> Vec<Move> {
    if moves.len() <= MIN_KEEP {
        return moves;
    }

    let prediction = {
        let mut guard = match predictor.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.predict(b, player, None) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "policy pruning skipped");
                return moves;
            }
        }
    };
    if prediction.policy.len() < POLICY_LEN - 1 {
        return moves;
    }

    struct Rec {
        mv: Move,
        p: f64,
        infect: u32,
    }

    let mut recs: Vec<Rec> = moves
        .iter()
        .map(|&mv| {
            let idx = axial_to_index(mv.to);
            let p = prediction.policy.get(idx).copied().unwrap_or(0.0) as f64;
            Rec {
                mv,
                p,
                infect: preview_infected(b, mv, player),
            }
        })
        .collect();

    // Renormalise over the legal moves.
    let sum: f64 = recs.iter().map(|r| r.p).sum();
    if sum > 0.0 {
        for r in &mut recs {
            r.p /= sum;
        }
    } else {
        let uniform = 1.0 / recs.len() as f64;
        for r in &mut recs {
            r.p = uniform;
        }
    }

    // High entropy means the network is unsure: keep more coverage.
    let entropy: f64 = recs
        .iter()
        .filter(|r| r.p > 0.0)
        .map(|r| -r.p * (r.p + 1e-12).ln())
        .sum();
    let cover_target = if entropy >= ENTROPY_HIGH {
        COVER_HIGH
    } else {
        COVER_BASE
    };

    recs.sort_by(|a, b| b.p.partial_cmp(&a.p).unwrap_or(std::cmp::Ordering::Equal));

    // Whitelist: big immediate infections, plus one clone and one jump.
    let mut keep = vec![false; recs.len()];
    for (i, r) in recs.iter().enumerate() {
        if r.infect >= 3 {
            keep[i] = true;
        }
    }
    for want_clone in [true, false] {
        if !recs
            .iter()
            .zip(&keep)
            .any(|(r, &k)| k && r.mv.is_clone() == want_clone)
        {
            if let Some(i) = recs.iter().position(|r| r.mv.is_clone() == want_clone) {
                keep[i] = true;
            }
        }
    }

    // Fill by probability until coverage is reached.
    let mut covered: f64 = recs
        .iter()
        .zip(&keep)
        .filter(|(_, &k)| k)
        .map(|(r, _)| r.p)
        .sum();
    for (i, r) in recs.iter().enumerate() {
        if keep[i] {
            continue;
        }
        if covered >= cover_target {
            break;
        }
        keep[i] = true;
        covered += r.p;
    }

    let want = ((moves.len() as f64 * KEEP_RATIO) as usize)
        .clamp(MIN_KEEP, MAX_KEEP)
        .min(recs.len());

    let mut kept: Vec<usize> = (0..recs.len()).filter(|&i| keep[i]).collect();
    if kept.len() < want {
        for i in 0..recs.len() {
            if kept.len() >= want {
                break;
            }
            if !keep[i] {
                keep[i] = true;
                kept.push(i);
            }
        }
    } else if kept.len() > want {
        kept.truncate(want);
    }

    // Order the survivors by probability; near-equal priors fall back to
    // clone-first, then bigger immediate infection.
    kept.sort_by(|&a, &b| {
        recs[b]
            .p
            .partial_cmp(&recs[a].p)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| recs[b].mv.is_clone().cmp(&recs[a].mv.is_clone()))
            .then_with(|| recs[b].infect.cmp(&recs[a].infect))
    });

    kept.into_iter().map(|i| recs[i].mv).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexxagon_core::{generate_moves, GameState};

    struct FailingPredictor;
    impl Predictor for FailingPredictor {
        fn predict(
            &mut self,
            _b: &Board,
            _me: CellState,
            _selected: Option<usize>,
        ) -> Result<Prediction, PredictError> {
            Err(PredictError::Unavailable("no model".into()))
        }
    }

    struct PeakedPredictor {
        favourite: usize,
    }
    impl Predictor for PeakedPredictor {
        fn predict(
            &mut self,
            _b: &Board,
            _me: CellState,
            _selected: Option<usize>,
        ) -> Result<Prediction, PredictError> {
            let mut policy = vec![1e-4; POLICY_LEN];
            policy[self.favourite] = 1.0;
            Ok(Prediction { policy, value: 0.3 })
        }
    }

    fn shared(p: impl Predictor + Send + 'static) -> std::sync::Arc<Mutex<dyn Predictor + Send>> {
        std::sync::Arc::new(Mutex::new(p))
    }

    #[test]
    fn predictor_failure_keeps_all_moves() {
        let gs = GameState::new();
        let moves = generate_moves(&gs.board, CellState::PlayerA);
        let predictor = shared(FailingPredictor);
        let kept = policy_prune_root(&gs.board, CellState::PlayerA, moves.clone(), &predictor);
        assert_eq!(kept.len(), moves.len());
    }

    #[test]
    fn peaked_policy_prunes_and_keeps_the_favourite() {
        let gs = GameState::new();
        let moves = generate_moves(&gs.board, CellState::PlayerA);
        assert!(moves.len() > MAX_KEEP);

        let favourite_move = moves[0];
        let predictor = shared(PeakedPredictor {
            favourite: axial_to_index(favourite_move.to),
        });
        let kept = policy_prune_root(&gs.board, CellState::PlayerA, moves, &predictor);
        assert!(kept.len() <= MAX_KEEP);
        assert!(kept.contains(&favourite_move));
        assert_eq!(kept[0].to, favourite_move.to);
    }

    #[test]
    fn small_lists_pass_through() {
        let gs = GameState::new();
        let moves: Vec<Move> = generate_moves(&gs.board, CellState::PlayerA)
            .into_iter()
            .take(4)
            .collect();
        let predictor = shared(UniformPredictor);
        let kept = policy_prune_root(&gs.board, CellState::PlayerA, moves.clone(), &predictor);
        assert_eq!(kept, moves);
    }
}
