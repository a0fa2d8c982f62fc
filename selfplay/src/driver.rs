//! Plays complete games with MCTS and turns them into labelled samples.

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, trace};

use hexxagon_core::{encode_board_tensor, generate_moves, CellState, GameState};
use hexxagon_mcts::{find_best_move_mcts_with_visits, VISIT_SLOTS};

use crate::writer::{RawSample, Sample};

/// Per-game knobs of the generator.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// MCTS simulations per move.
    pub sims: u32,
    /// Hard ply bound per game.
    pub max_plies: u32,
    /// Games shorter than this are discarded.
    pub min_plies: usize,
    /// Random moves per side injected before search play starts.
    pub opening_moves: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sims: 800,
            max_plies: 400,
            min_plies: 20,
            opening_moves: 2,
        }
    }
}

/// Normalise a visit histogram into a probability vector; an all-zero
/// histogram becomes uniform.
pub fn normalize_visits(visits: &[u32; VISIT_SLOTS]) -> [f32; VISIT_SLOTS] {
    let mut out = [0.0f32; VISIT_SLOTS];
    let total: u64 = visits.iter().map(|&v| u64::from(v)).sum();
    if total == 0 {
        out.fill(1.0 / VISIT_SLOTS as f32);
        return out;
    }
    let inv = 1.0 / total as f32;
    for (slot, &v) in out.iter_mut().zip(visits.iter()) {
        *slot = v as f32 * inv;
    }
    out
}

/// A few uniformly random plies for both sides, to decorrelate games.
fn add_random_opening(gs: &mut GameState, per_side: u32, rng: &mut ChaCha20Rng) {
    for _ in 0..per_side * 2 {
        if gs.game_over {
            return;
        }
        let moves = generate_moves(&gs.board, gs.current_player);
        if moves.is_empty() {
            return;
        }
        let mv = moves[rng.gen_range(0..moves.len())];
        if gs.make_move(mv).is_err() {
            return;
        }
    }
}

/// Winner by raw piece count, whether or not the state machine already
/// declared the game over (long games are cut off at the ply bound).
fn winner_by_count(gs: &GameState) -> Option<CellState> {
    let a = gs.board.count_pieces(CellState::PlayerA);
    let b = gs.board.count_pieces(CellState::PlayerB);
    match a.cmp(&b) {
        std::cmp::Ordering::Greater => Some(CellState::PlayerA),
        std::cmp::Ordering::Less => Some(CellState::PlayerB),
        std::cmp::Ordering::Equal => None,
    }
}

/// Play one game and label every recorded position with the final result
/// from that position's side to move. `None` when the game was too short
/// to be worth keeping.
pub fn play_one_game(cfg: &DriverConfig, rng: &mut ChaCha20Rng) -> Option<Vec<Sample>> {
    let mut gs = GameState::new();
    add_random_opening(&mut gs, cfg.opening_moves, rng);

    let mut raws: Vec<RawSample> = Vec::with_capacity(128);
    for ply in 0..cfg.max_plies {
        if gs.game_over {
            break;
        }
        let player = gs.current_player;
        let Some((mv, visits)) =
            find_best_move_mcts_with_visits(&gs.board, player, cfg.sims, None, true, rng)
        else {
            break;
        };

        raws.push(RawSample {
            state: encode_board_tensor(&gs.board, player),
            policy: normalize_visits(&visits),
            side: player,
        });

        if let Err(e) = gs.make_move(mv) {
            debug!(ply, error = %e, "search produced an unplayable move");
            break;
        }
        trace!(ply, ?mv, "played");
    }

    if raws.len() < cfg.min_plies {
        debug!(plies = raws.len(), "game too short, dropped");
        return None;
    }

    let winner = winner_by_count(&gs);
    let samples = raws
        .into_iter()
        .map(|r| Sample {
            state: r.state,
            policy: r.policy,
            value: match winner {
                Some(w) if w == r.side => 1,
                Some(_) => -1,
                None => 0,
            },
        })
        .collect();
    Some(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn normalization_sums_to_one() {
        let mut visits = [0u32; VISIT_SLOTS];
        visits[3] = 30;
        visits[40] = 70;
        let p = normalize_visits(&visits);
        let sum: f32 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((p[40] - 0.7).abs() < 1e-5);

        let uniform = normalize_visits(&[0u32; VISIT_SLOTS]);
        assert!((uniform[0] - 1.0 / VISIT_SLOTS as f32).abs() < 1e-6);
    }

    #[test]
    fn random_opening_advances_the_game() {
        let mut gs = GameState::new();
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        add_random_opening(&mut gs, 2, &mut rng);
        let pieces = gs.board.count_pieces(CellState::PlayerA)
            + gs.board.count_pieces(CellState::PlayerB);
        // Started with 6; every clone adds one, jumps keep the count.
        assert!(pieces >= 6);
        assert!(!gs.game_over);
    }

    #[test]
    fn short_games_are_rejected() {
        let cfg = DriverConfig {
            sims: 8,
            max_plies: 4,
            min_plies: 20,
            opening_moves: 0,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(play_one_game(&cfg, &mut rng).is_none());
    }

    #[test]
    fn labels_are_consistent_with_one_winner() {
        let cfg = DriverConfig {
            sims: 12,
            max_plies: 120,
            min_plies: 4,
            opening_moves: 1,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let samples = play_one_game(&cfg, &mut rng).expect("long enough game");
        assert!(samples.len() >= 4);
        for s in &samples {
            assert!(matches!(s.value, -1 | 0 | 1));
            let p_sum: f32 = s.policy.iter().sum();
            assert!((p_sum - 1.0).abs() < 1e-4);
        }
        // Alternating sides get alternating labels unless the game drew.
        if samples[0].value != 0 {
            assert_eq!(samples[0].value, -samples[1].value);
        }
    }
}
