//! Alpha-beta search stack for Hexxagon.
//!
//! The pieces, from the bottom up:
//!
//! - [`tt`]: a process-wide, lock-free (seqlock) transposition table
//! - [`eval`]: the bitboard static evaluator
//! - [`filters`]: heuristic move pruning shared by root and interior nodes
//! - [`alphabeta`]: the recursive search
//! - [`root`]: parallel root move selection and iterative deepening
//! - [`predict`]: the optional policy/value network seam
//!
//! Every search worker owns a private board clone; the only shared mutable
//! state is the transposition table, which is safe under plain data races
//! by construction (readers detect and discard torn entries).

pub mod alphabeta;
pub mod eval;
pub mod filters;
pub mod predict;
pub mod root;
pub mod tt;

pub use alphabeta::{alpha_beta, alpha_beta_no_tt, SCORE_INF};
pub use eval::{evaluate, PIECE_W, EDGE_W, TRI_W};
pub use filters::{filter_pipeline, infection_unlocked};
pub use predict::{PredictError, Prediction, Predictor, UniformPredictor, POLICY_LEN};
pub use root::{
    find_immediate_win_only, AbSearch, SearchOptions, JUMP_MOVE_PENALTY,
};
pub use tt::{clear_tt, tt_key, Bound, TtStats, TT_BUCKETS, TT_WAYS};
