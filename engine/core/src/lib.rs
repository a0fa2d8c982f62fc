//! Core rules and board model for Hexxagon, a two-player hexagonal
//! infection game on a radius-4 board.
//!
//! This crate owns everything the search layers treat as ground truth:
//!
//! - the board with its bitboards and incrementally maintained Zobrist hash
//! - move generation and exact make/unmake with undo records
//! - the game state machine with terminal adjudication
//! - the tensor encoders used by the neural collaborators
//!
//! Search (alpha-beta, MCTS) and self-play live in sibling crates.

pub mod board;
pub mod encode;
pub mod moves;
pub mod state;
pub mod zobrist;

pub use board::{
    coord_of, index_of, is_outer, jumps, neighbor_mask, neighbors, outer_mask,
    tight_triangle_masks, Board, CellState, HexCoord, BOARD_N, BOARD_RADIUS,
};
pub use encode::{
    axial_to_index, board_index_to_grid, encode_board_tensor, encode_nn_inputs, GRID_SIZE,
    NN_GLOBALS, NN_PLANES, PLANE_CNT, TENSOR_LEN,
};
pub use moves::{generate_moves, preview_infected, Move, Undo};
pub use state::{GameError, GameState};
