//! Board-to-tensor encoders for the external neural collaborators.
//!
//! Both encoders map the 61-cell hexagon onto a dense 9x9 grid via
//! `(q, r) -> (r+4)*9 + (q+4)`. Grid cells outside the hexagon exist only
//! in the blocked plane. The 3-plane tensor is the self-play training
//! input; the wider spatial/global pair feeds the policy-value network.

use once_cell::sync::Lazy;

use crate::board::{coord_of, Board, CellState, HexCoord, BOARD_N, BOARD_RADIUS};

/// Side length of the dense grid covering `q, r` in `[-4, 4]`.
pub const GRID_SIZE: usize = 9;

/// Planes of the training tensor: own pieces, opponent pieces, blocked.
pub const PLANE_CNT: usize = 3;

/// Length of the flattened training tensor.
pub const TENSOR_LEN: usize = PLANE_CNT * GRID_SIZE * GRID_SIZE;

/// Spatial planes of the policy-value network input.
pub const NN_PLANES: usize = 22;

/// Length of the network's global feature vector.
pub const NN_GLOBALS: usize = 19;

struct GridTables {
    /// For each of the 81 grid slots, whether it is a playable cell.
    in_board: [bool; GRID_SIZE * GRID_SIZE],
    /// Board index -> grid slot.
    board_to_grid: [usize; BOARD_N],
}

static GRID: Lazy<GridTables> = Lazy::new(|| {
    let mut in_board = [false; GRID_SIZE * GRID_SIZE];
    for y in 0..GRID_SIZE {
        for x in 0..GRID_SIZE {
            let c = HexCoord::new(x as i32 - BOARD_RADIUS, y as i32 - BOARD_RADIUS);
            in_board[y * GRID_SIZE + x] = c.in_bounds();
        }
    }
    let mut board_to_grid = [0usize; BOARD_N];
    for (i, slot) in board_to_grid.iter_mut().enumerate() {
        *slot = axial_to_index(coord_of(i));
    }
    GridTables {
        in_board,
        board_to_grid,
    }
});

/// Grid slot of an axial coordinate: `(r+4)*9 + (q+4)`. The caller is
/// responsible for passing an in-grid coordinate.
#[inline]
pub fn axial_to_index(c: HexCoord) -> usize {
    ((c.r + BOARD_RADIUS) * GRID_SIZE as i32 + (c.q + BOARD_RADIUS)) as usize
}

/// Whether grid slot `g` corresponds to a playable cell.
#[inline]
pub fn grid_in_board(g: usize) -> bool {
    GRID.in_board[g]
}

/// Grid slot of board cell `i`.
#[inline]
pub fn board_index_to_grid(i: usize) -> usize {
    GRID.board_to_grid[i]
}

/// Encode the board into the 3-plane training tensor from `me`'s point of
/// view: plane 0 own pieces, plane 1 opponent pieces, plane 2 blocked
/// (including everything outside the hexagon).
pub fn encode_board_tensor(b: &Board, me: CellState) -> [f32; TENSOR_LEN] {
    let mut t = [0.0f32; TENSOR_LEN];
    let plane = GRID_SIZE * GRID_SIZE;

    for (g, &in_board) in GRID.in_board.iter().enumerate() {
        if !in_board {
            t[2 * plane + g] = 1.0;
        }
    }

    let opp = me.opponent();
    for i in 0..BOARD_N {
        let s = b.get(i);
        if s == CellState::Empty {
            continue;
        }
        let g = GRID.board_to_grid[i];
        if s == me {
            t[g] = 1.0;
        } else if s == opp {
            t[plane + g] = 1.0;
        } else {
            t[2 * plane + g] = 1.0;
        }
    }
    t
}

/// Encode the board for the policy-value network.
///
/// Spatial planes: 0 all ones, 1 own pieces, 2 opponent pieces, 3 blocked
/// (out-of-board plus on-board obstacles), 4 one-hot of the selected piece
/// when a two-stage policy provides one, remaining planes zero. Global
/// vector: slot 0 flags the selection stage, slot 9 is always one.
///
/// `selected_grid` is a grid slot (see [`board_index_to_grid`]).
pub fn encode_nn_inputs(
    b: &Board,
    me: CellState,
    selected_grid: Option<usize>,
) -> (Vec<f32>, Vec<f32>) {
    let plane = GRID_SIZE * GRID_SIZE;
    let mut spatial = vec![0.0f32; NN_PLANES * plane];
    let mut global = vec![0.0f32; NN_GLOBALS];

    for g in 0..plane {
        spatial[g] = 1.0;
        if !GRID.in_board[g] {
            spatial[3 * plane + g] = 1.0;
        }
    }

    let opp = me.opponent();
    for i in 0..BOARD_N {
        let g = GRID.board_to_grid[i];
        match b.get(i) {
            s if s == me => spatial[plane + g] = 1.0,
            s if s == opp => spatial[2 * plane + g] = 1.0,
            CellState::Blocked => spatial[3 * plane + g] = 1.0,
            _ => {}
        }
    }

    if let Some(sel) = selected_grid {
        if sel < plane {
            spatial[4 * plane + sel] = 1.0;
        }
        global[0] = 1.0;
    }
    global[9] = 1.0;

    (spatial, global)
}
