//! Static position evaluation over bitboards.
//!
//! Three popcount terms, each a my-minus-opponent difference, so the score
//! is antisymmetric in the two sides by construction:
//!
//! - material: piece count
//! - edge: pieces on the outer ring (hard to infect from behind)
//! - structure: connected components containing a tight triangle, three
//!   mutually adjacent own cells
//!
//! The value depends only on the position, never on move history.

use hexxagon_core::{neighbor_mask, outer_mask, tight_triangle_masks, Board, CellState};

pub const PIECE_W: i32 = 10;
pub const EDGE_W: i32 = 2;
pub const TRI_W: i32 = 15;

/// Score of `b` from `side`'s perspective.
pub fn evaluate(b: &Board, side: CellState) -> i32 {
    let my = b.side_mask(side);
    let op = b.side_mask(side.opponent());

    let piece_score = (my.count_ones() as i32 - op.count_ones() as i32) * PIECE_W;

    let edge = outer_mask();
    let edge_score =
        ((my & edge).count_ones() as i32 - (op & edge).count_ones() as i32) * EDGE_W;

    let triangle_score = (count_triangle_components(my) - count_triangle_components(op)) * TRI_W;

    piece_score + edge_score + triangle_score
}

/// Grow the connected component of `seed` within `mask` under 6-neighbour
/// adjacency, as a pure bitmask BFS.
fn flood_component(seed: u64, mask: u64) -> u64 {
    let mut comp = seed;
    let mut frontier = seed;
    while frontier != 0 {
        let mut adjacent = 0u64;
        let mut f = frontier;
        while f != 0 {
            let i = f.trailing_zeros() as usize;
            f &= f - 1;
            adjacent |= neighbor_mask(i);
        }
        let next = adjacent & mask & !comp;
        if next == 0 {
            break;
        }
        comp |= next;
        frontier = next;
    }
    comp
}

fn component_has_tight_triangle(comp: u64) -> bool {
    if comp.count_ones() < 3 {
        return false;
    }
    tight_triangle_masks()
        .iter()
        .any(|&tri| comp & tri == tri)
}

/// Number of connected components of `mask` containing at least one tight
/// triangle. Each component counts once no matter how many triangles it
/// holds.
pub fn count_triangle_components(mask: u64) -> i32 {
    let mut count = 0;
    let mut remain = mask;
    while remain != 0 {
        let seed = remain & remain.wrapping_neg();
        let comp = flood_component(seed, mask);
        if component_has_tight_triangle(comp) {
            count += 1;
        }
        remain &= !comp;
    }
    count
}
