//! Moves, move generation, and incremental make/unmake.
//!
//! A move is a `(from, to)` coordinate pair; its kind is derived from the
//! direction tables: distance 1 is a clone (the origin keeps its piece),
//! distance 2 is a jump (the origin is vacated). Either way the destination
//! receives a piece and every enemy neighbour of the destination is infected.

use crate::board::{
    coord_of, index_of, jumps, neighbors, Board, CellState, HexCoord, CLONE_DIRS, JUMP_DIRS,
};

/// A move from one cell to another. Kind is derived, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: HexCoord,
    pub to: HexCoord,
}

impl Move {
    pub const fn new(from: HexCoord, to: HexCoord) -> Self {
        Self { from, to }
    }

    /// Clone move: `to - from` is one of the six neighbour offsets.
    #[inline]
    pub fn is_clone(self) -> bool {
        let d = HexCoord::new(self.to.q - self.from.q, self.to.r - self.from.r);
        CLONE_DIRS.contains(&d)
    }

    /// Jump move: `to - from` is one of the twelve distance-2 offsets.
    #[inline]
    pub fn is_jump(self) -> bool {
        let d = HexCoord::new(self.to.q - self.from.q, self.to.r - self.from.r);
        JUMP_DIRS.contains(&d)
    }
}

/// Record of the cells a move changed, enough to restore `cells`, both
/// bitboards, the hash and the move metadata exactly. A move touches at
/// most 8 cells (origin, destination, six infected neighbours).
#[derive(Debug)]
pub struct Undo {
    changed: Vec<(u8, CellState)>,
    prev_last_move: Option<Move>,
    prev_last_mover: CellState,
    prev_last_infect: u32,
}

impl Undo {
    /// Number of cells the move changed. Zero for a no-op make.
    pub fn touched(&self) -> usize {
        self.changed.len()
    }
}

/// Enumerate all legal moves for `side`: for every own piece, clones to
/// empty neighbours first, then jumps to empty distance-2 cells, in index
/// order. The returned buffer is owned by the caller; the filter pipeline
/// compacts it in place.
pub fn generate_moves(b: &Board, side: CellState) -> Vec<Move> {
    let mut moves = Vec::with_capacity(64);
    let mut occupied = b.side_mask(side);
    while occupied != 0 {
        let i = occupied.trailing_zeros() as usize;
        occupied &= occupied - 1;
        let from = coord_of(i);
        for &to in neighbors(i) {
            if b.get(to) == CellState::Empty {
                moves.push(Move::new(from, coord_of(to)));
            }
        }
        for &to in jumps(i) {
            if b.get(to) == CellState::Empty {
                moves.push(Move::new(from, coord_of(to)));
            }
        }
    }
    moves
}

/// Count the enemy neighbours of `m.to` without touching the board: the
/// number of stones the move would infect.
#[inline]
pub fn preview_infected(b: &Board, m: Move, side: CellState) -> u32 {
    let Some(to) = index_of(m.to) else {
        return 0;
    };
    let opp = side.opponent();
    let mut count = 0;
    for &j in neighbors(to) {
        if b.get(j) == opp {
            count += 1;
        }
    }
    count
}

impl Board {
    #[inline]
    fn set_recorded(&mut self, i: usize, s: CellState, undo: &mut Undo) {
        let prev = self.get(i);
        if prev == s {
            return;
        }
        undo.changed.push((i as u8, prev));
        self.write_cell(i, s);
    }

    /// Apply `m` for `player`, returning the undo record.
    ///
    /// Moves with coordinates off the board are a no-op producing an empty
    /// undo; the search never emits such moves and API boundaries validate
    /// before calling in.
    pub fn make(&mut self, m: Move, player: CellState) -> Undo {
        let mut undo = Undo {
            changed: Vec::with_capacity(8),
            prev_last_move: self.last_move,
            prev_last_mover: self.last_mover,
            prev_last_infect: self.last_infect,
        };
        let (Some(from), Some(to)) = (index_of(m.from), index_of(m.to)) else {
            return undo;
        };

        if m.is_jump() {
            self.set_recorded(from, CellState::Empty, &mut undo);
        }
        self.set_recorded(to, player, &mut undo);

        let opp = player.opponent();
        let mut infected = 0;
        for &j in neighbors(to) {
            if self.get(j) == opp {
                self.set_recorded(j, player, &mut undo);
                infected += 1;
            }
        }

        self.last_move = Some(m);
        self.last_mover = player;
        self.last_infect = infected;
        undo
    }

    /// Reverse the corresponding [`Board::make`] exactly. Cells are restored
    /// in reverse write order so the hash and bitboards return bit-exact.
    pub fn unmake(&mut self, undo: Undo) {
        for &(i, prev) in undo.changed.iter().rev() {
            self.write_cell(i as usize, prev);
        }
        self.last_move = undo.prev_last_move;
        self.last_mover = undo.prev_last_mover;
        self.last_infect = undo.prev_last_infect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::coord_of;
    use crate::zobrist;

    fn board_with(pieces: &[(HexCoord, CellState)]) -> Board {
        let mut b = Board::new();
        for &(c, s) in pieces {
            b.set_coord(c, s);
        }
        b
    }

    #[test]
    fn move_kind_from_direction_tables() {
        let clone = Move::new(HexCoord::new(0, 0), HexCoord::new(1, 0));
        assert!(clone.is_clone());
        assert!(!clone.is_jump());

        let jump = Move::new(HexCoord::new(0, 0), HexCoord::new(2, -1));
        assert!(jump.is_jump());
        assert!(!jump.is_clone());

        let too_far = Move::new(HexCoord::new(0, 0), HexCoord::new(3, 0));
        assert!(!too_far.is_clone());
        assert!(!too_far.is_jump());
    }

    #[test]
    fn generation_matches_brute_enumeration() {
        let b = board_with(&[
            (HexCoord::new(0, 0), CellState::PlayerA),
            (HexCoord::new(1, 0), CellState::PlayerB),
            (HexCoord::new(-2, 0), CellState::Blocked),
            (HexCoord::new(2, -2), CellState::PlayerA),
        ]);
        let generated = generate_moves(&b, CellState::PlayerA);

        // Brute force over all (from, to) pairs.
        let mut expected = Vec::new();
        for from_i in 0..crate::board::BOARD_N {
            if b.get(from_i) != CellState::PlayerA {
                continue;
            }
            for to_i in 0..crate::board::BOARD_N {
                if b.get(to_i) != CellState::Empty {
                    continue;
                }
                let d = coord_of(from_i).distance(coord_of(to_i));
                if d == 1 || d == 2 {
                    expected.push(Move::new(coord_of(from_i), coord_of(to_i)));
                }
            }
        }
        assert_eq!(generated.len(), expected.len());
        for m in &expected {
            assert!(generated.contains(m));
        }
    }

    #[test]
    fn clone_keeps_origin_jump_vacates_it() {
        let from = HexCoord::new(0, 0);
        let mut b = board_with(&[(from, CellState::PlayerA)]);

        let clone = Move::new(from, HexCoord::new(0, 1));
        let u = b.make(clone, CellState::PlayerA);
        assert_eq!(b.get_coord(from), CellState::PlayerA);
        assert_eq!(b.get_coord(HexCoord::new(0, 1)), CellState::PlayerA);
        b.unmake(u);

        let jump = Move::new(from, HexCoord::new(2, 0));
        b.make(jump, CellState::PlayerA);
        assert_eq!(b.get_coord(from), CellState::Empty);
        assert_eq!(b.get_coord(HexCoord::new(2, 0)), CellState::PlayerA);
    }

    #[test]
    fn infection_flips_enemy_neighbours() {
        // A at (0,0), B at (1,0); the clone (0,0)->(0,1) converts (1,0).
        let mut b = board_with(&[
            (HexCoord::new(0, 0), CellState::PlayerA),
            (HexCoord::new(1, 0), CellState::PlayerB),
        ]);
        let bit_b_to = 1u64 << index_of(HexCoord::new(1, 0)).unwrap();
        assert_eq!(b.bit_b(), bit_b_to);

        let m = Move::new(HexCoord::new(0, 0), HexCoord::new(0, 1));
        b.make(m, CellState::PlayerA);

        assert_eq!(b.get_coord(HexCoord::new(1, 0)), CellState::PlayerA);
        assert_eq!(b.last_infect, 1);
        assert_eq!(b.last_mover, CellState::PlayerA);
        assert_eq!(b.bit_b(), 0);
        let expected_a = [
            HexCoord::new(0, 0),
            HexCoord::new(0, 1),
            HexCoord::new(1, 0),
        ]
        .iter()
        .fold(0u64, |m, &c| m | 1 << index_of(c).unwrap());
        assert_eq!(b.bit_a(), expected_a);
    }

    #[test]
    fn make_unmake_is_identity() {
        let mut b = board_with(&[
            (HexCoord::new(0, 0), CellState::PlayerA),
            (HexCoord::new(1, 0), CellState::PlayerB),
            (HexCoord::new(0, 1), CellState::PlayerB),
            (HexCoord::new(-1, 0), CellState::PlayerA),
        ]);
        b.last_move = Some(Move::new(HexCoord::new(4, 0), HexCoord::new(3, 0)));
        b.last_mover = CellState::PlayerB;
        b.last_infect = 2;

        let snapshot = (
            b.hash(),
            b.bit_a(),
            b.bit_b(),
            b.last_move,
            b.last_mover,
            b.last_infect,
        );
        let cells: Vec<CellState> = (0..crate::board::BOARD_N).map(|i| b.get(i)).collect();

        let m = Move::new(HexCoord::new(-1, 0), HexCoord::new(1, -1));
        let u = b.make(m, CellState::PlayerA);
        assert!(u.touched() > 0);
        assert_ne!(b.hash(), snapshot.0);
        b.unmake(u);

        assert_eq!(
            (
                b.hash(),
                b.bit_a(),
                b.bit_b(),
                b.last_move,
                b.last_mover,
                b.last_infect
            ),
            snapshot
        );
        for (i, &s) in cells.iter().enumerate() {
            assert_eq!(b.get(i), s);
        }
        assert_eq!(b.hash(), zobrist::recompute_hash(&b));
    }

    #[test]
    fn out_of_board_move_is_a_noop() {
        let mut b = board_with(&[(HexCoord::new(4, 0), CellState::PlayerA)]);
        let before = b.hash();
        let u = b.make(
            Move::new(HexCoord::new(4, 0), HexCoord::new(6, 0)),
            CellState::PlayerA,
        );
        assert_eq!(u.touched(), 0);
        assert_eq!(b.hash(), before);
        b.unmake(u);
        assert_eq!(b.hash(), before);
    }

    #[test]
    fn preview_matches_actual_infection() {
        let mut b = board_with(&[
            (HexCoord::new(0, 0), CellState::PlayerA),
            (HexCoord::new(1, 0), CellState::PlayerB),
            (HexCoord::new(0, 1), CellState::PlayerB),
        ]);
        let m = Move::new(HexCoord::new(0, 0), HexCoord::new(1, 1));
        let preview = preview_infected(&b, m, CellState::PlayerA);
        b.make(m, CellState::PlayerA);
        assert_eq!(preview, b.last_infect);
        assert_eq!(preview, 2);
    }
}
