//! Full game state: board, side to move, scores and terminal adjudication.

use thiserror::Error;
use tracing::debug;

use crate::board::{coord_of, is_outer, neighbors, Board, CellState, HexCoord, BOARD_N, BOARD_RADIUS};
use crate::moves::{generate_moves, Move};

/// Errors surfaced at the game-state boundary. The search layer never sees
/// these: it only plays moves produced by the generator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("game is already over")]
    GameOver,
    #[error("move origin is not a piece of the side to move")]
    NotOwnPiece,
    #[error("move destination is not empty")]
    DestinationNotEmpty,
    #[error("move is neither a clone nor a jump")]
    BadDistance,
}

/// A running game. Created via [`GameState::new`]; advanced via
/// [`GameState::make_move`], which applies the terminal rules after every
/// move.
#[derive(Debug, Clone)]
pub struct GameState {
    pub board: Board,
    pub current_player: CellState,
    pub score_a: u32,
    pub score_b: u32,
    pub game_over: bool,
    /// `Some(player)` once decided; `None` is a draw when `game_over`.
    pub winner: Option<CellState>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Initial position: three PlayerA pieces and three PlayerB pieces at
    /// opposite corners, three blocked cells near the centre, PlayerA to
    /// move.
    pub fn new() -> Self {
        let r = BOARD_RADIUS;
        let mut board = Board::new();
        for c in [
            HexCoord::new(r, 0),
            HexCoord::new(0, -r),
            HexCoord::new(-r, r),
        ] {
            board.set_coord(c, CellState::PlayerA);
        }
        for c in [
            HexCoord::new(-r, 0),
            HexCoord::new(0, r),
            HexCoord::new(r, -r),
        ] {
            board.set_coord(c, CellState::PlayerB);
        }
        for c in [
            HexCoord::new(1, 0),
            HexCoord::new(-1, 1),
            HexCoord::new(0, -1),
        ] {
            board.set_coord(c, CellState::Blocked);
        }

        let mut gs = Self {
            board,
            current_player: CellState::PlayerA,
            score_a: 0,
            score_b: 0,
            game_over: false,
            winner: None,
        };
        gs.update_scores();
        gs
    }

    /// Reset to the initial position.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn update_scores(&mut self) {
        self.score_a = self.board.count_pieces(CellState::PlayerA);
        self.score_b = self.board.count_pieces(CellState::PlayerB);
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.score_a, self.score_b)
    }

    /// Validate and play a move for the current player, then evaluate the
    /// terminal conditions. Returns the number of stones infected.
    pub fn make_move(&mut self, m: Move) -> Result<u32, GameError> {
        if self.game_over {
            return Err(GameError::GameOver);
        }
        if self.board.get_coord(m.from) != self.current_player {
            return Err(GameError::NotOwnPiece);
        }
        if self.board.get_coord(m.to) != CellState::Empty {
            return Err(GameError::DestinationNotEmpty);
        }
        if !m.is_clone() && !m.is_jump() {
            return Err(GameError::BadDistance);
        }

        let mover = self.current_player;
        self.board.make(m, mover);
        let infected = self.board.last_infect;
        self.update_scores();

        let empties = self.board.count_empty();
        let next = mover.opponent();
        let next_has_moves = !generate_moves(&self.board, next).is_empty();

        // Opponent stuck while empties remain: every empty cell goes to the
        // mover and the game ends on counts.
        if !next_has_moves && empties > 0 {
            self.claim_all_empty(mover);
            self.update_scores();
            self.finish();
            return Ok(infected);
        }

        if self.score_a == 0 || self.score_b == 0 || empties == 0 {
            self.fill_enclosed_regions();
            self.update_scores();
            self.finish();
            return Ok(infected);
        }

        self.current_player = next;
        Ok(infected)
    }

    fn finish(&mut self) {
        self.game_over = true;
        self.winner = match self.score_a.cmp(&self.score_b) {
            std::cmp::Ordering::Greater => Some(CellState::PlayerA),
            std::cmp::Ordering::Less => Some(CellState::PlayerB),
            std::cmp::Ordering::Equal => None,
        };
        debug!(
            score_a = self.score_a,
            score_b = self.score_b,
            winner = ?self.winner,
            "game over"
        );
    }

    /// Award every empty cell to `owner`. Used when the opponent has no
    /// legal reply while empties remain.
    fn claim_all_empty(&mut self, owner: CellState) {
        for i in 0..BOARD_N {
            if self.board.get(i) == CellState::Empty {
                self.board.write_cell(i, owner);
            }
        }
    }

    /// Resolve enclosed territory: a contiguous empty region that does not
    /// touch the outer ring and whose boundary holds exactly one colour is
    /// awarded to that colour.
    fn fill_enclosed_regions(&mut self) {
        let mut visited = [false; BOARD_N];

        for start in 0..BOARD_N {
            if visited[start] || self.board.get(start) != CellState::Empty {
                continue;
            }

            let mut queue = vec![start];
            let mut region = vec![start];
            visited[start] = true;
            let mut touches_border = false;
            let mut border_a = false;
            let mut border_b = false;

            while let Some(cur) = queue.pop() {
                if is_outer(cur) {
                    touches_border = true;
                }
                for &nb in neighbors(cur) {
                    match self.board.get(nb) {
                        CellState::Empty => {
                            if !visited[nb] {
                                visited[nb] = true;
                                queue.push(nb);
                                region.push(nb);
                            }
                        }
                        CellState::Blocked => {}
                        CellState::PlayerA => border_a = true,
                        CellState::PlayerB => border_b = true,
                    }
                }
            }

            if !touches_border && (border_a != border_b) {
                let owner = if border_a {
                    CellState::PlayerA
                } else {
                    CellState::PlayerB
                };
                debug!(cells = region.len(), owner = ?owner, at = ?coord_of(start), "awarding enclosed region");
                for idx in region {
                    self.board.write_cell(idx, owner);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::index_of;

    #[test]
    fn initial_position_layout() {
        let gs = GameState::new();
        assert_eq!(gs.current_player, CellState::PlayerA);
        assert_eq!(gs.scores(), (3, 3));
        assert!(!gs.game_over);
        assert_eq!(gs.board.count_empty(), 52);

        for c in [
            HexCoord::new(4, 0),
            HexCoord::new(0, -4),
            HexCoord::new(-4, 4),
        ] {
            assert_eq!(gs.board.get_coord(c), CellState::PlayerA);
        }
        for c in [
            HexCoord::new(-4, 0),
            HexCoord::new(0, 4),
            HexCoord::new(4, -4),
        ] {
            assert_eq!(gs.board.get_coord(c), CellState::PlayerB);
        }
        for c in [
            HexCoord::new(1, 0),
            HexCoord::new(-1, 1),
            HexCoord::new(0, -1),
        ] {
            assert_eq!(gs.board.get_coord(c), CellState::Blocked);
        }
    }

    #[test]
    fn rejects_moves_at_the_boundary() {
        let mut gs = GameState::new();
        // Not our piece.
        assert_eq!(
            gs.make_move(Move::new(HexCoord::new(-4, 0), HexCoord::new(-3, 0))),
            Err(GameError::NotOwnPiece)
        );
        // Occupied destination.
        assert_eq!(
            gs.make_move(Move::new(HexCoord::new(4, 0), HexCoord::new(4, -4))),
            Err(GameError::DestinationNotEmpty)
        );
        // Distance 4.
        assert_eq!(
            gs.make_move(Move::new(HexCoord::new(4, 0), HexCoord::new(0, 0))),
            Err(GameError::BadDistance)
        );
    }

    #[test]
    fn legal_move_switches_sides() {
        let mut gs = GameState::new();
        gs.make_move(Move::new(HexCoord::new(4, 0), HexCoord::new(3, 0)))
            .unwrap();
        assert_eq!(gs.current_player, CellState::PlayerB);
        assert_eq!(gs.scores(), (4, 3));
        assert!(!gs.game_over);
    }

    #[test]
    fn stuck_opponent_forfeits_all_empties() {
        // B's lone piece is smothered by A's reply.
        let mut gs = GameState::new();
        let mut board = Board::new();
        // A single B stone in the corner with its escape cells controlled.
        board.set_coord(HexCoord::new(-4, 0), CellState::PlayerB);
        // Ring every cell within distance 2 of the B stone with A pieces,
        // except one empty cell A is about to take.
        for i in 0..BOARD_N {
            let c = coord_of(i);
            let d = c.distance(HexCoord::new(-4, 0));
            if (1..=2).contains(&d) && c != HexCoord::new(-3, 0) {
                board.set_coord(c, CellState::PlayerA);
            }
        }
        gs.board = board;
        gs.current_player = CellState::PlayerA;
        gs.game_over = false;
        gs.winner = None;
        gs.update_scores();

        // Taking (-3,0) infects the B stone; B then has nothing at all.
        gs.make_move(Move::new(HexCoord::new(-2, 0), HexCoord::new(-3, 0)))
            .unwrap();
        assert!(gs.game_over);
        assert_eq!(gs.winner, Some(CellState::PlayerA));
        assert_eq!(gs.board.count_empty(), 0);
        assert_eq!(gs.score_b, 0);
    }

    #[test]
    fn enclosed_region_goes_to_the_enclosing_colour() {
        let mut gs = GameState::new();
        let mut board = Board::new();
        // A pocket: empty cell (0,0) enclosed entirely by PlayerA, away
        // from the outer ring.
        let pocket = HexCoord::new(0, 0);
        for &nb in neighbors(index_of(pocket).unwrap()) {
            board.set_coord(coord_of(nb), CellState::PlayerA);
        }
        board.set_coord(HexCoord::new(4, 0), CellState::PlayerB);
        gs.board = board;
        gs.update_scores();

        gs.fill_enclosed_regions();

        // The pocket is sealed by a single colour and does not touch the
        // outer ring; the open space around (4,0) does and stays empty.
        assert_eq!(gs.board.get_coord(pocket), CellState::PlayerA);
        assert_eq!(gs.board.get_coord(HexCoord::new(3, 0)), CellState::Empty);
    }

    #[test]
    fn mixed_border_region_is_not_awarded() {
        let mut gs = GameState::new();
        let mut board = Board::new();
        let pocket = HexCoord::new(0, 0);
        let ring = neighbors(index_of(pocket).unwrap()).to_vec();
        for (k, &nb) in ring.iter().enumerate() {
            let colour = if k == 0 {
                CellState::PlayerB
            } else {
                CellState::PlayerA
            };
            board.set_coord(coord_of(nb), colour);
        }
        gs.board = board;
        gs.update_scores();

        gs.fill_enclosed_regions();
        assert_eq!(gs.board.get_coord(pocket), CellState::Empty);
    }
}
