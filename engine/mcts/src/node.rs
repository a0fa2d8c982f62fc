//! MCTS tree node.
//!
//! Nodes live in an arena (see [`crate::tree`]) and reference each other by
//! index, which keeps the parent links of back-propagation free of
//! reference cycles and the whole tree droppable in one deallocation.

use hexxagon_core::{CellState, Move};

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[inline]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// A node in the search tree. `value_sum` is accumulated in the ROOT
/// player's perspective; the backup step decides the sign from
/// `player_to_move`.
#[derive(Debug)]
pub struct MctsNode {
    /// Parent index (NONE for the root).
    pub parent: NodeId,

    /// Move that led here from the parent (None for the root).
    pub mv: Option<Move>,

    /// Side to move in the position this node represents.
    pub player_to_move: CellState,

    /// Expanded children as (move, node) pairs.
    pub children: Vec<(Move, NodeId)>,

    /// Legal moves not yet expanded; popped one per expansion.
    pub unexpanded: Vec<Move>,

    /// Selection prior.
    pub prior: f64,

    pub visits: u32,
    pub value_sum: f64,

    /// No legal moves at this node.
    pub terminal: bool,
}

impl MctsNode {
    pub fn new(
        parent: NodeId,
        mv: Option<Move>,
        player_to_move: CellState,
        moves: Vec<Move>,
    ) -> Self {
        Self {
            parent,
            mv,
            player_to_move,
            children: Vec::new(),
            terminal: moves.is_empty(),
            unexpanded: moves,
            prior: 1.0,
            visits: 0,
            value_sum: 0.0,
        }
    }

    /// Mean value; zero before the first visit.
    #[inline]
    pub fn q(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f64
        }
    }

    /// Fully expanded and playable: selection may descend through it.
    #[inline]
    pub fn is_interior(&self) -> bool {
        !self.terminal && self.unexpanded.is_empty() && !self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexxagon_core::HexCoord;

    #[test]
    fn node_id_sentinel() {
        assert!(NodeId::NONE.is_none());
        assert!(NodeId(0).is_some());
    }

    #[test]
    fn empty_move_list_marks_terminal() {
        let n = MctsNode::new(NodeId::NONE, None, CellState::PlayerA, Vec::new());
        assert!(n.terminal);
        assert!(!n.is_interior());
    }

    #[test]
    fn q_is_mean_value() {
        let mv = Move::new(HexCoord::new(0, 0), HexCoord::new(1, 0));
        let mut n = MctsNode::new(NodeId(0), Some(mv), CellState::PlayerB, vec![mv]);
        assert_eq!(n.q(), 0.0);
        n.visits = 4;
        n.value_sum = 2.0;
        assert_eq!(n.q(), 0.5);
    }
}
