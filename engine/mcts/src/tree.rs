//! Arena-allocated MCTS tree.
//!
//! All nodes sit in one contiguous `Vec`; parents and children refer to
//! each other through [`NodeId`] indices. Dropping the tree frees
//! everything at once.

use hexxagon_core::Move;

use crate::node::{MctsNode, NodeId};

#[derive(Debug)]
pub struct MctsTree {
    nodes: Vec<MctsNode>,
    root: NodeId,
}

impl MctsTree {
    pub fn new(root: MctsNode) -> Self {
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &MctsNode {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode {
        &mut self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate `node` and link it under `parent` via `mv`.
    pub fn add_child(&mut self, parent: NodeId, mv: Move, node: MctsNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.get_mut(parent).children.push((mv, id));
        id
    }

    /// UCT selection among the children of `id`:
    /// `Q + c * prior * sqrt(parent_visits) / (1 + child_visits)`.
    pub fn select_child(&self, id: NodeId, c_uct: f64) -> Option<(Move, NodeId)> {
        let node = self.get(id);
        let parent_visits = (node.visits.max(1)) as f64;
        let sqrt_parent = parent_visits.sqrt();

        let mut best: Option<(Move, NodeId)> = None;
        let mut best_score = f64::NEG_INFINITY;
        for &(mv, child_id) in &node.children {
            let child = self.get(child_id);
            let u = c_uct * child.prior * sqrt_parent / (1.0 + child.visits as f64);
            let score = child.q() + u;
            if score > best_score {
                best_score = score;
                best = Some((mv, child_id));
            }
        }
        best
    }

    /// Walk from `leaf` to the root adding `value` (root-player
    /// perspective) with the sign of each node's side to move.
    pub fn backup(&mut self, leaf: NodeId, root_player: hexxagon_core::CellState, value: f64) {
        let mut cur = leaf;
        while cur.is_some() {
            let node = self.get_mut(cur);
            node.visits += 1;
            if node.player_to_move == root_player {
                node.value_sum += value;
            } else {
                node.value_sum -= value;
            }
            cur = node.parent;
        }
    }

    /// Root child with the most visits.
    pub fn best_root_move(&self) -> Option<(Move, u32)> {
        self.get(self.root)
            .children
            .iter()
            .map(|&(mv, id)| (mv, self.get(id).visits))
            .max_by_key(|&(_, visits)| visits)
    }
}
