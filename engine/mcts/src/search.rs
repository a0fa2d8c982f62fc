//! The UCT search loop: select, expand, evaluate, back up.
//!
//! Leaf evaluation is a bounded random rollout unless a policy-value
//! predictor is attached, in which case its scalar value is used directly
//! and its policy seeds the root priors. Predictor failures silently fall
//! back to rollouts; the search must complete either way.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, trace};

use hexxagon_core::{
    axial_to_index, generate_moves, preview_infected, Board, CellState, Move, GRID_SIZE,
};
use hexxagon_search::predict::Predictor;

use crate::config::MctsConfig;
use crate::node::MctsNode;
use crate::tree::MctsTree;

/// Slots of the visit histogram: one per 9x9 grid cell, indexed by the
/// destination of each root move.
pub const VISIT_SLOTS: usize = GRID_SIZE * GRID_SIZE;

/// Outcome of a search.
#[derive(Debug, Clone)]
pub struct MctsResult {
    /// Most-visited root move.
    pub best: Move,
    /// Root visit counts over the destination grid, the training policy
    /// target.
    pub visits: [u32; VISIT_SLOTS],
    /// Iterations actually run.
    pub simulations: u32,
    /// Mean root value in the root player's perspective.
    pub root_value: f64,
}

pub struct MctsSearch {
    tree: MctsTree,
    root_board: Board,
    root_player: CellState,
    config: MctsConfig,
    predictor: Option<Arc<Mutex<dyn Predictor + Send>>>,
    root_prior: Option<Vec<f32>>,
}

impl MctsSearch {
    pub fn new(board: &Board, player: CellState, config: MctsConfig) -> Self {
        let moves = gated_moves(board, player, player, config.allow_jump);
        let root = MctsNode::new(crate::node::NodeId::NONE, None, player, moves);
        Self {
            tree: MctsTree::new(root),
            root_board: board.clone(),
            root_player: player,
            config,
            predictor: None,
            root_prior: None,
        }
    }

    /// Attach a predictor: its policy becomes the root prior, its value
    /// replaces rollouts at the leaves.
    pub fn with_predictor(mut self, p: Arc<Mutex<dyn Predictor + Send>>) -> Self {
        {
            let mut guard = match p.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.predict(&self.root_board, self.root_player, None) {
                Ok(pred) if pred.policy.len() >= VISIT_SLOTS => {
                    self.root_prior = Some(pred.policy);
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "root prior unavailable, using uniform"),
            }
        }
        self.predictor = Some(p);
        self
    }

    /// Run the configured number of simulations (or until the deadline)
    /// and return the most-visited root move. `None` iff the root has no
    /// legal move.
    pub fn run(&mut self, rng: &mut ChaCha20Rng) -> Option<MctsResult> {
        let simulations = if self.config.simulations == 0 && self.config.time_budget.is_none() {
            MctsConfig::DEFAULT_SIMULATIONS
        } else {
            self.config.simulations
        };
        let deadline = self.config.time_budget.map(|d| Instant::now() + d);

        let mut iterations = 0u32;
        loop {
            if simulations > 0 && iterations >= simulations {
                break;
            }
            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    break;
                }
            }
            self.simulate(rng);
            iterations += 1;
        }

        let (best, _) = self.tree.best_root_move()?;
        let root = self.tree.get(self.tree.root());
        let mut visits = [0u32; VISIT_SLOTS];
        for &(mv, id) in &root.children {
            let slot = axial_to_index(mv.to);
            if slot < VISIT_SLOTS {
                visits[slot] = self.tree.get(id).visits;
            }
        }
        trace!(
            simulations = iterations,
            nodes = self.tree.len(),
            root_value = root.q(),
            "mcts finished"
        );
        Some(MctsResult {
            best,
            visits,
            simulations: iterations,
            root_value: root.q(),
        })
    }

    fn simulate(&mut self, rng: &mut ChaCha20Rng) {
        let mut b = self.root_board.clone();
        let mut cur = self.tree.root();

        // Selection.
        while self.tree.get(cur).is_interior() {
            let Some((mv, child)) = self.tree.select_child(cur, self.config.c_uct) else {
                break;
            };
            let side = self.tree.get(cur).player_to_move;
            b.make(mv, side);
            cur = child;
        }

        // Expansion: one move off the unexpanded queue.
        if !self.tree.get(cur).terminal {
            if let Some(mv) = self.tree.get_mut(cur).unexpanded.pop() {
                let side = self.tree.get(cur).player_to_move;
                b.make(mv, side);
                let next = side.opponent();
                let moves = gated_moves(&b, next, self.root_player, self.config.allow_jump);
                let mut child = MctsNode::new(cur, Some(mv), next, moves);
                child.prior = self.child_prior(cur, mv, &child);
                cur = self.tree.add_child(cur, mv, child);
            }
        }

        // Evaluation.
        let node = self.tree.get(cur);
        let leaf_value = if node.terminal {
            terminal_value(&b, self.root_player)
        } else {
            self.leaf_value(&b, node.player_to_move, rng)
        };

        self.tree.backup(cur, self.root_player, leaf_value);
    }

    /// Root children draw their prior from the network policy when one is
    /// attached; everywhere else the prior is uniform over the child's own
    /// move count, matching a no-knowledge UCT.
    fn child_prior(&self, parent: crate::node::NodeId, mv: Move, child: &MctsNode) -> f64 {
        if parent == self.tree.root() {
            if let Some(prior) = &self.root_prior {
                let slot = axial_to_index(mv.to);
                if let Some(&p) = prior.get(slot) {
                    return p as f64 + 1e-6;
                }
            }
        }
        let total = child.unexpanded.len() + child.children.len();
        if total > 0 {
            1.0 / total as f64
        } else {
            1.0
        }
    }

    /// Value of a non-terminal leaf in the root player's perspective.
    fn leaf_value(&self, b: &Board, to_move: CellState, rng: &mut ChaCha20Rng) -> f64 {
        if let Some(p) = &self.predictor {
            let mut guard = match p.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.predict(b, to_move, None) {
                Ok(pred) => {
                    let v = f64::from(pred.value).clamp(-1.0, 1.0);
                    return if to_move == self.root_player { v } else { -v };
                }
                Err(e) => trace!(error = %e, "value inference failed, rolling out"),
            }
        }
        rollout(
            b.clone(),
            to_move,
            self.root_player,
            self.config.allow_jump,
            self.config.rollout_plies,
            rng,
        )
    }
}

/// Legal moves for `side`, with the root player's jump gate applied: while
/// jumps are locked the root player sticks to clones, unless only jumps
/// exist.
fn gated_moves(b: &Board, side: CellState, root_player: CellState, allow_jump: bool) -> Vec<Move> {
    let mut moves = generate_moves(b, side);
    if side != root_player || allow_jump {
        return moves;
    }
    let clones = moves.iter().filter(|m| m.is_clone()).count();
    if clones > 0 {
        moves.retain(|m| m.is_clone());
    }
    moves
}

/// `{-1, 0, +1}` from the piece-count difference.
fn terminal_value(b: &Board, root_player: CellState) -> f64 {
    let diff = b.count_pieces(root_player) as i64
        - b.count_pieces(root_player.opponent()) as i64;
    match diff.signum() {
        1 => 1.0,
        -1 => -1.0,
        _ => 0.0,
    }
}

/// Pick a rollout move: prefer clones; failing that drop zero-infect
/// jumps; pick uniformly from what remains.
fn rollout_policy(
    b: &Board,
    side: CellState,
    root_player: CellState,
    can_jump: bool,
    rng: &mut ChaCha20Rng,
) -> Option<Move> {
    let moves = gated_moves(b, side, root_player, can_jump);
    if moves.is_empty() {
        return None;
    }
    let clones: Vec<Move> = moves.iter().copied().filter(|m| m.is_clone()).collect();
    let candidates = if !clones.is_empty() {
        clones
    } else {
        let infecting: Vec<Move> = moves
            .iter()
            .copied()
            .filter(|m| !(m.is_jump() && preview_infected(b, *m, side) == 0))
            .collect();
        if infecting.is_empty() {
            moves
        } else {
            infecting
        }
    };
    Some(candidates[rng.gen_range(0..candidates.len())])
}

/// Play random-ish moves to the ply bound (or until someone is stuck) and
/// score the final position by piece-count sign.
fn rollout(
    mut b: Board,
    to_move: CellState,
    root_player: CellState,
    allow_jump: bool,
    max_plies: u32,
    rng: &mut ChaCha20Rng,
) -> f64 {
    let mut cur = to_move;
    let mut can_jump = allow_jump;
    for _ in 0..max_plies {
        let Some(mv) = rollout_policy(&b, cur, root_player, can_jump, rng) else {
            break;
        };
        b.make(mv, cur);
        // An enemy infection unlocks jumping for the rest of the playout.
        if b.last_mover == root_player.opponent() && b.last_infect > 0 {
            can_jump = true;
        }
        cur = cur.opponent();
    }
    terminal_value(&b, root_player)
}

/// Most-visited move after `sims` simulations (or a time budget). Both
/// zero means [`MctsConfig::DEFAULT_SIMULATIONS`].
pub fn find_best_move_mcts(
    b: &Board,
    player: CellState,
    sims: u32,
    time_budget: Option<std::time::Duration>,
    allow_jump: bool,
    rng: &mut ChaCha20Rng,
) -> Option<Move> {
    let mut config = MctsConfig::default()
        .with_simulations(sims)
        .with_allow_jump(allow_jump);
    config.time_budget = time_budget;
    MctsSearch::new(b, player, config)
        .run(rng)
        .map(|r| r.best)
}

/// As [`find_best_move_mcts`], also returning the root visit histogram
/// used as the self-play policy target.
pub fn find_best_move_mcts_with_visits(
    b: &Board,
    player: CellState,
    sims: u32,
    time_budget: Option<std::time::Duration>,
    allow_jump: bool,
    rng: &mut ChaCha20Rng,
) -> Option<(Move, [u32; VISIT_SLOTS])> {
    let sims = if sims == 0 && time_budget.is_none() {
        MctsConfig::SELFPLAY_SIMULATIONS
    } else {
        sims
    };
    let mut config = MctsConfig::default()
        .with_simulations(sims)
        .with_allow_jump(allow_jump);
    config.time_budget = time_budget;
    MctsSearch::new(b, player, config)
        .run(rng)
        .map(|r| (r.best, r.visits))
}
