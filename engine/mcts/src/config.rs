//! MCTS configuration.

use std::time::Duration;

/// Tunables for a single MCTS search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Simulations to run. Zero with no time budget falls back to
    /// [`MctsConfig::DEFAULT_SIMULATIONS`].
    pub simulations: u32,

    /// Optional wall-clock budget, checked between iterations.
    pub time_budget: Option<Duration>,

    /// Exploration constant in the UCT formula.
    pub c_uct: f64,

    /// Ply bound for random rollouts.
    pub rollout_plies: u32,

    /// Whether the root player may jump before an infection unlocks them.
    pub allow_jump: bool,
}

impl MctsConfig {
    pub const DEFAULT_SIMULATIONS: u32 = 2000;

    /// Simulations per move during self-play, where throughput matters
    /// more than single-move strength.
    pub const SELFPLAY_SIMULATIONS: u32 = 800;

    pub fn with_simulations(mut self, n: u32) -> Self {
        self.simulations = n;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_allow_jump(mut self, allow: bool) -> Self {
        self.allow_jump = allow;
        self
    }

    /// Config for self-play generation.
    pub fn for_selfplay() -> Self {
        Self {
            simulations: Self::SELFPLAY_SIMULATIONS,
            ..Self::default()
        }
    }
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            simulations: Self::DEFAULT_SIMULATIONS,
            time_budget: None,
            c_uct: 1.4,
            rollout_plies: 64,
            allow_jump: true,
        }
    }
}
