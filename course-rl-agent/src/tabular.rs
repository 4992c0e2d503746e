//! Tabular Q-learning agent over a dense state/action value table

use async_trait::async_trait;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use course_rl_core::{
    ActionValueFunction, Agent, AgentConfig, AgentMetrics, DiscreteAction, IndexObservation,
    Result, RlError, Transition,
};

/// Configuration for the tabular Q-learning agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularConfig {
    /// Base agent configuration (learning rate, discount, seed)
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Exploration probability
    pub epsilon: f64,
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig::default(),
            epsilon: 0.05,
        }
    }
}

/// Q-learning agent backed by a dense `states x actions` table.
///
/// Entries start at zero and are rewritten in place after every transition
/// with the Bellman update. The bootstrap is always the maximum value of the
/// next state's row, never the index of that maximum.
pub struct TabularQLearner {
    config: TabularConfig,
    q: Array2<f64>,
    rng: StdRng,
    steps: usize,
    episodes: usize,
    episode_reward: f64,
    lifetime_reward: f64,
}

impl TabularQLearner {
    /// Create a new agent with a zero-initialized table
    pub fn new(num_states: usize, num_actions: usize, config: TabularConfig) -> Result<Self> {
        if num_states == 0 || num_actions == 0 {
            return Err(RlError::Agent(
                "table dimensions must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.epsilon) {
            return Err(RlError::Agent(format!(
                "epsilon {} outside [0, 1]",
                config.epsilon
            )));
        }
        if config.base.learning_rate <= 0.0 || config.base.learning_rate > 1.0 {
            return Err(RlError::Agent(format!(
                "learning rate {} outside (0, 1]",
                config.base.learning_rate
            )));
        }

        let rng = match config.base.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            q: Array2::zeros((num_states, num_actions)),
            config,
            rng,
            steps: 0,
            episodes: 0,
            episode_reward: 0.0,
            lifetime_reward: 0.0,
        })
    }

    /// The value table
    #[must_use]
    pub fn q_table(&self) -> &Array2<f64> {
        &self.q
    }

    /// Number of states
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.q.nrows()
    }

    /// Number of actions
    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.q.ncols()
    }

    fn check_state(&self, state: usize) -> Result<()> {
        if state >= self.num_states() {
            return Err(RlError::Environment(format!(
                "state index {state} out of range for {} states",
                self.num_states()
            )));
        }
        Ok(())
    }

    fn check_action(&self, action: usize) -> Result<()> {
        if action >= self.num_actions() {
            return Err(RlError::InvalidAction(format!(
                "action index {action} out of range for {} actions",
                self.num_actions()
            )));
        }
        Ok(())
    }

    /// Update the table entry for `(state, action)` from one transition.
    ///
    /// Non-terminal: `q <- (1 - alpha) q + alpha (r + gamma max_a' Q(s', a'))`.
    /// Terminal: the bootstrap term is dropped.
    pub fn process_experience(
        &mut self,
        state: usize,
        action: usize,
        next_state: usize,
        reward: f64,
        done: bool,
    ) -> Result<()> {
        self.check_state(state)?;
        self.check_action(action)?;
        self.check_state(next_state)?;

        let alpha = self.config.base.learning_rate;
        let old = self.q[[state, action]];
        let new = if done {
            (1.0 - alpha) * old + alpha * reward
        } else {
            let bootstrap = row_max(&self.q, next_state);
            (1.0 - alpha) * old + alpha * (reward + self.config.base.gamma * bootstrap)
        };
        self.q[[state, action]] = new;

        tracing::trace!(state, action, old, new, "q update");
        Ok(())
    }

    /// Greedy action for a state, breaking ties uniformly at random
    pub fn greedy_action(&mut self, state: usize) -> Result<usize> {
        self.check_state(state)?;
        let best = row_max(&self.q, state);
        let tied: Vec<usize> = self
            .q
            .row(state)
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == best)
            .map(|(a, _)| a)
            .collect();
        Ok(tied[self.rng.gen_range(0..tied.len())])
    }

    /// Epsilon-greedy action selection: explore with probability epsilon,
    /// otherwise act greedily with random tie-breaking
    pub fn select_action(&mut self, state: usize) -> Result<usize> {
        self.check_state(state)?;
        if self.rng.gen::<f64>() < self.config.epsilon {
            Ok(self.rng.gen_range(0..self.num_actions()))
        } else {
            self.greedy_action(state)
        }
    }
}

fn row_max(q: &Array2<f64>, state: usize) -> f64 {
    q.row(state).iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v))
}

#[async_trait]
impl Agent for TabularQLearner {
    type Observation = IndexObservation;
    type Action = DiscreteAction;

    async fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action> {
        Ok(DiscreteAction(self.select_action(observation.index)?))
    }

    async fn start_episode(&mut self, _observation: &Self::Observation) -> Result<()> {
        self.episode_reward = 0.0;
        Ok(())
    }

    async fn observe(
        &mut self,
        transition: &Transition<Self::Observation, Self::Action>,
    ) -> Result<()> {
        self.process_experience(
            transition.observation.index,
            transition.action.0,
            transition.next_observation.index,
            transition.reward.0,
            transition.done,
        )?;
        self.steps += 1;
        self.episode_reward += transition.reward.0;
        self.lifetime_reward += transition.reward.0;
        if transition.done {
            self.episodes += 1;
        }
        Ok(())
    }

    async fn save(&self, path: &std::path::Path) -> Result<()> {
        let data = serde_json::json!({
            "config": self.config,
            "q_table": self.q,
        });
        let json = serde_json::to_string_pretty(&data)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn load(&mut self, path: &std::path::Path) -> Result<()> {
        let json = tokio::fs::read_to_string(path).await?;
        let data: serde_json::Value = serde_json::from_str(&json)?;

        if let Some(config) = data.get("config") {
            self.config = serde_json::from_value(config.clone())?;
        }
        if let Some(table) = data.get("q_table") {
            let q: Array2<f64> = serde_json::from_value(table.clone())?;
            if q.dim() != self.q.dim() {
                return Err(RlError::ShapeMismatch {
                    expected: self.q.len(),
                    actual: q.len(),
                });
            }
            self.q = q;
        }
        Ok(())
    }

    fn metrics(&self) -> AgentMetrics {
        AgentMetrics {
            total_steps: self.steps,
            total_episodes: self.episodes,
            lifetime_reward: self.lifetime_reward,
            episode_reward: self.episode_reward,
            ..AgentMetrics::default()
        }
    }
}

#[async_trait]
impl ActionValueFunction for TabularQLearner {
    type Observation = IndexObservation;
    type Action = DiscreteAction;

    async fn q_value(
        &self,
        observation: &Self::Observation,
        action: &Self::Action,
    ) -> Result<f64> {
        self.check_state(observation.index)?;
        self.check_action(action.0)?;
        Ok(self.q[[observation.index, action.0]])
    }

    async fn all_q_values(&self, observation: &Self::Observation) -> Result<Vec<f64>> {
        self.check_state(observation.index)?;
        Ok(self.q.row(observation.index).to_vec())
    }

    async fn best_action_value(
        &self,
        observation: &Self::Observation,
    ) -> Result<(Self::Action, f64)> {
        self.check_state(observation.index)?;
        let row = self.q.row(observation.index);
        let (action, value) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(a, &v)| (a, v))
            .ok_or_else(|| RlError::Agent("empty action set".to_string()))?;
        Ok((DiscreteAction(action), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(epsilon: f64) -> TabularConfig {
        TabularConfig {
            base: AgentConfig {
                learning_rate: 0.1,
                gamma: 0.9,
                seed: Some(17),
                ..AgentConfig::default()
            },
            epsilon,
        }
    }

    #[test]
    fn non_terminal_update_uses_the_value_bootstrap() {
        let mut agent = TabularQLearner::new(3, 2, config(0.0)).unwrap();
        // Next-state row: max value 5.0 sits at action 1
        agent.q[[1, 0]] = 2.0;
        agent.q[[1, 1]] = 5.0;
        agent.q[[0, 0]] = 1.0;

        agent.process_experience(0, 0, 1, 3.0, false).unwrap();
        assert_relative_eq!(agent.q[[0, 0]], 0.9 * 1.0 + 0.1 * (3.0 + 0.9 * 5.0));
    }

    #[test]
    fn terminal_update_drops_the_bootstrap() {
        let mut agent = TabularQLearner::new(3, 2, config(0.0)).unwrap();
        agent.q[[1, 1]] = 100.0;
        agent.q[[0, 0]] = 1.0;

        agent.process_experience(0, 0, 1, 3.0, true).unwrap();
        assert_relative_eq!(agent.q[[0, 0]], 0.9 * 1.0 + 0.1 * 3.0);
    }

    #[test]
    fn greedy_selection_returns_a_row_maximum() {
        let mut agent = TabularQLearner::new(2, 4, config(0.0)).unwrap();
        agent.q[[0, 2]] = 7.0;
        let best = row_max(&agent.q, 0);
        for _ in 0..50 {
            let action = agent.select_action(0).unwrap();
            assert_relative_eq!(agent.q[[0, action]], best);
        }
    }

    #[test]
    fn tied_maxima_are_all_selected() {
        let mut agent = TabularQLearner::new(1, 4, config(0.0)).unwrap();
        agent.q[[0, 1]] = 3.0;
        agent.q[[0, 3]] = 3.0;

        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(agent.select_action(0).unwrap());
        }
        assert_eq!(seen, [1usize, 3usize].into_iter().collect());
    }

    #[test]
    fn selection_is_deterministic_per_seed() {
        let mut a = TabularQLearner::new(4, 4, config(0.3)).unwrap();
        let mut b = TabularQLearner::new(4, 4, config(0.3)).unwrap();
        for state in [0usize, 1, 2, 3, 2, 1, 0, 3] {
            assert_eq!(
                a.select_action(state).unwrap(),
                b.select_action(state).unwrap()
            );
        }
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut agent = TabularQLearner::new(2, 2, config(0.0)).unwrap();
        assert!(agent.select_action(2).is_err());
        assert!(agent.process_experience(0, 5, 1, 0.0, false).is_err());
        assert!(agent.process_experience(0, 0, 9, 0.0, false).is_err());
    }

    #[tokio::test]
    async fn observe_updates_table_and_metrics() {
        let mut agent = TabularQLearner::new(2, 2, config(0.0)).unwrap();
        let transition = Transition::new(
            IndexObservation::new(0, 2).unwrap(),
            DiscreteAction(1),
            5.0,
            IndexObservation::new(1, 2).unwrap(),
            true,
        );
        agent.observe(&transition).await.unwrap();

        assert_relative_eq!(agent.q_table()[[0, 1]], 0.5);
        let metrics = agent.metrics();
        assert_eq!(metrics.total_steps, 1);
        assert_eq!(metrics.total_episodes, 1);
        assert_relative_eq!(metrics.lifetime_reward, 5.0);
    }
}
