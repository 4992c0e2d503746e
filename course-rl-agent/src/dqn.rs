//! Deep Q-learning agent with replay memory and a target network

use async_trait::async_trait;
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use course_rl_core::{
    ActionValueFunction, Agent, AgentConfig, AgentMetrics, DiscreteAction, Result, RlError,
    Transition, VectorObservation,
};

use crate::buffer::ReplayMemory;
use crate::network::{Activation, NetworkConfig, QNetwork};
use crate::schedule::{ExponentialSchedule, Schedule};

/// Configuration for the deep Q-learning agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqnConfig {
    /// Base agent configuration (learning rate, discount, seed)
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Hidden layer sizes of both networks
    pub hidden_dims: Vec<usize>,
    /// Hidden-layer activation
    pub activation: Activation,
    /// Initial exploration probability
    pub epsilon_start: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Multiplicative epsilon decay applied after every episode
    pub epsilon_decay: f64,
    /// Replay memory capacity
    pub memory_capacity: usize,
    /// Mini-batch size for replay updates
    pub batch_size: usize,
    /// Replay updates start once `replay_start_factor * batch_size`
    /// transitions have been stored
    pub replay_start_factor: usize,
    /// Synchronize the target network every this many episode ends
    pub target_sync_episodes: usize,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig {
                learning_rate: 1e-4,
                gamma: 0.99,
                seed: None,
                params: serde_json::Map::new(),
            },
            hidden_dims: vec![150, 120],
            activation: Activation::LeakyRelu,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.98,
            memory_capacity: 10_000,
            batch_size: 256,
            replay_start_factor: 10,
            target_sync_episodes: 1,
        }
    }
}

/// Deep Q-learning agent.
///
/// Maintains an online network updated on every transition and a target
/// network used for bootstrap values, copied wholesale from the online
/// network on the configured episode cadence. Episode statistics are kept
/// for reporting only and never feed back into learning.
pub struct DqnAgent {
    config: DqnConfig,
    online: QNetwork,
    target: QNetwork,
    memory: ReplayMemory,
    epsilon_schedule: ExponentialSchedule,
    epsilon: f64,
    rng: StdRng,
    episodes: usize,
    episodes_since_sync: usize,
    stage: usize,
    total_stages: usize,
    episode_reward: f64,
    lifetime_reward: f64,
    episode_return: f64,
    last_loss: Option<f64>,
}

impl DqnAgent {
    /// Create a new agent for observations of width `input_dim` and
    /// `num_actions` discrete actions
    pub fn new(input_dim: usize, num_actions: usize, config: DqnConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(RlError::Agent("batch size must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&config.epsilon_start)
            || !(0.0..=1.0).contains(&config.epsilon_min)
        {
            return Err(RlError::Agent("epsilon outside [0, 1]".to_string()));
        }
        if config.epsilon_decay <= 0.0 || config.epsilon_decay > 1.0 {
            return Err(RlError::Agent(format!(
                "epsilon decay {} outside (0, 1]",
                config.epsilon_decay
            )));
        }
        if config.target_sync_episodes == 0 {
            return Err(RlError::Agent(
                "target sync cadence must be positive".to_string(),
            ));
        }

        let online = QNetwork::new(NetworkConfig {
            input_dim,
            hidden_dims: config.hidden_dims.clone(),
            output_dim: num_actions,
            activation: config.activation,
            learning_rate: config.base.learning_rate,
            rmsprop_decay: 0.9,
            seed: config.base.seed,
        })?;
        // The pair starts out identical; training drifts the online copy
        // until the next sync.
        let target = online.clone();
        let memory = ReplayMemory::new(config.memory_capacity, input_dim)?;
        let rng = match config.base.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let epsilon_schedule = ExponentialSchedule::new(
            config.epsilon_start,
            config.epsilon_min,
            config.epsilon_decay,
        );

        Ok(Self {
            epsilon: config.epsilon_start,
            config,
            online,
            target,
            memory,
            epsilon_schedule,
            rng,
            episodes: 0,
            episodes_since_sync: 0,
            stage: 0,
            total_stages: 0,
            episode_reward: 0.0,
            lifetime_reward: 0.0,
            episode_return: 0.0,
            last_loss: None,
        })
    }

    /// Current exploration probability
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The network trained on every transition
    #[must_use]
    pub fn online_network(&self) -> &QNetwork {
        &self.online
    }

    /// The periodically synchronized bootstrap network
    #[must_use]
    pub fn target_network(&self) -> &QNetwork {
        &self.target
    }

    /// Transitions currently held in replay memory
    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Epsilon-greedy action selection over the online network
    pub fn select_action(&mut self, observation: &VectorObservation) -> Result<usize> {
        if self.rng.gen::<f64>() < self.epsilon {
            Ok(self.rng.gen_range(0..self.online.num_actions()))
        } else {
            self.online
                .greedy_action(ArrayView1::from(&observation.data), &mut self.rng)
        }
    }

    /// Learn from one transition.
    ///
    /// Always performs a single-transition update of the online network
    /// toward `reward + gamma * future`, where `future` is the target
    /// network's maximum Q at the next observation (zero when terminal).
    /// Once enough transitions have accumulated, additionally samples a
    /// mini-batch and performs a batched update with one target-network
    /// evaluation for the whole batch.
    pub fn process_experience(
        &mut self,
        transition: &Transition<VectorObservation, DiscreteAction>,
    ) -> Result<()> {
        let reward = transition.reward.0;
        self.episode_reward += reward;
        self.episode_return += reward * self.config.base.gamma.powi(self.stage as i32);
        self.stage += 1;
        self.total_stages += 1;

        self.memory.store(transition)?;

        let future = if transition.done {
            0.0
        } else {
            self.target
                .max_q_value(ArrayView1::from(&transition.next_observation.data))?
        };
        let target_value = reward + self.config.base.gamma * future;
        let td = self.online.update_single(
            ArrayView1::from(&transition.observation.data),
            transition.action.0,
            target_value,
        )?;
        tracing::trace!(td, target_value, "single q update");

        if self.memory.len() >= self.config.batch_size
            && self.memory.total_writes() > self.config.replay_start_factor * self.config.batch_size
        {
            self.replay_update()?;
        }

        if transition.done {
            self.finish_episode();
        }
        Ok(())
    }

    fn replay_update(&mut self) -> Result<()> {
        let batch = self.memory.sample(self.config.batch_size, &mut self.rng)?;
        let bootstrap = self
            .target
            .batch_max_q_values(batch.next_observations.view())?;
        let continuing =
            Array1::from_iter(batch.dones.iter().map(|&done| if done { 0.0 } else { 1.0 }));
        let targets = &batch.rewards + &(bootstrap * self.config.base.gamma * continuing);

        let loss = self
            .online
            .update_batch(batch.observations.view(), &batch.actions, targets.view())?;
        self.last_loss = Some(loss);
        tracing::trace!(loss, batch = self.config.batch_size, "batch q update");
        Ok(())
    }

    fn finish_episode(&mut self) {
        self.episodes += 1;
        self.lifetime_reward += self.episode_reward;
        self.episodes_since_sync += 1;
        if self.episodes_since_sync >= self.config.target_sync_episodes {
            self.target.sync_from(&self.online);
            self.episodes_since_sync = 0;
            tracing::debug!(episode = self.episodes, "target network synchronized");
        }
        self.epsilon = self.epsilon_schedule.value(self.episodes);

        tracing::info!(
            episode = self.episodes,
            steps = self.stage,
            total_steps = self.total_stages,
            epsilon = self.epsilon,
            episode_reward = self.episode_reward,
            discounted_return = self.episode_return,
            "episode finished"
        );
        metrics::counter!("dqn_episodes_total", 1);
        metrics::gauge!("dqn_episode_reward", self.episode_reward);
        metrics::gauge!("dqn_epsilon", self.epsilon);
    }
}

#[async_trait]
impl Agent for DqnAgent {
    type Observation = VectorObservation;
    type Action = DiscreteAction;

    async fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action> {
        Ok(DiscreteAction(self.select_action(observation)?))
    }

    async fn start_episode(&mut self, _observation: &Self::Observation) -> Result<()> {
        self.episode_reward = 0.0;
        self.episode_return = 0.0;
        self.stage = 0;
        Ok(())
    }

    async fn observe(
        &mut self,
        transition: &Transition<Self::Observation, Self::Action>,
    ) -> Result<()> {
        self.process_experience(transition)
    }

    async fn save(&self, path: &std::path::Path) -> Result<()> {
        let data = serde_json::json!({
            "config": self.config,
            "epsilon": self.epsilon,
            "parameters": self.online.parameters(),
        });
        let json = serde_json::to_string_pretty(&data)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn load(&mut self, path: &std::path::Path) -> Result<()> {
        let json = tokio::fs::read_to_string(path).await?;
        let data: serde_json::Value = serde_json::from_str(&json)?;

        if let Some(epsilon) = data.get("epsilon").and_then(serde_json::Value::as_f64) {
            self.epsilon = epsilon;
        }
        if let Some(parameters) = data.get("parameters") {
            let parameters: Vec<f64> = serde_json::from_value(parameters.clone())?;
            self.online.set_parameters(&parameters)?;
            self.target.sync_from(&self.online);
        }
        Ok(())
    }

    fn metrics(&self) -> AgentMetrics {
        let mut custom = serde_json::Map::new();
        custom.insert("epsilon".to_string(), serde_json::json!(self.epsilon));
        AgentMetrics {
            total_steps: self.total_stages,
            total_episodes: self.episodes,
            lifetime_reward: self.lifetime_reward,
            episode_reward: self.episode_reward,
            episode_return: self.episode_return,
            loss: self.last_loss,
            custom,
        }
    }
}

#[async_trait]
impl ActionValueFunction for DqnAgent {
    type Observation = VectorObservation;
    type Action = DiscreteAction;

    async fn q_value(
        &self,
        observation: &Self::Observation,
        action: &Self::Action,
    ) -> Result<f64> {
        self.online
            .q_value(ArrayView1::from(&observation.data), action.0)
    }

    async fn all_q_values(&self, observation: &Self::Observation) -> Result<Vec<f64>> {
        Ok(self
            .online
            .q_values(ArrayView1::from(&observation.data))?
            .to_vec())
    }

    async fn best_action_value(
        &self,
        observation: &Self::Observation,
    ) -> Result<(Self::Action, f64)> {
        ActionValueFunction::best_action_value(&self.online, observation).await
    }
}
