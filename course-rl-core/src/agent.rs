//! Agent traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Action, Observation, Transition};

/// Configuration shared by learning agents.
///
/// Learning rates and discount factors are constructor inputs, never
/// module-level constants, so that agents stay independently testable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Discount factor
    pub gamma: f64,
    /// Seed for the agent's random source
    pub seed: Option<u64>,
    /// Additional parameters
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            gamma: 0.9,
            seed: None,
            params: serde_json::Map::new(),
        }
    }
}

/// Agent metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Total steps taken
    pub total_steps: usize,
    /// Total episodes
    pub total_episodes: usize,
    /// Cumulative reward over the agent's lifetime
    pub lifetime_reward: f64,
    /// Cumulative reward in the current episode
    pub episode_reward: f64,
    /// Discounted return accumulated in the current episode
    pub episode_return: f64,
    /// Most recent loss value, when the agent trains a network
    pub loss: Option<f64>,
    /// Additional metrics
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// Core agent trait
#[async_trait]
pub trait Agent: Send + Sync {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;

    /// Select an action given an observation
    async fn act(&mut self, observation: &Self::Observation) -> crate::Result<Self::Action>;

    /// Notify the agent that a new episode begins at the given observation
    async fn start_episode(&mut self, _observation: &Self::Observation) -> crate::Result<()> {
        Ok(())
    }

    /// Process one transition (for learning)
    async fn observe(
        &mut self,
        _transition: &Transition<Self::Observation, Self::Action>,
    ) -> crate::Result<()> {
        Ok(()) // Default: no learning
    }

    /// Save the agent
    async fn save(&self, path: &std::path::Path) -> crate::Result<()>;

    /// Load the agent
    async fn load(&mut self, path: &std::path::Path) -> crate::Result<()>;

    /// Get agent metrics
    fn metrics(&self) -> AgentMetrics {
        AgentMetrics::default()
    }
}
