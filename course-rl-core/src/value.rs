//! Action-value function abstractions

use async_trait::async_trait;

use crate::{Action, Observation};

/// Action value function Q(s, a).
///
/// Both the dense Q-table and the Q-network implement this trait, so code
/// that only reads values does not care which approximator backs them.
#[async_trait]
pub trait ActionValueFunction: Send + Sync {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;

    /// Estimate the value of taking an action after an observation
    async fn q_value(
        &self,
        observation: &Self::Observation,
        action: &Self::Action,
    ) -> crate::Result<f64>;

    /// Get Q-values for all actions
    async fn all_q_values(&self, observation: &Self::Observation) -> crate::Result<Vec<f64>>;

    /// Get the best action and its value
    async fn best_action_value(
        &self,
        observation: &Self::Observation,
    ) -> crate::Result<(Self::Action, f64)>;
}
