//! Transitions and episode trajectories

use serde::{Deserialize, Serialize};

use crate::{Action, Observation, Reward};

/// Single transition: what the agent saw, what it did, and what happened.
///
/// This is exactly the record replay memory stores and agents learn from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition<O, A> {
    /// Observation before the action
    pub observation: O,
    /// Action taken
    pub action: A,
    /// Reward received
    pub reward: Reward,
    /// Observation after the action
    pub next_observation: O,
    /// Whether the episode ended on this step
    pub done: bool,
}

impl<O, A> Transition<O, A>
where
    O: Observation,
    A: Action,
{
    /// Create a new transition
    pub fn new(
        observation: O,
        action: A,
        reward: impl Into<Reward>,
        next_observation: O,
        done: bool,
    ) -> Self {
        Self {
            observation,
            action,
            reward: reward.into(),
            next_observation,
            done,
        }
    }
}

/// Complete trajectory of an episode
#[derive(Debug, Clone)]
pub struct Trajectory<O, A> {
    /// Sequence of transitions
    pub transitions: Vec<Transition<O, A>>,
    /// Total undiscounted reward
    pub total_reward: f64,
    /// Episode ID
    pub episode_id: String,
}

impl<O, A> Trajectory<O, A> {
    /// Create a new empty trajectory
    #[must_use]
    pub fn new(episode_id: String) -> Self {
        Self {
            transitions: Vec::new(),
            total_reward: 0.0,
            episode_id,
        }
    }

    /// Add a transition to the trajectory
    pub fn push(&mut self, transition: Transition<O, A>) {
        self.total_reward += transition.reward.0;
        self.transitions.push(transition);
    }

    /// Get the length of the trajectory
    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Check if trajectory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Compute returns (cumulative discounted rewards) per step
    #[must_use]
    pub fn returns(&self, gamma: f64) -> Vec<f64> {
        let mut returns = vec![0.0; self.len()];
        let mut running_return = 0.0;

        for i in (0..self.len()).rev() {
            if self.transitions[i].done {
                running_return = 0.0;
            }
            running_return = self.transitions[i].reward.0 + gamma * running_return;
            returns[i] = running_return;
        }

        returns
    }
}
