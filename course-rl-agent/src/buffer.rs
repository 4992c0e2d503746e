//! Experience replay memory for the deep Q-learning agent

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::RngCore;

use course_rl_core::{DiscreteAction, Result, RlError, Transition, VectorObservation};

/// Fixed-capacity replay memory with ring-buffer overwrite semantics.
///
/// Transitions are stored column-wise in preallocated arrays of a fixed
/// observation width. Slot `total_writes mod capacity` is written on each
/// store, so once the memory is full the oldest entries are overwritten.
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    capacity: usize,
    obs_dim: usize,
    observations: Array2<f64>,
    actions: Vec<usize>,
    next_observations: Array2<f64>,
    rewards: Array1<f64>,
    dones: Vec<bool>,
    total_writes: usize,
}

/// A mini-batch of transitions, field-wise
#[derive(Debug, Clone)]
pub struct TransitionBatch {
    /// Observations before the action, one row per transition
    pub observations: Array2<f64>,
    /// Actions taken
    pub actions: Vec<usize>,
    /// Observations after the action, one row per transition
    pub next_observations: Array2<f64>,
    /// Rewards received
    pub rewards: Array1<f64>,
    /// Terminal flags
    pub dones: Vec<bool>,
}

impl TransitionBatch {
    /// Number of transitions in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if the batch is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl ReplayMemory {
    /// Create a new replay memory for observations of width `obs_dim`
    pub fn new(capacity: usize, obs_dim: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RlError::Computation(
                "replay capacity must be positive".to_string(),
            ));
        }
        if obs_dim == 0 {
            return Err(RlError::Computation(
                "observation width must be positive".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            obs_dim,
            observations: Array2::zeros((capacity, obs_dim)),
            actions: vec![0; capacity],
            next_observations: Array2::zeros((capacity, obs_dim)),
            rewards: Array1::zeros(capacity),
            dones: vec![false; capacity],
            total_writes: 0,
        })
    }

    /// Maximum number of transitions held at once
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of transitions currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.total_writes.min(self.capacity)
    }

    /// Check if the memory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_writes == 0
    }

    /// Total stores over the memory's lifetime, including overwritten slots
    #[must_use]
    pub fn total_writes(&self) -> usize {
        self.total_writes
    }

    /// Store a transition, overwriting the oldest entry once full
    pub fn store(&mut self, transition: &Transition<VectorObservation, DiscreteAction>) -> Result<()> {
        self.check_width(&transition.observation.data)?;
        self.check_width(&transition.next_observation.data)?;

        let slot = self.total_writes % self.capacity;
        self.observations
            .row_mut(slot)
            .assign(&ArrayView1::from(&transition.observation.data));
        self.actions[slot] = transition.action.0;
        self.next_observations
            .row_mut(slot)
            .assign(&ArrayView1::from(&transition.next_observation.data));
        self.rewards[slot] = transition.reward.0;
        self.dones[slot] = transition.done;
        self.total_writes += 1;
        Ok(())
    }

    /// Sample `batch_size` stored transitions without replacement.
    ///
    /// Asking for more transitions than are stored is an error, never a
    /// batch with duplicates.
    pub fn sample(&self, batch_size: usize, rng: &mut dyn RngCore) -> Result<TransitionBatch> {
        let available = self.len();
        if batch_size > available {
            return Err(RlError::ReplayUnderfilled {
                requested: batch_size,
                available,
            });
        }

        let indices: Vec<usize> = rand::seq::index::sample(rng, available, batch_size).into_vec();

        Ok(TransitionBatch {
            observations: self.observations.select(Axis(0), &indices),
            actions: indices.iter().map(|&i| self.actions[i]).collect(),
            next_observations: self.next_observations.select(Axis(0), &indices),
            rewards: indices.iter().map(|&i| self.rewards[i]).collect(),
            dones: indices.iter().map(|&i| self.dones[i]).collect(),
        })
    }

    fn check_width(&self, data: &[f64]) -> Result<()> {
        if data.len() != self.obs_dim {
            return Err(RlError::ShapeMismatch {
                expected: self.obs_dim,
                actual: data.len(),
            });
        }
        Ok(())
    }
}
