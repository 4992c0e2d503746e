//! Observation representations and observation spaces

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{Result, RlError};

/// Trait for observations from an environment
pub trait Observation: Clone + Debug + Send + Sync {
    /// Convert observation to a feature vector
    fn to_vec(&self) -> Vec<f64>;

    /// Get the shape of the feature vector
    fn shape(&self) -> Vec<usize>;
}

/// Trait for defining observation spaces
pub trait ObservationSpace: Send + Sync {
    /// The type of observations in this space
    type Observation: Observation;

    /// Sample a random observation from the space
    fn sample(&self, rng: &mut dyn RngCore) -> Self::Observation;

    /// Check if an observation is valid within this space
    fn contains(&self, obs: &Self::Observation) -> bool;

    /// Get the shape of observations in this space
    fn shape(&self) -> Vec<usize>;
}

/// Discrete observation: a state index out of a known number of states.
///
/// The feature vector is the one-hot encoding, which is what a network
/// expects when the environment reports bare state indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexObservation {
    /// State index
    pub index: usize,
    /// Total number of states
    pub n: usize,
}

impl IndexObservation {
    /// Create a new index observation.
    ///
    /// Fails if the index is outside `0..n`.
    pub fn new(index: usize, n: usize) -> Result<Self> {
        if index >= n {
            return Err(RlError::Environment(format!(
                "state index {index} out of range for {n} states"
            )));
        }
        Ok(Self { index, n })
    }
}

impl Observation for IndexObservation {
    fn to_vec(&self) -> Vec<f64> {
        let mut one_hot = vec![0.0; self.n];
        one_hot[self.index] = 1.0;
        one_hot
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.n]
    }
}

/// Vector observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorObservation {
    /// The observation data
    pub data: Vec<f64>,
}

impl VectorObservation {
    /// Create a new vector observation
    #[must_use]
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }
}

impl Observation for VectorObservation {
    fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.data.len()]
    }
}

/// Observation space of `n` discrete states
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSpace {
    /// Number of states
    pub n: usize,
}

impl IndexSpace {
    /// Create a new discrete observation space
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl ObservationSpace for IndexSpace {
    type Observation = IndexObservation;

    fn sample(&self, rng: &mut dyn RngCore) -> Self::Observation {
        IndexObservation {
            index: rng.gen_range(0..self.n),
            n: self.n,
        }
    }

    fn contains(&self, obs: &Self::Observation) -> bool {
        obs.n == self.n && obs.index < self.n
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.n]
    }
}

/// Box observation space with per-dimension bounds
#[derive(Debug, Clone)]
pub struct BoxObservationSpace {
    /// Lower bounds
    pub low: Vec<f64>,
    /// Upper bounds
    pub high: Vec<f64>,
}

impl BoxObservationSpace {
    /// Create a new box observation space
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(RlError::ShapeMismatch {
                expected: low.len(),
                actual: high.len(),
            });
        }
        Ok(Self { low, high })
    }
}

impl ObservationSpace for BoxObservationSpace {
    type Observation = VectorObservation;

    fn sample(&self, rng: &mut dyn RngCore) -> Self::Observation {
        let data: Vec<f64> = self
            .low
            .iter()
            .zip(&self.high)
            .map(|(l, h)| rng.gen_range(*l..*h))
            .collect();

        VectorObservation { data }
    }

    fn contains(&self, obs: &Self::Observation) -> bool {
        obs.data.len() == self.low.len()
            && obs
                .data
                .iter()
                .zip(&self.low)
                .zip(&self.high)
                .all(|((x, l), h)| x >= l && x <= h)
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.low.len()]
    }
}
