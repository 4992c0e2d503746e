//! Policy abstractions for action selection

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::marker::PhantomData;

use crate::{Action, ActionSpace, Observation};

/// Core policy trait for selecting actions.
///
/// `act` takes `&mut self` because policies own their random source; two
/// policies built from the same seed produce the same action sequence.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;

    /// Select an action given an observation
    async fn act(&mut self, observation: &Self::Observation) -> crate::Result<Self::Action>;
}

/// Policy that always selects uniformly random actions
pub struct RandomPolicy<A, O> {
    /// Action space
    pub action_space: A,
    rng: StdRng,
    _observation: PhantomData<fn() -> O>,
}

impl<A, O> RandomPolicy<A, O> {
    /// Create a new random policy, seeded for reproducibility when a seed is
    /// given
    pub fn new(action_space: A, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            action_space,
            rng,
            _observation: PhantomData,
        }
    }
}

#[async_trait]
impl<A, O> Policy for RandomPolicy<A, O>
where
    O: Observation,
    A: ActionSpace + Send + Sync,
    A::Action: Send,
{
    type Observation = O;
    type Action = A::Action;

    async fn act(&mut self, _observation: &Self::Observation) -> crate::Result<Self::Action> {
        Ok(self.action_space.sample(&mut self.rng))
    }
}
