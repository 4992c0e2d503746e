//! Random agent for baseline comparisons

use async_trait::async_trait;
use std::marker::PhantomData;

use course_rl_core::{
    ActionSpace, Agent, AgentMetrics, Observation, Policy, RandomPolicy, Result,
};

/// Agent that selects actions uniformly at random and never learns.
///
/// Useful as the control baseline when judging whether a learner picked up
/// anything at all.
pub struct RandomAgent<A, O> {
    policy: RandomPolicy<A, O>,
    steps: usize,
    _observation: PhantomData<fn() -> O>,
}

impl<A, O> RandomAgent<A, O> {
    /// Create a new random agent over the given action space
    pub fn new(action_space: A, seed: Option<u64>) -> Self {
        Self {
            policy: RandomPolicy::new(action_space, seed),
            steps: 0,
            _observation: PhantomData,
        }
    }
}

#[async_trait]
impl<A, O> Agent for RandomAgent<A, O>
where
    O: Observation,
    A: ActionSpace + Send + Sync + 'static,
    A::Action: Send,
{
    type Observation = O;
    type Action = A::Action;

    async fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action> {
        self.steps += 1;
        self.policy.act(observation).await
    }

    async fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&serde_json::json!({ "steps": self.steps }))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn load(&mut self, path: &std::path::Path) -> Result<()> {
        let json = tokio::fs::read_to_string(path).await?;
        let data: serde_json::Value = serde_json::from_str(&json)?;
        if let Some(steps) = data.get("steps").and_then(serde_json::Value::as_u64) {
            self.steps = steps as usize;
        }
        Ok(())
    }

    fn metrics(&self) -> AgentMetrics {
        AgentMetrics {
            total_steps: self.steps,
            ..AgentMetrics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_rl_core::{DiscreteSpace, IndexObservation};

    #[tokio::test]
    async fn acts_within_the_space() {
        let mut agent: RandomAgent<DiscreteSpace, IndexObservation> =
            RandomAgent::new(DiscreteSpace::new(3), Some(4));
        let obs = IndexObservation::new(0, 1).unwrap();
        for _ in 0..50 {
            let action = agent.act(&obs).await.unwrap();
            assert!(action.0 < 3);
        }
        assert_eq!(agent.metrics().total_steps, 50);
    }
}
