//! End-to-end learning checks against small in-test environments

use async_trait::async_trait;

use course_rl_agent::{run_episodes, DqnAgent, DqnConfig, RandomAgent, TabularConfig, TabularQLearner};
use course_rl_core::{
    ActionSpace, ActionValueFunction, DiscreteAction, DiscreteSpace, Environment, IndexObservation,
    IndexSpace, ObservationSpace, Result, Reward, Step, StepInfo, VectorObservation,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Deterministic corridor: states 0..length, start at 0, goal at the right
/// end. Action 1 moves right, action 0 moves left (clamped at 0). Each step
/// costs -1 and reaching the goal pays +10 and ends the episode.
struct CorridorEnv {
    position: usize,
    length: usize,
}

impl CorridorEnv {
    fn new(length: usize) -> Self {
        Self {
            position: 0,
            length,
        }
    }
}

#[async_trait]
impl Environment for CorridorEnv {
    type Observation = IndexObservation;
    type Action = DiscreteAction;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(IndexSpace::new(self.length))
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        Box::new(DiscreteSpace::new(2))
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.position = 0;
        Ok((IndexObservation::new(0, self.length)?, StepInfo::default()))
    }

    async fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>> {
        self.position = match action.0 {
            1 => (self.position + 1).min(self.length - 1),
            _ => self.position.saturating_sub(1),
        };
        let done = self.position == self.length - 1;
        let reward = if done { 10.0 } else { -1.0 };

        Ok(Step {
            observation: IndexObservation::new(self.position, self.length)?,
            reward: Reward(reward),
            done,
            truncated: false,
            info: StepInfo::default(),
        })
    }
}

/// One-step bandit: a single constant observation, two actions, reward 1 for
/// the optimal arm and 0 otherwise. Every step ends the episode.
struct BanditEnv {
    optimal: usize,
}

#[async_trait]
impl Environment for BanditEnv {
    type Observation = VectorObservation;
    type Action = DiscreteAction;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(
            course_rl_core::BoxObservationSpace::new(vec![0.0], vec![1.0])
                .expect("static bounds"),
        )
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        Box::new(DiscreteSpace::new(2))
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        Ok((VectorObservation::new(vec![1.0]), StepInfo::default()))
    }

    async fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>> {
        let reward = if action.0 == self.optimal { 1.0 } else { 0.0 };
        Ok(Step {
            observation: VectorObservation::new(vec![1.0]),
            reward: Reward(reward),
            done: true,
            truncated: false,
            info: StepInfo::default(),
        })
    }
}

#[tokio::test]
async fn tabular_agent_learns_the_corridor() {
    init_logging();

    let length = 5;
    let mut config = TabularConfig::default();
    config.base.learning_rate = 0.5;
    config.base.seed = Some(7);
    config.epsilon = 0.2;
    let mut agent = TabularQLearner::new(length, 2, config).unwrap();

    let records = run_episodes(CorridorEnv::new(length), &mut agent, 200, 100)
        .await
        .unwrap();
    assert_eq!(records.len(), 200);

    // The greedy policy must point right in every non-terminal state.
    for state in 0..length - 1 {
        let observation = IndexObservation::new(state, length).unwrap();
        let (action, value) = agent.best_action_value(&observation).await.unwrap();
        assert_eq!(action, DiscreteAction(1), "state {state} prefers {action:?}");
        assert!(value > 0.0);
    }
}

#[tokio::test]
async fn trained_tabular_agent_beats_the_random_baseline() {
    init_logging();

    let length = 5;
    let mut config = TabularConfig::default();
    config.base.learning_rate = 0.5;
    config.base.seed = Some(11);
    config.epsilon = 0.2;
    let mut learner = TabularQLearner::new(length, 2, config).unwrap();
    let learner_records = run_episodes(CorridorEnv::new(length), &mut learner, 200, 100)
        .await
        .unwrap();

    let mut baseline: RandomAgent<DiscreteSpace, IndexObservation> =
        RandomAgent::new(DiscreteSpace::new(2), Some(11));
    let baseline_records = run_episodes(CorridorEnv::new(length), &mut baseline, 50, 100)
        .await
        .unwrap();

    let mean_steps = |records: &[course_rl_core::Episode]| {
        records.iter().map(|r| r.steps as f64).sum::<f64>() / records.len() as f64
    };

    // Once trained, episodes should be much shorter than a random walk's.
    let trained_tail = mean_steps(&learner_records[150..]);
    let random_mean = mean_steps(&baseline_records);
    assert!(
        trained_tail < random_mean,
        "trained {trained_tail} vs random {random_mean}"
    );
}

#[tokio::test]
async fn dqn_agent_learns_the_better_arm() {
    init_logging();

    let mut config = DqnConfig {
        hidden_dims: vec![8],
        batch_size: 8,
        memory_capacity: 128,
        replay_start_factor: 1,
        ..DqnConfig::default()
    };
    config.base.learning_rate = 0.05;
    config.base.seed = Some(13);
    let mut agent = DqnAgent::new(1, 2, config).unwrap();

    let records = run_episodes(BanditEnv { optimal: 1 }, &mut agent, 300, 5)
        .await
        .unwrap();
    assert_eq!(records.len(), 300);

    let observation = VectorObservation::new(vec![1.0]);
    let values = agent.all_q_values(&observation).await.unwrap();
    assert!(
        values[1] > values[0],
        "expected arm 1 to dominate: {values:?}"
    );

    // Exploration has decayed well below its starting point.
    assert!(agent.epsilon() < 0.05);

    // With epsilon at the floor, recent episodes almost always hit reward 1.
    let tail_reward: f64 = records[250..].iter().map(|r| r.total_reward).sum();
    assert!(tail_reward > 40.0, "tail reward {tail_reward}");
}

#[tokio::test]
async fn episode_records_track_totals() {
    init_logging();

    let mut agent: RandomAgent<DiscreteSpace, IndexObservation> =
        RandomAgent::new(DiscreteSpace::new(2), Some(5));
    let records = run_episodes(CorridorEnv::new(4), &mut agent, 10, 50)
        .await
        .unwrap();

    assert_eq!(records.len(), 10);
    for record in &records {
        assert!(record.steps >= 1);
        assert!(record.end_time.is_some() || record.steps == 50);
        // Reward bookkeeping matches the corridor's structure: +10 at the
        // goal, -1 everywhere else.
        if record.steps < 50 {
            assert!((record.total_reward - (10.0 - (record.steps as f64 - 1.0))).abs() < 1e-9);
        }
    }
}
