//! Episode driver: runs an agent against an environment

use course_rl_core::{Agent, Environment, Episode, Result, TrackedEnvironment, Transition};

/// Run `episodes` episodes, learning online, and return the per-episode
/// records.
///
/// Each episode runs reset, then act/step/observe until the environment
/// reports termination or `max_steps` transitions have been taken. Truncated
/// episodes are not treated as terminal for learning; only the environment's
/// done flag ends up in the stored transitions.
pub async fn run_episodes<E, A>(
    env: E,
    agent: &mut A,
    episodes: usize,
    max_steps: usize,
) -> Result<Vec<Episode>>
where
    E: Environment,
    A: Agent<Observation = E::Observation, Action = E::Action>,
{
    let mut env = TrackedEnvironment::new(env);
    let mut records = Vec::with_capacity(episodes);

    for episode in 0..episodes {
        let (mut observation, _info) = env.reset().await?;
        agent.start_episode(&observation).await?;

        for _ in 0..max_steps {
            let action = agent.act(&observation).await?;
            let step = env.step(action.clone()).await?;

            let transition = Transition::new(
                observation,
                action,
                step.reward,
                step.observation.clone(),
                step.done,
            );
            agent.observe(&transition).await?;

            observation = step.observation;
            if step.done || step.truncated {
                break;
            }
        }

        if let Some(record) = env.episode_info() {
            tracing::info!(
                episode,
                steps = record.steps,
                total_reward = record.total_reward,
                "episode complete"
            );
            records.push(record);
        }
    }

    env.close().await?;
    Ok(records)
}
