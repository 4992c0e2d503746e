//! Reinforcement learning agents for the RL coursework
//!
//! This crate provides the learning side of the exercises:
//! - A tabular Q-learning agent over a dense state/action table
//! - Fixed-capacity replay memory with ring-buffer overwrite semantics
//! - A deep Q-learning agent driving an online/target network pair
//! - A uniform-random baseline agent and an episode driver

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod dqn;
pub mod network;
pub mod random;
pub mod schedule;
pub mod tabular;
pub mod training;

// Re-export agents
pub use dqn::{DqnAgent, DqnConfig};
pub use random::RandomAgent;
pub use tabular::{TabularConfig, TabularQLearner};

// Re-export supporting pieces
pub use buffer::{ReplayMemory, TransitionBatch};
pub use network::{Activation, NetworkConfig, QNetwork};
pub use schedule::{ConstantSchedule, ExponentialSchedule, LinearSchedule, Schedule};
pub use training::run_episodes;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DqnAgent, DqnConfig, QNetwork, RandomAgent, ReplayMemory, TabularConfig, TabularQLearner,
    };
    pub use course_rl_core::prelude::*;
}
