//! Discrete Bayesian updating over a fixed hypothesis/observation table
//!
//! This crate implements the classic "cookie bowl" style of exercise: a fixed
//! set of hypotheses with prior probabilities, a fixed set of possible
//! observations, and a likelihood table P(observation | hypothesis). Each
//! observation is folded into the running distribution with a single
//! application of Bayes' rule.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod model;

pub use error::{BayesError, Result};
pub use model::BayesTable;
