//! The hypothesis/observation table and Bayes-rule updates

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{BayesError, Result};

/// Tolerance used when checking that a probability vector sums to one.
const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// A fixed table of hypotheses, observations and likelihoods, together with
/// the current distribution over hypotheses.
///
/// The likelihood matrix is indexed `[hypothesis][observation]`. The prior
/// vector doubles as the running posterior: [`BayesTable::observe`] overwrites
/// it in place after each observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BayesTable {
    /// Ordered hypothesis labels
    hypotheses: Vec<String>,
    /// Ordered observation labels
    observations: Vec<String>,
    /// Current distribution over hypotheses
    priors: Vec<f64>,
    /// Likelihood matrix P(observation | hypothesis)
    likelihood: Array2<f64>,
}

impl BayesTable {
    /// Create a new table.
    ///
    /// Fails if the dimensions do not line up, if a likelihood entry is not a
    /// probability, or if the priors are not a valid distribution.
    pub fn new(
        hypotheses: Vec<String>,
        priors: Vec<f64>,
        observations: Vec<String>,
        likelihood: Array2<f64>,
    ) -> Result<Self> {
        if priors.len() != hypotheses.len() {
            return Err(BayesError::ShapeMismatch {
                expected: hypotheses.len(),
                actual: priors.len(),
            });
        }
        if likelihood.nrows() != hypotheses.len() {
            return Err(BayesError::ShapeMismatch {
                expected: hypotheses.len(),
                actual: likelihood.nrows(),
            });
        }
        if likelihood.ncols() != observations.len() {
            return Err(BayesError::ShapeMismatch {
                expected: observations.len(),
                actual: likelihood.ncols(),
            });
        }
        if likelihood.iter().any(|&p| !(0.0..=1.0).contains(&p)) {
            return Err(BayesError::InvalidDistribution(
                "likelihood entries must lie in [0, 1]".to_string(),
            ));
        }
        check_distribution(&priors)?;

        Ok(Self {
            hypotheses,
            observations,
            priors,
            likelihood,
        })
    }

    /// The ordered hypothesis labels.
    #[must_use]
    pub fn hypotheses(&self) -> &[String] {
        &self.hypotheses
    }

    /// The ordered observation labels.
    #[must_use]
    pub fn observations(&self) -> &[String] {
        &self.observations
    }

    /// The current distribution over hypotheses.
    #[must_use]
    pub fn priors(&self) -> &[f64] {
        &self.priors
    }

    /// Index of the hypothesis with the highest current probability.
    #[must_use]
    pub fn mode(&self) -> usize {
        self.priors
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map_or(0, |(i, _)| i)
    }

    fn hypothesis_index(&self, hypothesis: &str) -> Result<usize> {
        self.hypotheses
            .iter()
            .position(|h| h == hypothesis)
            .ok_or_else(|| BayesError::UnknownHypothesis(hypothesis.to_string()))
    }

    fn observation_index(&self, observation: &str) -> Result<usize> {
        self.observations
            .iter()
            .position(|o| o == observation)
            .ok_or_else(|| BayesError::UnknownObservation(observation.to_string()))
    }

    /// Look up P(observation | hypothesis).
    ///
    /// Unknown labels are reported as errors rather than silently swallowed.
    pub fn likelihood(&self, observation: &str, hypothesis: &str) -> Result<f64> {
        let row = self.hypothesis_index(hypothesis)?;
        let col = self.observation_index(observation)?;
        Ok(self.likelihood[[row, col]])
    }

    /// Normalizing constant P(observation), marginalized over the current
    /// priors.
    pub fn normalizing_constant(&self, observation: &str) -> Result<f64> {
        self.normalizing_constant_with(observation, &self.priors)
    }

    /// Normalizing constant P(observation) under an explicit prior vector.
    pub fn normalizing_constant_with(&self, observation: &str, priors: &[f64]) -> Result<f64> {
        if priors.len() != self.hypotheses.len() {
            return Err(BayesError::ShapeMismatch {
                expected: self.hypotheses.len(),
                actual: priors.len(),
            });
        }
        let col = self.observation_index(observation)?;
        Ok(self
            .likelihood
            .column(col)
            .iter()
            .zip(priors)
            .map(|(l, p)| l * p)
            .sum())
    }

    /// One discrete Bayes-rule step: P(H | O) = P(O | H) P(H) / P(O).
    ///
    /// A zero normalizing constant means the observation is impossible under
    /// the given priors; this is surfaced as an error instead of dividing
    /// through to NaN.
    pub fn single_posterior_update(&self, observation: &str, priors: &[f64]) -> Result<Vec<f64>> {
        let constant = self.normalizing_constant_with(observation, priors)?;
        if constant <= 0.0 {
            return Err(BayesError::ImpossibleObservation(observation.to_string()));
        }

        let col = self.observation_index(observation)?;
        let posterior: Vec<f64> = self
            .likelihood
            .column(col)
            .iter()
            .zip(priors)
            .map(|(l, p)| l * p / constant)
            .collect();

        tracing::debug!(observation, ?posterior, "posterior update");
        Ok(posterior)
    }

    /// Fold a sequence of independent, identically distributed observations
    /// into the current priors, feeding each step's posterior into the next.
    ///
    /// The empty sequence returns the priors unchanged.
    pub fn compute_posterior<S: AsRef<str>>(&self, observations: &[S]) -> Result<Vec<f64>> {
        let mut distribution = self.priors.clone();
        for observation in observations {
            distribution = self.single_posterior_update(observation.as_ref(), &distribution)?;
        }
        Ok(distribution)
    }

    /// Incorporate one observation, overwriting the stored priors with the
    /// resulting posterior. Returns the new distribution.
    pub fn observe(&mut self, observation: &str) -> Result<&[f64]> {
        self.priors = self.single_posterior_update(observation, &self.priors)?;
        Ok(&self.priors)
    }
}

fn check_distribution(probabilities: &[f64]) -> Result<()> {
    if probabilities.iter().any(|&p| p < 0.0) {
        return Err(BayesError::InvalidDistribution(
            "negative probability".to_string(),
        ));
    }
    let total: f64 = probabilities.iter().sum();
    if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        return Err(BayesError::InvalidDistribution(format!(
            "probabilities sum to {total}, expected 1"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;
    use proptest::prelude::*;

    fn cookie_table() -> BayesTable {
        // Bowl 1 holds 15 chocolate / 35 vanilla cookies, bowl 2 holds 30 / 20.
        BayesTable::new(
            vec!["Bowl1".to_string(), "Bowl2".to_string()],
            vec![0.5, 0.5],
            vec!["chocolate".to_string(), "vanilla".to_string()],
            arr2(&[[0.3, 0.7], [0.6, 0.4]]),
        )
        .unwrap()
    }

    fn archery_table() -> BayesTable {
        BayesTable::new(
            vec![
                "Beginner".to_string(),
                "Intermediate".to_string(),
                "Advanced".to_string(),
                "Expert".to_string(),
            ],
            vec![0.25, 0.25, 0.25, 0.25],
            vec![
                "Yellow".to_string(),
                "Red".to_string(),
                "Blue".to_string(),
                "Black".to_string(),
                "White".to_string(),
            ],
            arr2(&[
                [0.05, 0.1, 0.4, 0.25, 0.2],
                [0.1, 0.2, 0.4, 0.2, 0.1],
                [0.2, 0.4, 0.25, 0.1, 0.05],
                [0.3, 0.5, 0.125, 0.05, 0.025],
            ]),
        )
        .unwrap()
    }

    #[test]
    fn likelihood_lookup() {
        let table = cookie_table();
        assert_relative_eq!(table.likelihood("chocolate", "Bowl1").unwrap(), 0.3);
        assert_relative_eq!(table.likelihood("vanilla", "Bowl2").unwrap(), 0.4);
    }

    #[test]
    fn unknown_labels_are_errors() {
        let table = cookie_table();
        assert!(matches!(
            table.likelihood("strawberry", "Bowl1"),
            Err(BayesError::UnknownObservation(_))
        ));
        assert!(matches!(
            table.likelihood("vanilla", "Bowl3"),
            Err(BayesError::UnknownHypothesis(_))
        ));
    }

    #[test]
    fn cookie_normalizing_constant() {
        let table = cookie_table();
        assert_relative_eq!(table.normalizing_constant("vanilla").unwrap(), 0.55);
    }

    #[test]
    fn cookie_single_update() {
        let table = cookie_table();
        let posterior = table
            .single_posterior_update("vanilla", &[0.5, 0.5])
            .unwrap();
        assert_relative_eq!(posterior[0], 7.0 / 11.0, max_relative = 1e-12);
        assert_relative_eq!(posterior[1], 4.0 / 11.0, max_relative = 1e-12);

        let posterior = table
            .single_posterior_update("chocolate", &[0.5, 0.5])
            .unwrap();
        assert_relative_eq!(posterior[0], 1.0 / 3.0, max_relative = 1e-12);
        assert_relative_eq!(posterior[1], 2.0 / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn cookie_observation_fold() {
        let table = cookie_table();
        let posterior = table.compute_posterior(&["chocolate", "vanilla"]).unwrap();
        assert_relative_eq!(posterior[0], 7.0 / 15.0, max_relative = 1e-12);
        assert_relative_eq!(posterior[1], 8.0 / 15.0, max_relative = 1e-12);
    }

    #[test]
    fn empty_sequence_returns_priors() {
        let table = cookie_table();
        let empty: [&str; 0] = [];
        assert_eq!(table.compute_posterior(&empty).unwrap(), vec![0.5, 0.5]);
    }

    #[test]
    fn observe_updates_in_place() {
        let mut table = cookie_table();
        table.observe("vanilla").unwrap();
        assert_relative_eq!(table.priors()[0], 7.0 / 11.0, max_relative = 1e-12);
        // A second observation folds into the stored posterior.
        table.observe("vanilla").unwrap();
        let sum: f64 = table.priors().iter().sum();
        assert_relative_eq!(sum, 1.0, max_relative = 1e-9);
    }

    #[test]
    fn archery_sequence_favors_advanced() {
        let observed = ["Yellow", "White", "Blue", "Red", "Red", "Blue"];

        let mut table = archery_table();
        for color in observed {
            table.observe(color).unwrap();
        }
        assert_relative_eq!(
            table.priors()[2],
            0.477_790_220_231_429_6,
            max_relative = 1e-9
        );
        assert_eq!(table.hypotheses()[table.mode()], "Advanced");

        // The pure fold agrees with the in-place updates.
        let fold = archery_table().compute_posterior(&observed).unwrap();
        for (a, b) in fold.iter().zip(table.priors()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }

    #[test]
    fn impossible_observation_is_rejected() {
        let table = BayesTable::new(
            vec!["H1".to_string(), "H2".to_string()],
            vec![0.5, 0.5],
            vec!["a".to_string(), "b".to_string()],
            arr2(&[[1.0, 0.0], [1.0, 0.0]]),
        )
        .unwrap();
        assert!(matches!(
            table.single_posterior_update("b", &[0.5, 0.5]),
            Err(BayesError::ImpossibleObservation(_))
        ));
    }

    #[test]
    fn invalid_priors_are_rejected() {
        let result = BayesTable::new(
            vec!["H1".to_string(), "H2".to_string()],
            vec![0.9, 0.9],
            vec!["a".to_string()],
            arr2(&[[0.5], [0.5]]),
        );
        assert!(matches!(result, Err(BayesError::InvalidDistribution(_))));
    }

    proptest! {
        #[test]
        fn posterior_is_a_distribution(
            (weights, likelihood_rows) in (2usize..6).prop_flat_map(|n| (
                proptest::collection::vec(0.01f64..1.0, n),
                proptest::collection::vec(proptest::collection::vec(0.01f64..1.0, 3), n),
            )),
            observation_index in 0usize..3,
        ) {
            let n = weights.len();
            let total: f64 = weights.iter().sum();
            let priors: Vec<f64> = weights.iter().map(|w| w / total).collect();

            let hypotheses: Vec<String> = (0..n).map(|i| format!("h{i}")).collect();
            let observations: Vec<String> = (0..3).map(|i| format!("o{i}")).collect();
            let mut likelihood = Array2::zeros((n, 3));
            for (i, row) in likelihood_rows.iter().enumerate() {
                for (j, &p) in row.iter().enumerate() {
                    likelihood[[i, j]] = p;
                }
            }

            let table = BayesTable::new(hypotheses, priors.clone(), observations, likelihood)
                .unwrap();
            let posterior = table
                .single_posterior_update(&format!("o{observation_index}"), &priors)
                .unwrap();

            let sum: f64 = posterior.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
            prop_assert!(posterior.iter().all(|&p| p >= 0.0));
        }
    }
}
