//! Feed-forward Q-value network with manual gradients
//!
//! A small pure-`ndarray` MLP, no external autodiff backend. Two update
//! paths exist: a single-transition step that nudges the taken action's
//! value toward its target with per-parameter gradient clipping, and a
//! batched MSE step driven by an RMSprop accumulator.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use course_rl_core::{ActionValueFunction, DiscreteAction, Result, RlError, VectorObservation};

/// Per-parameter gradient clip bound for single-transition updates
const GRADIENT_CLIP: f64 = 1.0;
/// Denominator guard for the RMSprop step
const RMSPROP_EPSILON: f64 = 1e-8;

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Leaky ReLU with slope 0.01 on the negative side
    LeakyRelu,
    /// ReLU
    Relu,
    /// Hyperbolic tangent
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    0.01 * x
                }
            }
            Self::Relu => x.max(0.0),
            Self::Tanh => x.tanh(),
        }
    }

    fn derivative(self, x: f64) -> f64 {
        match self {
            Self::LeakyRelu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.01
                }
            }
            Self::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }
}

/// Q-network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Input dimension (observation width)
    pub input_dim: usize,
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Output dimension (number of actions)
    pub output_dim: usize,
    /// Hidden-layer activation
    pub activation: Activation,
    /// Learning rate for both update paths
    pub learning_rate: f64,
    /// RMSprop smoothing constant for batched updates
    pub rmsprop_decay: f64,
    /// Seed for weight initialization
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_dim: 4,
            hidden_dims: vec![150, 120],
            output_dim: 2,
            activation: Activation::LeakyRelu,
            learning_rate: 1e-4,
            rmsprop_decay: 0.9,
            seed: None,
        }
    }
}

/// Feed-forward action-value approximator
#[derive(Debug, Clone)]
pub struct QNetwork {
    config: NetworkConfig,
    /// Weights per layer, shape `(in, out)`
    weights: Vec<Array2<f64>>,
    /// Biases per layer
    biases: Vec<Array1<f64>>,
    /// RMSprop squared-gradient accumulators
    sq_grad_w: Vec<Array2<f64>>,
    sq_grad_b: Vec<Array1<f64>>,
}

impl QNetwork {
    /// Create a new network with Xavier-uniform weights and zero biases
    pub fn new(config: NetworkConfig) -> Result<Self> {
        if config.input_dim == 0 || config.output_dim == 0 {
            return Err(RlError::Computation(
                "network dimensions must be positive".to_string(),
            ));
        }
        if config.hidden_dims.iter().any(|&d| d == 0) {
            return Err(RlError::Computation(
                "hidden layer sizes must be positive".to_string(),
            ));
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut dims = Vec::with_capacity(config.hidden_dims.len() + 2);
        dims.push(config.input_dim);
        dims.extend_from_slice(&config.hidden_dims);
        dims.push(config.output_dim);

        let mut weights = Vec::new();
        let mut biases = Vec::new();
        let mut sq_grad_w = Vec::new();
        let mut sq_grad_b = Vec::new();
        for pair in dims.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            weights.push(xavier_init(fan_in, fan_out, &mut rng));
            biases.push(Array1::zeros(fan_out));
            sq_grad_w.push(Array2::zeros((fan_in, fan_out)));
            sq_grad_b.push(Array1::zeros(fan_out));
        }

        Ok(Self {
            config,
            weights,
            biases,
            sq_grad_w,
            sq_grad_b,
        })
    }

    /// Network configuration
    #[must_use]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Number of actions the network scores
    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.config.output_dim
    }

    fn check_input(&self, input: ArrayView1<f64>) -> Result<()> {
        if input.len() != self.config.input_dim {
            return Err(RlError::ShapeMismatch {
                expected: self.config.input_dim,
                actual: input.len(),
            });
        }
        Ok(())
    }

    fn check_action(&self, action: usize) -> Result<()> {
        if action >= self.config.output_dim {
            return Err(RlError::InvalidAction(format!(
                "action index {action} out of range for {} outputs",
                self.config.output_dim
            )));
        }
        Ok(())
    }

    /// Forward pass keeping per-layer pre-activations and activations for
    /// the backward pass. `activations[0]` is the input itself.
    fn forward_cached(&self, input: ArrayView1<f64>) -> (Vec<Array1<f64>>, Vec<Array1<f64>>) {
        let last = self.weights.len() - 1;
        let mut activations = vec![input.to_owned()];
        let mut pre_activations = Vec::with_capacity(self.weights.len());

        for (layer, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = activations[layer].dot(w) + b;
            let a = if layer < last {
                z.mapv(|v| self.config.activation.apply(v))
            } else {
                z.clone()
            };
            pre_activations.push(z);
            activations.push(a);
        }
        (activations, pre_activations)
    }

    /// Q-values for all actions after one observation
    pub fn q_values(&self, input: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_input(input)?;
        let (mut activations, _) = self.forward_cached(input);
        activations
            .pop()
            .ok_or_else(|| RlError::Computation("network has no layers".to_string()))
    }

    /// Q-value of a single action
    pub fn q_value(&self, input: ArrayView1<f64>, action: usize) -> Result<f64> {
        self.check_action(action)?;
        Ok(self.q_values(input)?[action])
    }

    /// Maximum Q-value after one observation (the bootstrap evaluation)
    pub fn max_q_value(&self, input: ArrayView1<f64>) -> Result<f64> {
        Ok(self
            .q_values(input)?
            .iter()
            .fold(f64::NEG_INFINITY, |m, &v| m.max(v)))
    }

    /// Greedy action with uniform random tie-breaking among maxima
    pub fn greedy_action(&self, input: ArrayView1<f64>, rng: &mut dyn RngCore) -> Result<usize> {
        let values = self.q_values(input)?;
        let best = values.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let tied: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == best)
            .map(|(a, _)| a)
            .collect();
        Ok(tied[rng.gen_range(0..tied.len())])
    }

    /// Q-values for a batch of observations, one row per observation
    pub fn batch_q_values(&self, inputs: ArrayView2<f64>) -> Result<Array2<f64>> {
        if inputs.ncols() != self.config.input_dim {
            return Err(RlError::ShapeMismatch {
                expected: self.config.input_dim,
                actual: inputs.ncols(),
            });
        }
        let last = self.weights.len() - 1;
        let mut a = inputs.to_owned();
        for (layer, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = a.dot(w) + b;
            a = if layer < last {
                z.mapv(|v| self.config.activation.apply(v))
            } else {
                z
            };
        }
        Ok(a)
    }

    /// Row-wise maximum Q-values for a batch of observations
    pub fn batch_max_q_values(&self, inputs: ArrayView2<f64>) -> Result<Array1<f64>> {
        let values = self.batch_q_values(inputs)?;
        Ok(values.map_axis(Axis(1), |row| {
            row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v))
        }))
    }

    /// One gradient step of the taken action's value toward `target`.
    ///
    /// The gradient of Q(s, a) with respect to each parameter is clipped to
    /// `[-1, 1]` before the step `param += lr * td * grad`. Returns the
    /// temporal-difference error `target - Q(s, a)`.
    pub fn update_single(
        &mut self,
        input: ArrayView1<f64>,
        action: usize,
        target: f64,
    ) -> Result<f64> {
        self.check_input(input)?;
        self.check_action(action)?;

        let (activations, pre_activations) = self.forward_cached(input);
        let predicted = activations[self.weights.len()][action];
        let td = target - predicted;

        let lr = self.config.learning_rate;
        // delta = gradient of Q(s, a) with respect to the layer's pre-activation
        let mut delta = Array1::zeros(self.config.output_dim);
        delta[action] = 1.0;

        for layer in (0..self.weights.len()).rev() {
            let next_delta = if layer > 0 {
                let back = delta.dot(&self.weights[layer].t());
                let deriv =
                    pre_activations[layer - 1].mapv(|z| self.config.activation.derivative(z));
                Some(back * deriv)
            } else {
                None
            };

            let grad_w = outer(&activations[layer], &delta);
            Zip::from(&mut self.weights[layer])
                .and(&grad_w)
                .for_each(|w, &g| {
                    *w += lr * td * g.clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                });
            Zip::from(&mut self.biases[layer])
                .and(&delta)
                .for_each(|b, &g| {
                    *b += lr * td * g.clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                });

            if let Some(next) = next_delta {
                delta = next;
            }
        }

        Ok(td)
    }

    /// One RMSprop step on the sum-reduction MSE between the taken actions'
    /// values and `targets`. Returns the loss before the step.
    pub fn update_batch(
        &mut self,
        inputs: ArrayView2<f64>,
        actions: &[usize],
        targets: ArrayView1<f64>,
    ) -> Result<f64> {
        let batch = inputs.nrows();
        if actions.len() != batch || targets.len() != batch {
            return Err(RlError::ShapeMismatch {
                expected: batch,
                actual: actions.len().min(targets.len()),
            });
        }
        if inputs.ncols() != self.config.input_dim {
            return Err(RlError::ShapeMismatch {
                expected: self.config.input_dim,
                actual: inputs.ncols(),
            });
        }
        for &action in actions {
            self.check_action(action)?;
        }

        // Batched forward pass with caches
        let last = self.weights.len() - 1;
        let mut activations = vec![inputs.to_owned()];
        let mut pre_activations = Vec::with_capacity(self.weights.len());
        for (layer, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = activations[layer].dot(w) + b;
            let a = if layer < last {
                z.mapv(|v| self.config.activation.apply(v))
            } else {
                z.clone()
            };
            pre_activations.push(z);
            activations.push(a);
        }

        let outputs = &activations[self.weights.len()];
        let mut loss = 0.0;
        let mut delta = Array2::zeros((batch, self.config.output_dim));
        for (row, (&action, &target)) in actions.iter().zip(targets.iter()).enumerate() {
            let residual = outputs[[row, action]] - target;
            loss += residual * residual;
            delta[[row, action]] = 2.0 * residual;
        }

        let lr = self.config.learning_rate;
        let decay = self.config.rmsprop_decay;
        for layer in (0..self.weights.len()).rev() {
            let next_delta = if layer > 0 {
                let back = delta.dot(&self.weights[layer].t());
                let deriv =
                    pre_activations[layer - 1].mapv(|z| self.config.activation.derivative(z));
                Some(back * deriv)
            } else {
                None
            };

            let grad_w = activations[layer].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));

            Zip::from(&mut self.weights[layer])
                .and(&mut self.sq_grad_w[layer])
                .and(&grad_w)
                .for_each(|w, s, &g| {
                    *s = decay * *s + (1.0 - decay) * g * g;
                    *w -= lr * g / (s.sqrt() + RMSPROP_EPSILON);
                });
            Zip::from(&mut self.biases[layer])
                .and(&mut self.sq_grad_b[layer])
                .and(&grad_b)
                .for_each(|b, s, &g| {
                    *s = decay * *s + (1.0 - decay) * g * g;
                    *b -= lr * g / (s.sqrt() + RMSPROP_EPSILON);
                });

            if let Some(next) = next_delta {
                delta = next;
            }
        }

        Ok(loss)
    }

    /// Copy all parameters from another network (target-network sync)
    pub fn sync_from(&mut self, other: &Self) {
        self.weights = other.weights.clone();
        self.biases = other.biases.clone();
    }

    /// Flattened parameters, layer by layer, weights then bias
    #[must_use]
    pub fn parameters(&self) -> Vec<f64> {
        let mut params = Vec::with_capacity(self.num_parameters());
        for (w, b) in self.weights.iter().zip(&self.biases) {
            params.extend(w.iter().copied());
            params.extend(b.iter().copied());
        }
        params
    }

    /// Restore parameters from a flattened vector
    pub fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        if params.len() != self.num_parameters() {
            return Err(RlError::ShapeMismatch {
                expected: self.num_parameters(),
                actual: params.len(),
            });
        }
        let mut offset = 0;
        for (w, b) in self.weights.iter_mut().zip(self.biases.iter_mut()) {
            for value in w.iter_mut() {
                *value = params[offset];
                offset += 1;
            }
            for value in b.iter_mut() {
                *value = params[offset];
                offset += 1;
            }
        }
        Ok(())
    }

    /// Total parameter count
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(w, b)| w.len() + b.len())
            .sum()
    }
}

fn xavier_init(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let column = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    column.dot(&row)
}

#[async_trait::async_trait]
impl ActionValueFunction for QNetwork {
    type Observation = VectorObservation;
    type Action = DiscreteAction;

    async fn q_value(
        &self,
        observation: &Self::Observation,
        action: &Self::Action,
    ) -> Result<f64> {
        self.q_value(ArrayView1::from(&observation.data), action.0)
    }

    async fn all_q_values(&self, observation: &Self::Observation) -> Result<Vec<f64>> {
        Ok(self.q_values(ArrayView1::from(&observation.data))?.to_vec())
    }

    async fn best_action_value(
        &self,
        observation: &Self::Observation,
    ) -> Result<(Self::Action, f64)> {
        let values = self.q_values(ArrayView1::from(&observation.data))?;
        let (action, value) = values
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(a, &v)| (a, v))
            .ok_or_else(|| RlError::Computation("network has no outputs".to_string()))?;
        Ok((DiscreteAction(action), value))
    }
}
