// Model and training hyper-parameters. All of them deserialize from JSON with
// field defaults, so a run configuration only needs to name what it changes.

use crate::backend::FmFloat;
use crate::nn::initializers::Init;
use crate::nn::{Adam, Optim, SGD};
use crate::search::{InteractionMask, Result, SearchError, num_combinations};
use serde::{Deserialize, Serialize};

fn default_weight_base() -> f64 {
    0.6
}

fn default_prune_threshold() -> f64 {
    0.3
}

fn default_init() -> String {
    "xavier".to_string()
}

/// Hyper-parameters of [`AutoFm`](crate::models::AutoFm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoFmConfig {
    /// Initializer name for the embedding tables
    pub init: String,
    /// Number of fields (slots) per example
    pub num_inputs: usize,
    /// Size of the shared feature id space
    pub input_dim: usize,
    pub embed_size: usize,
    pub l2_w: Option<f64>,
    pub l2_v: Option<f64>,
    /// Keep mask over the full pair list; `None` keeps every pair
    pub comb_mask: Option<Vec<u8>>,
    #[serde(default = "default_weight_base")]
    pub weight_base: f64,
    /// Build (and prune) the order 3 term
    pub third_prune: bool,
    pub comb_mask_third: Option<Vec<u8>>,
    #[serde(default = "default_weight_base")]
    pub weight_base_third: f64,
    pub retrain_stage: bool,
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: f64,
    pub seed: u64,
}

impl Default for AutoFmConfig {
    fn default() -> Self {
        Self {
            init: default_init(),
            num_inputs: 0,
            input_dim: 0,
            embed_size: 0,
            l2_w: None,
            l2_v: None,
            comb_mask: None,
            weight_base: default_weight_base(),
            third_prune: false,
            comb_mask_third: None,
            weight_base_third: default_weight_base(),
            retrain_stage: false,
            prune_threshold: default_prune_threshold(),
            seed: 0,
        }
    }
}

impl AutoFmConfig {
    pub fn new(num_inputs: usize, input_dim: usize, embed_size: usize) -> Self {
        Self {
            num_inputs,
            input_dim,
            embed_size,
            ..Self::default()
        }
    }

    pub fn init(&self) -> Result<Init> {
        self.init.parse::<Init>().map_err(SearchError::Config)
    }

    /// Effective L2 coefficient on the looked-up linear weights. Always off
    /// in the retrain stage.
    pub fn l2_w(&self) -> Option<f64> {
        if self.retrain_stage { None } else { self.l2_w }
    }

    /// Effective L2 coefficient on the looked-up embeddings.
    pub fn l2_v(&self) -> Option<f64> {
        if self.retrain_stage { None } else { self.l2_v }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_inputs < 2 {
            return Err(SearchError::Config(format!(
                "num_inputs must be at least 2, got {}",
                self.num_inputs
            )));
        }
        if self.input_dim == 0 || self.embed_size == 0 {
            return Err(SearchError::Config(
                "input_dim and embed_size must be positive".to_string(),
            ));
        }
        if !(self.prune_threshold >= 0.0 && self.prune_threshold <= 1.0) {
            return Err(SearchError::Config(format!(
                "prune_threshold must be in [0, 1], got {}",
                self.prune_threshold
            )));
        }
        self.init()?;
        if let Some(mask) = &self.comb_mask {
            InteractionMask::new(2, self.num_inputs, mask.clone())?;
        }
        if let Some(mask) = &self.comb_mask_third {
            if !self.third_prune {
                return Err(SearchError::Config(
                    "comb_mask_third given but third_prune is off".to_string(),
                ));
            }
            InteractionMask::new(3, self.num_inputs, mask.clone())?;
        }
        Ok(())
    }

    /// Configuration of the retrain stage: masks from structure analysis
    /// applied, regularization off. Orders without a mask keep every
    /// combination.
    pub fn for_retrain(&self, masks: &[InteractionMask]) -> Result<Self> {
        let mut config = self.clone();
        config.retrain_stage = true;
        for mask in masks {
            mask.validate()?;
            if mask.num_slots != self.num_inputs {
                return Err(SearchError::Config(format!(
                    "mask was built for {} slots, model has {}",
                    mask.num_slots, self.num_inputs
                )));
            }
            match mask.order {
                2 => config.comb_mask = Some(mask.mask.clone()),
                3 if self.third_prune => config.comb_mask_third = Some(mask.mask.clone()),
                order => {
                    return Err(SearchError::InvalidOrder {
                        order,
                        num_slots: self.num_inputs,
                    });
                }
            }
        }
        Ok(config)
    }

    pub fn num_pairs(&self) -> usize {
        num_combinations(self.num_inputs, 2)
    }
}

/// Hyper-parameters of [`AutoDeepFm`](crate::models::AutoDeepFm): the FM part
/// plus the deep component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDeepFmConfig {
    #[serde(flatten)]
    pub base: AutoFmConfig,
    /// Output sizes of the dense layers; the last one must be 1
    pub layer_sizes: Vec<usize>,
    /// Activation per layer (`relu`, `sigmoid`, `tanh`, `none`)
    pub layer_acts: Vec<String>,
    /// Keep probability per layer, applied only while training
    pub layer_keeps: Vec<f64>,
    pub layer_l2: Option<f64>,
    pub batch_norm: bool,
    pub layer_norm: bool,
}

impl Default for AutoDeepFmConfig {
    fn default() -> Self {
        Self {
            base: AutoFmConfig::default(),
            layer_sizes: vec![32, 32, 1],
            layer_acts: vec!["relu".to_string(), "relu".to_string(), "none".to_string()],
            layer_keeps: vec![1.0, 1.0, 1.0],
            layer_l2: None,
            batch_norm: false,
            layer_norm: false,
        }
    }
}

impl AutoDeepFmConfig {
    pub fn new(num_inputs: usize, input_dim: usize, embed_size: usize) -> Self {
        Self {
            base: AutoFmConfig::new(num_inputs, input_dim, embed_size),
            ..Self::default()
        }
    }

    pub fn layer_l2(&self) -> Option<f64> {
        if self.base.retrain_stage { None } else { self.layer_l2 }
    }

    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.layer_sizes.last() != Some(&1) {
            return Err(SearchError::Config(format!(
                "the last dense layer must have one output, got layer_sizes {:?}",
                self.layer_sizes
            )));
        }
        if self.layer_acts.len() != self.layer_sizes.len()
            || self.layer_keeps.len() != self.layer_sizes.len()
        {
            return Err(SearchError::Config(
                "layer_sizes, layer_acts and layer_keeps must have the same length".to_string(),
            ));
        }
        Ok(())
    }

    pub fn for_retrain(&self, masks: &[InteractionMask]) -> Result<Self> {
        Ok(Self {
            base: self.base.for_retrain(masks)?,
            ..self.clone()
        })
    }
}

/// Training loop settings, with presets for common setups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    // Common training parameters
    pub batch_size: usize,
    pub num_epochs: usize,
    pub learning_rate: Option<f64>,
    pub print_every: usize,

    // Optimizer selection and parameters
    pub optimizer: String,

    // SGD-specific parameters
    pub momentum: Option<f64>,
    pub nesterov: bool,
    pub decay: Option<f64>,

    // Adam-specific parameters
    pub beta1: Option<f64>,
    pub beta2: Option<f64>,
    pub eps: Option<f64>,
    pub amsgrad: bool,

    /// Weight of positive examples in the loss
    pub pos_weight: f64,
    /// When set, the edge-weight gates get their own optimizer with this rate
    pub gate_learning_rate: Option<f64>,
    /// Log full weight and mask lists instead of the first entries
    pub print_full_weight: bool,
    /// Drop the last incomplete batch of each epoch
    pub drop_last: bool,
    /// Reshuffle the samples every epoch
    pub shuffle: bool,
    pub seed: u64,
}

impl TrainingConfig {
    /// Default configuration for stable training
    pub fn default_stable() -> Self {
        Self {
            batch_size: 32,
            num_epochs: 100,
            learning_rate: Some(0.0001),
            print_every: 10,
            optimizer: "Adam".to_string(),

            momentum: Some(0.9),
            nesterov: false,
            decay: Some(0.0),

            beta1: Some(0.9),
            beta2: Some(0.999),
            eps: Some(1e-8),
            amsgrad: false,

            pos_weight: 1.0,
            gate_learning_rate: None,
            print_full_weight: false,
            drop_last: false,
            shuffle: true,
            seed: 0,
        }
    }

    /// Fast training configuration for quick testing
    pub fn fast() -> Self {
        Self {
            batch_size: 100,
            num_epochs: 20,
            learning_rate: Some(0.01),
            print_every: 5,
            ..Self::default_stable()
        }
    }

    /// SGD-specific configuration
    pub fn sgd(learning_rate: f64) -> Self {
        Self {
            learning_rate: Some(learning_rate),
            optimizer: "SGD".to_string(),
            nesterov: true,
            beta1: None,
            beta2: None,
            eps: None,
            ..Self::default_stable()
        }
    }

    fn required(value: Option<f64>, what: &str) -> Result<f64> {
        value.ok_or_else(|| SearchError::Config(format!("{} not provided", what)))
    }

    /// Builds the optimizer named by `optimizer` with learning rate `lr`.
    pub fn build_optimizer<T: FmFloat>(&self, lr: f64) -> Result<Optim<T>> {
        if !(lr > 0.0) {
            return Err(SearchError::Config(format!(
                "learning rate must be positive, got {}",
                lr
            )));
        }
        match self.optimizer.as_str() {
            "SGD" => Ok(Optim::SGD(SGD::new(
                T::from_real(lr),
                T::from_real(Self::required(self.momentum, "Momentum")?),
                T::from_real(Self::required(self.decay, "Weight decay")?),
                self.nesterov,
            ))),
            "Adam" => Ok(Optim::Adam(Adam::new(
                T::from_real(lr),
                T::from_real(Self::required(self.beta1, "Beta1")?),
                T::from_real(Self::required(self.beta2, "Beta2")?),
                T::from_real(Self::required(self.eps, "Epsilon")?),
                T::from_real(Self::required(self.decay, "Weight decay")?),
                self.amsgrad,
            ))),
            other => Err(SearchError::Config(format!(
                "Invalid optimizer name '{}'! Must be Adam or SGD",
                other
            ))),
        }
    }

    /// Main optimizer, plus the gate optimizer when `gate_learning_rate` is set.
    pub fn build_optimizers<T: FmFloat>(&self) -> Result<(Optim<T>, Option<Optim<T>>)> {
        let main = self.build_optimizer(Self::required(self.learning_rate, "Learning rate")?)?;
        let gates = match self.gate_learning_rate {
            Some(lr) => Some(self.build_optimizer(lr)?),
            None => None,
        };
        Ok((main, gates))
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::default_stable()
    }
}
