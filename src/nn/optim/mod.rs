use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use std::collections::BTreeSet;

pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::SGD;

/// Error types for optimizer operations
#[derive(Debug)]
pub enum OptimizerError {
    GradientNotFound(NodeId),
    ParameterNotFound(NodeId),
    TensorOperation(String),
    InvalidParameterGroup,
    InvalidHyperparameter(String),
}

impl std::fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            OptimizerError::GradientNotFound(id) => {
                write!(f, "Gradient not found for node {}", id.0)
            }
            OptimizerError::ParameterNotFound(id) => {
                write!(f, "Parameter not found for node {}", id.0)
            }
            OptimizerError::TensorOperation(msg) => write!(f, "Tensor operation failed: {}", msg),
            OptimizerError::InvalidParameterGroup => {
                write!(f, "Invalid parameter group configuration")
            }
            OptimizerError::InvalidHyperparameter(msg) => {
                write!(f, "Invalid hyperparameter: {}", msg)
            }
        }
    }
}

impl std::error::Error for OptimizerError {}

impl From<String> for OptimizerError {
    fn from(msg: String) -> Self {
        OptimizerError::TensorOperation(msg)
    }
}

/// Parameter group for flexible per-layer optimization settings
#[derive(Debug, Clone)]
pub struct ParameterGroup<T>
where
    T: FmFloat,
{
    // Ordered so every step visits parameters in the same order
    pub params: BTreeSet<NodeId>,
    pub lr: Option<T>,
    pub weight_decay: Option<T>,
    pub momentum: Option<T>,
    pub name: String,
}

impl<T> ParameterGroup<T>
where
    T: FmFloat,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            params: BTreeSet::new(),
            lr: None,
            weight_decay: None,
            momentum: None,
            name: name.into(),
        }
    }

    pub fn with_lr(mut self, lr: T) -> Self {
        self.lr = Some(lr);
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: T) -> Self {
        self.weight_decay = Some(weight_decay);
        self
    }

    pub fn add_param(&mut self, param_id: NodeId) {
        self.params.insert(param_id);
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Core trait for all optimizers with proper error handling
pub trait Optimizer<T>
where
    T: FmFloat,
{
    /// Perform one optimization step using computed gradients.
    /// Parameters without a gradient are skipped.
    fn step(&mut self, engine: &mut Engine<T>) -> Result<(), OptimizerError>;

    /// Clear all gradients for registered parameters
    fn reset_grad(&mut self, engine: &mut Engine<T>) {
        for id in self.param_ids() {
            engine.clear_gradient(id);
        }
    }

    /// Add a single parameter to be optimized
    fn add_param(&mut self, param_node_id: NodeId);

    /// Add parameter group with custom settings
    fn add_param_group(&mut self, group: ParameterGroup<T>) -> Result<(), OptimizerError>;

    /// Add several parameters to the default group
    fn add_params(&mut self, params: &[NodeId]) {
        for &id in params {
            self.add_param(id);
        }
    }

    /// All parameters this optimizer updates
    fn param_ids(&self) -> Vec<NodeId>;

    /// Get current learning rate for main parameter group
    fn get_lr(&self) -> T;

    /// Set learning rate for all parameter groups
    fn set_lr(&mut self, lr: T);

    fn name(&self) -> &'static str;
}

/// Optimizer chosen at runtime by name.
#[derive(Debug)]
pub enum Optim<T>
where
    T: FmFloat,
{
    SGD(SGD<T>),
    Adam(Adam<T>),
}

impl<T> Optimizer<T> for Optim<T>
where
    T: FmFloat,
{
    fn step(&mut self, engine: &mut Engine<T>) -> Result<(), OptimizerError> {
        match self {
            Optim::SGD(o) => o.step(engine),
            Optim::Adam(o) => o.step(engine),
        }
    }

    fn add_param(&mut self, param_node_id: NodeId) {
        match self {
            Optim::SGD(o) => o.add_param(param_node_id),
            Optim::Adam(o) => o.add_param(param_node_id),
        }
    }

    fn add_param_group(&mut self, group: ParameterGroup<T>) -> Result<(), OptimizerError> {
        match self {
            Optim::SGD(o) => o.add_param_group(group),
            Optim::Adam(o) => o.add_param_group(group),
        }
    }

    fn param_ids(&self) -> Vec<NodeId> {
        match self {
            Optim::SGD(o) => o.param_ids(),
            Optim::Adam(o) => o.param_ids(),
        }
    }

    fn get_lr(&self) -> T {
        match self {
            Optim::SGD(o) => o.get_lr(),
            Optim::Adam(o) => o.get_lr(),
        }
    }

    fn set_lr(&mut self, lr: T) {
        match self {
            Optim::SGD(o) => o.set_lr(lr),
            Optim::Adam(o) => o.set_lr(lr),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Optim::SGD(o) => o.name(),
            Optim::Adam(o) => o.name(),
        }
    }
}

/// Reads the parameter value and its gradient, or None if the parameter has
/// no gradient this step.
pub(crate) fn param_and_grad<T: FmFloat>(
    engine: &Engine<T>,
    param_node: NodeId,
) -> Result<Option<(crate::backend::Tensor<T>, crate::backend::Tensor<T>)>, OptimizerError> {
    let Some(grad) = engine.get_gradient(param_node) else {
        return Ok(None);
    };
    let params = engine
        .get_tensor(param_node)
        .ok_or(OptimizerError::ParameterNotFound(param_node))?;
    Ok(Some((params.clone(), grad.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Tensor;
    use approx::assert_abs_diff_eq;

    fn setup(value: f64) -> (Engine<f64>, NodeId) {
        let mut engine = Engine::new();
        let node = engine
            .create_parameter(Tensor::from_vec(vec![value], &[1]).unwrap(), "p")
            .unwrap();
        (engine, node)
    }

    #[test]
    fn test_sgd_plain_step() {
        let (mut engine, node) = setup(1.0);
        let mut optimizer = SGD::with_defaults(0.1);
        optimizer.add_param(node);
        engine.set_gradient(node, Tensor::from_vec(vec![2.0], &[1]).unwrap());
        optimizer.step(&mut engine).unwrap();
        assert_abs_diff_eq!(engine.get_tensor(node).unwrap().to_vec()[0], 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_sgd_momentum_accumulates() {
        let (mut engine, node) = setup(0.0);
        let mut optimizer = SGD::with_momentum(1.0, 0.5);
        optimizer.add_param(node);
        for _ in 0..2 {
            engine.set_gradient(node, Tensor::from_vec(vec![1.0], &[1]).unwrap());
            optimizer.step(&mut engine).unwrap();
            optimizer.reset_grad(&mut engine);
        }
        // buffers: 1.0 then 1.5
        assert_abs_diff_eq!(engine.get_tensor(node).unwrap().to_vec()[0], -2.5, epsilon = 1e-12);
        assert!(engine.get_gradient(node).is_none());
    }

    #[test]
    fn test_sgd_weight_decay() {
        let (mut engine, node) = setup(2.0);
        let mut optimizer = SGD::new(0.5, 0.0, 0.1, false);
        optimizer.add_param(node);
        engine.set_gradient(node, Tensor::from_vec(vec![0.0], &[1]).unwrap());
        optimizer.step(&mut engine).unwrap();
        assert_abs_diff_eq!(engine.get_tensor(node).unwrap().to_vec()[0], 1.9, epsilon = 1e-12);
    }

    #[test]
    fn test_adam_first_step_moves_by_lr() {
        let (mut engine, node) = setup(1.0);
        let mut optimizer = Adam::with_defaults(0.01);
        optimizer.add_param(node);
        engine.set_gradient(node, Tensor::from_vec(vec![0.5], &[1]).unwrap());
        optimizer.step(&mut engine).unwrap();
        // bias-corrected first step is lr * sign(grad)
        assert_abs_diff_eq!(engine.get_tensor(node).unwrap().to_vec()[0], 0.99, epsilon = 1e-6);
        assert_eq!(optimizer.get_step_count(), 1);
    }

    #[test]
    fn test_parameters_without_gradient_are_skipped() {
        let (mut engine, node) = setup(1.0);
        let mut optimizer = Adam::with_defaults(0.01);
        optimizer.add_param(node);
        optimizer.step(&mut engine).unwrap();
        assert_eq!(engine.get_tensor(node).unwrap().to_vec(), vec![1.0]);
    }

    #[test]
    fn test_set_lr_updates_groups() {
        let mut optimizer = SGD::<f64>::with_defaults(0.1);
        let mut group = ParameterGroup::new("gates").with_lr(0.5);
        group.add_param(NodeId(usize::MAX));
        optimizer.add_param_group(group).unwrap();
        assert!(optimizer.add_param_group(ParameterGroup::new("empty")).is_err());
        optimizer.set_lr(0.01);
        assert_eq!(optimizer.get_lr(), 0.01);
        assert_eq!(optimizer.param_ids(), vec![NodeId(usize::MAX)]);
    }
}
