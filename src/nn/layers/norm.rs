// src/nn/layers/norm.rs
// Normalization layers composed from graph operations

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::nn::parameter::Parameter;
use crate::ops::{Add, AddScalar, Div, Mean, Mul, Sqrt, Square, Sub};
use std::cell::RefCell;

/// Shared tail of both norms: `(centered / sqrt(var + eps)) * gamma + beta`.
fn scale_and_shift<T: FmFloat>(
    graph: &mut Engine<T>,
    centered: NodeId,
    variance: NodeId,
    eps: f64,
    gamma: NodeId,
    beta: NodeId,
) -> Result<NodeId, String> {
    let var_eps = graph.apply_operation(
        Box::new(AddScalar::new(T::from_real(eps))),
        vec![variance],
    )?;
    let std = graph.apply_operation(Box::new(Sqrt), vec![var_eps])?;
    let normalized = graph.apply_operation(Box::new(Div), vec![centered, std])?;
    let scaled = graph.apply_operation(Box::new(Mul), vec![normalized, gamma])?;
    graph.apply_operation(Box::new(Add), vec![scaled, beta])
}

/// ---------------------------------------------------
/// BATCH NORM
/// ---------------------------------------------------
///
/// Batch normalization over the batch axis of a [batch, features] input.
/// Learnable scale (gamma) and center (beta). Running statistics follow the
/// moving average convention `running = momentum * running + (1 - momentum) * batch`
/// and are used in inference mode.
#[derive(Debug)]
pub struct BatchNorm1d<T>
where
    T: FmFloat,
{
    eps: f64,
    momentum: f64,
    pub gamma: Parameter<T>,
    pub beta: Parameter<T>,
    pub running_mean: RefCell<Tensor<T>>,
    pub running_var: RefCell<Tensor<T>>,
    num_batches_tracked: RefCell<usize>,
    training: bool,
}

impl<T> BatchNorm1d<T>
where
    T: FmFloat,
{
    pub fn new(scope: &str, num_features: usize, eps: f64, momentum: f64) -> Self {
        Self {
            eps,
            momentum,
            gamma: Parameter::ones(&[num_features], format!("{}/gamma", scope)),
            beta: Parameter::zeros(&[num_features], format!("{}/beta", scope)),
            running_mean: RefCell::new(Tensor::zeros(&[num_features])),
            running_var: RefCell::new(Tensor::ones(&[num_features])),
            num_batches_tracked: RefCell::new(0),
            training: true,
        }
    }

    /// Defaults: eps 1e-3, momentum 0.99.
    pub fn new_default(scope: &str, num_features: usize) -> Self {
        Self::new(scope, num_features, 1e-3, 0.99)
    }

    pub fn num_features(&self) -> usize {
        self.gamma.size()
    }

    pub fn num_batches_tracked(&self) -> usize {
        *self.num_batches_tracked.borrow()
    }

    fn update_running_stats(
        &self,
        batch_mean: &Tensor<T>,
        batch_var: &Tensor<T>,
    ) -> Result<(), String> {
        let momentum = T::from_real(self.momentum);
        let one_minus_momentum = T::from_real(1.0 - self.momentum);
        let features = [self.num_features()];

        *self.num_batches_tracked.borrow_mut() += 1;
        {
            let mut running_mean = self.running_mean.borrow_mut();
            *running_mean = running_mean
                .mul_scalar(momentum)
                .add(&batch_mean.reshape(&features)?.mul_scalar(one_minus_momentum))?;
        }
        {
            let mut running_var = self.running_var.borrow_mut();
            *running_var = running_var
                .mul_scalar(momentum)
                .add(&batch_var.reshape(&features)?.mul_scalar(one_minus_momentum))?;
        }
        Ok(())
    }

    fn forward_training(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let batch_mean = graph
            .apply_operation(Box::new(Mean::along_axes(vec![0], true)), vec![input])
            .map_err(|e| format!("BatchNorm mean computation failed: {}", e))?;
        let centered = graph
            .apply_operation(Box::new(Sub), vec![input, batch_mean])
            .map_err(|e| format!("BatchNorm centering failed: {}", e))?;
        let squared = graph.apply_operation(Box::new(Square), vec![centered])?;
        let variance = graph
            .apply_operation(Box::new(Mean::along_axes(vec![0], true)), vec![squared])
            .map_err(|e| format!("BatchNorm variance computation failed: {}", e))?;

        {
            let mean_tensor = graph
                .get_tensor(batch_mean)
                .ok_or("Could not get batch mean tensor")?;
            let var_tensor = graph
                .get_tensor(variance)
                .ok_or("Could not get variance tensor")?;
            self.update_running_stats(mean_tensor, var_tensor)?;
        }

        scale_and_shift(
            graph,
            centered,
            variance,
            self.eps,
            self.gamma.node()?,
            self.beta.node()?,
        )
    }

    fn forward_inference(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let mean = graph.create_variable(self.running_mean.borrow().clone(), false);
        let var = graph.create_variable(self.running_var.borrow().clone(), false);
        let centered = graph.apply_operation(Box::new(Sub), vec![input, mean])?;
        scale_and_shift(
            graph,
            centered,
            var,
            self.eps,
            self.gamma.node()?,
            self.beta.node()?,
        )
    }
}

impl<T> Module<T> for BatchNorm1d<T>
where
    T: FmFloat,
{
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let shape = graph
            .get_node_shape(input)
            .ok_or("Input tensor not found in graph")?;
        if shape.len() != 2 || shape[1] != self.num_features() {
            return Err(format!(
                "BatchNorm1d expects input [batch, {}], got {:?}",
                self.num_features(),
                shape
            ));
        }

        if self.training {
            self.forward_training(graph, input)
        } else {
            self.forward_inference(graph, input)
        }
    }

    fn parameters(&self) -> Vec<&Parameter<T>> {
        vec![&self.gamma, &self.beta]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        vec![&mut self.gamma, &mut self.beta]
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

/// ---------------------------------------------------
/// LAYER NORM
/// ---------------------------------------------------
///
/// Normalizes each example over its feature axis.
#[derive(Debug)]
pub struct LayerNorm<T>
where
    T: FmFloat,
{
    eps: f64,
    pub gamma: Parameter<T>,
    pub beta: Parameter<T>,
    training: bool,
}

impl<T> LayerNorm<T>
where
    T: FmFloat,
{
    pub fn new(scope: &str, num_features: usize, eps: f64) -> Self {
        Self {
            eps,
            gamma: Parameter::ones(&[num_features], format!("{}/gamma", scope)),
            beta: Parameter::zeros(&[num_features], format!("{}/beta", scope)),
            training: true,
        }
    }

    pub fn new_default(scope: &str, num_features: usize) -> Self {
        Self::new(scope, num_features, 1e-5)
    }
}

impl<T> Module<T> for LayerNorm<T>
where
    T: FmFloat,
{
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let shape = graph
            .get_node_shape(input)
            .ok_or("Input tensor not found in graph")?;
        if shape.len() != 2 || shape[1] != self.gamma.size() {
            return Err(format!(
                "LayerNorm expects input [batch, {}], got {:?}",
                self.gamma.size(),
                shape
            ));
        }

        let mean = graph.apply_operation(Box::new(Mean::along_axes(vec![1], true)), vec![input])?;
        let centered = graph.apply_operation(Box::new(Sub), vec![input, mean])?;
        let squared = graph.apply_operation(Box::new(Square), vec![centered])?;
        let variance =
            graph.apply_operation(Box::new(Mean::along_axes(vec![1], true)), vec![squared])?;
        scale_and_shift(
            graph,
            centered,
            variance,
            self.eps,
            self.gamma.node()?,
            self.beta.node()?,
        )
    }

    fn parameters(&self) -> Vec<&Parameter<T>> {
        vec![&self.gamma, &self.beta]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        vec![&mut self.gamma, &mut self.beta]
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
