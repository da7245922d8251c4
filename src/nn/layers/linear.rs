// src/nn/layers/linear.rs
// Fully connected layer on top of the graph engine

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::nn::initializers::{Init, init_tensor};
use crate::nn::parameter::Parameter;
use crate::ops::{Add, MatMul};
use rand::Rng;

/// Linear transformation layer: y = x @ W + b
///
/// The kernel is stored as [in_features, out_features] so the forward pass is a
/// single matmul without a transpose.
#[derive(Debug)]
pub struct Linear<T>
where
    T: FmFloat,
{
    /// Kernel [in_features, out_features]
    pub weight: Parameter<T>,
    /// Optional bias vector [out_features]
    pub bias: Option<Parameter<T>>,
    pub in_features: usize,
    pub out_features: usize,
    training: bool,
}

impl<T> Linear<T>
where
    T: FmFloat,
{
    /// Creates a layer named `scope`, kernel initialized with `init` and bias
    /// with zeros.
    pub fn new<R: Rng + ?Sized>(
        scope: &str,
        in_features: usize,
        out_features: usize,
        bias: bool,
        init: Init,
        rng: &mut R,
    ) -> Result<Self, String> {
        let kernel = init_tensor(init, &[in_features, out_features], rng)?;
        let weight = Parameter::new(kernel, format!("{}/kernel", scope));
        let bias = bias.then(|| Parameter::zeros(&[out_features], format!("{}/bias", scope)));

        Ok(Self {
            weight,
            bias,
            in_features,
            out_features,
            training: true,
        })
    }

    /// Creates a layer with given kernel and bias tensors.
    pub fn from_tensors(
        scope: &str,
        weight: Tensor<T>,
        bias: Option<Tensor<T>>,
    ) -> Result<Self, String> {
        if weight.ndim() != 2 {
            return Err(format!(
                "Linear kernel must be 2D [in_features, out_features], got {:?}",
                weight.shape()
            ));
        }
        let (in_features, out_features) = (weight.shape()[0], weight.shape()[1]);
        if let Some(ref b) = bias {
            if b.shape() != [out_features] {
                return Err(format!(
                    "Bias shape {:?} doesn't match expected [out_features={}]",
                    b.shape(),
                    out_features
                ));
            }
        }

        Ok(Self {
            weight: Parameter::new(weight, format!("{}/kernel", scope)),
            bias: bias.map(|b| Parameter::new(b, format!("{}/bias", scope))),
            in_features,
            out_features,
            training: true,
        })
    }

    /// Kernel node, used by the layer L2 penalty.
    pub fn kernel_node(&self) -> Result<NodeId, String> {
        self.weight.node()
    }
}

impl<T> Module<T> for Linear<T>
where
    T: FmFloat,
{
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let input_shape = graph
            .get_node_shape(input)
            .ok_or("Input tensor not found in graph")?;
        if input_shape.len() != 2 || input_shape[1] != self.in_features {
            return Err(format!(
                "Linear expects input [batch, {}], got {:?}",
                self.in_features, input_shape
            ));
        }

        let weight_node = self.weight.node()?;
        let output = graph.apply_operation(Box::new(MatMul), vec![input, weight_node])?;

        match &self.bias {
            Some(bias) => graph.apply_operation(Box::new(Add), vec![output, bias.node()?]),
            None => Ok(output),
        }
    }

    fn parameters(&self) -> Vec<&Parameter<T>> {
        let mut params = vec![&self.weight];
        if let Some(ref bias) = self.bias {
            params.push(bias);
        }
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        let mut params = vec![&mut self.weight];
        if let Some(ref mut bias) = self.bias {
            params.push(bias);
        }
        params
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
