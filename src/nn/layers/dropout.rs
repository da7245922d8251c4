// src/nn/layers/dropout.rs
// Inverted dropout, parameterized by keep probability

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::ops::Mul;
use rand::Rng;

/// Dropout layer for regularization.
/// During training each element is kept with probability `keep_prob` and
/// scaled by `1 / keep_prob`; during evaluation the input passes unchanged.
#[derive(Debug, Clone)]
pub struct Dropout<T>
where
    T: FmFloat,
{
    pub keep_prob: f64,
    training: bool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Dropout<T>
where
    T: FmFloat,
{
    pub fn new(keep_prob: f64) -> Result<Self, String> {
        if !(keep_prob > 0.0 && keep_prob <= 1.0) {
            return Err(format!(
                "Dropout keep probability must be in (0, 1], got {}",
                keep_prob
            ));
        }

        Ok(Self {
            keep_prob,
            training: true,
            _phantom: std::marker::PhantomData,
        })
    }

    fn create_dropout_mask(&self, input_shape: &[usize]) -> Result<Tensor<T>, String> {
        let total_elements: usize = input_shape.iter().product();
        let mut rng = rand::rng();
        let scale = T::from_real(1.0 / self.keep_prob);

        let mask_data = (0..total_elements)
            .map(|_| {
                let random_val: f64 = rng.random();
                if random_val < self.keep_prob {
                    scale
                } else {
                    T::zero()
                }
            })
            .collect();

        Tensor::from_vec(mask_data, input_shape)
    }
}

impl<T> Module<T> for Dropout<T>
where
    T: FmFloat,
{
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        if !self.training || self.keep_prob >= 1.0 {
            return Ok(input);
        }

        let shape = graph
            .get_node_shape(input)
            .ok_or("Input tensor not found in graph")?;
        let mask = graph.create_variable(self.create_dropout_mask(&shape)?, false);
        graph.apply_operation(Box::new(Mul), vec![input, mask])
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
