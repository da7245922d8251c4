// reshape.rs
// Shape manipulation

use crate::backend::{FmFloat, Tensor};
use crate::ops::{Operator, expect_inputs};

/// Reshape to a new shape with the same number of elements.
#[derive(Debug, Clone)]
pub struct Reshape {
    pub new_shape: Vec<usize>,
}

impl Reshape {
    pub fn new(new_shape: Vec<usize>) -> Self {
        Self { new_shape }
    }
}

impl<T> Operator<T> for Reshape
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Reshape", inputs, 1)?;
        inputs[0].reshape(&self.new_shape)
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Reshape", inputs, 1)?;
        Ok(vec![grad_output.reshape(inputs[0].shape())?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
