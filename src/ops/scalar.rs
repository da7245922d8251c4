// scalar.rs
// Operations between a tensor and a constant scalar

use crate::backend::{FmFloat, Tensor};
use crate::ops::{Operator, expect_inputs};

/// Scalar addition: output = input + scalar
#[derive(Debug, Clone)]
pub struct AddScalar<T> {
    pub scalar: T,
}

impl<T> AddScalar<T> {
    pub fn new(scalar: T) -> Self {
        Self { scalar }
    }
}

impl<T> Operator<T> for AddScalar<T>
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("AddScalar", inputs, 1)?;
        Ok(inputs[0].add_scalar(self.scalar))
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("AddScalar", inputs, 1)?;
        Ok(vec![grad_output])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Scalar multiplication: output = input * scalar
#[derive(Debug, Clone)]
pub struct MulScalar<T> {
    pub scalar: T,
}

impl<T> MulScalar<T> {
    pub fn new(scalar: T) -> Self {
        Self { scalar }
    }
}

impl<T> Operator<T> for MulScalar<T>
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("MulScalar", inputs, 1)?;
        Ok(inputs[0].mul_scalar(self.scalar))
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("MulScalar", inputs, 1)?;
        Ok(vec![grad_output.mul_scalar(self.scalar)])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
