// matrix.rs
// Matrix multiplication for dense layers

use crate::backend::{FmFloat, Tensor};
use crate::ops::{Operator, expect_inputs};

/// output = input1 @ input2, both 2D
#[derive(Debug, Clone, Default)]
pub struct MatMul;

impl<T> Operator<T> for MatMul
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("MatMul", inputs, 2)?;
        inputs[0].matmul(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("MatMul", inputs, 2)?;
        // dA = dC @ B^T, dB = A^T @ dC
        let b_t = inputs[1].transpose(None)?;
        let a_t = inputs[0].transpose(None)?;
        Ok(vec![grad_output.matmul(&b_t)?, a_t.matmul(&grad_output)?])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}
