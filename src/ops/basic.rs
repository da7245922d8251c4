// basic.rs
// Elementwise arithmetic with numpy broadcasting.

use crate::backend::{FmFloat, Tensor};
use crate::ops::{Operator, expect_inputs};

/// Helper to reduce gradients when broadcasting was used in forward pass
/// This ensures gradient shapes match the original input shapes
pub fn reduce_gradient_for_broadcasting<T>(
    grad: Tensor<T>,
    target_shape: &[usize],
) -> Result<Tensor<T>, String>
where
    T: FmFloat,
{
    let grad_shape = grad.shape().to_vec();
    if grad_shape == target_shape {
        return Ok(grad);
    }

    let mut axes_to_reduce = Vec::new();
    let extra = grad_shape.len().saturating_sub(target_shape.len());
    for (i, &size) in grad_shape.iter().enumerate() {
        if i < extra {
            // Extra leading dimensions in grad - sum them out
            axes_to_reduce.push(i);
        } else if target_shape[i - extra] == 1 && size > 1 {
            axes_to_reduce.push(i);
        }
    }

    let reduced = if axes_to_reduce.is_empty() {
        grad
    } else {
        grad.sum(Some(&axes_to_reduce), true)?
    };

    // Drop the kept leading axes and restore trailing 1s.
    reduced.reshape(target_shape)
}

/// Element-wise addition: output = input1 + input2
#[derive(Debug, Clone, Default)]
pub struct Add;

impl<T> Operator<T> for Add
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Add", inputs, 2)?;
        inputs[0].add(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Add", inputs, 2)?;
        // d/dx(x + y) = 1, d/dy(x + y) = 1
        let grad_lhs = reduce_gradient_for_broadcasting(grad_output.clone(), inputs[0].shape())?;
        let grad_rhs = reduce_gradient_for_broadcasting(grad_output, inputs[1].shape())?;
        Ok(vec![grad_lhs, grad_rhs])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Element-wise subtraction: output = input1 - input2
#[derive(Debug, Clone, Default)]
pub struct Sub;

impl<T> Operator<T> for Sub
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Sub", inputs, 2)?;
        inputs[0].sub(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Sub", inputs, 2)?;
        let grad_lhs = reduce_gradient_for_broadcasting(grad_output.clone(), inputs[0].shape())?;
        let grad_rhs = reduce_gradient_for_broadcasting(grad_output.neg(), inputs[1].shape())?;
        Ok(vec![grad_lhs, grad_rhs])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Element-wise multiplication: output = input1 * input2
#[derive(Debug, Clone, Default)]
pub struct Mul;

impl<T> Operator<T> for Mul
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Mul", inputs, 2)?;
        inputs[0].mul(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Mul", inputs, 2)?;
        // d/dx(x * y) = y, d/dy(x * y) = x
        let grad_lhs = grad_output.mul(inputs[1])?;
        let grad_rhs = grad_output.mul(inputs[0])?;
        Ok(vec![
            reduce_gradient_for_broadcasting(grad_lhs, inputs[0].shape())?,
            reduce_gradient_for_broadcasting(grad_rhs, inputs[1].shape())?,
        ])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}

/// Element-wise division: output = input1 / input2
#[derive(Debug, Clone, Default)]
pub struct Div;

impl<T> Operator<T> for Div
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Div", inputs, 2)?;
        inputs[0].div(inputs[1])
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Div", inputs, 2)?;
        // d/dx(x / y) = 1/y, d/dy(x / y) = -x/y^2 = -output/y
        let grad_lhs = grad_output.div(inputs[1])?;
        let grad_rhs = grad_output.mul(output)?.div(inputs[1])?.neg();
        Ok(vec![
            reduce_gradient_for_broadcasting(grad_lhs, inputs[0].shape())?,
            reduce_gradient_for_broadcasting(grad_rhs, inputs[1].shape())?,
        ])
    }

    fn num_inputs(&self) -> usize {
        2
    }
}
