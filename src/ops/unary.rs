// unary.rs
// Elementwise unary operations

use crate::backend::{FmFloat, Tensor};
use crate::ops::{Operator, expect_inputs};

/// Element-wise negation: output = -input
#[derive(Debug, Clone, Default)]
pub struct Neg;

impl<T> Operator<T> for Neg
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Neg", inputs, 1)?;
        Ok(inputs[0].neg())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Neg", inputs, 1)?;
        Ok(vec![grad_output.neg()])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise exponential: output = exp(input)
#[derive(Debug, Clone, Default)]
pub struct Exp;

impl<T> Operator<T> for Exp
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Exp", inputs, 1)?;
        Ok(inputs[0].exp())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Exp", inputs, 1)?;
        // d/dx(exp(x)) = exp(x), which is the cached output
        Ok(vec![grad_output.mul(output)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise natural logarithm: output = log(input)
#[derive(Debug, Clone, Default)]
pub struct Log;

impl<T> Operator<T> for Log
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Log", inputs, 1)?;
        Ok(inputs[0].log())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Log", inputs, 1)?;
        Ok(vec![grad_output.div(inputs[0])?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise square root
#[derive(Debug, Clone, Default)]
pub struct Sqrt;

impl<T> Operator<T> for Sqrt
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Sqrt", inputs, 1)?;
        Ok(inputs[0].sqrt())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Sqrt", inputs, 1)?;
        // d/dx(sqrt(x)) = 1 / (2 sqrt(x))
        let two = T::from_real(2.0);
        Ok(vec![grad_output.div(&output.mul_scalar(two))?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise absolute value
#[derive(Debug, Clone, Default)]
pub struct Abs;

impl<T> Operator<T> for Abs
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Abs", inputs, 1)?;
        Ok(inputs[0].abs())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Abs", inputs, 1)?;
        Ok(vec![grad_output.mul(&inputs[0].sign())?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Element-wise square: output = input^2
#[derive(Debug, Clone, Default)]
pub struct Square;

impl<T> Operator<T> for Square
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Square", inputs, 1)?;
        Ok(inputs[0].square())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Square", inputs, 1)?;
        let two = T::from_real(2.0);
        Ok(vec![grad_output.mul(&inputs[0].mul_scalar(two))?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Logistic sigmoid: output = 1 / (1 + exp(-input))
#[derive(Debug, Clone, Default)]
pub struct Sigmoid;

impl<T> Operator<T> for Sigmoid
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Sigmoid", inputs, 1)?;
        Ok(inputs[0].sigmoid())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Sigmoid", inputs, 1)?;
        // s'(x) = s(x) * (1 - s(x))
        let local = output.map(|s| s * (T::one() - s));
        Ok(vec![grad_output.mul(&local)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Rectified linear unit: output = max(0, input)
#[derive(Debug, Clone, Default)]
pub struct ReLU;

impl<T> Operator<T> for ReLU
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("ReLU", inputs, 1)?;
        Ok(inputs[0].relu())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("ReLU", inputs, 1)?;
        let mask = inputs[0].map(|x| if x > T::zero() { T::one() } else { T::zero() });
        Ok(vec![grad_output.mul(&mask)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Hyperbolic tangent
#[derive(Debug, Clone, Default)]
pub struct Tanh;

impl<T> Operator<T> for Tanh
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Tanh", inputs, 1)?;
        Ok(inputs[0].tanh())
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Tanh", inputs, 1)?;
        let local = output.map(|t| T::one() - t * t);
        Ok(vec![grad_output.mul(&local)?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Numerically stable softplus: output = log(1 + exp(input))
#[derive(Debug, Clone, Default)]
pub struct Softplus;

impl<T> Operator<T> for Softplus
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Softplus", inputs, 1)?;
        // max(x, 0) + log1p(exp(-|x|))
        Ok(inputs[0].map(|x| x.max(T::zero()) + (-x.abs()).exp().ln_1p()))
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Softplus", inputs, 1)?;
        Ok(vec![grad_output.mul(&inputs[0].sigmoid())?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
