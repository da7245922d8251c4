// ops/mod.rs
// Operators recorded in the computational graph. Each one knows how to compute its
// output from input tensors and how to map an output gradient back to its inputs.
use crate::backend::{FmFloat, Tensor};
use std::any::type_name;

// All operators in the computational graph implement this trait.
pub trait Operator<T>: std::fmt::Debug
where
    T: FmFloat,
{
    // Compute function computes the output in the computational graph.
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String>;

    // Gradient function computes the gradient of the output with respect to the inputs.
    // `output` is the cached forward result, which some operators reuse.
    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String>;

    // Get number of inputs this operator expects
    fn num_inputs(&self) -> usize;

    fn name(&self) -> String {
        let full_name = type_name::<Self>();
        let base = full_name.split('<').next().unwrap_or(full_name);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }
}

pub mod basic;
pub mod gather;
pub mod matrix;
pub mod reduction;
pub mod reshape;
pub mod scalar;
pub mod unary;

// Re-export all operations for convenient importing
pub use basic::*;
pub use gather::*;
pub use matrix::*;
pub use reduction::*;
pub use reshape::*;
pub use scalar::*;
pub use unary::*;

fn expect_inputs<T: FmFloat>(name: &str, inputs: &[&Tensor<T>], n: usize) -> Result<(), String> {
    if inputs.len() != n {
        return Err(format!(
            "{} operation requires exactly {} input(s), got {}",
            name,
            n,
            inputs.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
