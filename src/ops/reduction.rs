// reduction.rs
// Sum and mean reductions

use crate::backend::{FmFloat, Tensor};
use crate::ops::{Operator, expect_inputs};

fn expand_reduction<T>(
    grad_output: Tensor<T>,
    axes: &Option<Vec<usize>>,
    keep_dims: bool,
    input_shape: &[usize],
) -> Result<Tensor<T>, String>
where
    T: FmFloat,
{
    let restored = match axes {
        Some(reduction_axes) if !keep_dims => {
            // Unsqueeze each reduced axis (ascending) to get size-1 dims back
            let mut sorted_axes = reduction_axes.clone();
            sorted_axes.sort_unstable();
            sorted_axes.dedup();
            let mut grad = grad_output;
            for &axis in &sorted_axes {
                grad = grad.unsqueeze(axis)?;
            }
            grad
        }
        Some(_) => grad_output,
        None => {
            let ones = vec![1; input_shape.len()];
            grad_output.reshape(&ones)?
        }
    };
    restored.broadcast_to(input_shape)
}

/// Sum reduction: output = sum(input, axes)
/// Reduces tensor along specified axes or all elements if None
#[derive(Debug, Clone)]
pub struct Sum {
    /// Axes to reduce along. If None, reduces all elements to scalar
    pub axes: Option<Vec<usize>>,
    /// Whether to keep the reduced dimensions as size 1
    pub keep_dims: bool,
}

impl Sum {
    /// Create sum operation that reduces all elements to scalar
    pub fn new() -> Self {
        Self {
            axes: None,
            keep_dims: false,
        }
    }

    /// Create sum operation along specific axes
    pub fn along_axes(axes: Vec<usize>, keep_dims: bool) -> Self {
        Self {
            axes: Some(axes),
            keep_dims,
        }
    }
}

impl Default for Sum {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Operator<T> for Sum
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Sum", inputs, 1)?;
        inputs[0].sum(self.axes.as_deref(), self.keep_dims)
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Sum", inputs, 1)?;
        Ok(vec![expand_reduction(
            grad_output,
            &self.axes,
            self.keep_dims,
            inputs[0].shape(),
        )?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}

/// Mean reduction: output = mean(input, axes)
#[derive(Debug, Clone)]
pub struct Mean {
    pub axes: Option<Vec<usize>>,
    pub keep_dims: bool,
}

impl Mean {
    pub fn new() -> Self {
        Self {
            axes: None,
            keep_dims: false,
        }
    }

    pub fn along_axes(axes: Vec<usize>, keep_dims: bool) -> Self {
        Self {
            axes: Some(axes),
            keep_dims,
        }
    }

    fn count(&self, shape: &[usize]) -> usize {
        match &self.axes {
            None => shape.iter().product(),
            Some(axes) => axes.iter().map(|&a| shape.get(a).copied().unwrap_or(1)).product(),
        }
    }
}

impl Default for Mean {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Operator<T> for Mean
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Mean", inputs, 1)?;
        inputs[0].mean(self.axes.as_deref(), self.keep_dims)
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Mean", inputs, 1)?;
        let count = T::from_real(self.count(inputs[0].shape()) as f64);
        let expanded = expand_reduction(grad_output, &self.axes, self.keep_dims, inputs[0].shape())?;
        Ok(vec![expanded.div_scalar(count)])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
