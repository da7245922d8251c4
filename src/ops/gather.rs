// gather.rs
// Index selection along one axis. Used both for embedding table lookups and for
// pulling the slots of every feature combination out of the field embeddings.

use crate::backend::{FmFloat, Tensor};
use crate::ops::{Operator, expect_inputs};

/// output = input.select(axis, indices); indices may repeat.
#[derive(Debug, Clone)]
pub struct Gather {
    pub axis: usize,
    pub indices: Vec<usize>,
}

impl Gather {
    pub fn new(axis: usize, indices: Vec<usize>) -> Self {
        Self { axis, indices }
    }
}

impl<T> Operator<T> for Gather
where
    T: FmFloat,
{
    fn compute(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>, String> {
        expect_inputs("Gather", inputs, 1)?;
        inputs[0].gather(self.axis, &self.indices)
    }

    fn gradient(
        &self,
        grad_output: Tensor<T>,
        inputs: &[&Tensor<T>],
        _output: &Tensor<T>,
    ) -> Result<Vec<Tensor<T>>, String> {
        expect_inputs("Gather", inputs, 1)?;
        // Repeated indices accumulate, which is what makes shared embeddings learn
        // from every combination they take part in.
        Ok(vec![grad_output.scatter_add(
            self.axis,
            &self.indices,
            inputs[0].shape(),
        )?])
    }

    fn num_inputs(&self) -> usize {
        1
    }
}
