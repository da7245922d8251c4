// Factorization machine models with searchable interaction structure.

pub mod autodeepfm;
pub mod autofm;
pub mod compile;
pub mod config;
pub mod output;

#[cfg(test)]
mod tests;

pub use autodeepfm::AutoDeepFm;
pub use autofm::AutoFm;
pub use compile::CompiledModel;
pub use config::{AutoDeepFmConfig, AutoFmConfig, TrainingConfig};

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::{Loss, Optimizer};
use crate::search::{Pruner, Result, StructureReport, analyse_structure};

/// Nodes produced by one model forward pass.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// `[batch]`
    pub logits: NodeId,
    /// `(coefficient, nodes)` groups of the L2 penalty
    pub l2_terms: Vec<(Option<f64>, Vec<NodeId>)>,
}

/// A model whose interaction structure can be searched and pruned.
pub trait Model<T>
where
    T: FmFloat,
{
    /// `ids` is row-major `[batch, num_slots]`, `values` an optional
    /// `[batch, num_slots]` tensor of real feature values.
    fn forward(
        &self,
        graph: &mut Engine<T>,
        ids: &[usize],
        values: Option<&Tensor<T>>,
    ) -> Result<ModelOutput>;

    /// Registers every parameter (and the gate aliases) in `graph`.
    fn create_parameters_in_graph(&mut self, graph: &mut Engine<T>) -> Result<()>;

    /// Every trainable node, gates included.
    fn parameter_nodes(&self) -> Result<Vec<NodeId>>;

    /// The edge-weight variables only.
    fn gate_nodes(&self) -> Result<Vec<NodeId>>;

    fn set_training(&mut self, training: bool);

    fn num_slots(&self) -> usize;

    fn third_prune(&self) -> bool;

    fn retrain_stage(&self) -> bool;

    fn pruner(&self) -> Pruner;

    fn name(&self) -> &'static str;

    /// Reads the trained gates and, outside the retrain stage, derives masks.
    fn analyse_structure(
        &self,
        graph: &Engine<T>,
        print_full_weight: bool,
        epoch: usize,
    ) -> Result<StructureReport> {
        analyse_structure(
            graph,
            &self.pruner(),
            self.third_prune(),
            self.retrain_stage(),
            print_full_weight,
            epoch,
        )
    }

    /// Registers the model in `graph` and binds it to a loss and optimizers.
    /// With `optimizer2`, the gates are updated by it and everything else by
    /// `optimizer1`; otherwise `optimizer1` updates all variables.
    fn compile<L, O>(
        self,
        graph: &mut Engine<T>,
        loss: L,
        optimizer1: O,
        optimizer2: Option<O>,
        pos_weight: f64,
    ) -> Result<CompiledModel<T, Self, L, O>>
    where
        Self: Sized,
        L: Loss<T>,
        O: Optimizer<T>,
    {
        CompiledModel::new(self, graph, loss, optimizer1, optimizer2, pos_weight)
    }
}
