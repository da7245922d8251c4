pub mod classification;
pub mod regularization;

use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::ops::{Mean, Sum};
pub use classification::SigmoidCrossEntropy;
pub use regularization::l2_penalty;

/// Base trait for all loss functions.
///
/// Losses work on logits so the sigmoid can be folded into a stable
/// formulation. `pos_weight` scales the contribution of positive targets;
/// 1.0 leaves the loss unweighted.
pub trait Loss<T>
where
    T: FmFloat,
{
    /// logits: model outputs [batch_size]
    /// targets: labels in {0, 1} [batch_size]
    /// Returns a loss node reduced according to `reduction()`.
    fn forward(
        &self,
        graph: &mut Engine<T>,
        logits: NodeId,
        targets: NodeId,
        pos_weight: f64,
    ) -> Result<NodeId, String>;

    fn reduction(&self) -> ReductionType {
        ReductionType::Mean
    }
}

/// Loss reduction strategies - determines how batch losses are aggregated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReductionType {
    /// Average loss across batch (most common)
    Mean,
    /// Sum all losses in batch
    Sum,
    /// Return individual losses without reduction
    None,
}

pub(crate) fn reduce<T: FmFloat>(
    graph: &mut Engine<T>,
    per_example: NodeId,
    reduction: ReductionType,
) -> Result<NodeId, String> {
    match reduction {
        ReductionType::Mean => graph.apply_operation(Box::new(Mean::new()), vec![per_example]),
        ReductionType::Sum => graph.apply_operation(Box::new(Sum::new()), vec![per_example]),
        ReductionType::None => Ok(per_example),
    }
}
