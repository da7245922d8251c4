// src/nn/losses/classification.rs
// Binary classification loss on logits

use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::nn::losses::{Loss, ReductionType, reduce};
use crate::ops::{Add, AddScalar, Mul, MulScalar, Neg, Softplus};
use std::marker::PhantomData;

/// Weighted sigmoid cross entropy on logits x with labels z and weight q:
///
/// `loss = (1 - z) * x + (1 + (q - 1) * z) * softplus(-x)`
///
/// which equals `-q * z * log(sigmoid(x)) - (1 - z) * log(1 - sigmoid(x))`
/// without computing the sigmoid.
#[derive(Debug, Clone)]
pub struct SigmoidCrossEntropy<T> {
    reduction: ReductionType,
    _phantom: PhantomData<T>,
}

impl<T> SigmoidCrossEntropy<T>
where
    T: FmFloat,
{
    pub fn new(reduction: ReductionType) -> Self {
        Self {
            reduction,
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for SigmoidCrossEntropy<T>
where
    T: FmFloat,
{
    fn default() -> Self {
        Self::new(ReductionType::Mean)
    }
}

impl<T> Loss<T> for SigmoidCrossEntropy<T>
where
    T: FmFloat,
{
    fn forward(
        &self,
        graph: &mut Engine<T>,
        logits: NodeId,
        targets: NodeId,
        pos_weight: f64,
    ) -> Result<NodeId, String> {
        let logits_shape = graph.get_node_shape(logits).ok_or("Logits not found in graph")?;
        let targets_shape = graph.get_node_shape(targets).ok_or("Targets not found in graph")?;
        if logits_shape != targets_shape {
            return Err(format!(
                "Logits shape {:?} does not match targets shape {:?}",
                logits_shape, targets_shape
            ));
        }
        if pos_weight <= 0.0 {
            return Err(format!("pos_weight must be positive, got {}", pos_weight));
        }

        // (1 - z) * x
        let neg_targets = graph.apply_operation(Box::new(Neg), vec![targets])?;
        let one_minus_targets =
            graph.apply_operation(Box::new(AddScalar::new(T::one())), vec![neg_targets])?;
        let linear_term = graph
            .apply_operation(Box::new(Mul), vec![one_minus_targets, logits])
            .map_err(|e| format!("Cross entropy (1-z)*x failed: {}", e))?;

        // (1 + (q - 1) * z) * softplus(-x)
        let scaled_targets = graph.apply_operation(
            Box::new(MulScalar::new(T::from_real(pos_weight - 1.0))),
            vec![targets],
        )?;
        let coefficient =
            graph.apply_operation(Box::new(AddScalar::new(T::one())), vec![scaled_targets])?;
        let neg_logits = graph.apply_operation(Box::new(Neg), vec![logits])?;
        let softplus = graph.apply_operation(Box::new(Softplus), vec![neg_logits])?;
        let log_term = graph
            .apply_operation(Box::new(Mul), vec![coefficient, softplus])
            .map_err(|e| format!("Cross entropy weighted log term failed: {}", e))?;

        let per_example = graph.apply_operation(Box::new(Add), vec![linear_term, log_term])?;
        reduce(graph, per_example, self.reduction)
    }

    fn reduction(&self) -> ReductionType {
        self.reduction
    }
}
