// Output aggregation: per-example terms summed into logits.

use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::ops::{Add, Sigmoid, Sum};

/// First order term: `sum_f xw[b, f]`, shape `[batch]`.
pub fn linear_term<T: FmFloat>(graph: &mut Engine<T>, xw: NodeId) -> Result<NodeId, String> {
    graph.apply_operation(Box::new(Sum::along_axes(vec![1], false)), vec![xw])
}

/// Sums `[batch]` terms and an optional `[1]` bias into logits `[batch]`.
pub fn aggregate_logits<T: FmFloat>(
    graph: &mut Engine<T>,
    terms: &[NodeId],
    bias: Option<NodeId>,
) -> Result<NodeId, String> {
    let (&first, rest) = terms.split_first().ok_or("No output terms to aggregate")?;
    let mut logits = first;
    for &term in rest.iter().chain(bias.as_ref()) {
        logits = graph.apply_operation(Box::new(Add), vec![logits, term])?;
    }
    Ok(logits)
}

/// Click probabilities from logits.
pub fn predictions<T: FmFloat>(graph: &mut Engine<T>, logits: NodeId) -> Result<NodeId, String> {
    graph.apply_operation(Box::new(Sigmoid), vec![logits])
}
