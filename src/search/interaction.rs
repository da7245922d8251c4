// Interaction scores: for every combination, the elementwise product of its
// slot embeddings summed over the embedding dimension.

use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::ops::{Gather, Mul, Sum};
use crate::search::combinations::Combinations;

/// Computes `[batch, n_comb]` scores from field embeddings `[batch, slots, dim]`.
///
/// For a pair (i, j) the score of an example is `<e_i, e_j>`; for a triple it
/// is `sum_d e_i[d] * e_j[d] * e_k[d]`. Gradients reach the embeddings through
/// the gathers, accumulating over every combination a slot takes part in.
pub fn interaction_scores<T: FmFloat>(
    graph: &mut Engine<T>,
    embeddings: NodeId,
    combinations: &Combinations,
) -> Result<NodeId, String> {
    let shape = graph
        .get_node_shape(embeddings)
        .ok_or("Embeddings not found in graph")?;
    if shape.len() != 3 {
        return Err(format!(
            "Interaction scores need embeddings [batch, slots, dim], got {:?}",
            shape
        ));
    }
    if shape[1] != combinations.num_slots() {
        return Err(format!(
            "Combinations were generated for {} slots but embeddings have {}",
            combinations.num_slots(),
            shape[1]
        ));
    }
    if combinations.is_empty() {
        return Err("Cannot score an empty combination list".to_string());
    }

    let mut product: Option<NodeId> = None;
    for column in combinations.columns() {
        let gathered = graph.apply_operation(
            Box::new(Gather::new(1, column.clone())),
            vec![embeddings],
        )?;
        product = Some(match product {
            Some(acc) => graph.apply_operation(Box::new(Mul), vec![acc, gathered])?,
            None => gathered,
        });
    }
    let product = product.ok_or("Combinations have no columns")?;
    graph.apply_operation(Box::new(Sum::along_axes(vec![2], false)), vec![product])
}
