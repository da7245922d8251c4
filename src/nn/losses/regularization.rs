// src/nn/losses/regularization.rs

use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::ops::{Add, MulScalar, Square, Sum};

/// L2 penalty `sum_i coef_i * sum_{x in nodes_i} sum(x^2) / 2`.
///
/// Groups with a zero or missing coefficient are skipped. Returns `None` when
/// nothing contributes, so callers can leave the loss untouched.
pub fn l2_penalty<T: FmFloat>(
    graph: &mut Engine<T>,
    terms: &[(Option<f64>, Vec<NodeId>)],
) -> Result<Option<NodeId>, String> {
    let mut total: Option<NodeId> = None;
    for (coef, nodes) in terms {
        let Some(coef) = coef.filter(|c| *c != 0.0) else {
            continue;
        };
        for &node in nodes {
            let squared = graph.apply_operation(Box::new(Square), vec![node])?;
            let summed = graph.apply_operation(Box::new(Sum::new()), vec![squared])?;
            let scaled = graph.apply_operation(
                Box::new(MulScalar::new(T::from_real(coef * 0.5))),
                vec![summed],
            )?;
            total = Some(match total {
                Some(acc) => graph.apply_operation(Box::new(Add), vec![acc, scaled])?,
                None => scaled,
            });
        }
    }
    Ok(total)
}
