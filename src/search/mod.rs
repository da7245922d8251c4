// Interaction search: enumerating feature combinations, scoring and gating
// them, and pruning the gates into masks after training.

pub mod analysis;
pub mod combinations;
pub mod error;
pub mod gate;
pub mod interaction;
pub mod mask;
pub mod pruner;

#[cfg(test)]
mod tests;

pub use analysis::{OrderReport, StructureReport, analyse_structure};
pub use combinations::{Combinations, generate_pairs, num_combinations};
pub use error::{Result, SearchError};
pub use gate::{EdgeWeightGate, GateNames, SECOND_ORDER_NAMES, THIRD_ORDER_NAMES, gate_names};
pub use interaction::interaction_scores;
pub use mask::InteractionMask;
pub use pruner::{DOMINANCE_RATIO, Pruner, Rescale};
