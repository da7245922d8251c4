// Structure analysis: read the trained gate weights out of the graph and turn
// them into interaction masks.

use crate::backend::FmFloat;
use crate::graph::Engine;
use crate::search::error::{Result, SearchError};
use crate::search::gate::{SECOND_ORDER_NAMES, THIRD_ORDER_NAMES};
use crate::search::mask::InteractionMask;
use crate::search::pruner::Pruner;
use serde::{Deserialize, Serialize};

/// How many leading entries are logged when the full lists are not requested.
pub const PREVIEW_LEN: usize = 10;

/// Weights and (when pruning ran) the mask of one interaction order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub order: usize,
    pub weights: Vec<f64>,
    pub mask: Option<Vec<u8>>,
    pub masked_edges: Option<usize>,
}

impl OrderReport {
    pub fn to_mask(&self, num_slots: usize) -> Option<Result<InteractionMask>> {
        self.mask
            .as_ref()
            .map(|mask| InteractionMask::new(self.order, num_slots, mask.clone()))
    }
}

/// Result of [`analyse_structure`] for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub epoch: usize,
    pub second: OrderReport,
    pub third: Option<OrderReport>,
}

impl StructureReport {
    /// Masks ready for the retrain stage; empty when pruning was skipped.
    pub fn masks(&self, num_slots: usize) -> Result<Vec<InteractionMask>> {
        let mut masks = Vec::new();
        for report in std::iter::once(&self.second).chain(self.third.as_ref()) {
            if let Some(mask) = report.to_mask(num_slots) {
                masks.push(mask?);
            }
        }
        Ok(masks)
    }
}

fn read_weights<T: FmFloat>(graph: &Engine<T>, name: &str) -> Result<Vec<f64>> {
    graph
        .tensor_by_name(name)
        .map(|t| t.to_vec().into_iter().map(FmFloat::to_real).collect())
        .ok_or_else(|| SearchError::MissingTensor(name.to_string()))
}

fn preview<V: std::fmt::Debug>(values: &[V], full: bool) -> String {
    if full {
        format!("{:?}", values)
    } else {
        format!("{:?}", &values[..values.len().min(PREVIEW_LEN)])
    }
}

/// Reads `edge_weight/normed_wts` (and, with `third_prune`,
/// `third_edge_weight/third_normed_wts`), logs them and, outside the retrain
/// stage, derives the keep masks with `pruner`.
pub fn analyse_structure<T: FmFloat>(
    graph: &Engine<T>,
    pruner: &Pruner,
    third_prune: bool,
    retrain_stage: bool,
    print_full_weight: bool,
    epoch: usize,
) -> Result<StructureReport> {
    let second_weights = read_weights(graph, SECOND_ORDER_NAMES.normed)?;
    let third_weights = if third_prune {
        Some(read_weights(graph, THIRD_ORDER_NAMES.normed)?)
    } else {
        None
    };

    log::info!(
        "epoch {} second order weights: {}",
        epoch,
        preview(&second_weights, print_full_weight)
    );
    if let Some(third) = &third_weights {
        log::info!(
            "epoch {} third order weights: {}",
            epoch,
            preview(third, print_full_weight)
        );
    }

    let mut second = OrderReport {
        order: 2,
        weights: second_weights,
        mask: None,
        masked_edges: None,
    };
    let mut third = third_weights.map(|weights| OrderReport {
        order: 3,
        weights,
        mask: None,
        masked_edges: None,
    });

    if retrain_stage {
        log::debug!("retrain stage, skipping pruning");
        return Ok(StructureReport {
            epoch,
            second,
            third,
        });
    }

    let mask = pruner.pick_feature(&second.weights, 2, None)?;
    let masked = mask.iter().filter(|&&m| m == 0).count();
    log::info!(
        "epoch {} second order mask: {}",
        epoch,
        preview(&mask, print_full_weight)
    );
    log::info!("epoch {} masked second order edges: {}", epoch, masked);
    second.mask = Some(mask);
    second.masked_edges = Some(masked);

    if let Some(report) = third.as_mut() {
        let mask = pruner.pick_feature(&report.weights, 3, Some(&second.weights))?;
        let masked = mask.iter().filter(|&&m| m == 0).count();
        log::info!(
            "epoch {} third order mask: {}",
            epoch,
            preview(&mask, print_full_weight)
        );
        log::info!("epoch {} masked third order edges: {}", epoch, masked);
        report.mask = Some(mask);
        report.masked_edges = Some(masked);
    }

    Ok(StructureReport {
        epoch,
        second,
        third,
    })
}
