// Learnable per-interaction edge weights gating batch-normalized interaction
// scores.

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::initializers::init_tensor_uniform;
use crate::nn::{BatchNorm1d, Module, Parameter};
use crate::ops::{Mul, Sum};
use crate::search::combinations::Combinations;
use crate::search::error::{Result, SearchError};
use crate::search::interaction::interaction_scores;
use rand::Rng;
use std::collections::HashMap;

/// Half-width of the uniform range edge weights are drawn from.
pub const WEIGHT_JITTER: f64 = 0.001;

/// Graph names of the tensors belonging to one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateNames {
    /// The trainable variable
    pub weights: &'static str,
    /// Read-only alias that structure analysis reads
    pub normed: &'static str,
    /// Scope of the batch norm applied to the scores
    pub batch_norm: &'static str,
}

pub const SECOND_ORDER_NAMES: GateNames = GateNames {
    weights: "edge_weight/weights",
    normed: "edge_weight/normed_wts",
    batch_norm: "prune_BN",
};

pub const THIRD_ORDER_NAMES: GateNames = GateNames {
    weights: "third_edge_weight/third_weights",
    normed: "third_edge_weight/third_normed_wts",
    batch_norm: "level_3_matrix_BN",
};

pub fn gate_names(order: usize) -> Result<GateNames> {
    match order {
        2 => Ok(SECOND_ORDER_NAMES),
        3 => Ok(THIRD_ORDER_NAMES),
        _ => Err(SearchError::InvalidOrder {
            order,
            num_slots: 0,
        }),
    }
}

/// Edge-weight gate for one interaction order.
///
/// Scores `[batch, n]` from [`interaction_scores`] are batch normalized, scaled
/// by the broadcast gate values and summed to one term per example. The gate
/// values are unconstrained and may change sign during training.
#[derive(Debug)]
pub struct EdgeWeightGate<T>
where
    T: FmFloat,
{
    order: usize,
    names: GateNames,
    combinations: Combinations,
    pub weights: Parameter<T>,
    pub batch_norm: BatchNorm1d<T>,
    training: bool,
}

impl<T> EdgeWeightGate<T>
where
    T: FmFloat,
{
    /// Builds a gate over `combinations`, weights drawn from
    /// `U[weight_base - 0.001, weight_base + 0.001]`.
    pub fn new<R: Rng + ?Sized>(
        combinations: Combinations,
        weight_base: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let order = combinations.order();
        let names = gate_names(order)?;
        let n = combinations.len();
        let init = init_tensor_uniform(
            &[n],
            weight_base - WEIGHT_JITTER,
            weight_base + WEIGHT_JITTER,
            rng,
        )?;

        Ok(Self {
            order,
            names,
            combinations,
            weights: Parameter::new(init, names.weights),
            batch_norm: BatchNorm1d::new_default(names.batch_norm, n),
            training: true,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn names(&self) -> GateNames {
        self.names
    }

    pub fn combinations(&self) -> &Combinations {
        &self.combinations
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn weights_node(&self) -> std::result::Result<NodeId, String> {
        self.weights.node()
    }
}

impl<T> Module<T> for EdgeWeightGate<T>
where
    T: FmFloat,
{
    /// `input` is the field embedding node `[batch, slots, dim]`; the output is
    /// the gated interaction term `[batch]`.
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> std::result::Result<NodeId, String> {
        if self.combinations.is_empty() {
            // every interaction of this order was pruned
            let batch = graph
                .get_node_shape(input)
                .and_then(|s| s.first().copied())
                .ok_or("Embeddings not found in graph")?;
            return Ok(graph.create_variable(Tensor::zeros(&[batch]), false));
        }

        let scores = interaction_scores(graph, input, &self.combinations)?;
        let normalized = self.batch_norm.forward(graph, scores)?;
        let gated = graph.apply_operation(Box::new(Mul), vec![normalized, self.weights.node()?])?;
        graph.apply_operation(Box::new(Sum::along_axes(vec![1], false)), vec![gated])
    }

    fn parameters(&self) -> Vec<&Parameter<T>> {
        let mut params = vec![&self.weights];
        params.extend(self.batch_norm.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        let mut params = vec![&mut self.weights];
        params.extend(self.batch_norm.parameters_mut());
        params
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        self.batch_norm.set_training(training);
    }

    /// Registers the parameters and binds the read-only alias of the weights.
    fn create_parameters_in_graph(
        &mut self,
        graph: &mut Engine<T>,
    ) -> std::result::Result<HashMap<String, NodeId>, String> {
        let mut param_map = HashMap::new();
        for param in self.parameters_mut() {
            let node_id = param.register(graph)?;
            param_map.insert(param.name().to_string(), node_id);
        }
        graph.name_node(self.weights.node()?, self.names.normed)?;
        Ok(param_map)
    }
}
