// AutoFM: factorization machine whose pairwise (and optionally triple-wise)
// interactions are gated by learnable edge weights.

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::models::config::AutoFmConfig;
use crate::models::{Model, ModelOutput, output};
use crate::nn::{FieldEmbedding, Module};
use crate::search::{EdgeWeightGate, Pruner, Rescale, Result, generate_pairs};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// `logits = sum_f xw + gate_2(xv) [+ gate_3(xv)] + b`
#[derive(Debug)]
pub struct AutoFm<T>
where
    T: FmFloat,
{
    config: AutoFmConfig,
    embedding: FieldEmbedding<T>,
    second: EdgeWeightGate<T>,
    third: Option<EdgeWeightGate<T>>,
}

impl<T> AutoFm<T>
where
    T: FmFloat,
{
    pub fn new(config: AutoFmConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let embedding = FieldEmbedding::new(
            config.init()?,
            config.input_dim,
            config.embed_size,
            config.num_inputs,
            true,
            &mut rng,
        )?;

        let pairs = generate_pairs(config.num_inputs, config.comb_mask.as_deref(), 2)?;
        let second = EdgeWeightGate::new(pairs, config.weight_base, &mut rng)?;
        let third = if config.third_prune {
            let triples = generate_pairs(config.num_inputs, config.comb_mask_third.as_deref(), 3)?;
            Some(EdgeWeightGate::new(triples, config.weight_base_third, &mut rng)?)
        } else {
            None
        };

        log::info!(
            "AutoFM: {} slots, {} pairs{}{}",
            config.num_inputs,
            second.len(),
            third
                .as_ref()
                .map(|g| format!(", {} triples", g.len()))
                .unwrap_or_default(),
            if config.retrain_stage { " (retrain)" } else { "" }
        );

        Ok(Self {
            config,
            embedding,
            second,
            third,
        })
    }

    pub fn config(&self) -> &AutoFmConfig {
        &self.config
    }

    pub fn embedding(&self) -> &FieldEmbedding<T> {
        &self.embedding
    }

    pub fn second_order_gate(&self) -> &EdgeWeightGate<T> {
        &self.second
    }

    pub fn third_order_gate(&self) -> Option<&EdgeWeightGate<T>> {
        self.third.as_ref()
    }
}

impl<T> Model<T> for AutoFm<T>
where
    T: FmFloat,
{
    fn forward(
        &self,
        graph: &mut Engine<T>,
        ids: &[usize],
        values: Option<&Tensor<T>>,
    ) -> Result<ModelOutput> {
        let emb = self.embedding.lookup(graph, ids, values)?;

        let mut terms = vec![output::linear_term(graph, emb.xw)?];
        terms.push(self.second.forward(graph, emb.xv)?);
        if let Some(third) = &self.third {
            terms.push(third.forward(graph, emb.xv)?);
        }
        let logits = output::aggregate_logits(graph, &terms, emb.b)?;

        Ok(ModelOutput {
            logits,
            l2_terms: vec![
                (self.config.l2_w(), vec![emb.xw]),
                (self.config.l2_v(), vec![emb.xv]),
            ],
        })
    }

    fn create_parameters_in_graph(&mut self, graph: &mut Engine<T>) -> Result<()> {
        for param in self.embedding.parameters_mut() {
            param.register(graph)?;
        }
        self.second.create_parameters_in_graph(graph)?;
        if let Some(third) = self.third.as_mut() {
            third.create_parameters_in_graph(graph)?;
        }
        Ok(())
    }

    fn parameter_nodes(&self) -> Result<Vec<NodeId>> {
        let mut nodes = Vec::new();
        for param in self
            .embedding
            .parameters()
            .into_iter()
            .chain(self.second.parameters())
            .chain(self.third.iter().flat_map(|g| g.parameters()))
        {
            nodes.push(param.node()?);
        }
        Ok(nodes)
    }

    fn gate_nodes(&self) -> Result<Vec<NodeId>> {
        let mut nodes = vec![self.second.weights_node()?];
        if let Some(third) = &self.third {
            nodes.push(third.weights_node()?);
        }
        Ok(nodes)
    }

    fn set_training(&mut self, training: bool) {
        self.second.set_training(training);
        if let Some(third) = self.third.as_mut() {
            third.set_training(training);
        }
    }

    fn num_slots(&self) -> usize {
        self.config.num_inputs
    }

    fn third_prune(&self) -> bool {
        self.config.third_prune
    }

    fn retrain_stage(&self) -> bool {
        self.config.retrain_stage
    }

    fn pruner(&self) -> Pruner {
        Pruner::new(self.config.num_inputs, self.config.prune_threshold, Rescale::MaxAbs)
    }

    fn name(&self) -> &'static str {
        "AutoFM"
    }
}
