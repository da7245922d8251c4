// AutoDeepFM: the gated FM terms plus an MLP over the concatenated field
// embeddings, without a global bias.

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::models::config::AutoDeepFmConfig;
use crate::models::{Model, ModelOutput, output};
use crate::nn::{FieldEmbedding, Mlp, MlpSpec, Module};
use crate::ops::Reshape;
use crate::search::{EdgeWeightGate, Pruner, Rescale, Result, generate_pairs};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Debug)]
pub struct AutoDeepFm<T>
where
    T: FmFloat,
{
    config: AutoDeepFmConfig,
    embedding: FieldEmbedding<T>,
    mlp: Mlp<T>,
    second: EdgeWeightGate<T>,
    third: Option<EdgeWeightGate<T>>,
}

impl<T> AutoDeepFm<T>
where
    T: FmFloat,
{
    pub fn new(config: AutoDeepFmConfig) -> Result<Self> {
        config.validate()?;
        let base = &config.base;
        let init = base.init()?;
        let mut rng = StdRng::seed_from_u64(base.seed);

        let embedding = FieldEmbedding::new(
            init,
            base.input_dim,
            base.embed_size,
            base.num_inputs,
            false,
            &mut rng,
        )?;
        let spec = MlpSpec {
            layer_sizes: &config.layer_sizes,
            layer_acts: &config.layer_acts,
            layer_keeps: &config.layer_keeps,
            batch_norm: config.batch_norm,
            layer_norm: config.layer_norm,
        };
        let mlp = Mlp::new("mlp", base.num_inputs * base.embed_size, &spec, init, &mut rng)?;

        let pairs = generate_pairs(base.num_inputs, base.comb_mask.as_deref(), 2)?;
        let second = EdgeWeightGate::new(pairs, base.weight_base, &mut rng)?;
        let third = if base.third_prune {
            let triples = generate_pairs(base.num_inputs, base.comb_mask_third.as_deref(), 3)?;
            Some(EdgeWeightGate::new(triples, base.weight_base_third, &mut rng)?)
        } else {
            None
        };

        log::info!(
            "AutoDeepFM: {} slots, {} pairs, {} dense layers{}",
            base.num_inputs,
            second.len(),
            mlp.num_layers(),
            if base.retrain_stage { " (retrain)" } else { "" }
        );

        Ok(Self {
            config,
            embedding,
            mlp,
            second,
            third,
        })
    }

    pub fn config(&self) -> &AutoDeepFmConfig {
        &self.config
    }

    pub fn second_order_gate(&self) -> &EdgeWeightGate<T> {
        &self.second
    }

    pub fn third_order_gate(&self) -> Option<&EdgeWeightGate<T>> {
        self.third.as_ref()
    }

    pub fn mlp(&self) -> &Mlp<T> {
        &self.mlp
    }
}

impl<T> Model<T> for AutoDeepFm<T>
where
    T: FmFloat,
{
    fn forward(
        &self,
        graph: &mut Engine<T>,
        ids: &[usize],
        values: Option<&Tensor<T>>,
    ) -> Result<ModelOutput> {
        let base = &self.config.base;
        let emb = self.embedding.lookup(graph, ids, values)?;
        let batch = ids.len() / base.num_inputs;

        let flat = graph.apply_operation(
            Box::new(Reshape::new(vec![batch, base.num_inputs * base.embed_size])),
            vec![emb.xv],
        )?;
        let h = self.mlp.forward(graph, flat)?;
        let deep = graph.apply_operation(Box::new(Reshape::new(vec![batch])), vec![h])?;

        let mut terms = vec![output::linear_term(graph, emb.xw)?];
        terms.push(self.second.forward(graph, emb.xv)?);
        if let Some(third) = &self.third {
            terms.push(third.forward(graph, emb.xv)?);
        }
        terms.push(deep);
        let logits = output::aggregate_logits(graph, &terms, None)?;

        Ok(ModelOutput {
            logits,
            l2_terms: vec![
                (base.l2_w(), vec![emb.xw]),
                (base.l2_v(), vec![emb.xv]),
                (self.config.layer_l2(), self.mlp.kernel_nodes()?),
            ],
        })
    }

    fn create_parameters_in_graph(&mut self, graph: &mut Engine<T>) -> Result<()> {
        for param in self.embedding.parameters_mut() {
            param.register(graph)?;
        }
        self.mlp.create_parameters_in_graph(graph)?;
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
            .chain(self.mlp.parameters())
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
        self.mlp.set_training(training);
        self.second.set_training(training);
        if let Some(third) = self.third.as_mut() {
            third.set_training(training);
        }
    }

    fn num_slots(&self) -> usize {
        self.config.base.num_inputs
    }

    fn third_prune(&self) -> bool {
        self.config.base.third_prune
    }

    fn retrain_stage(&self) -> bool {
        self.config.base.retrain_stage
    }

    fn pruner(&self) -> Pruner {
        Pruner::new(
            self.config.base.num_inputs,
            self.config.base.prune_threshold,
            Rescale::MinMax,
        )
    }

    fn name(&self) -> &'static str {
        "AutoDeepFM"
    }
}
