// src/nn/layers/mlp.rs
// Stack of dense blocks: linear -> [batch/layer norm] -> activation -> dropout

use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::nn::initializers::Init;
use crate::nn::layers::activation::Activation;
use crate::nn::layers::dropout::Dropout;
use crate::nn::layers::linear::Linear;
use crate::nn::layers::norm::{BatchNorm1d, LayerNorm};
use crate::nn::parameter::Parameter;
use rand::Rng;

#[derive(Debug)]
enum Norm<T: FmFloat> {
    Batch(BatchNorm1d<T>),
    Layer(LayerNorm<T>),
}

#[derive(Debug)]
struct DenseBlock<T: FmFloat> {
    linear: Linear<T>,
    norm: Option<Norm<T>>,
    activation: Activation<T>,
    dropout: Dropout<T>,
}

/// Hyper-parameters of an [`Mlp`]. The three per-layer lists must have equal
/// length.
#[derive(Debug, Clone)]
pub struct MlpSpec<'a> {
    pub layer_sizes: &'a [usize],
    pub layer_acts: &'a [String],
    pub layer_keeps: &'a [f64],
    pub batch_norm: bool,
    pub layer_norm: bool,
}

/// Multi-layer perceptron used as the deep component of AutoDeepFM.
#[derive(Debug)]
pub struct Mlp<T>
where
    T: FmFloat,
{
    blocks: Vec<DenseBlock<T>>,
    training: bool,
}

impl<T> Mlp<T>
where
    T: FmFloat,
{
    pub fn new<R: Rng + ?Sized>(
        scope: &str,
        input_dim: usize,
        spec: &MlpSpec<'_>,
        init: Init,
        rng: &mut R,
    ) -> Result<Self, String> {
        let n = spec.layer_sizes.len();
        if spec.layer_acts.len() != n || spec.layer_keeps.len() != n {
            return Err(format!(
                "MLP config lists differ in length: sizes {}, acts {}, keeps {}",
                n,
                spec.layer_acts.len(),
                spec.layer_keeps.len()
            ));
        }
        if spec.batch_norm && spec.layer_norm {
            return Err("MLP cannot use batch norm and layer norm together".to_string());
        }

        let mut blocks = Vec::with_capacity(n);
        let mut fan_in = input_dim;
        for (i, &size) in spec.layer_sizes.iter().enumerate() {
            let linear = Linear::new(&format!("{}/layer_{}", scope, i), fan_in, size, true, init, rng)?;
            let norm = if spec.batch_norm {
                Some(Norm::Batch(BatchNorm1d::new_default(
                    &format!("{}/batch_norm_{}", scope, i),
                    size,
                )))
            } else if spec.layer_norm {
                Some(Norm::Layer(LayerNorm::new_default(
                    &format!("{}/layer_norm_{}", scope, i),
                    size,
                )))
            } else {
                None
            };
            blocks.push(DenseBlock {
                linear,
                norm,
                activation: Activation::from_name(&spec.layer_acts[i])?,
                dropout: Dropout::new(spec.layer_keeps[i])?,
            });
            fan_in = size;
        }

        Ok(Self {
            blocks,
            training: true,
        })
    }

    pub fn output_dim(&self) -> Option<usize> {
        self.blocks.last().map(|b| b.linear.out_features)
    }

    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    /// Kernels of every dense layer, the targets of the layer L2 penalty.
    pub fn kernel_nodes(&self) -> Result<Vec<NodeId>, String> {
        self.blocks.iter().map(|b| b.linear.kernel_node()).collect()
    }
}

impl<T> Module<T> for Mlp<T>
where
    T: FmFloat,
{
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let mut h = input;
        for block in &self.blocks {
            h = block.linear.forward(graph, h)?;
            h = match &block.norm {
                Some(Norm::Batch(bn)) => bn.forward(graph, h)?,
                Some(Norm::Layer(ln)) => ln.forward(graph, h)?,
                None => h,
            };
            h = block.activation.forward(graph, h)?;
            h = block.dropout.forward(graph, h)?;
        }
        Ok(h)
    }

    fn parameters(&self) -> Vec<&Parameter<T>> {
        let mut params = Vec::new();
        for block in &self.blocks {
            params.extend(block.linear.parameters());
            match &block.norm {
                Some(Norm::Batch(bn)) => params.extend(bn.parameters()),
                Some(Norm::Layer(ln)) => params.extend(ln.parameters()),
                None => {}
            }
        }
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        let mut params = Vec::new();
        for block in &mut self.blocks {
            params.extend(block.linear.parameters_mut());
            match &mut block.norm {
                Some(Norm::Batch(bn)) => params.extend(bn.parameters_mut()),
                Some(Norm::Layer(ln)) => params.extend(ln.parameters_mut()),
                None => {}
            }
        }
        params
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for block in &mut self.blocks {
            block.linear.set_training(training);
            match &mut block.norm {
                Some(Norm::Batch(bn)) => bn.set_training(training),
                Some(Norm::Layer(ln)) => ln.set_training(training),
                None => {}
            }
            block.activation.set_training(training);
            block.dropout.set_training(training);
        }
    }
}
