// src/nn/layers/embedding.rs
// Field-aware embedding lookup for sparse categorical inputs

use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::initializers::{Init, init_tensor};
use crate::nn::parameter::Parameter;
use crate::ops::{Gather, Mul, Reshape};
use rand::Rng;

/// Nodes produced by one lookup.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingOutput {
    /// Linear weight per field, [batch, fields]
    pub xw: NodeId,
    /// Factor embedding per field, [batch, fields, embed_size]
    pub xv: NodeId,
    /// Global bias [1], when the table was built with one
    pub b: Option<NodeId>,
}

/// Tables for a factorization machine over `num_fields` categorical fields
/// sharing one feature id space of size `input_dim`.
///
/// * `w: [input_dim, 1]` first order weights
/// * `v: [input_dim, embed_size]` latent factors
/// * `b: [1]` optional global bias
#[derive(Debug)]
pub struct FieldEmbedding<T>
where
    T: FmFloat,
{
    pub w: Parameter<T>,
    pub v: Parameter<T>,
    pub b: Option<Parameter<T>>,
    pub input_dim: usize,
    pub embed_size: usize,
    pub num_fields: usize,
}

impl<T> FieldEmbedding<T>
where
    T: FmFloat,
{
    pub fn new<R: Rng + ?Sized>(
        init: Init,
        input_dim: usize,
        embed_size: usize,
        num_fields: usize,
        use_b: bool,
        rng: &mut R,
    ) -> Result<Self, String> {
        if input_dim == 0 || embed_size == 0 || num_fields == 0 {
            return Err(format!(
                "Embedding dimensions must be positive, got input_dim={}, embed_size={}, num_fields={}",
                input_dim, embed_size, num_fields
            ));
        }
        let w = Parameter::new(init_tensor(init, &[input_dim, 1], rng)?, "embedding/w");
        let v = Parameter::new(
            init_tensor(init, &[input_dim, embed_size], rng)?,
            "embedding/v",
        );
        let b = use_b.then(|| Parameter::zeros(&[1], "embedding/b"));

        Ok(Self {
            w,
            v,
            b,
            input_dim,
            embed_size,
            num_fields,
        })
    }

    pub fn parameters(&self) -> Vec<&Parameter<T>> {
        let mut params = vec![&self.w, &self.v];
        if let Some(ref b) = self.b {
            params.push(b);
        }
        params
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        let mut params = vec![&mut self.w, &mut self.v];
        if let Some(ref mut b) = self.b {
            params.push(b);
        }
        params
    }

    /// Looks up a batch. `ids` is row-major `[batch, num_fields]`; `values`,
    /// when given, is a `[batch, num_fields]` tensor of real feature values that
    /// scales both the linear weight and the embedding row of each field.
    pub fn lookup(
        &self,
        graph: &mut Engine<T>,
        ids: &[usize],
        values: Option<&Tensor<T>>,
    ) -> Result<EmbeddingOutput, String> {
        if ids.is_empty() || ids.len() % self.num_fields != 0 {
            return Err(format!(
                "Expected a multiple of {} feature ids, got {}",
                self.num_fields,
                ids.len()
            ));
        }
        let batch = ids.len() / self.num_fields;
        if let Some(&bad) = ids.iter().find(|&&id| id >= self.input_dim) {
            return Err(format!(
                "Feature id {} out of range for input_dim {}",
                bad, self.input_dim
            ));
        }

        let rows_w = graph.apply_operation(Box::new(Gather::new(0, ids.to_vec())), vec![self.w.node()?])?;
        let mut xw = graph.apply_operation(
            Box::new(Reshape::new(vec![batch, self.num_fields])),
            vec![rows_w],
        )?;
        let rows_v = graph.apply_operation(Box::new(Gather::new(0, ids.to_vec())), vec![self.v.node()?])?;
        let mut xv = graph.apply_operation(
            Box::new(Reshape::new(vec![batch, self.num_fields, self.embed_size])),
            vec![rows_v],
        )?;

        if let Some(values) = values {
            if values.shape() != [batch, self.num_fields] {
                return Err(format!(
                    "Feature values must have shape [{}, {}], got {:?}",
                    batch,
                    self.num_fields,
                    values.shape()
                ));
            }
            let flat_values = graph.create_variable(values.clone(), false);
            xw = graph.apply_operation(Box::new(Mul), vec![xw, flat_values])?;
            let expanded = graph.create_variable(values.unsqueeze(2)?, false);
            xv = graph.apply_operation(Box::new(Mul), vec![xv, expanded])?;
        }

        let b = match &self.b {
            Some(b) => Some(b.node()?),
            None => None,
        };
        Ok(EmbeddingOutput { xw, xv, b })
    }
}
