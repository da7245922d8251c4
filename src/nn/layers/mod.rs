// src/nn/layers/mod.rs
// Layer modules used by the factorization machine models

pub mod activation;
pub mod dropout;
pub mod embedding;
pub mod linear;
pub mod mlp;
pub mod norm;

pub use activation::{Activation, ActivationKind};
pub use dropout::Dropout;
pub use embedding::{EmbeddingOutput, FieldEmbedding};
pub use linear::Linear;
pub use mlp::{Mlp, MlpSpec};
pub use norm::{BatchNorm1d, LayerNorm};
