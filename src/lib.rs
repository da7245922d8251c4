//! # autofm
//!
//! Automatic feature-interaction search for factorization machines.
//!
//! AutoFM and AutoDeepFM gate every pairwise (and optionally triple-wise)
//! embedding interaction with a learnable edge weight. After a search stage
//! the trained weights are pruned into binary masks, and the models are
//! rebuilt on the surviving interactions for a retrain stage.
//!
//! ## Features
//!
//! - Lexicographic combination generation with keep masks
//! - Edge-weight gates over batch-normalized interaction scores
//! - Threshold pruning with max-abs or min-max rescaling, and sub-combination
//!   dominance for third order interactions
//! - A small CPU reverse-mode autodiff engine over `ndarray`
//! - Embedding, dense, batch/layer norm and dropout layers, weighted sigmoid
//!   cross entropy, SGD and Adam
//! - JSON configuration and mask files
//!
//! ```rust
//! use autofm::Engine;
//! use autofm::models::{AutoFm, AutoFmConfig, Model};
//!
//! let mut graph = Engine::<f64>::new();
//! let mut model = AutoFm::<f64>::new(AutoFmConfig::new(4, 16, 4)).unwrap();
//! model.create_parameters_in_graph(&mut graph).unwrap();
//! assert_eq!(graph.tensor_by_name("edge_weight/normed_wts").unwrap().size(), 6);
//! ```

pub mod backend;
pub mod dataset;
pub mod graph;
pub mod models;
pub mod nn;
pub mod ops;
pub mod search;
pub mod training;

// Re-export commonly used types for convenience
pub use backend::{FmFloat, Tensor};
pub use graph::{Engine, NodeId};
pub use models::{AutoDeepFm, AutoDeepFmConfig, AutoFm, AutoFmConfig, Model, TrainingConfig};
pub use search::{InteractionMask, Pruner, Rescale, SearchError, generate_pairs};
