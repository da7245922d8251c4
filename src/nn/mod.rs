// Neural network building blocks on top of the automatic differentiation engine:
// parameters, layers, losses, initializers and optimizers.

pub mod initializers;
pub mod layers;
pub mod losses;
pub mod module;
pub mod optim;
pub mod parameter;

pub use initializers::Init;
pub use layers::{
    Activation, ActivationKind, BatchNorm1d, Dropout, EmbeddingOutput, FieldEmbedding, LayerNorm,
    Linear, Mlp, MlpSpec,
};
pub use losses::{Loss, ReductionType, SigmoidCrossEntropy, l2_penalty};
pub use module::{Module, ModuleList};
pub use optim::{Adam, Optim, Optimizer, OptimizerError, ParameterGroup, SGD};
pub use parameter::Parameter;
