// src/nn/layers/activation.rs
// Activation layer selected by name, as hidden layer configs specify them

use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::nn::Module;
use crate::ops::{ReLU as ReLUOp, Sigmoid as SigmoidOp, Tanh as TanhOp};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    ReLU,
    Sigmoid,
    Tanh,
    Identity,
}

impl FromStr for ActivationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Ok(ActivationKind::ReLU),
            "sigmoid" => Ok(ActivationKind::Sigmoid),
            "tanh" => Ok(ActivationKind::Tanh),
            "none" | "linear" | "identity" | "" => Ok(ActivationKind::Identity),
            other => Err(format!("Unknown activation '{}'", other)),
        }
    }
}

/// Element-wise activation layer. Has no parameters.
#[derive(Debug, Clone)]
pub struct Activation<T>
where
    T: FmFloat,
{
    pub kind: ActivationKind,
    training: bool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Activation<T>
where
    T: FmFloat,
{
    pub fn new(kind: ActivationKind) -> Self {
        Self {
            kind,
            training: true,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, String> {
        Ok(Self::new(name.parse()?))
    }
}

impl<T> Module<T> for Activation<T>
where
    T: FmFloat,
{
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let result = match self.kind {
            ActivationKind::ReLU => graph.apply_operation(Box::new(ReLUOp), vec![input]),
            ActivationKind::Sigmoid => graph.apply_operation(Box::new(SigmoidOp), vec![input]),
            ActivationKind::Tanh => graph.apply_operation(Box::new(TanhOp), vec![input]),
            ActivationKind::Identity => return Ok(input),
        };
        result.map_err(|e| format!("{:?} activation failed: {}", self.kind, e))
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
