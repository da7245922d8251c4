// A model bound to its loss and optimizers, able to take training steps and
// produce predictions.

use crate::backend::{FmFloat, Tensor};
use crate::dataset::Batch;
use crate::graph::{Engine, NodeId};
use crate::models::{Model, output};
use crate::nn::{Loss, Optimizer, l2_penalty};
use crate::ops::Add;
use crate::search::{Result, SearchError};
use std::collections::HashSet;
use std::marker::PhantomData;

/// Result of a compiled model's training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLoss {
    /// Mean weighted cross entropy
    pub loss: f64,
    /// L2 penalty added to the objective, 0 when regularization is off
    pub l2: f64,
}

#[derive(Debug)]
pub struct CompiledModel<T, M, L, O>
where
    T: FmFloat,
    M: Model<T>,
    L: Loss<T>,
    O: Optimizer<T>,
{
    model: M,
    loss: L,
    optimizer1: O,
    optimizer2: Option<O>,
    pos_weight: f64,
    steps: usize,
    _phantom: PhantomData<T>,
}

impl<T, M, L, O> CompiledModel<T, M, L, O>
where
    T: FmFloat,
    M: Model<T>,
    L: Loss<T>,
    O: Optimizer<T>,
{
    pub fn new(
        mut model: M,
        graph: &mut Engine<T>,
        loss: L,
        mut optimizer1: O,
        mut optimizer2: Option<O>,
        pos_weight: f64,
    ) -> Result<Self> {
        if !(pos_weight > 0.0) {
            return Err(SearchError::Config(format!(
                "pos_weight must be positive, got {}",
                pos_weight
            )));
        }
        model.create_parameters_in_graph(graph)?;
        let all = model.parameter_nodes()?;

        match optimizer2.as_mut() {
            Some(gate_optimizer) => {
                let gates: HashSet<NodeId> = model.gate_nodes()?.into_iter().collect();
                let rest: Vec<NodeId> = all.iter().copied().filter(|id| !gates.contains(id)).collect();
                gate_optimizer.add_params(&gates.iter().copied().collect::<Vec<_>>());
                optimizer1.add_params(&rest);
                log::info!(
                    "compiled {}: {} variables on {}, {} gates on {}",
                    model.name(),
                    rest.len(),
                    optimizer1.name(),
                    gates.len(),
                    gate_optimizer.name()
                );
            }
            None => {
                optimizer1.add_params(&all);
                log::info!(
                    "compiled {}: {} variables on {}",
                    model.name(),
                    all.len(),
                    optimizer1.name()
                );
            }
        }

        Ok(Self {
            model,
            loss,
            optimizer1,
            optimizer2,
            pos_weight,
            steps: 0,
            _phantom: PhantomData,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn pos_weight(&self) -> f64 {
        self.pos_weight
    }

    /// One optimization step on `batch`: mean weighted loss plus the L2
    /// penalty, backward, then both optimizers.
    pub fn train_step(&mut self, graph: &mut Engine<T>, batch: &Batch<T>) -> Result<StepLoss> {
        graph.clear_transient();
        self.model.set_training(true);
        graph.set_training(true);

        let out = self.model.forward(graph, &batch.ids, batch.values.as_ref())?;
        let targets = graph.create_variable(batch.labels.clone(), false);
        let loss = self.loss.forward(graph, out.logits, targets, self.pos_weight)?;
        let loss_value = read_scalar(graph, loss)?;
        if !loss_value.is_finite() {
            log::warn!("loss is {} at step {}", loss_value, self.steps);
            return Err(SearchError::Graph(format!(
                "Training unstable at step {}: loss = {}",
                self.steps, loss_value
            )));
        }

        let (objective, l2_value) = match l2_penalty(graph, &out.l2_terms)? {
            Some(penalty) => {
                let l2_value = read_scalar(graph, penalty)?;
                (graph.apply_operation(Box::new(Add), vec![loss, penalty])?, l2_value)
            }
            None => (loss, 0.0),
        };

        graph.backward(objective)?;
        self.optimizer1.step(graph)?;
        if let Some(gate_optimizer) = self.optimizer2.as_mut() {
            gate_optimizer.step(graph)?;
        }
        self.steps += 1;

        Ok(StepLoss {
            loss: loss_value,
            l2: l2_value,
        })
    }

    /// Click probabilities in inference mode (running batch statistics,
    /// dropout off).
    pub fn predict(
        &mut self,
        graph: &mut Engine<T>,
        ids: &[usize],
        values: Option<&Tensor<T>>,
    ) -> Result<Vec<f64>> {
        graph.clear_transient();
        self.model.set_training(false);
        graph.set_training(false);

        let result = self
            .model
            .forward(graph, ids, values)
            .and_then(|out| Ok(output::predictions(graph, out.logits)?))
            .and_then(|probs| {
                graph
                    .get_tensor(probs)
                    .map(|t| t.to_vec().into_iter().map(FmFloat::to_real).collect())
                    .ok_or_else(|| SearchError::Graph("Predictions not found in graph".to_string()))
            });

        self.model.set_training(true);
        graph.set_training(true);
        result
    }
}

fn read_scalar<T: FmFloat>(graph: &Engine<T>, node: NodeId) -> Result<f64> {
    let tensor = graph
        .get_tensor(node)
        .ok_or_else(|| SearchError::Graph(format!("Node {} not found in graph", node)))?;
    Ok(tensor.first()?.to_real())
}
