use crate::backend::{FmFloat, Tensor};
use crate::graph::node::{Node, NodeId, NodeState};
use crate::ops::Operator;
use std::collections::{HashMap, HashSet};

/// Main computational graph engine.
///
/// Operations are evaluated eagerly as they are applied and recorded so that
/// `backward` can walk them in reverse topological order. Parameters are
/// created as persistent leaves; everything else is transient and dropped by
/// `clear_transient` between training steps.
///
/// Nodes can be registered under a name (`scope/name`). Names are how saved
/// structure weights are addressed from outside the model, e.g.
/// `edge_weight/normed_wts`.
#[derive(Debug)]
pub struct Engine<T>
where
    T: FmFloat,
{
    nodes: HashMap<NodeId, Node<T>>,
    gradients: HashMap<NodeId, Tensor<T>>,
    names: HashMap<String, NodeId>,
    training_mode: bool,
}

impl<T> Default for Engine<T>
where
    T: FmFloat,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Engine<T>
where
    T: FmFloat,
{
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            gradients: HashMap::new(),
            names: HashMap::new(),
            training_mode: true,
        }
    }

    pub fn set_training(&mut self, training: bool) {
        self.training_mode = training;
    }

    pub fn is_training(&self) -> bool {
        self.training_mode
    }

    // Creates a new transient leaf node in the computational graph
    pub fn create_variable(&mut self, tensor: Tensor<T>, requires_grad: bool) -> NodeId {
        let node = Node::new_leaf(tensor, requires_grad);
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Creates a persistent, trainable leaf registered under `name`.
    pub fn create_parameter(&mut self, tensor: Tensor<T>, name: &str) -> Result<NodeId, String> {
        if self.names.contains_key(name) {
            return Err(format!("A node named '{}' already exists", name));
        }
        let mut node = Node::new_leaf(tensor, true);
        node.persistent = true;
        let id = node.id;
        self.nodes.insert(id, node);
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Registers an additional name for an existing node.
    pub fn name_node(&mut self, node_id: NodeId, name: &str) -> Result<(), String> {
        if !self.nodes.contains_key(&node_id) {
            return Err(format!("Node {} not found", node_id));
        }
        match self.names.get(name) {
            Some(existing) if *existing != node_id => {
                Err(format!("Name '{}' is already bound to {}", name, existing))
            }
            _ => {
                self.names.insert(name.to_string(), node_id);
                Ok(())
            }
        }
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn tensor_by_name(&self, name: &str) -> Option<&Tensor<T>> {
        self.node_by_name(name).and_then(|id| self.get_tensor(id))
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(&node_id)
    }

    pub fn get_tensor(&self, node_id: NodeId) -> Option<&Tensor<T>> {
        self.nodes.get(&node_id).map(|n| n.get_tensor())
    }

    pub fn get_node_shape(&self, node_id: NodeId) -> Option<Vec<usize>> {
        self.get_tensor(node_id).map(|t| t.shape().to_vec())
    }

    pub fn get_gradient(&self, node_id: NodeId) -> Option<&Tensor<T>> {
        self.gradients.get(&node_id)
    }

    pub fn set_gradient(&mut self, node_id: NodeId, grad: Tensor<T>) {
        self.gradients.insert(node_id, grad);
    }

    pub fn clear_gradient(&mut self, node_id: NodeId) {
        self.gradients.remove(&node_id);
    }

    /// Clean up gradients
    pub fn zero_gradients(&mut self) {
        self.gradients.clear();
    }

    /// Replaces the value of a leaf node. Used by optimizers and by running
    /// statistics updates.
    pub fn update_parameter(&mut self, node_id: NodeId, tensor: Tensor<T>) -> Result<(), String> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| format!("Node {} not found", node_id))?;
        match &mut node.state {
            NodeState::Leaf(current) => {
                if current.shape() != tensor.shape() {
                    return Err(format!(
                        "Cannot update {} of shape {:?} with tensor of shape {:?}",
                        node_id,
                        current.shape(),
                        tensor.shape()
                    ));
                }
                *current = tensor;
                Ok(())
            }
            NodeState::Evaluated { .. } => {
                Err(format!("Node {} is not a leaf and cannot be updated", node_id))
            }
        }
    }

    fn validate_inputs(&self, op: &dyn Operator<T>, input_ids: &[NodeId]) -> Result<(), String> {
        for &input_id in input_ids {
            if !self.nodes.contains_key(&input_id) {
                return Err(format!("Input node {} not found", input_id));
            }
        }

        if input_ids.len() != op.num_inputs() {
            return Err(format!(
                "Operation {} expects {} inputs, got {}",
                op.name(),
                op.num_inputs(),
                input_ids.len()
            ));
        }

        Ok(())
    }

    pub fn apply_operation(
        &mut self,
        op: Box<dyn Operator<T>>,
        input_ids: Vec<NodeId>,
    ) -> Result<NodeId, String> {
        self.validate_inputs(op.as_ref(), &input_ids)?;

        let (result_tensor, requires_grad) = {
            let mut input_tensors = Vec::with_capacity(input_ids.len());
            let mut requires_grad = false;
            for input_id in &input_ids {
                let node = self
                    .nodes
                    .get(input_id)
                    .ok_or_else(|| format!("Input node {} not available", input_id))?;
                requires_grad |= node.requires_grad;
                input_tensors.push(node.get_tensor());
            }
            let result = op
                .compute(&input_tensors)
                .map_err(|e| format!("{} failed: {}", op.name(), e))?;
            (result, requires_grad)
        };

        let node = Node::new_evaluated(result_tensor, op, input_ids, requires_grad);
        let id = node.id;
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn accumulate_gradient(&mut self, node_id: NodeId, grad: Tensor<T>) -> Result<(), String> {
        match self.gradients.remove(&node_id) {
            Some(existing_grad) => {
                let accumulated = existing_grad.add(&grad)?;
                self.gradients.insert(node_id, accumulated);
            }
            None => {
                self.gradients.insert(node_id, grad);
            }
        }
        Ok(())
    }

    pub fn backward(&mut self, loss_id: NodeId) -> Result<(), String> {
        if !self.training_mode {
            return Ok(());
        }

        let loss_tensor = self
            .get_tensor(loss_id)
            .ok_or_else(|| format!("Loss node {} not found", loss_id))?;
        let ones_grad = Tensor::ones(loss_tensor.shape());
        self.gradients.insert(loss_id, ones_grad);

        let mut visited = HashSet::new();
        let mut topo_order = Vec::new();
        self.topological_sort(loss_id, &mut visited, &mut topo_order);
        topo_order.reverse();

        for &node_id in &topo_order {
            self.backward_node(node_id)?;
        }

        Ok(())
    }

    fn backward_node(&mut self, node_id: NodeId) -> Result<(), String> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or_else(|| format!("Node {} not found", node_id))?;

        // Leaf gradients stay in the map for the optimizer.
        let (op, inputs, tensor) = match &node.state {
            NodeState::Leaf(_) => return Ok(()),
            NodeState::Evaluated { op, inputs, tensor } => (op, inputs, tensor),
        };

        let grad_output = match self.gradients.remove(&node_id) {
            Some(grad) => grad,
            None => return Ok(()),
        };

        let mut input_tensors = Vec::with_capacity(inputs.len());
        let mut wants_grad = Vec::with_capacity(inputs.len());
        for input_id in inputs {
            let input = self
                .nodes
                .get(input_id)
                .ok_or_else(|| format!("Input node {} not found", input_id))?;
            input_tensors.push(input.get_tensor());
            wants_grad.push(input.requires_grad);
        }

        let input_grads = op
            .gradient(grad_output, &input_tensors, tensor)
            .map_err(|e| format!("{} backward failed: {}", op.name(), e))?;
        let targets: Vec<NodeId> = inputs.clone();

        for ((input_id, input_grad), wanted) in targets.into_iter().zip(input_grads).zip(wants_grad) {
            if wanted {
                self.accumulate_gradient(input_id, input_grad)?;
            }
        }

        Ok(())
    }

    /// TOPOLOGICAL SORTING TO COMPUTE OPS IN ORDER. Nodes that do not require
    /// gradients are pruned from the walk.
    fn topological_sort(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        topo_order: &mut Vec<NodeId>,
    ) {
        // Iterative post-order; deep MLP stacks would otherwise recurse a lot.
        let mut stack = vec![(node_id, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                topo_order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.requires_grad {
                continue;
            }
            stack.push((id, true));
            for &input_id in node.inputs() {
                if !visited.contains(&input_id) {
                    stack.push((input_id, false));
                }
            }
        }
    }

    /// Drops every non-persistent node, all gradients, and names that pointed
    /// at dropped nodes.
    pub fn clear_transient(&mut self) {
        self.nodes.retain(|_, node| node.persistent);
        self.gradients.clear();
        let nodes = &self.nodes;
        self.names.retain(|_, id| nodes.contains_key(id));
        log::trace!("graph cleared, {} persistent nodes kept", self.nodes.len());
    }

    /// GRAPH STATISTICS
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_persistent_nodes(&self) -> usize {
        self.nodes.values().filter(|node| node.persistent).count()
    }
}
