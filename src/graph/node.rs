use crate::backend::{FmFloat, Tensor};
use crate::ops::Operator;
use std::sync::atomic::{AtomicUsize, Ordering};

/// ATOMIC auto incrementing id for all nodes.
static NODE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn new() -> Self {
        // Relaxed is enough: ids only need to be unique, not ordered across threads.
        Self(NODE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[derive(Debug)]
pub enum NodeState<T>
where
    T: FmFloat,
{
    /// Leaf node with materialized tensor.
    Leaf(Tensor<T>),

    /// Result of an operation, kept with its inputs for the backward pass.
    Evaluated {
        tensor: Tensor<T>,
        op: Box<dyn Operator<T>>,
        inputs: Vec<NodeId>,
    },
}

/// Computational graph node.
#[derive(Debug)]
pub struct Node<T>
where
    T: FmFloat,
{
    pub id: NodeId,
    pub state: NodeState<T>,
    pub requires_grad: bool,
    /// Persistent nodes (parameters) survive `Engine::clear_transient`.
    pub persistent: bool,
}

impl<T> Node<T>
where
    T: FmFloat,
{
    pub fn new_leaf(tensor: Tensor<T>, requires_grad: bool) -> Self {
        Self {
            id: NodeId::new(),
            state: NodeState::Leaf(tensor),
            requires_grad,
            persistent: false,
        }
    }

    pub fn new_evaluated(
        tensor: Tensor<T>,
        op: Box<dyn Operator<T>>,
        inputs: Vec<NodeId>,
        requires_grad: bool,
    ) -> Self {
        Self {
            id: NodeId::new(),
            state: NodeState::Evaluated { tensor, op, inputs },
            requires_grad,
            persistent: false,
        }
    }

    pub fn get_tensor(&self) -> &Tensor<T> {
        match &self.state {
            NodeState::Leaf(tensor) => tensor,
            NodeState::Evaluated { tensor, .. } => tensor,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.state, NodeState::Leaf(_))
    }

    pub fn inputs(&self) -> &[NodeId] {
        match &self.state {
            NodeState::Leaf(_) => &[],
            NodeState::Evaluated { inputs, .. } => inputs,
        }
    }
}
