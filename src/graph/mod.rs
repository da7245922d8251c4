pub mod engine;
pub mod node;
mod tests;

pub use engine::Engine;
pub use node::{Node, NodeId, NodeState};
