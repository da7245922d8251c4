use crate::backend::FmFloat;
use crate::graph::{Engine, NodeId};
use crate::nn::parameter::Parameter;
use std::collections::HashMap;

/// The base trait for all neural network modules.
///
/// Similar to PyTorch's Module class, this trait allows for:
/// - Hierarchical composition of layers
/// - Automatic parameter collection and registration in a graph
/// - Training/evaluation mode switching
pub trait Module<T>
where
    T: FmFloat,
{
    /// Performs the forward pass of the module.
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String>;

    /// Returns all parameters of this module, including submodules.
    fn parameters(&self) -> Vec<&Parameter<T>> {
        Vec::new()
    }

    /// Returns mutable references to all parameters of this module.
    fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        Vec::new()
    }

    /// Returns whether the module is in training mode.
    ///
    /// Training mode affects layers like Dropout and BatchNorm.
    fn training(&self) -> bool {
        true
    }

    /// Sets the training mode for this module and all submodules.
    fn set_training(&mut self, training: bool);

    fn eval(&mut self) {
        self.set_training(false);
    }

    fn train(&mut self) {
        self.set_training(true);
    }

    /// Returns the number of scalar parameters in this module.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.size()).sum()
    }

    /// Creates persistent nodes in the computation graph for all parameters.
    ///
    /// Must be called once before any forward pass.
    fn create_parameters_in_graph(
        &mut self,
        graph: &mut Engine<T>,
    ) -> Result<HashMap<String, NodeId>, String> {
        let mut param_map = HashMap::new();
        for param in self.parameters_mut() {
            let node_id = param.register(graph)?;
            param_map.insert(param.name().to_string(), node_id);
        }
        Ok(param_map)
    }

    /// Copies trained values from the graph back into the parameters.
    fn sync_from_graph(&mut self, graph: &Engine<T>) -> Result<(), String> {
        for param in self.parameters_mut() {
            param.sync_from_graph(graph)?;
        }
        Ok(())
    }
}

/// A container that runs its modules in sequence.
pub struct ModuleList<T>
where
    T: FmFloat,
{
    modules: Vec<Box<dyn Module<T>>>,
    training: bool,
}

impl<T> ModuleList<T>
where
    T: FmFloat,
{
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            training: true,
        }
    }

    pub fn push(&mut self, module: Box<dyn Module<T>>) {
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Box<dyn Module<T>>> {
        self.modules.iter()
    }
}

impl<T> Default for ModuleList<T>
where
    T: FmFloat,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Module<T> for ModuleList<T>
where
    T: FmFloat,
{
    fn forward(&self, graph: &mut Engine<T>, input: NodeId) -> Result<NodeId, String> {
        let mut current = input;
        for module in &self.modules {
            current = module.forward(graph, current)?;
        }
        Ok(current)
    }

    fn parameters(&self) -> Vec<&Parameter<T>> {
        self.modules.iter().flat_map(|m| m.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter<T>> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.parameters_mut())
            .collect()
    }

    fn training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for module in &mut self.modules {
            module.set_training(training);
        }
    }
}
