use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};

/// A Parameter is a named tensor that represents learnable state of a layer.
///
/// The tensor held here is the initial value. Once the owning module is
/// registered with `Module::create_parameters_in_graph`, the graph owns the live
/// value and the parameter only remembers its node. `sync_from_graph` copies the
/// trained value back.
///
/// # Examples
///
/// ```rust
/// use autofm::Tensor;
/// use autofm::nn::Parameter;
///
/// let param = Parameter::new(Tensor::<f64>::zeros(&[10, 5]), "dense/weight");
/// assert_eq!(param.shape(), &[10, 5]);
/// assert!(param.node().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Parameter<T>
where
    T: FmFloat,
{
    /// The tensor data (initial or last synced value)
    pub data: Tensor<T>,
    /// Fully scoped name, unique within one graph
    name: String,
    node: Option<NodeId>,
}

impl<T> Parameter<T>
where
    T: FmFloat,
{
    pub fn new(data: Tensor<T>, name: impl Into<String>) -> Self {
        Self {
            data,
            name: name.into(),
            node: None,
        }
    }

    pub fn zeros(shape: &[usize], name: impl Into<String>) -> Self {
        Self::new(Tensor::zeros(shape), name)
    }

    pub fn ones(shape: &[usize], name: impl Into<String>) -> Self {
        Self::new(Tensor::ones(shape), name)
    }

    /// Returns the shape of the parameter.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Returns the number of elements in the parameter.
    pub fn size(&self) -> usize {
        self.data.size()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates the persistent graph node for this parameter. Registering twice
    /// in the same graph is a no-op.
    pub fn register(&mut self, graph: &mut Engine<T>) -> Result<NodeId, String> {
        if let Some(node) = self.node {
            if graph.get_node(node).is_some() {
                return Ok(node);
            }
        }
        let node = graph.create_parameter(self.data.clone(), &self.name)?;
        self.node = Some(node);
        Ok(node)
    }

    /// Node of this parameter in the graph it was registered with.
    pub fn node(&self) -> Result<NodeId, String> {
        self.node.ok_or_else(|| {
            format!(
                "Parameter '{}' not yet created in graph. Call create_parameters_in_graph() first.",
                self.name
            )
        })
    }

    /// Copies the live value out of the graph.
    pub fn sync_from_graph(&mut self, graph: &Engine<T>) -> Result<(), String> {
        let node = self.node()?;
        let tensor = graph
            .get_tensor(node)
            .ok_or_else(|| format!("Parameter '{}' missing from graph", self.name))?;
        self.data = tensor.clone();
        Ok(())
    }
}
