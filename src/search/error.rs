use std::fmt;

/// Errors raised by interaction search, pruning and model assembly.
#[derive(Debug)]
pub enum SearchError {
    /// Interaction order outside the supported range
    InvalidOrder { order: usize, num_slots: usize },
    /// Lower order weights were passed for an order below 3
    UnexpectedLowerWeights { order: usize },
    /// Order 3 pruning needs the order 2 weights
    MissingLowerWeights,
    /// Mask length differs from the number of combinations it filters
    MaskLength { expected: usize, actual: usize },
    /// Weight vector length differs from the number of combinations
    WeightCount { expected: usize, actual: usize },
    /// Rescaling is undefined (all-zero weights, or zero magnitude range)
    DegenerateWeights(String),
    /// A named tensor is missing from the graph
    MissingTensor(String),
    /// Invalid configuration value
    Config(String),
    /// Error bubbled up from the graph, a layer, or an optimizer
    Graph(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::InvalidOrder { order, num_slots } => write!(
                f,
                "Invalid interaction order {} for {} slots",
                order, num_slots
            ),
            SearchError::UnexpectedLowerWeights { order } => write!(
                f,
                "Lower order weights are only meaningful for order >= 3, got order {}",
                order
            ),
            SearchError::MissingLowerWeights => {
                write!(f, "Order 3 pruning requires the order 2 weights")
            }
            SearchError::MaskLength { expected, actual } => write!(
                f,
                "Mask has {} entries but there are {} combinations",
                actual, expected
            ),
            SearchError::WeightCount { expected, actual } => write!(
                f,
                "Got {} weights but there are {} combinations",
                actual, expected
            ),
            SearchError::DegenerateWeights(msg) => write!(f, "Degenerate weights: {}", msg),
            SearchError::MissingTensor(name) => {
                write!(f, "Tensor '{}' not found in graph", name)
            }
            SearchError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            SearchError::Graph(msg) => write!(f, "Graph error: {}", msg),
            SearchError::Io(e) => write!(f, "I/O error: {}", e),
            SearchError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SearchError::Io(e) => Some(e),
            SearchError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<String> for SearchError {
    fn from(msg: String) -> Self {
        SearchError::Graph(msg)
    }
}

impl From<crate::nn::OptimizerError> for SearchError {
    fn from(e: crate::nn::OptimizerError) -> Self {
        SearchError::Graph(e.to_string())
    }
}

impl From<std::io::Error> for SearchError {
    fn from(e: std::io::Error) -> Self {
        SearchError::Io(e)
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        SearchError::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
