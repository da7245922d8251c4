pub mod number;
pub mod tensor;

pub use number::FmFloat;
pub use tensor::{Tensor, broadcast_shape};
