// src/backend/number.rs

use ndarray::{LinalgScalar, ScalarOperand};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

/// Floating point element type accepted by tensors, layers and optimizers.
///
/// Only `f32` and `f64` implement it. The two conversion helpers exist so
/// hyper-parameters (which are always `f64` in configs) can be brought into
/// the element type without an `Option` round trip.
pub trait FmFloat:
    Float
    + FromPrimitive
    + Sum<Self>
    + for<'a> Sum<&'a Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Debug
    + Display
    + Default
    + LinalgScalar
    + ScalarOperand
    + Send
    + Sync
    + 'static
{
    /// Lossy conversion from a configuration value.
    fn from_real(value: f64) -> Self;

    /// Widening conversion used for logging and pruning.
    fn to_real(self) -> f64;

    /// Name of the element type, used in log lines.
    fn type_name() -> &'static str;
}

impl FmFloat for f32 {
    fn from_real(value: f64) -> Self {
        value as f32
    }

    fn to_real(self) -> f64 {
        self as f64
    }

    fn type_name() -> &'static str {
        "float32"
    }
}

impl FmFloat for f64 {
    fn from_real(value: f64) -> Self {
        value
    }

    fn to_real(self) -> f64 {
        self
    }

    fn type_name() -> &'static str {
        "float64"
    }
}
