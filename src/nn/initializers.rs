// Parameter initializers. All of them draw from a caller supplied RNG so model
// construction is reproducible from a seed.

use crate::backend::{FmFloat, Tensor};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use std::str::FromStr;

/// Half-width of the `uniform` initializer range.
pub const UNIFORM_SCALE: f64 = 0.001;
/// Standard deviation of the `normal` initializer.
pub const NORMAL_STDDEV: f64 = 0.001;
/// Xavier magnitude. With `FactorType::Avg` this gives Glorot uniform.
pub const XAVIER_MAGNITUDE: f64 = 3.0;

/// How the fan of a weight matrix is reduced before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorType {
    Avg,
    In,
    Out,
}

/// Named initializer, selected by string in model configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Init {
    Xavier,
    Uniform,
    Normal,
    Zero,
}

impl FromStr for Init {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xavier" => Ok(Init::Xavier),
            "uniform" => Ok(Init::Uniform),
            "normal" => Ok(Init::Normal),
            "zero" | "zeros" => Ok(Init::Zero),
            other => Err(format!("Unknown initializer '{}'", other)),
        }
    }
}

fn fans(shape: &[usize]) -> (usize, usize) {
    match shape.len() {
        0 => (1, 1),
        1 => (shape[0], shape[0]),
        n => (shape[n - 2], shape[n - 1]),
    }
}

fn sample_tensor<T, D, R>(shape: &[usize], dist: D, rng: &mut R) -> Result<Tensor<T>, String>
where
    T: FmFloat,
    D: Distribution<f64>,
    R: Rng + ?Sized,
{
    let total_size: usize = shape.iter().product();
    let data = (0..total_size)
        .map(|_| T::from_real(dist.sample(rng)))
        .collect();
    Tensor::from_vec(data, shape)
}

/// Samples U(low, high). `low` must be strictly below `high`.
pub fn init_tensor_uniform<T, R>(
    shape: &[usize],
    low: f64,
    high: f64,
    rng: &mut R,
) -> Result<Tensor<T>, String>
where
    T: FmFloat,
    R: Rng + ?Sized,
{
    let uniform = Uniform::new(low, high)
        .map_err(|e| format!("Invalid uniform range [{}, {}): {}", low, high, e))?;
    sample_tensor(shape, uniform, rng)
}

/// Samples N(mean, std).
pub fn init_tensor_normal<T, R>(
    shape: &[usize],
    mean: f64,
    std: f64,
    rng: &mut R,
) -> Result<Tensor<T>, String>
where
    T: FmFloat,
    R: Rng + ?Sized,
{
    let normal = Normal::new(mean, std)
        .map_err(|e| format!("Invalid normal parameters ({}, {}): {}", mean, std, e))?;
    sample_tensor(shape, normal, rng)
}

/// Xavier uniform: U(-a, a) with a = sqrt(magnitude / factor), where factor is
/// the fan of the last two dimensions reduced by `factor_type`.
pub fn init_tensor_xavier_uniform<T, R>(
    shape: &[usize],
    factor_type: FactorType,
    magnitude: f64,
    rng: &mut R,
) -> Result<Tensor<T>, String>
where
    T: FmFloat,
    R: Rng + ?Sized,
{
    let (fan_in, fan_out) = fans(shape);
    let factor = match factor_type {
        FactorType::Avg => (fan_in + fan_out) as f64 / 2.0,
        FactorType::In => fan_in as f64,
        FactorType::Out => fan_out as f64,
    };
    let a = (magnitude / factor.max(1.0)).sqrt();
    init_tensor_uniform(shape, -a, a, rng)
}

/// Initializes a tensor with a named strategy.
pub fn init_tensor<T, R>(init: Init, shape: &[usize], rng: &mut R) -> Result<Tensor<T>, String>
where
    T: FmFloat,
    R: Rng + ?Sized,
{
    match init {
        Init::Xavier => {
            init_tensor_xavier_uniform(shape, FactorType::Avg, XAVIER_MAGNITUDE, rng)
        }
        Init::Uniform => init_tensor_uniform(shape, -UNIFORM_SCALE, UNIFORM_SCALE, rng),
        Init::Normal => init_tensor_normal(shape, 0.0, NORMAL_STDDEV, rng),
        Init::Zero => Ok(Tensor::zeros(shape)),
    }
}
