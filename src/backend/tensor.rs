// src/backend/tensor.rs
// CPU tensor wrapper around ndarray's dynamic arrays.
// Every operator in the graph is expressed through this API, so the math lives here
// and the graph layer only deals with shapes and gradients.

use crate::backend::number::FmFloat;
use ndarray::{Array, ArrayD, Axis, IxDyn};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T>
where
    T: FmFloat,
{
    pub data: ArrayD<T>,
}

/// Numpy style broadcast of two shapes.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, String> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let da = if i < ndim - a.len() { 1 } else { a[i - (ndim - a.len())] };
        let db = if i < ndim - b.len() { 1 } else { b[i - (ndim - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(format!(
                    "Shapes {:?} and {:?} cannot be broadcast together",
                    a, b
                ));
            }
        };
    }
    Ok(out)
}

impl<T> Tensor<T>
where
    T: FmFloat,
{
    pub fn new(data: ArrayD<T>) -> Self {
        Self { data }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(ArrayD::zeros(IxDyn(shape)))
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::new(ArrayD::ones(IxDyn(shape)))
    }

    pub fn full(shape: &[usize], value: T) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(shape), value))
    }

    /// Zero-dimensional tensor holding a single value.
    pub fn scalar(value: T) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self, String> {
        let total_elements: usize = shape.iter().product();
        if data.len() != total_elements {
            return Err(format!(
                "Data length {} doesn't match shape {:?} (expected {})",
                data.len(),
                shape,
                total_elements
            ));
        }

        Array::from_shape_vec(IxDyn(shape), data)
            .map(Self::new)
            .map_err(|e| format!("Failed to create tensor: {}", e))
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<T> {
        self.data
    }

    /// Elements in logical (row-major) order.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().copied().collect()
    }

    /// First element in logical order, usually the value of a scalar loss.
    pub fn first(&self) -> Result<T, String> {
        self.data
            .iter()
            .next()
            .copied()
            .ok_or_else(|| "Cannot take first element of an empty tensor".to_string())
    }

    // ELEMENTWISE BINARY OPS. Shapes are checked up front because ndarray panics on
    // incompatible broadcasts.

    fn check_broadcast(&self, other: &Self) -> Result<(), String> {
        broadcast_shape(self.shape(), other.shape()).map(|_| ())
    }

    pub fn add(&self, other: &Self) -> Result<Self, String> {
        self.check_broadcast(other)?;
        Ok(Self::new(&self.data + &other.data))
    }

    pub fn sub(&self, other: &Self) -> Result<Self, String> {
        self.check_broadcast(other)?;
        Ok(Self::new(&self.data - &other.data))
    }

    pub fn mul(&self, other: &Self) -> Result<Self, String> {
        self.check_broadcast(other)?;
        Ok(Self::new(&self.data * &other.data))
    }

    pub fn div(&self, other: &Self) -> Result<Self, String> {
        self.check_broadcast(other)?;
        Ok(Self::new(&self.data / &other.data))
    }

    // SCALAR AND UNARY OPS

    pub fn add_scalar(&self, scalar: T) -> Self {
        self.map(|x| x + scalar)
    }

    pub fn mul_scalar(&self, scalar: T) -> Self {
        self.map(|x| x * scalar)
    }

    pub fn div_scalar(&self, scalar: T) -> Self {
        self.map(|x| x / scalar)
    }

    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T,
    {
        Self::new(self.data.mapv(f))
    }

    pub fn neg(&self) -> Self {
        self.map(|x| -x)
    }

    pub fn abs(&self) -> Self {
        self.map(|x| x.abs())
    }

    pub fn sign(&self) -> Self {
        // signum(0) is 1 for floats; the gradient of |x| at 0 is taken as 0
        self.map(|x| if x == T::zero() { T::zero() } else { x.signum() })
    }

    pub fn sqrt(&self) -> Self {
        self.map(|x| x.sqrt())
    }

    pub fn exp(&self) -> Self {
        self.map(|x| x.exp())
    }

    pub fn log(&self) -> Self {
        self.map(|x| x.ln())
    }

    pub fn square(&self) -> Self {
        self.map(|x| x * x)
    }

    pub fn sigmoid(&self) -> Self {
        self.map(|x| T::one() / (T::one() + (-x).exp()))
    }

    pub fn relu(&self) -> Self {
        self.map(|x| if x > T::zero() { x } else { T::zero() })
    }

    pub fn tanh(&self) -> Self {
        self.map(|x| x.tanh())
    }

    // REDUCTIONS

    /// Sum along `axes` (all elements when `None`).
    pub fn sum(&self, axes: Option<&[usize]>, keep_dims: bool) -> Result<Self, String> {
        match axes {
            None => {
                let total = self.data.sum();
                if keep_dims {
                    let ones = vec![1; self.ndim()];
                    Ok(Self::new(ArrayD::from_elem(IxDyn(&ones), total)))
                } else {
                    Ok(Self::scalar(total))
                }
            }
            Some(axes) => {
                let mut sorted: Vec<usize> = axes.to_vec();
                sorted.sort_unstable();
                sorted.dedup();
                if let Some(&bad) = sorted.iter().find(|&&a| a >= self.ndim()) {
                    return Err(format!(
                        "Axis {} out of bounds for tensor with {} dimensions",
                        bad,
                        self.ndim()
                    ));
                }
                let mut result = self.data.clone();
                // Highest axis first so lower indices stay valid.
                for &axis in sorted.iter().rev() {
                    result = result.sum_axis(Axis(axis));
                    if keep_dims {
                        result = result.insert_axis(Axis(axis));
                    }
                }
                Ok(Self::new(result))
            }
        }
    }

    pub fn mean(&self, axes: Option<&[usize]>, keep_dims: bool) -> Result<Self, String> {
        let count: usize = match axes {
            None => self.size(),
            Some(axes) => axes.iter().map(|&a| self.shape().get(a).copied().unwrap_or(1)).product(),
        };
        if count == 0 {
            return Err("Cannot take the mean of an empty tensor".to_string());
        }
        let summed = self.sum(axes, keep_dims)?;
        Ok(summed.div_scalar(T::from_real(count as f64)))
    }

    // LINEAR ALGEBRA

    pub fn matmul(&self, other: &Self) -> Result<Self, String> {
        if self.ndim() != 2 || other.ndim() != 2 {
            return Err("Matrix multiplication requires 2D tensors".to_string());
        }

        let a_shape = self.shape();
        let b_shape = other.shape();
        if a_shape[1] != b_shape[0] {
            return Err(format!(
                "Matrix multiplication shape mismatch: ({}, {}) @ ({}, {})",
                a_shape[0], a_shape[1], b_shape[0], b_shape[1]
            ));
        }

        let a = self
            .data
            .view()
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| e.to_string())?;
        let b = other
            .data
            .view()
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| e.to_string())?;
        Ok(Self::new(a.dot(&b).into_dyn()))
    }

    // SHAPE MANIPULATION

    /// Permute axes. Reverses them when `axes` is `None`.
    pub fn transpose(&self, axes: Option<&[usize]>) -> Result<Self, String> {
        let ndim = self.ndim();
        let perm: Vec<usize> = match axes {
            Some(axes) => {
                let mut check = axes.to_vec();
                check.sort_unstable();
                if check != (0..ndim).collect::<Vec<_>>() {
                    return Err(format!(
                        "Invalid permutation {:?} for tensor with {} dimensions",
                        axes, ndim
                    ));
                }
                axes.to_vec()
            }
            None => (0..ndim).rev().collect(),
        };
        let permuted = self.data.clone().permuted_axes(IxDyn(&perm));
        Ok(Self::new(permuted.as_standard_layout().into_owned()))
    }

    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, String> {
        let total: usize = new_shape.iter().product();
        if total != self.size() {
            return Err(format!(
                "Cannot reshape tensor of shape {:?} into {:?}",
                self.shape(),
                new_shape
            ));
        }
        Self::from_vec(self.to_vec(), new_shape)
    }

    pub fn broadcast_to(&self, target_shape: &[usize]) -> Result<Self, String> {
        match self.data.broadcast(IxDyn(target_shape)) {
            Some(view) => Ok(Self::new(view.to_owned())),
            None => Err(format!(
                "Cannot broadcast {:?} to {:?}",
                self.shape(),
                target_shape
            )),
        }
    }

    /// Insert a size-1 axis at `axis`.
    pub fn unsqueeze(&self, axis: usize) -> Result<Self, String> {
        if axis > self.ndim() {
            return Err(format!(
                "Cannot unsqueeze axis {} of tensor with {} dimensions",
                axis,
                self.ndim()
            ));
        }
        Ok(Self::new(self.data.clone().insert_axis(Axis(axis))))
    }

    // INDEXING

    /// Select slices along `axis` in the given order, repeating indices as needed.
    pub fn gather(&self, axis: usize, indices: &[usize]) -> Result<Self, String> {
        if axis >= self.ndim() {
            return Err(format!(
                "Gather axis {} out of bounds for shape {:?}",
                axis,
                self.shape()
            ));
        }
        let bound = self.shape()[axis];
        if let Some(&bad) = indices.iter().find(|&&i| i >= bound) {
            return Err(format!(
                "Gather index {} out of bounds for axis {} of size {}",
                bad, axis, bound
            ));
        }
        Ok(Self::new(self.data.select(Axis(axis), indices)))
    }

    /// Adjoint of `gather`: accumulates slices of `self` into a zero tensor of
    /// `target_shape` at the given positions along `axis`.
    pub fn scatter_add(
        &self,
        axis: usize,
        indices: &[usize],
        target_shape: &[usize],
    ) -> Result<Self, String> {
        if self.shape().get(axis) != Some(&indices.len()) {
            return Err(format!(
                "Scatter source shape {:?} does not match {} indices on axis {}",
                self.shape(),
                indices.len(),
                axis
            ));
        }
        let mut out = ArrayD::<T>::zeros(IxDyn(target_shape));
        for (pos, &idx) in indices.iter().enumerate() {
            if idx >= target_shape[axis] {
                return Err(format!(
                    "Scatter index {} out of bounds for axis {} of size {}",
                    idx, axis, target_shape[axis]
                ));
            }
            let src = self.data.index_axis(Axis(axis), pos);
            let mut dst = out.index_axis_mut(Axis(axis), idx);
            dst.zip_mut_with(&src, |d, &s| *d += s);
        }
        Ok(Self::new(out))
    }

    /// Concatenate along an existing axis.
    pub fn concat(tensors: &[&Self], axis: usize) -> Result<Self, String> {
        let views: Vec<_> = tensors.iter().map(|t| t.data.view()).collect();
        ndarray::concatenate(Axis(axis), &views)
            .map(Self::new)
            .map_err(|e| format!("Concatenation failed: {}", e))
    }

    /// Split along `axis` into pieces of the given sizes.
    pub fn split(&self, axis: usize, sizes: &[usize]) -> Result<Vec<Self>, String> {
        let total: usize = sizes.iter().sum();
        if self.shape().get(axis) != Some(&total) {
            return Err(format!(
                "Split sizes {:?} do not add up to axis {} of shape {:?}",
                sizes,
                axis,
                self.shape()
            ));
        }
        let mut start = 0;
        let mut parts = Vec::with_capacity(sizes.len());
        for &size in sizes {
            let indices: Vec<usize> = (start..start + size).collect();
            parts.push(self.gather(axis, &indices)?);
            start += size;
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::{Tensor, broadcast_shape};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_broadcast_shape_rules() {
        assert_eq!(broadcast_shape(&[4, 3], &[3]).unwrap(), vec![4, 3]);
        assert_eq!(broadcast_shape(&[4, 1], &[1, 5]).unwrap(), vec![4, 5]);
        assert!(broadcast_shape(&[4, 3], &[2]).is_err());
    }

    #[test]
    fn test_tensor_matmul() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();

        let result = a.matmul(&b).unwrap();
        let expected = Tensor::from_vec(vec![22.0, 28.0, 49.0, 64.0], &[2, 2]).unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_sum_keep_dims() {
        let t = Tensor::from_vec((0..6).map(|x| x as f64).collect(), &[2, 3]).unwrap();
        let s = t.sum(Some(&[1]), true).unwrap();
        assert_eq!(s.shape(), &[2, 1]);
        assert_eq!(s.to_vec(), vec![3.0, 12.0]);

        let all = t.sum(None, false).unwrap();
        assert_eq!(all.shape(), &[] as &[usize]);
        assert_eq!(all.first().unwrap(), 15.0);
    }

    #[test]
    fn test_mean_along_batch() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let m = t.mean(Some(&[0]), true).unwrap();
        assert_eq!(m.shape(), &[1, 2]);
        assert_abs_diff_eq!(m.to_vec()[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.to_vec()[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gather_and_scatter_are_adjoint() {
        // 3 slots, 2-dim embeddings
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();
        let picked = t.gather(0, &[2, 0, 2]).unwrap();
        assert_eq!(picked.to_vec(), vec![5.0, 6.0, 1.0, 2.0, 5.0, 6.0]);

        let ones = Tensor::<f64>::ones(&[3, 2]);
        let back = ones.scatter_add(0, &[2, 0, 2], &[3, 2]).unwrap();
        assert_eq!(back.to_vec(), vec![1.0, 1.0, 0.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_gather_out_of_bounds() {
        let t = Tensor::<f64>::zeros(&[2, 2]);
        assert!(t.gather(0, &[2]).is_err());
        assert!(t.gather(3, &[0]).is_err());
    }

    #[test]
    fn test_transpose_and_reshape() {
        let t = Tensor::from_vec((0..6).map(|x| x as f64).collect(), &[2, 3]).unwrap();
        let tt = t.transpose(None).unwrap();
        assert_eq!(tt.shape(), &[3, 2]);
        assert_eq!(tt.to_vec(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

        let r = t.reshape(&[3, 2]).unwrap();
        assert_eq!(r.to_vec(), t.to_vec());
        assert!(t.reshape(&[4, 2]).is_err());
    }

    #[test]
    fn test_split_and_concat() {
        let t = Tensor::from_vec((0..8).map(|x| x as f64).collect(), &[2, 4]).unwrap();
        let parts = t.split(1, &[1, 3]).unwrap();
        assert_eq!(parts[0].shape(), &[2, 1]);
        assert_eq!(parts[1].shape(), &[2, 3]);
        let joined = Tensor::concat(&[&parts[0], &parts[1]], 1).unwrap();
        assert_eq!(joined, t);
    }

    #[test]
    fn test_activations() {
        let input = Tensor::from_vec(vec![-2.0, -1.0, 0.0, 1.0, 2.0], &[5]).unwrap();
        assert_eq!(input.relu().to_vec(), vec![0.0, 0.0, 0.0, 1.0, 2.0]);
        assert!(input.sigmoid().to_vec().iter().all(|&v| v > 0.0 && v < 1.0));
        assert_eq!(input.sign().to_vec(), vec![-1.0, -1.0, 0.0, 1.0, 1.0]);
    }
}
