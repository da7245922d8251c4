use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::optim::{Optimizer, OptimizerError, ParameterGroup, param_and_grad};
use ndarray::Zip;
use std::collections::HashMap;

/// Adam optimizer with AdamW-style decoupled weight decay.
/// Implements bias correction and the AMSGrad variant.
#[derive(Debug)]
pub struct Adam<T>
where
    T: FmFloat,
{
    lr: T,
    beta1: T,
    beta2: T,
    eps: T,
    weight_decay: T,
    amsgrad: bool,
    param_groups: Vec<ParameterGroup<T>>,
    first_moments: HashMap<NodeId, Tensor<T>>,
    second_moments: HashMap<NodeId, Tensor<T>>,
    max_second_moments: HashMap<NodeId, Tensor<T>>,
    step_count: u64,
}

impl<T> Adam<T>
where
    T: FmFloat,
{
    pub fn new(lr: T, beta1: T, beta2: T, eps: T, weight_decay: T, amsgrad: bool) -> Self {
        let mut default_group = ParameterGroup::new("default");
        default_group.lr = Some(lr);
        default_group.weight_decay = Some(weight_decay);

        Self {
            lr,
            beta1,
            beta2,
            eps,
            weight_decay,
            amsgrad,
            param_groups: vec![default_group],
            first_moments: HashMap::new(),
            second_moments: HashMap::new(),
            max_second_moments: HashMap::new(),
            step_count: 0,
        }
    }

    pub fn with_defaults(lr: T) -> Self {
        Self::new(
            lr,
            T::from_real(0.9),
            T::from_real(0.999),
            T::from_real(1e-8),
            T::zero(),
            false,
        )
    }

    /// AdamW variant with decoupled weight decay
    pub fn adamw(lr: T, weight_decay: T) -> Self {
        Self::new(
            lr,
            T::from_real(0.9),
            T::from_real(0.999),
            T::from_real(1e-8),
            weight_decay,
            false,
        )
    }

    pub fn amsgrad(lr: T) -> Self {
        Self::new(
            lr,
            T::from_real(0.9),
            T::from_real(0.999),
            T::from_real(1e-8),
            T::zero(),
            true,
        )
    }

    pub fn get_step_count(&self) -> u64 {
        self.step_count
    }

    /// Reset optimizer state for fresh training
    pub fn reset_state(&mut self) {
        self.first_moments.clear();
        self.second_moments.clear();
        self.max_second_moments.clear();
        self.step_count = 0;
    }

    fn compute_bias_corrections(&self) -> (T, T) {
        let step = T::from_real(self.step_count as f64);
        (
            T::one() - self.beta1.powf(step),
            T::one() - self.beta2.powf(step),
        )
    }

    fn get_group_lr(&self, group: &ParameterGroup<T>) -> T {
        group.lr.unwrap_or(self.lr)
    }

    fn get_group_weight_decay(&self, group: &ParameterGroup<T>) -> T {
        group.weight_decay.unwrap_or(self.weight_decay)
    }

    /// m = beta1 * m + (1 - beta1) * grad, v = beta2 * v + (1 - beta2) * grad^2.
    /// Returns the first moment and the second moment used for the update.
    fn update_moments(
        &mut self,
        param_id: NodeId,
        grad: &Tensor<T>,
    ) -> Result<(Tensor<T>, Tensor<T>), OptimizerError> {
        let shape = grad.shape().to_vec();

        let first = self
            .first_moments
            .remove(&param_id)
            .unwrap_or_else(|| Tensor::zeros(&shape))
            .mul_scalar(self.beta1)
            .add(&grad.mul_scalar(T::one() - self.beta1))?;

        let second = self
            .second_moments
            .remove(&param_id)
            .unwrap_or_else(|| Tensor::zeros(&shape))
            .mul_scalar(self.beta2)
            .add(&grad.square().mul_scalar(T::one() - self.beta2))?;

        let for_update = if self.amsgrad {
            let previous = self
                .max_second_moments
                .remove(&param_id)
                .unwrap_or_else(|| Tensor::zeros(&shape));
            let max = Tensor::new(
                Zip::from(previous.data())
                    .and(second.data())
                    .map_collect(|&a, &b| a.max(b)),
            );
            self.max_second_moments.insert(param_id, max.clone());
            max
        } else {
            second.clone()
        };

        self.first_moments.insert(param_id, first.clone());
        self.second_moments.insert(param_id, second);
        Ok((first, for_update))
    }
}

impl<T> Optimizer<T> for Adam<T>
where
    T: FmFloat,
{
    fn step(&mut self, engine: &mut Engine<T>) -> Result<(), OptimizerError> {
        self.step_count += 1;
        let (bias_correction1, bias_correction2) = self.compute_bias_corrections();

        let groups = self.param_groups.clone();
        for group in &groups {
            let group_lr = self.get_group_lr(group);
            let group_weight_decay = self.get_group_weight_decay(group);

            for &param_node in &group.params {
                let Some((params, grad)) = param_and_grad(engine, param_node)? else {
                    continue;
                };
                let (first, second) = self.update_moments(param_node, &grad)?;

                // update = lr * m_hat / (sqrt(v_hat) + eps)
                let denominator = second
                    .div_scalar(bias_correction2)
                    .sqrt()
                    .add_scalar(self.eps);
                let update = first
                    .div_scalar(bias_correction1)
                    .div(&denominator)?
                    .mul_scalar(group_lr);

                let mut new_params = params.sub(&update)?;
                if group_weight_decay != T::zero() {
                    new_params = new_params.sub(&params.mul_scalar(group_weight_decay * group_lr))?;
                }

                engine
                    .update_parameter(param_node, new_params)
                    .map_err(|_| OptimizerError::ParameterNotFound(param_node))?;
            }
        }
        Ok(())
    }

    fn add_param(&mut self, param_node_id: NodeId) {
        self.param_groups[0].params.insert(param_node_id);
    }

    fn add_param_group(&mut self, group: ParameterGroup<T>) -> Result<(), OptimizerError> {
        if group.params.is_empty() {
            return Err(OptimizerError::InvalidParameterGroup);
        }
        self.param_groups.push(group);
        Ok(())
    }

    fn param_ids(&self) -> Vec<NodeId> {
        self.param_groups
            .iter()
            .flat_map(|g| g.params.iter().copied())
            .collect()
    }

    fn get_lr(&self) -> T {
        self.lr
    }

    fn set_lr(&mut self, lr: T) {
        self.lr = lr;
        for group in &mut self.param_groups {
            group.lr = Some(lr);
        }
    }

    fn name(&self) -> &'static str {
        "Adam"
    }
}
