use crate::backend::{FmFloat, Tensor};
use crate::graph::{Engine, NodeId};
use crate::nn::optim::{Optimizer, OptimizerError, ParameterGroup, param_and_grad};
use std::collections::HashMap;

/// Stochastic Gradient Descent optimizer with momentum and weight decay
/// Uses L2 weight decay folded into the gradient (not decoupled)
#[derive(Debug)]
pub struct SGD<T>
where
    T: FmFloat,
{
    lr: T,
    momentum: T,
    weight_decay: T,
    nesterov: bool,
    param_groups: Vec<ParameterGroup<T>>,
    momentum_buffers: HashMap<NodeId, Tensor<T>>,
}

impl<T> SGD<T>
where
    T: FmFloat,
{
    pub fn new(lr: T, momentum: T, weight_decay: T, nesterov: bool) -> Self {
        let mut default_group = ParameterGroup::new("default");
        default_group.lr = Some(lr);
        default_group.weight_decay = Some(weight_decay);
        default_group.momentum = Some(momentum);

        Self {
            lr,
            momentum,
            weight_decay,
            nesterov,
            param_groups: vec![default_group],
            momentum_buffers: HashMap::new(),
        }
    }

    pub fn with_defaults(lr: T) -> Self {
        Self::new(lr, T::zero(), T::zero(), false)
    }

    pub fn with_momentum(lr: T, momentum: T) -> Self {
        Self::new(lr, momentum, T::zero(), false)
    }

    pub fn set_nesterov(&mut self, nesterov: bool) {
        self.nesterov = nesterov;
    }

    fn get_group_lr(&self, group: &ParameterGroup<T>) -> T {
        group.lr.unwrap_or(self.lr)
    }

    fn get_group_weight_decay(&self, group: &ParameterGroup<T>) -> T {
        group.weight_decay.unwrap_or(self.weight_decay)
    }

    fn get_group_momentum(&self, group: &ParameterGroup<T>) -> T {
        group.momentum.unwrap_or(self.momentum)
    }

    fn apply_weight_decay(
        decay_rate: T,
        grad: &Tensor<T>,
        params: &Tensor<T>,
    ) -> Result<Tensor<T>, OptimizerError> {
        if decay_rate == T::zero() {
            return Ok(grad.clone());
        }
        // effective_grad = grad + weight_decay * params
        Ok(grad.add(&params.mul_scalar(decay_rate))?)
    }

    fn compute_update(
        &mut self,
        momentum: T,
        param_id: NodeId,
        effective_grad: &Tensor<T>,
    ) -> Result<Tensor<T>, OptimizerError> {
        if momentum == T::zero() {
            return Ok(effective_grad.clone());
        }

        let buffer = match self.momentum_buffers.remove(&param_id) {
            Some(previous) => previous.mul_scalar(momentum).add(effective_grad)?,
            None => effective_grad.clone(),
        };

        let update = if self.nesterov {
            buffer.mul_scalar(momentum).add(effective_grad)?
        } else {
            buffer.clone()
        };
        self.momentum_buffers.insert(param_id, buffer);
        Ok(update)
    }
}

impl<T> Optimizer<T> for SGD<T>
where
    T: FmFloat,
{
    fn step(&mut self, engine: &mut Engine<T>) -> Result<(), OptimizerError> {
        let groups = self.param_groups.clone();
        for group in &groups {
            let group_lr = self.get_group_lr(group);
            let group_weight_decay = self.get_group_weight_decay(group);
            let group_momentum = self.get_group_momentum(group);

            for &param_node in &group.params {
                let Some((params, grad)) = param_and_grad(engine, param_node)? else {
                    continue;
                };
                let effective_grad = Self::apply_weight_decay(group_weight_decay, &grad, &params)?;
                let update = self.compute_update(group_momentum, param_node, &effective_grad)?;
                let updated_params = params.sub(&update.mul_scalar(group_lr))?;

                engine
                    .update_parameter(param_node, updated_params)
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
        "SGD"
    }
}
