// Gradient checks for every operator against central finite differences.
use crate::backend::Tensor;
use crate::graph::Engine;
use crate::ops::*;
use approx::assert_abs_diff_eq;

/// Builds `sum(op(x, extra...))` and compares d/dx with finite differences.
fn check_gradient<F>(x: Vec<f64>, shape: &[usize], build: F)
where
    F: Fn(&mut Engine<f64>, crate::graph::NodeId) -> crate::graph::NodeId,
{
    let mut engine = Engine::new();
    let input = engine.create_variable(Tensor::from_vec(x.clone(), shape).unwrap(), true);
    let out = build(&mut engine, input);
    let loss = engine.apply_operation(Box::new(Sum::new()), vec![out]).unwrap();
    engine.backward(loss).unwrap();
    let analytic = engine.get_gradient(input).unwrap().to_vec();

    let eps = 1e-6;
    for i in 0..x.len() {
        let eval = |delta: f64| {
            let mut probe = x.clone();
            probe[i] += delta;
            let mut e = Engine::new();
            let node = e.create_variable(Tensor::from_vec(probe, shape).unwrap(), true);
            let out = build(&mut e, node);
            e.get_tensor(out).unwrap().sum(None, false).unwrap().first().unwrap()
        };
        let numeric = (eval(eps) - eval(-eps)) / (2.0 * eps);
        assert_abs_diff_eq!(analytic[i], numeric, epsilon = 1e-4);
    }
}

#[test]
fn test_mul_with_broadcast_gradient() {
    check_gradient(vec![1.0, -2.0, 3.0, 0.5, 0.25, -1.5], &[2, 3], |g, x| {
        let w = g.create_variable(Tensor::from_vec(vec![0.3, -0.7, 2.0], &[3]).unwrap(), true);
        g.apply_operation(Box::new(Mul), vec![x, w]).unwrap()
    });
}

#[test]
fn test_div_gradient() {
    check_gradient(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], |g, x| {
        let d = g.create_variable(Tensor::from_vec(vec![2.0, -4.0], &[1, 2]).unwrap(), false);
        let num = g.apply_operation(Box::new(Square), vec![x]).unwrap();
        let ratio = g.apply_operation(Box::new(Div), vec![num, x]).unwrap();
        let scaled = g.apply_operation(Box::new(Div), vec![x, d]).unwrap();
        g.apply_operation(Box::new(Mul), vec![ratio, scaled]).unwrap()
    });
}

#[test]
fn test_unary_chain_gradient() {
    check_gradient(vec![0.2, -0.4, 1.1], &[3], |g, x| {
        let s = g.apply_operation(Box::new(Sigmoid), vec![x]).unwrap();
        let t = g.apply_operation(Box::new(Tanh), vec![s]).unwrap();
        let e = g.apply_operation(Box::new(Exp), vec![t]).unwrap();
        let l = g.apply_operation(Box::new(Log), vec![e]).unwrap();
        let a = g.apply_operation(Box::new(Abs), vec![x]).unwrap();
        let r = g.apply_operation(Box::new(ReLU), vec![x]).unwrap();
        let q = g.apply_operation(Box::new(AddScalar::new(1.0)), vec![a]).unwrap();
        let q = g.apply_operation(Box::new(Sqrt), vec![q]).unwrap();
        let lr = g.apply_operation(Box::new(Add), vec![l, r]).unwrap();
        g.apply_operation(Box::new(Sub), vec![lr, q]).unwrap()
    });
}

#[test]
fn test_mean_along_batch_gradient() {
    check_gradient(vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0], &[3, 2], |g, x| {
        let m = g.apply_operation(Box::new(Mean::along_axes(vec![0], true)), vec![x]).unwrap();
        let c = g.apply_operation(Box::new(Sub), vec![x, m]).unwrap();
        g.apply_operation(Box::new(Square), vec![c]).unwrap()
    });
}

#[test]
fn test_gather_gradient_accumulates_repeats() {
    // [batch=1, slots=3, dim=2]; slot 0 is used twice
    check_gradient(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], &[1, 3, 2], |g, x| {
        let left = g.apply_operation(Box::new(Gather::new(1, vec![0, 0, 1])), vec![x]).unwrap();
        let right = g.apply_operation(Box::new(Gather::new(1, vec![1, 2, 2])), vec![x]).unwrap();
        let prod = g.apply_operation(Box::new(Mul), vec![left, right]).unwrap();
        g.apply_operation(Box::new(Sum::along_axes(vec![2], false)), vec![prod]).unwrap()
    });
}

#[test]
fn test_matmul_and_reshape_gradient() {
    check_gradient(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], |g, x| {
        let w = g
            .create_variable(Tensor::from_vec(vec![0.5, -1.0, 0.25, 2.0, 1.5, -0.5], &[3, 2]).unwrap(), true);
        let y = g.apply_operation(Box::new(MatMul), vec![x, w]).unwrap();
        let y = g.apply_operation(Box::new(Reshape::new(vec![4])), vec![y]).unwrap();
        g.apply_operation(Box::new(MulScalar::new(3.0)), vec![y]).unwrap()
    });
}

#[test]
fn test_operator_names() {
    let op: Box<dyn Operator<f64>> = Box::new(Gather::new(0, vec![0]));
    assert_eq!(op.name(), "Gather");
    let op: Box<dyn Operator<f64>> = Box::new(AddScalar::new(1.0));
    assert_eq!(op.name(), "AddScalar");
}

#[test]
fn test_wrong_arity_is_rejected() {
    let mut engine = Engine::<f64>::new();
    let a = engine.create_variable(Tensor::ones(&[2]), true);
    assert!(engine.apply_operation(Box::new(Add), vec![a]).is_err());
}

#[test]
fn test_softplus_gradient_and_stability() {
    check_gradient(vec![-3.0, 0.0, 0.7, 2.5], &[4], |g, x| {
        g.apply_operation(Box::new(Softplus), vec![x]).unwrap()
    });

    let mut engine = Engine::<f64>::new();
    let x = engine.create_variable(Tensor::from_vec(vec![-800.0, 800.0], &[2]).unwrap(), false);
    let y = engine.apply_operation(Box::new(Softplus), vec![x]).unwrap();
    let values = engine.get_tensor(y).unwrap().to_vec();
    assert_abs_diff_eq!(values[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(values[1], 800.0, epsilon = 1e-9);
}
