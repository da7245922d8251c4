use crate::backend::Tensor;
use crate::dataset::Batch;
use crate::graph::Engine;
use crate::models::*;
use crate::nn::{Adam, Optim, SGD, SigmoidCrossEntropy};
use crate::search::{InteractionMask, SearchError};
use approx::assert_abs_diff_eq;

fn fm_config() -> AutoFmConfig {
    AutoFmConfig {
        seed: 7,
        ..AutoFmConfig::new(4, 12, 3)
    }
}

fn batch() -> Batch<f64> {
    Batch {
        ids: vec![0, 3, 6, 9, 1, 4, 7, 10, 2, 5, 8, 11, 0, 4, 8, 9],
        values: None,
        labels: Tensor::from_vec(vec![1.0, 0.0, 1.0, 0.0], &[4]).unwrap(),
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_autofm_registers_named_tensors() {
    let mut graph = Engine::<f64>::new();
    let mut model = AutoFm::<f64>::new(AutoFmConfig {
        third_prune: true,
        ..fm_config()
    })
    .unwrap();
    model.create_parameters_in_graph(&mut graph).unwrap();

    let names = graph.names();
    for expected in [
        "embedding/w",
        "embedding/v",
        "embedding/b",
        "edge_weight/weights",
        "edge_weight/normed_wts",
        "prune_BN/gamma",
        "third_edge_weight/third_weights",
        "third_edge_weight/third_normed_wts",
        "level_3_matrix_BN/beta",
    ] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    assert_eq!(graph.tensor_by_name("edge_weight/normed_wts").unwrap().size(), 6);
    assert_eq!(
        graph.tensor_by_name("third_edge_weight/third_normed_wts").unwrap().size(),
        4
    );
    assert_eq!(model.gate_nodes().unwrap().len(), 2);
}

#[test]
fn test_config_validation() {
    assert!(AutoFm::<f64>::new(AutoFmConfig::new(1, 12, 3)).is_err());
    assert!(matches!(
        AutoFm::<f64>::new(AutoFmConfig {
            comb_mask: Some(vec![1, 0]),
            ..fm_config()
        }),
        Err(SearchError::MaskLength { .. })
    ));
    assert!(AutoFm::<f64>::new(AutoFmConfig {
        init: "orthogonal".to_string(),
        ..fm_config()
    })
    .is_err());

    let deep = AutoDeepFmConfig {
        layer_sizes: vec![8, 2],
        layer_acts: vec!["relu".to_string(), "none".to_string()],
        layer_keeps: vec![1.0, 1.0],
        ..AutoDeepFmConfig::new(4, 12, 3)
    };
    assert!(matches!(deep.validate(), Err(SearchError::Config(_))));
}

#[test]
fn test_configs_deserialize_with_defaults() {
    let fm: AutoFmConfig =
        serde_json::from_str(r#"{"num_inputs": 4, "input_dim": 10, "embed_size": 3}"#).unwrap();
    assert_eq!(fm.weight_base, 0.6);
    assert_eq!(fm.weight_base_third, 0.6);
    assert_eq!(fm.prune_threshold, 0.3);
    assert_eq!(fm.init, "xavier");
    assert!(!fm.third_prune && !fm.retrain_stage);

    let deep: AutoDeepFmConfig = serde_json::from_str(
        r#"{"num_inputs": 4, "input_dim": 10, "embed_size": 3, "layer_sizes": [4, 1],
            "layer_acts": ["relu", "none"], "layer_keeps": [0.5, 1.0], "batch_norm": true}"#,
    )
    .unwrap();
    assert_eq!(deep.base.num_inputs, 4);
    assert!(deep.validate().is_ok());

    let training: TrainingConfig = serde_json::from_str(r#"{"optimizer": "SGD"}"#).unwrap();
    assert_eq!(training.batch_size, 32);
    assert_eq!(training.pos_weight, 1.0);
    assert!(training.build_optimizer::<f32>(0.1).is_ok());

    let bad = TrainingConfig {
        optimizer: "RMSProp".to_string(),
        ..TrainingConfig::fast()
    };
    assert!(bad.build_optimizers::<f64>().is_err());
}

#[test]
fn test_retrain_config_applies_masks_and_drops_l2() {
    let config = AutoFmConfig {
        l2_w: Some(0.1),
        l2_v: Some(0.1),
        third_prune: true,
        ..fm_config()
    };
    let masks = vec![
        InteractionMask::new(2, 4, vec![1, 0, 0, 1, 0, 1]).unwrap(),
        InteractionMask::new(3, 4, vec![0, 1, 0, 0]).unwrap(),
    ];
    let retrain = config.for_retrain(&masks).unwrap();
    assert!(retrain.retrain_stage);
    assert_eq!(retrain.l2_w(), None);
    assert_eq!(retrain.l2_v(), None);
    assert_eq!(config.l2_w(), Some(0.1));

    let model = AutoFm::<f64>::new(retrain).unwrap();
    assert_eq!(model.second_order_gate().len(), 3);
    assert_eq!(model.third_order_gate().unwrap().len(), 1);
    assert_eq!(
        model.second_order_gate().combinations().tuples(),
        vec![vec![0, 1], vec![1, 2], vec![2, 3]]
    );

    let wrong_slots = vec![InteractionMask::new(2, 3, vec![1, 1, 1]).unwrap()];
    assert!(config.for_retrain(&wrong_slots).is_err());
}

// ============================================================================
// FORWARD
// ============================================================================

#[test]
fn test_autofm_with_all_pairs_pruned_is_linear() {
    let mut graph = Engine::<f64>::new();
    let mut model = AutoFm::<f64>::new(AutoFmConfig {
        comb_mask: Some(vec![0; 6]),
        ..fm_config()
    })
    .unwrap();
    model.create_parameters_in_graph(&mut graph).unwrap();

    let b = batch();
    let out = model.forward(&mut graph, &b.ids, None).unwrap();
    let logits = graph.get_tensor(out.logits).unwrap().to_vec();

    // bias starts at zero, so logits are the summed first order weights
    let w = graph.tensor_by_name("embedding/w").unwrap().to_vec();
    for (row, logit) in b.ids.chunks(4).zip(&logits) {
        let expected: f64 = row.iter().map(|&id| w[id]).sum();
        assert_abs_diff_eq!(*logit, expected, epsilon = 1e-12);
    }
}

#[test]
fn test_forward_shapes_and_l2_terms() {
    let mut graph = Engine::<f64>::new();
    let mut fm = AutoFm::<f64>::new(AutoFmConfig {
        l2_v: Some(0.01),
        third_prune: true,
        ..fm_config()
    })
    .unwrap();
    fm.create_parameters_in_graph(&mut graph).unwrap();
    let out = fm.forward(&mut graph, &batch().ids, None).unwrap();
    assert_eq!(graph.get_tensor(out.logits).unwrap().shape(), &[4]);
    assert_eq!(out.l2_terms.len(), 2);
    assert_eq!(out.l2_terms[1].0, Some(0.01));

    let mut graph = Engine::<f64>::new();
    let mut deep = AutoDeepFm::<f64>::new(AutoDeepFmConfig {
        layer_l2: Some(0.001),
        batch_norm: true,
        ..AutoDeepFmConfig::new(4, 12, 3)
    })
    .unwrap();
    deep.create_parameters_in_graph(&mut graph).unwrap();
    assert!(graph.node_by_name("embedding/b").is_none());
    assert!(graph.node_by_name("mlp/layer_0/kernel").is_some());

    let values = Tensor::full(&[4, 4], 0.5);
    let out = deep.forward(&mut graph, &batch().ids, Some(&values)).unwrap();
    assert_eq!(graph.get_tensor(out.logits).unwrap().shape(), &[4]);
    assert_eq!(out.l2_terms[2].1.len(), deep.mlp().num_layers());
}

// ============================================================================
// COMPILE AND TRAIN
// ============================================================================

#[test]
fn test_train_step_reduces_loss() {
    let mut graph = Engine::<f64>::new();
    let model = AutoFm::<f64>::new(AutoFmConfig {
        l2_w: Some(1e-4),
        l2_v: Some(1e-4),
        ..fm_config()
    })
    .unwrap();
    let mut compiled = model
        .compile(
            &mut graph,
            SigmoidCrossEntropy::default(),
            Adam::with_defaults(0.05),
            None,
            1.0,
        )
        .unwrap();

    let b = batch();
    let first = compiled.train_step(&mut graph, &b).unwrap();
    assert!(first.l2 > 0.0);
    let mut last = first;
    for _ in 0..50 {
        last = compiled.train_step(&mut graph, &b).unwrap();
    }
    assert!(last.loss < first.loss);
    assert_eq!(compiled.steps(), 51);

    let probs = compiled.predict(&mut graph, &b.ids, None).unwrap();
    assert_eq!(probs.len(), 4);
    assert!(probs.iter().all(|p| *p > 0.0 && *p < 1.0));

    // structure analysis reads the trained gates from the graph
    let report = compiled.model().analyse_structure(&graph, false, 1).unwrap();
    assert_eq!(report.second.weights.len(), 6);
    assert_eq!(report.second.mask.as_ref().unwrap().len(), 6);
}

#[test]
fn test_gate_optimizer_updates_only_gates() {
    let mut graph = Engine::<f64>::new();
    let model = AutoFm::<f64>::new(fm_config()).unwrap();
    let mut compiled = model
        .compile(
            &mut graph,
            SigmoidCrossEntropy::default(),
            Optim::SGD(SGD::with_defaults(0.0)),
            Some(Optim::SGD(SGD::with_defaults(0.5))),
            1.0,
        )
        .unwrap();

    let w_before = graph.tensor_by_name("embedding/w").unwrap().clone();
    let gates_before = graph.tensor_by_name("edge_weight/normed_wts").unwrap().clone();
    compiled.train_step(&mut graph, &batch()).unwrap();

    assert_eq!(graph.tensor_by_name("embedding/w").unwrap(), &w_before);
    assert_ne!(
        graph.tensor_by_name("edge_weight/normed_wts").unwrap(),
        &gates_before
    );
}

#[test]
fn test_compile_rejects_bad_pos_weight() {
    let mut graph = Engine::<f64>::new();
    let model = AutoFm::<f64>::new(fm_config()).unwrap();
    let result = model.compile(
        &mut graph,
        SigmoidCrossEntropy::default(),
        Adam::with_defaults(0.01),
        None,
        0.0,
    );
    assert!(matches!(result, Err(SearchError::Config(_))));
}

#[test]
fn test_autodeepfm_trains_and_prunes_with_min_max() {
    let mut graph = Engine::<f64>::new();
    let model = AutoDeepFm::<f64>::new(AutoDeepFmConfig {
        layer_sizes: vec![8, 1],
        layer_acts: vec!["relu".to_string(), "none".to_string()],
        layer_keeps: vec![0.8, 1.0],
        ..AutoDeepFmConfig::new(4, 12, 3)
    })
    .unwrap();
    assert_eq!(model.pruner().rescale(), crate::search::Rescale::MinMax);

    let mut compiled = model
        .compile(
            &mut graph,
            SigmoidCrossEntropy::default(),
            Adam::with_defaults(0.01),
            None,
            2.0,
        )
        .unwrap();
    for _ in 0..5 {
        let step = compiled.train_step(&mut graph, &batch()).unwrap();
        assert!(step.loss.is_finite());
        assert_eq!(step.l2, 0.0);
    }

    let report = compiled.model().analyse_structure(&graph, true, 5).unwrap();
    assert_eq!(report.second.mask.as_ref().unwrap().len(), 6);
    // the largest magnitude always survives min-max rescaling
    assert!(report.second.masked_edges.unwrap() < 6);
}
