use crate::backend::Tensor;
use crate::graph::Engine;
use crate::nn::Module;
use crate::ops::Sum;
use crate::search::*;
use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;

// ============================================================================
// COMBINATIONS
// ============================================================================

#[test]
fn test_generate_pairs_lexicographic() {
    let pairs = generate_pairs(4, None, 2).unwrap();
    assert_eq!(pairs.len(), 6);
    assert_eq!(pairs.column(0), &[0, 0, 0, 1, 1, 2]);
    assert_eq!(pairs.column(1), &[1, 2, 3, 2, 3, 3]);

    let triples = generate_pairs(5, None, 3).unwrap();
    assert_eq!(triples.len(), num_combinations(5, 3));
    assert_eq!(triples.tuple(0), vec![0, 1, 2]);
    assert_eq!(triples.tuple(9), vec![2, 3, 4]);
}

#[test]
fn test_generate_pairs_with_mask() {
    let pairs = generate_pairs(4, Some(&[1, 0, 1, 0, 0, 1]), 2).unwrap();
    assert_eq!(pairs.tuples(), vec![vec![0, 1], vec![0, 3], vec![2, 3]]);

    let none_kept = generate_pairs(3, Some(&[0, 0, 0]), 2).unwrap();
    assert!(none_kept.is_empty());
    assert_eq!(none_kept.columns().len(), 2);
}

#[test]
fn test_generate_pairs_edge_cases() {
    assert!(matches!(
        generate_pairs(4, None, 0),
        Err(SearchError::InvalidOrder { order: 0, .. })
    ));
    assert!(matches!(
        generate_pairs(4, Some(&[1, 1]), 2),
        Err(SearchError::MaskLength {
            expected: 6,
            actual: 2
        })
    ));
    assert!(generate_pairs(2, None, 3).unwrap().is_empty());
    assert_eq!(generate_pairs(3, None, 3).unwrap().len(), 1);
}

#[test]
fn test_bisect_left_finds_sub_combinations() {
    let pairs = generate_pairs(4, None, 2).unwrap();
    assert_eq!(pairs.bisect_left(&[0, 1]), 0);
    assert_eq!(pairs.bisect_left(&[1, 3]), 4);
    assert_eq!(pairs.bisect_left(&[2, 3]), 5);
    assert_eq!(pairs.lower_order_position(&[1, 2]), Some(3));

    let masked = generate_pairs(4, Some(&[1, 0, 1, 0, 0, 1]), 2).unwrap();
    assert_eq!(masked.lower_order_position(&[0, 2]), None);
    assert_eq!(masked.lower_order_position(&[0, 3]), Some(1));
}

// ============================================================================
// INTERACTION SCORES AND GATES
// ============================================================================

fn three_slot_embeddings(graph: &mut Engine<f64>) -> crate::graph::NodeId {
    graph.create_variable(
        Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 3, 2]).unwrap(),
        true,
    )
}

#[test]
fn test_pair_and_triple_scores() {
    let mut graph = Engine::<f64>::new();
    let embeddings = three_slot_embeddings(&mut graph);

    let pairs = generate_pairs(3, None, 2).unwrap();
    let scores = interaction_scores(&mut graph, embeddings, &pairs).unwrap();
    assert_eq!(graph.get_tensor(scores).unwrap().shape(), &[1, 3]);
    assert_eq!(
        graph.get_tensor(scores).unwrap().to_vec(),
        vec![11.0, 17.0, 39.0]
    );

    let triples = generate_pairs(3, None, 3).unwrap();
    let triple_scores = interaction_scores(&mut graph, embeddings, &triples).unwrap();
    assert_eq!(graph.get_tensor(triple_scores).unwrap().to_vec(), vec![63.0]);
}

#[test]
fn test_scores_gradient_accumulates_per_slot() {
    let mut graph = Engine::<f64>::new();
    let embeddings = three_slot_embeddings(&mut graph);
    let pairs = generate_pairs(3, None, 2).unwrap();
    let scores = interaction_scores(&mut graph, embeddings, &pairs).unwrap();
    let loss = graph.apply_operation(Box::new(Sum::new()), vec![scores]).unwrap();
    graph.backward(loss).unwrap();

    // d/de_0 = e_1 + e_2, d/de_1 = e_0 + e_2, d/de_2 = e_0 + e_1
    let grad = graph.get_gradient(embeddings).unwrap().to_vec();
    assert_eq!(grad, vec![8.0, 10.0, 6.0, 8.0, 4.0, 6.0]);
}

#[test]
fn test_scores_reject_mismatched_slots() {
    let mut graph = Engine::<f64>::new();
    let embeddings = three_slot_embeddings(&mut graph);
    let pairs = generate_pairs(4, None, 2).unwrap();
    assert!(interaction_scores(&mut graph, embeddings, &pairs).is_err());
}

#[test]
fn test_gate_initialization_and_aliases() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut graph = Engine::<f64>::new();
    let mut gate = EdgeWeightGate::new(generate_pairs(4, None, 2).unwrap(), 0.6, &mut rng).unwrap();
    gate.create_parameters_in_graph(&mut graph).unwrap();

    let weights = graph.tensor_by_name("edge_weight/normed_wts").unwrap().to_vec();
    assert_eq!(weights.len(), 6);
    for w in weights {
        assert!((0.599..=0.601).contains(&w));
    }
    assert_eq!(
        graph.node_by_name("edge_weight/weights"),
        graph.node_by_name("edge_weight/normed_wts")
    );
    assert!(graph.node_by_name("prune_BN/gamma").is_some());

    let third = EdgeWeightGate::<f64>::new(generate_pairs(4, None, 3).unwrap(), 0.6, &mut rng).unwrap();
    assert_eq!(third.names(), THIRD_ORDER_NAMES);
    assert!(gate_names(4).is_err());
}

#[test]
fn test_gate_forward_and_gradient() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut graph = Engine::<f64>::new();
    let mut gate = EdgeWeightGate::new(generate_pairs(3, None, 2).unwrap(), 0.6, &mut rng).unwrap();
    gate.create_parameters_in_graph(&mut graph).unwrap();

    let embeddings = graph.create_variable(
        Tensor::from_vec(
            (0..24).map(|i| (i as f64 * 0.37).sin()).collect(),
            &[4, 3, 2],
        )
        .unwrap(),
        true,
    );
    let out = gate.forward(&mut graph, embeddings).unwrap();
    assert_eq!(graph.get_tensor(out).unwrap().shape(), &[4]);

    let loss = graph.apply_operation(Box::new(Sum::new()), vec![out]).unwrap();
    graph.backward(loss).unwrap();
    let weights = gate.weights_node().unwrap();
    assert_eq!(graph.get_gradient(weights).unwrap().shape(), &[3]);
    assert!(graph.get_gradient(embeddings).is_some());

    // the alias survives per-step cleanup
    graph.clear_transient();
    assert!(graph.tensor_by_name("edge_weight/normed_wts").is_some());
    assert!(graph.get_tensor(out).is_none());
}

#[test]
fn test_gate_with_every_interaction_pruned() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut graph = Engine::<f64>::new();
    let combos = generate_pairs(3, Some(&[0, 0, 0]), 2).unwrap();
    let mut gate = EdgeWeightGate::new(combos, 0.6, &mut rng).unwrap();
    gate.create_parameters_in_graph(&mut graph).unwrap();

    let embeddings = graph.create_variable(Tensor::ones(&[2, 3, 4]), false);
    let out = gate.forward(&mut graph, embeddings).unwrap();
    assert_eq!(graph.get_tensor(out).unwrap().to_vec(), vec![0.0, 0.0]);
}

// ============================================================================
// PRUNING
// ============================================================================

#[test_log::test]
fn test_pick_feature_threshold_max_abs() {
    let pruner = Pruner::new(3, 0.3, Rescale::MaxAbs);
    let mask = pruner.pick_feature(&[0.1, 0.9, -0.95], 2, None).unwrap();
    assert_eq!(mask, vec![0, 1, 1]);
    assert_eq!(
        pruner.pick_feature(&[0.1, 0.9, -0.95], 2, None).unwrap(),
        mask
    );
}

#[test]
fn test_rescale_modes() {
    let scaled = Rescale::MaxAbs.apply(&[0.5, -2.0, 1.0]).unwrap();
    assert_eq!(scaled, vec![0.25, -1.0, 0.5]);

    let scaled = Rescale::MinMax.apply(&[0.2, -0.6, 1.0]).unwrap();
    assert_abs_diff_eq!(scaled[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(scaled[1], -0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(scaled[2], 1.0, epsilon = 1e-12);

    assert!(Rescale::MinMax.apply(&[]).unwrap().is_empty());
}

#[test]
fn test_pick_feature_min_max() {
    let pruner = Pruner::new(3, 0.3, Rescale::MinMax);
    let mask = pruner.pick_feature(&[0.2, -0.6, 1.0], 2, None).unwrap();
    assert_eq!(mask, vec![0, 1, 1]);
}

#[test]
fn test_degenerate_weights_are_errors() {
    let max_abs = Pruner::new(3, 0.3, Rescale::MaxAbs);
    assert!(matches!(
        max_abs.pick_feature(&[0.0, 0.0, 0.0], 2, None),
        Err(SearchError::DegenerateWeights(_))
    ));
    let min_max = Pruner::new(3, 0.3, Rescale::MinMax);
    assert!(matches!(
        min_max.pick_feature(&[0.5, -0.5, 0.5], 2, None),
        Err(SearchError::DegenerateWeights(_))
    ));
}

#[test_log::test]
fn test_third_order_dominance() {
    let pruner = Pruner::new(4, 0.3, Rescale::MaxAbs);
    // pair (2, 3) dominates every triple containing both 2 and 3
    let lower = [0.1, 0.1, 0.1, 0.1, 0.1, 1.0];
    let mask = pruner
        .pick_feature(&[1.0, 0.9, 0.8, 0.7], 3, Some(&lower))
        .unwrap();
    assert_eq!(mask, vec![1, 1, 0, 0]);

    let mask = pruner
        .pick_feature(&[1.0, 0.2, 0.8, 0.7], 3, Some(&lower))
        .unwrap();
    assert_eq!(mask, vec![1, 0, 0, 0]);
}

#[test]
fn test_pick_feature_validation() {
    let pruner = Pruner::new(4, 0.3, Rescale::MaxAbs);
    let pairs = [1.0; 6];
    assert!(matches!(
        pruner.pick_feature(&[1.0; 4], 1, None),
        Err(SearchError::InvalidOrder { order: 1, .. })
    ));
    assert!(matches!(
        pruner.pick_feature(&pairs, 2, Some(&pairs)),
        Err(SearchError::UnexpectedLowerWeights { order: 2 })
    ));
    assert!(matches!(
        pruner.pick_feature(&[1.0; 4], 3, None),
        Err(SearchError::MissingLowerWeights)
    ));
    assert!(matches!(
        pruner.pick_feature(&[1.0; 5], 2, None),
        Err(SearchError::WeightCount {
            expected: 6,
            actual: 5
        })
    ));
    assert!(matches!(
        pruner.pick_feature(&[1.0; 4], 3, Some(&[1.0; 3])),
        Err(SearchError::WeightCount {
            expected: 6,
            actual: 3
        })
    ));
}

// ============================================================================
// STRUCTURE ANALYSIS AND MASKS
// ============================================================================

#[test_log::test]
fn test_analyse_structure_reads_named_weights() {
    let mut graph = Engine::<f64>::new();
    let second = graph
        .create_parameter(
            Tensor::from_vec(vec![0.1, 0.9, -0.95], &[3]).unwrap(),
            SECOND_ORDER_NAMES.weights,
        )
        .unwrap();
    graph.name_node(second, SECOND_ORDER_NAMES.normed).unwrap();

    let pruner = Pruner::new(3, 0.3, Rescale::MaxAbs);
    let report = analyse_structure(&graph, &pruner, false, false, false, 1).unwrap();
    assert_eq!(report.second.weights, vec![0.1, 0.9, -0.95]);
    assert_eq!(report.second.mask, Some(vec![0, 1, 1]));
    assert_eq!(report.second.masked_edges, Some(1));
    assert!(report.third.is_none());

    let masks = report.masks(3).unwrap();
    assert_eq!(masks.len(), 1);
    assert_eq!(masks[0].kept(), 2);

    // third order requested but never built
    assert!(matches!(
        analyse_structure(&graph, &pruner, true, false, false, 1),
        Err(SearchError::MissingTensor(_))
    ));
}

#[test]
fn test_analyse_structure_skips_pruning_when_retraining() {
    let mut graph = Engine::<f32>::new();
    let second = graph
        .create_parameter(Tensor::zeros(&[3]), SECOND_ORDER_NAMES.weights)
        .unwrap();
    graph.name_node(second, SECOND_ORDER_NAMES.normed).unwrap();

    // all-zero weights would be degenerate if pruning ran
    let pruner = Pruner::new(3, 0.3, Rescale::MaxAbs);
    let report = analyse_structure(&graph, &pruner, false, true, true, 2).unwrap();
    assert_eq!(report.second.mask, None);
    assert!(report.masks(3).unwrap().is_empty());
}

#[test]
fn test_analyse_structure_third_order() {
    let mut graph = Engine::<f64>::new();
    for (names, values) in [
        (SECOND_ORDER_NAMES, vec![0.1, 0.1, 0.1, 0.1, 0.1, 1.0]),
        (THIRD_ORDER_NAMES, vec![1.0, 0.9, 0.8, 0.7]),
    ] {
        let len = values.len();
        let id = graph
            .create_parameter(Tensor::from_vec(values, &[len]).unwrap(), names.weights)
            .unwrap();
        graph.name_node(id, names.normed).unwrap();
    }

    let pruner = Pruner::new(4, 0.3, Rescale::MaxAbs);
    let report = analyse_structure(&graph, &pruner, true, false, false, 1).unwrap();
    let third = report.third.as_ref().unwrap();
    assert_eq!(third.mask, Some(vec![1, 1, 0, 0]));
    assert_eq!(third.masked_edges, Some(2));
    assert_eq!(report.second.masked_edges, Some(5));
    assert_eq!(report.masks(4).unwrap().len(), 2);
}

#[test]
fn test_mask_validation_and_file_round_trip() {
    assert!(matches!(
        InteractionMask::new(2, 4, vec![1, 0, 1]),
        Err(SearchError::MaskLength {
            expected: 6,
            actual: 3
        })
    ));
    assert!(InteractionMask::new(2, 3, vec![1, 2, 0]).is_err());

    let mask = InteractionMask::new(2, 4, vec![1, 0, 1, 0, 0, 1]).unwrap();
    assert_eq!(mask.kept(), 3);
    assert_eq!(mask.masked(), 3);

    let path = std::env::temp_dir().join(format!("autofm_mask_{}.json", std::process::id()));
    mask.save(&path).unwrap();
    let loaded = InteractionMask::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, mask);

    let pairs = generate_pairs(loaded.num_slots, Some(loaded.as_slice()), loaded.order).unwrap();
    assert_eq!(pairs.len(), 3);
}
