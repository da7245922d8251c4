use autofm::dataset::{Dataset, SyntheticConfig, synthetic_ctr};
use autofm::models::{AutoDeepFm, AutoDeepFmConfig, AutoFm, AutoFmConfig, Model, TrainingConfig};
use autofm::nn::{Optim, SigmoidCrossEntropy};
use autofm::search::{InteractionMask, generate_pairs, num_combinations};
use autofm::training::{evaluate, fit};
use autofm::Engine;

fn data_config() -> SyntheticConfig {
    SyntheticConfig {
        num_samples: 600,
        num_fields: 5,
        vocab_per_field: 4,
        planted_pairs: vec![(0, 1), (2, 4)],
        strength: 2.0,
        seed: 9,
    }
}

fn training_config() -> TrainingConfig {
    TrainingConfig {
        batch_size: 64,
        num_epochs: 4,
        learning_rate: Some(0.01),
        print_every: 1,
        ..TrainingConfig::default_stable()
    }
}

#[test_log::test]
fn test_autofm_search_prune_retrain() {
    let data = synthetic_ctr::<f64>(&data_config()).unwrap();
    let (train, valid) = data.split(0.25).unwrap();
    let training = training_config();

    // search stage, third order on
    let config = AutoFmConfig {
        third_prune: true,
        l2_v: Some(1e-4),
        seed: 1,
        ..AutoFmConfig::new(5, 20, 4)
    };
    let mut graph = Engine::<f64>::new();
    let (optimizer1, optimizer2) = training.build_optimizers::<f64>().unwrap();
    let mut compiled = AutoFm::new(config.clone())
        .unwrap()
        .compile(
            &mut graph,
            SigmoidCrossEntropy::default(),
            optimizer1,
            optimizer2,
            1.0,
        )
        .unwrap();
    let history = fit(&mut compiled, &mut graph, &train, &training).unwrap();
    assert_eq!(history.epoch_losses.len(), 4);
    assert!(history.epoch_losses.iter().all(|l| l.is_finite()));
    assert!(history.epoch_l2.iter().all(|l| *l > 0.0));

    let report = compiled.model().analyse_structure(&graph, false, 4).unwrap();
    let masks = report.masks(5).unwrap();
    assert_eq!(masks.len(), 2);
    assert_eq!(masks[0].len(), num_combinations(5, 2));
    assert_eq!(masks[1].len(), num_combinations(5, 3));

    // masks survive a round trip through disk
    let dir = std::env::temp_dir().join(format!("autofm_pipeline_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let mut loaded = Vec::new();
    for mask in &masks {
        let path = dir.join(format!("mask_order_{}.json", mask.order));
        mask.save(&path).unwrap();
        loaded.push(InteractionMask::load(&path).unwrap());
    }
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(loaded, masks);

    // retrain stage on the pruned structure
    let retrain_config = config.for_retrain(&loaded).unwrap();
    assert_eq!(retrain_config.l2_v(), None);
    let retrained = AutoFm::<f64>::new(retrain_config).unwrap();
    let expected = generate_pairs(5, Some(loaded[0].as_slice()), 2).unwrap();
    assert_eq!(retrained.second_order_gate().combinations(), &expected);
    assert_eq!(
        retrained.third_order_gate().unwrap().len(),
        loaded[1].kept()
    );

    let mut graph = Engine::<f64>::new();
    let mut compiled = retrained
        .compile(
            &mut graph,
            SigmoidCrossEntropy::default(),
            Optim::Adam(autofm::nn::Adam::with_defaults(0.01)),
            None,
            1.0,
        )
        .unwrap();
    let history = fit(&mut compiled, &mut graph, &train, &training).unwrap();
    assert!(history.epoch_l2.iter().all(|l| *l == 0.0));

    let eval = evaluate(&mut compiled, &mut graph, &valid, 64).unwrap();
    assert!(eval.log_loss.is_finite());
    assert!((0.0..=1.0).contains(&eval.auc));

    // retrain stage reports weights without pruning again
    let report = compiled.model().analyse_structure(&graph, false, 4).unwrap();
    assert!(report.masks(5).unwrap().is_empty());
    assert_eq!(report.second.weights.len(), loaded[0].kept());
}

#[test]
fn test_autodeepfm_search_with_gate_optimizer() {
    let data = synthetic_ctr::<f32>(&data_config()).unwrap();
    let training = TrainingConfig {
        gate_learning_rate: Some(0.05),
        num_epochs: 2,
        ..training_config()
    };

    let config = AutoDeepFmConfig {
        layer_sizes: vec![16, 1],
        layer_acts: vec!["relu".to_string(), "none".to_string()],
        layer_keeps: vec![0.9, 1.0],
        layer_l2: Some(1e-4),
        batch_norm: true,
        ..AutoDeepFmConfig::new(5, data.input_dim(), 4)
    };
    let mut graph = Engine::<f32>::new();
    let (optimizer1, optimizer2) = training.build_optimizers::<f32>().unwrap();
    assert!(optimizer2.is_some());
    let mut compiled = AutoDeepFm::new(config.clone())
        .unwrap()
        .compile(
            &mut graph,
            SigmoidCrossEntropy::default(),
            optimizer1,
            optimizer2,
            2.0,
        )
        .unwrap();
    let history = fit(&mut compiled, &mut graph, &data, &training).unwrap();
    assert_eq!(history.epoch_losses.len(), 2);

    let probs = compiled
        .predict(&mut graph, &data.get_item(0).unwrap().0, None)
        .unwrap();
    assert_eq!(probs.len(), 1);

    let report = compiled.model().analyse_structure(&graph, true, 2).unwrap();
    let masks = report.masks(5).unwrap();
    assert_eq!(masks.len(), 1);

    let retrain = AutoDeepFm::<f32>::new(config.for_retrain(&masks).unwrap()).unwrap();
    assert_eq!(retrain.second_order_gate().len(), masks[0].kept());
    assert_eq!(retrain.config().layer_l2(), None);
}
