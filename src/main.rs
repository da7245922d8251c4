// Search -> prune -> retrain on synthetic click data.
//
// Usage: autofm [run_config.json]

use anyhow::{Context, bail};
use autofm::dataset::{Dataset, FieldDataset, SyntheticConfig, synthetic_ctr};
use autofm::models::{AutoDeepFm, AutoDeepFmConfig, AutoFm, AutoFmConfig, Model, TrainingConfig};
use autofm::nn::SigmoidCrossEntropy;
use autofm::search::{InteractionMask, StructureReport};
use autofm::training::{Evaluation, evaluate, fit};
use autofm::Engine;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ModelKind {
    #[default]
    AutoFm,
    AutoDeepFm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RunConfig {
    model: ModelKind,
    autofm: AutoFmConfig,
    autodeepfm: AutoDeepFmConfig,
    search: TrainingConfig,
    retrain: TrainingConfig,
    data: SyntheticConfig,
    validation_fraction: f64,
    output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        let training = TrainingConfig {
            num_epochs: 10,
            batch_size: 128,
            print_every: 1,
            ..TrainingConfig::fast()
        };
        Self {
            model: ModelKind::default(),
            autofm: AutoFmConfig {
                embed_size: 4,
                ..AutoFmConfig::default()
            },
            autodeepfm: AutoDeepFmConfig {
                base: AutoFmConfig {
                    embed_size: 4,
                    ..AutoFmConfig::default()
                },
                ..AutoDeepFmConfig::default()
            },
            search: training.clone(),
            retrain: training,
            data: SyntheticConfig::default(),
            validation_fraction: 0.2,
            output_dir: PathBuf::from("masks"),
        }
    }
}

/// Fills the data-dependent sizes left at zero in the model config.
fn fill_sizes(config: &mut AutoFmConfig, data: &FieldDataset<f64>, vocab: usize) {
    if config.num_inputs == 0 {
        config.num_inputs = data.num_fields();
    }
    if config.input_dim == 0 {
        config.input_dim = data.input_dim().max(data.num_fields() * vocab);
    }
}

fn train_and_analyse<M: Model<f64>>(
    model: M,
    train: &FieldDataset<f64>,
    valid: &FieldDataset<f64>,
    config: &TrainingConfig,
) -> anyhow::Result<(StructureReport, Evaluation)> {
    let mut graph = Engine::new();
    let (optimizer1, optimizer2) = config.build_optimizers()?;
    let mut compiled = model.compile(
        &mut graph,
        SigmoidCrossEntropy::default(),
        optimizer1,
        optimizer2,
        config.pos_weight,
    )?;

    let history = fit(&mut compiled, &mut graph, train, config)?;
    info!(
        "{} trained for {} epochs, final loss {:.6}",
        compiled.model().name(),
        config.num_epochs,
        history.last_loss().unwrap_or(f64::NAN)
    );
    let evaluation = evaluate(&mut compiled, &mut graph, valid, config.batch_size)?;
    let report = compiled
        .model()
        .analyse_structure(&graph, config.print_full_weight, config.num_epochs)?;
    Ok((report, evaluation))
}

fn save_masks(masks: &[InteractionMask], dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    for mask in masks {
        let path = dir.join(format!("mask_order_{}.json", mask.order));
        mask.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(
            "order {} mask: kept {} of {} -> {}",
            mask.order,
            mask.kept(),
            mask.len(),
            path.display()
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read run config {}", path))?;
            serde_json::from_str::<RunConfig>(&json)
                .with_context(|| format!("Failed to parse run config {}", path))?
        }
        None => RunConfig::default(),
    };
    if !(0.0..1.0).contains(&config.validation_fraction) {
        bail!(
            "validation_fraction must be in [0, 1), got {}",
            config.validation_fraction
        );
    }

    let data = synthetic_ctr::<f64>(&config.data).map_err(anyhow::Error::msg)?;
    let (train, valid) = data
        .split(config.validation_fraction)
        .map_err(anyhow::Error::msg)?;
    info!(
        "{} training / {} validation samples, positive rate {:.3}, planted pairs {:?}",
        train.len(),
        valid.len(),
        data.positive_rate(),
        config.data.planted_pairs
    );
    let vocab = config.data.vocab_per_field;
    let num_slots = data.num_fields();

    let (search_eval, retrain_eval) = match config.model {
        ModelKind::AutoFm => {
            fill_sizes(&mut config.autofm, &data, vocab);
            let model = AutoFm::new(config.autofm.clone())?;
            let (report, search_eval) = train_and_analyse(model, &train, &valid, &config.search)?;
            let masks = report.masks(num_slots)?;
            save_masks(&masks, &config.output_dir)?;

            let retrained = AutoFm::new(config.autofm.for_retrain(&masks)?)?;
            let (_, retrain_eval) = train_and_analyse(retrained, &train, &valid, &config.retrain)?;
            (search_eval, retrain_eval)
        }
        ModelKind::AutoDeepFm => {
            fill_sizes(&mut config.autodeepfm.base, &data, vocab);
            let model = AutoDeepFm::new(config.autodeepfm.clone())?;
            let (report, search_eval) = train_and_analyse(model, &train, &valid, &config.search)?;
            let masks = report.masks(num_slots)?;
            save_masks(&masks, &config.output_dir)?;

            let retrained = AutoDeepFm::new(config.autodeepfm.for_retrain(&masks)?)?;
            let (_, retrain_eval) = train_and_analyse(retrained, &train, &valid, &config.retrain)?;
            (search_eval, retrain_eval)
        }
    };

    info!(
        "search stage: log loss {:.6}, auc {:.4}",
        search_eval.log_loss, search_eval.auc
    );
    info!(
        "retrain stage: log loss {:.6}, auc {:.4}",
        retrain_eval.log_loss, retrain_eval.auc
    );
    Ok(())
}
