// Epoch loop and evaluation metrics for compiled models.

use crate::backend::FmFloat;
use crate::dataset::{Dataset, FieldDataset};
use crate::graph::Engine;
use crate::models::{CompiledModel, Model, TrainingConfig};
use crate::nn::{Loss, Optimizer};
use crate::search::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
const LOG_LOSS_EPS: f64 = 1e-7;

/// Mean training loss per epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub epoch_losses: Vec<f64>,
    pub epoch_l2: Vec<f64>,
}

impl TrainingHistory {
    pub fn last_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub log_loss: f64,
    pub auc: f64,
}

/// Runs `config.num_epochs` epochs of mini-batch training.
pub fn fit<T, M, L, O>(
    compiled: &mut CompiledModel<T, M, L, O>,
    graph: &mut Engine<T>,
    dataset: &FieldDataset<T>,
    config: &TrainingConfig,
) -> Result<TrainingHistory>
where
    T: FmFloat,
    M: Model<T>,
    L: Loss<T>,
    O: Optimizer<T>,
{
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut history = TrainingHistory::default();

    for epoch in 0..config.num_epochs {
        let batches = if config.shuffle {
            dataset.shuffled_batches(config.batch_size, config.drop_last, &mut rng)?
        } else {
            dataset.batches(config.batch_size, config.drop_last)?
        };

        let (mut loss_sum, mut l2_sum, mut seen) = (0.0, 0.0, 0usize);
        for batch in &batches {
            let step = compiled.train_step(graph, batch)?;
            loss_sum += step.loss * batch.len() as f64;
            l2_sum += step.l2;
            seen += batch.len();
        }
        let epoch_loss = if seen > 0 { loss_sum / seen as f64 } else { 0.0 };
        let epoch_l2 = if batches.is_empty() {
            0.0
        } else {
            l2_sum / batches.len() as f64
        };
        history.epoch_losses.push(epoch_loss);
        history.epoch_l2.push(epoch_l2);

        if config.print_every > 0 && epoch % config.print_every == 0 {
            log::info!(
                "[EPOCH {}] {} loss: {:.6} l2: {:.6}",
                epoch,
                compiled.model().name(),
                epoch_loss,
                epoch_l2
            );
        }
    }

    Ok(history)
}

/// Mean log loss and ROC AUC of the model's predictions on `dataset`.
pub fn evaluate<T, M, L, O>(
    compiled: &mut CompiledModel<T, M, L, O>,
    graph: &mut Engine<T>,
    dataset: &FieldDataset<T>,
    batch_size: usize,
) -> Result<Evaluation>
where
    T: FmFloat,
    M: Model<T>,
    L: Loss<T>,
    O: Optimizer<T>,
{
    let mut scores = Vec::with_capacity(dataset.len());
    let mut labels = Vec::with_capacity(dataset.len());
    for batch in &dataset.batches(batch_size, false)? {
        scores.extend(compiled.predict(graph, &batch.ids, batch.values.as_ref())?);
        labels.extend(batch.labels.to_vec().into_iter().map(FmFloat::to_real));
    }
    let evaluation = Evaluation {
        log_loss: log_loss(&scores, &labels),
        auc: auc(&scores, &labels),
    };
    log::info!(
        "{} eval: log loss {:.6}, auc {:.4}",
        compiled.model().name(),
        evaluation.log_loss,
        evaluation.auc
    );
    Ok(evaluation)
}

pub fn log_loss(probs: &[f64], labels: &[f64]) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    let total: f64 = probs
        .iter()
        .zip(labels)
        .map(|(&p, &y)| {
            let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / probs.len() as f64
}

/// Area under the ROC curve from the rank statistic, ties sharing their
/// average rank. 0.5 when only one class is present.
pub fn auc(scores: &[f64], labels: &[f64]) -> f64 {
    let positives = labels.iter().filter(|&&y| y > 0.5).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if labels[k] > 0.5 {
                positive_rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}
