// Converts trained edge weights into a keep/drop mask per interaction.

use crate::search::combinations::{Combinations, generate_pairs, num_combinations};
use crate::search::error::{Result, SearchError};

/// A higher order interaction is dropped when any of its sub-combinations has
/// a rescaled magnitude above this fraction of its own.
pub const DOMINANCE_RATIO: f64 = 0.8;

/// How raw weights are brought onto a common scale before thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Rescale {
    /// `w / max|w|`
    MaxAbs,
    /// `sign(w) * (|w| - min|w|) / (max|w| - min|w|)`
    MinMax,
}

impl Rescale {
    /// Rescales sign-preservingly. Fails when the scale is undefined: all
    /// weights zero for `MaxAbs`, all magnitudes equal for `MinMax`.
    pub fn apply(&self, weights: &[f64]) -> Result<Vec<f64>> {
        if weights.is_empty() {
            return Ok(Vec::new());
        }
        let max_abs = weights.iter().fold(0.0f64, |m, w| m.max(w.abs()));
        match self {
            Rescale::MaxAbs => {
                if max_abs == 0.0 {
                    return Err(SearchError::DegenerateWeights(
                        "all weights are zero, max-abs rescaling is undefined".to_string(),
                    ));
                }
                Ok(weights.iter().map(|w| w / max_abs).collect())
            }
            Rescale::MinMax => {
                let min_abs = weights.iter().fold(f64::INFINITY, |m, w| m.min(w.abs()));
                let range = max_abs - min_abs;
                if range == 0.0 {
                    return Err(SearchError::DegenerateWeights(format!(
                        "all weight magnitudes equal {}, min-max rescaling is undefined",
                        max_abs
                    )));
                }
                Ok(weights
                    .iter()
                    .map(|w| w.signum() * (w.abs() - min_abs) / range)
                    .map(|w| if w == 0.0 { 0.0 } else { w })
                    .collect())
            }
        }
    }
}

/// Threshold pruner for one model's interaction weights.
#[derive(Debug, Clone)]
pub struct Pruner {
    num_slots: usize,
    threshold: f64,
    rescale: Rescale,
}

impl Pruner {
    pub fn new(num_slots: usize, threshold: f64, rescale: Rescale) -> Self {
        Self {
            num_slots,
            threshold,
            rescale,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn rescale(&self) -> Rescale {
        self.rescale
    }

    /// Returns a 0/1 mask aligned with the full combination list of `order`.
    ///
    /// A weight whose rescaled magnitude is below the threshold is dropped.
    /// For order >= 3, `lower_weights` (the full order-1 weights) are rescaled
    /// independently and a surviving weight is also dropped when, for some
    /// sub-combination obtained by removing one index, `0.8 * |w| < |w_lower|`.
    ///
    /// ```rust
    /// use autofm::search::{Pruner, Rescale};
    ///
    /// let pruner = Pruner::new(3, 0.3, Rescale::MaxAbs);
    /// let mask = pruner.pick_feature(&[0.1, 0.9, -0.95], 2, None).unwrap();
    /// assert_eq!(mask, vec![0, 1, 1]);
    /// ```
    pub fn pick_feature(
        &self,
        weights: &[f64],
        order: usize,
        lower_weights: Option<&[f64]>,
    ) -> Result<Vec<u8>> {
        if order < 2 {
            return Err(SearchError::InvalidOrder {
                order,
                num_slots: self.num_slots,
            });
        }
        if lower_weights.is_some() && order < 3 {
            return Err(SearchError::UnexpectedLowerWeights { order });
        }
        if lower_weights.is_none() && order >= 3 {
            return Err(SearchError::MissingLowerWeights);
        }

        let expected = num_combinations(self.num_slots, order);
        if weights.len() != expected {
            return Err(SearchError::WeightCount {
                expected,
                actual: weights.len(),
            });
        }
        let scaled = self.rescale.apply(weights)?;

        let lower = match lower_weights {
            Some(lower) => {
                let expected = num_combinations(self.num_slots, order - 1);
                if lower.len() != expected {
                    return Err(SearchError::WeightCount {
                        expected,
                        actual: lower.len(),
                    });
                }
                Some((
                    self.rescale.apply(lower)?,
                    generate_pairs(self.num_slots, None, order - 1)?,
                ))
            }
            None => None,
        };

        let combinations = generate_pairs(self.num_slots, None, order)?;
        let mut mask = vec![1u8; scaled.len()];
        let mut dominated = 0usize;
        for (i, &weight) in scaled.iter().enumerate() {
            if weight.abs() < self.threshold {
                mask[i] = 0;
                continue;
            }
            if let Some((lower_scaled, lower_combs)) = &lower {
                if is_dominated(weight, &combinations, i, lower_scaled, lower_combs)? {
                    mask[i] = 0;
                    dominated += 1;
                }
            }
        }

        log::info!(
            "order {} pruning: {} of {} kept, {} dropped as dominated by a sub-combination",
            order,
            mask.iter().filter(|&&m| m == 1).count(),
            mask.len(),
            dominated
        );
        Ok(mask)
    }
}

fn is_dominated(
    weight: f64,
    combinations: &Combinations,
    position: usize,
    lower_scaled: &[f64],
    lower_combs: &Combinations,
) -> Result<bool> {
    let tuple = combinations.tuple(position);
    for removed in 0..tuple.len() {
        let sub: Vec<usize> = tuple
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != removed)
            .map(|(_, &v)| v)
            .collect();
        let id = lower_combs.bisect_left(&sub);
        let lower = lower_scaled.get(id).ok_or(SearchError::WeightCount {
            expected: lower_combs.len(),
            actual: lower_scaled.len(),
        })?;
        if DOMINANCE_RATIO * weight.abs() < lower.abs() {
            return Ok(true);
        }
    }
    Ok(false)
}
