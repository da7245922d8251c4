// src/dataset/mod.rs
// Multi-field categorical datasets and mini-batching.
use crate::backend::{FmFloat, Tensor};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub trait Dataset<T>
where
    T: FmFloat,
{
    /// Feature ids, optional feature values and label of one sample
    fn get_item(&self, index: usize) -> Result<(Vec<usize>, Option<Vec<T>>, T), String>;

    /// Total number of samples in the dataset
    fn len(&self) -> usize;

    /// Check if dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One mini-batch.
#[derive(Debug, Clone)]
pub struct Batch<T>
where
    T: FmFloat,
{
    /// Row-major feature ids, [batch, num_fields]
    pub ids: Vec<usize>,
    /// Real feature values, [batch, num_fields]
    pub values: Option<Tensor<T>>,
    /// Labels in {0, 1}, [batch]
    pub labels: Tensor<T>,
}

impl<T> Batch<T>
where
    T: FmFloat,
{
    pub fn len(&self) -> usize {
        self.labels.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Samples with one categorical feature id per field, sharing a single id
/// space across fields.
#[derive(Debug, Clone)]
pub struct FieldDataset<T>
where
    T: FmFloat,
{
    ids: Vec<usize>,
    values: Option<Vec<T>>,
    labels: Vec<T>,
    num_fields: usize,
}

impl<T> FieldDataset<T>
where
    T: FmFloat,
{
    pub fn new(
        ids: Vec<usize>,
        values: Option<Vec<T>>,
        labels: Vec<T>,
        num_fields: usize,
    ) -> Result<Self, String> {
        if num_fields == 0 {
            return Err("Dataset needs at least one field".to_string());
        }
        if ids.len() != labels.len() * num_fields {
            return Err(format!(
                "Expected {} feature ids for {} samples of {} fields, got {}",
                labels.len() * num_fields,
                labels.len(),
                num_fields,
                ids.len()
            ));
        }
        if let Some(values) = &values {
            if values.len() != ids.len() {
                return Err(format!(
                    "Feature values ({}) don't match feature ids ({})",
                    values.len(),
                    ids.len()
                ));
            }
        }
        if let Some(bad) = labels.iter().find(|&&l| l != T::zero() && l != T::one()) {
            return Err(format!("Labels must be 0 or 1, found {}", bad));
        }
        Ok(Self {
            ids,
            values,
            labels,
            num_fields,
        })
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Smallest id space covering every feature id in the dataset.
    pub fn input_dim(&self) -> usize {
        self.ids.iter().max().map_or(0, |m| m + 1)
    }

    pub fn labels(&self) -> &[T] {
        &self.labels
    }

    /// Fraction of positive labels.
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        let positives = self.labels.iter().filter(|&&l| l == T::one()).count();
        positives as f64 / self.labels.len() as f64
    }

    fn gather(&self, indices: &[usize]) -> Result<Batch<T>, String> {
        let f = self.num_fields;
        let mut ids = Vec::with_capacity(indices.len() * f);
        let mut values = self.values.as_ref().map(|_| Vec::with_capacity(indices.len() * f));
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            ids.extend_from_slice(&self.ids[i * f..(i + 1) * f]);
            if let (Some(out), Some(all)) = (values.as_mut(), self.values.as_ref()) {
                out.extend_from_slice(&all[i * f..(i + 1) * f]);
            }
            labels.push(self.labels[i]);
        }
        let n = labels.len();
        Ok(Batch {
            ids,
            values: values.map(|v| Tensor::from_vec(v, &[n, f])).transpose()?,
            labels: Tensor::from_vec(labels, &[n])?,
        })
    }

    fn batches_from_order(
        &self,
        order: &[usize],
        batch_size: usize,
        drop_last: bool,
    ) -> Result<BatchedDataset<T>, String> {
        if batch_size == 0 {
            return Err("Batch size must be greater than 0".to_string());
        }
        let mut batches = Vec::with_capacity(order.len().div_ceil(batch_size));
        for chunk in order.chunks(batch_size) {
            if drop_last && chunk.len() < batch_size {
                break;
            }
            batches.push(self.gather(chunk)?);
        }
        Ok(BatchedDataset::new(batches))
    }

    /// Splits into consecutive batches in sample order.
    pub fn batches(&self, batch_size: usize, drop_last: bool) -> Result<BatchedDataset<T>, String> {
        let order: Vec<usize> = (0..self.len()).collect();
        self.batches_from_order(&order, batch_size, drop_last)
    }

    /// Splits into batches after shuffling the sample order.
    pub fn shuffled_batches<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        drop_last: bool,
        rng: &mut R,
    ) -> Result<BatchedDataset<T>, String> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.batches_from_order(&order, batch_size, drop_last)
    }

    /// Splits off the last `fraction` of samples, e.g. as a validation set.
    pub fn split(&self, fraction: f64) -> Result<(Self, Self), String> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(format!("Split fraction must be in [0, 1], got {}", fraction));
        }
        let tail = (self.len() as f64 * fraction).round() as usize;
        let head = self.len() - tail;
        let f = self.num_fields;
        let part = |range: std::ops::Range<usize>| {
            Self::new(
                self.ids[range.start * f..range.end * f].to_vec(),
                self.values
                    .as_ref()
                    .map(|v| v[range.start * f..range.end * f].to_vec()),
                self.labels[range].to_vec(),
                f,
            )
        };
        Ok((part(0..head)?, part(head..self.len())?))
    }
}

impl<T> Dataset<T> for FieldDataset<T>
where
    T: FmFloat,
{
    fn get_item(&self, index: usize) -> Result<(Vec<usize>, Option<Vec<T>>, T), String> {
        if index >= self.len() {
            return Err(format!(
                "Index {} out of bounds for dataset of {} samples",
                index,
                self.len()
            ));
        }
        let f = self.num_fields;
        Ok((
            self.ids[index * f..(index + 1) * f].to_vec(),
            self.values
                .as_ref()
                .map(|v| v[index * f..(index + 1) * f].to_vec()),
            self.labels[index],
        ))
    }

    fn len(&self) -> usize {
        self.labels.len()
    }
}

#[derive(Debug)]
pub struct BatchedDataset<T>
where
    T: FmFloat,
{
    batches: Vec<Batch<T>>,
}

impl<T> BatchedDataset<T>
where
    T: FmFloat,
{
    fn new(batches: Vec<Batch<T>>) -> Self {
        Self { batches }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Batch<T>> {
        self.batches.iter()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl<'a, T> IntoIterator for &'a BatchedDataset<T>
where
    T: FmFloat,
{
    type Item = &'a Batch<T>;
    type IntoIter = std::slice::Iter<'a, Batch<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.iter()
    }
}

/// Settings of [`synthetic_ctr`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub num_samples: usize,
    pub num_fields: usize,
    /// Distinct values per field
    pub vocab_per_field: usize,
    /// Field pairs whose values drive the label
    pub planted_pairs: Vec<(usize, usize)>,
    /// Logit contribution of each planted pair
    pub strength: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_samples: 2000,
            num_fields: 5,
            vocab_per_field: 4,
            planted_pairs: vec![(0, 1), (2, 4)],
            strength: 2.0,
            seed: 42,
        }
    }
}

/// Click-through style data with known pairwise structure.
///
/// Field `f` takes ids in `[f * vocab, (f + 1) * vocab)`. Each value has a
/// polarity (+1 for the lower half of the vocabulary, -1 otherwise); the label
/// is drawn from `sigmoid(strength * sum_{(i, j) planted} p_i * p_j)`, so only
/// the planted pairs carry signal.
pub fn synthetic_ctr<T: FmFloat>(config: &SyntheticConfig) -> Result<FieldDataset<T>, String> {
    let (n, f, vocab) = (config.num_samples, config.num_fields, config.vocab_per_field);
    if vocab < 2 {
        return Err("Synthetic data needs at least 2 values per field".to_string());
    }
    if let Some(&(i, j)) = config
        .planted_pairs
        .iter()
        .find(|&&(i, j)| i >= f || j >= f || i == j)
    {
        return Err(format!("Invalid planted pair ({}, {}) for {} fields", i, j, f));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut ids = Vec::with_capacity(n * f);
    let mut labels = Vec::with_capacity(n);
    let mut polarity = vec![0.0f64; f];
    for _ in 0..n {
        for (field, p) in polarity.iter_mut().enumerate() {
            let value = rng.random_range(0..vocab);
            *p = if value < vocab / 2 { 1.0 } else { -1.0 };
            ids.push(field * vocab + value);
        }
        let logit: f64 = config
            .planted_pairs
            .iter()
            .map(|&(i, j)| config.strength * polarity[i] * polarity[j])
            .sum();
        let prob = 1.0 / (1.0 + (-logit).exp());
        labels.push(if rng.random::<f64>() < prob { T::one() } else { T::zero() });
    }

    log::debug!(
        "generated {} synthetic samples over {} fields, planted pairs {:?}",
        n,
        f,
        config.planted_pairs
    );
    FieldDataset::new(ids, None, labels, f)
}
