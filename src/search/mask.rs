// Interaction masks as produced by structure analysis and consumed by the
// retrain stage.

use crate::search::combinations::num_combinations;
use crate::search::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A 0/1 keep mask over the full combination list of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionMask {
    pub order: usize,
    pub num_slots: usize,
    pub mask: Vec<u8>,
}

impl InteractionMask {
    pub fn new(order: usize, num_slots: usize, mask: Vec<u8>) -> Result<Self> {
        let mask = Self {
            order,
            num_slots,
            mask,
        };
        mask.validate()?;
        Ok(mask)
    }

    /// Checks the length against `C(num_slots, order)` and that entries are 0 or 1.
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(SearchError::InvalidOrder {
                order: self.order,
                num_slots: self.num_slots,
            });
        }
        let expected = num_combinations(self.num_slots, self.order);
        if self.mask.len() != expected {
            return Err(SearchError::MaskLength {
                expected,
                actual: self.mask.len(),
            });
        }
        if let Some(bad) = self.mask.iter().find(|&&v| v > 1) {
            return Err(SearchError::Config(format!(
                "mask entries must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mask
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Number of kept interactions.
    pub fn kept(&self) -> usize {
        self.mask.iter().filter(|&&v| v == 1).count()
    }

    /// Number of masked (dropped) interactions.
    pub fn masked(&self) -> usize {
        self.len() - self.kept()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::debug!(
            "saved order {} mask ({} of {} kept) to {}",
            self.order,
            self.kept(),
            self.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let mask: Self = serde_json::from_str(&json)?;
        mask.validate()?;
        Ok(mask)
    }
}
