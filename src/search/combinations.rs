// Enumeration of feature interactions: every `order`-subset of the slots in
// lexicographic order, optionally filtered by a keep mask.

use crate::search::error::{Result, SearchError};
use std::cmp::Ordering;

/// Binomial coefficient C(n, k); zero when k > n.
pub fn num_combinations(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1usize, |acc, i| acc * (n - i) / (i + 1))
}

/// Selected combinations stored as `order` parallel index columns.
/// Zipping the columns position-wise yields each combination tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combinations {
    order: usize,
    num_slots: usize,
    columns: Vec<Vec<usize>>,
}

impl Combinations {
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[Vec<usize>] {
        &self.columns
    }

    pub fn column(&self, i: usize) -> &[usize] {
        &self.columns[i]
    }

    /// The combination at `position`.
    pub fn tuple(&self, position: usize) -> Vec<usize> {
        self.columns.iter().map(|c| c[position]).collect()
    }

    pub fn tuples(&self) -> Vec<Vec<usize>> {
        (0..self.len()).map(|i| self.tuple(i)).collect()
    }

    fn compare_at(&self, position: usize, tuple: &[usize]) -> Ordering {
        for (column, &value) in self.columns.iter().zip(tuple) {
            match column[position].cmp(&value) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.order.cmp(&tuple.len())
    }

    /// Leftmost insertion point of `tuple` in this (sorted) list.
    pub fn bisect_left(&self, tuple: &[usize]) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.compare_at(mid, tuple) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Position of `tuple` in the list, or None if it is not present.
    pub fn lower_order_position(&self, tuple: &[usize]) -> Option<usize> {
        let position = self.bisect_left(tuple);
        (position < self.len() && self.compare_at(position, tuple) == Ordering::Equal)
            .then_some(position)
    }
}

/// Advances `indices` to the next k-combination of 0..n in lexicographic order.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    let Some(i) = (0..k).rev().find(|&i| indices[i] < n - k + i) else {
        return false;
    };
    indices[i] += 1;
    for j in i + 1..k {
        indices[j] = indices[j - 1] + 1;
    }
    true
}

/// Generates all `order`-combinations of `0..num_slots` in lexicographic order.
///
/// With a mask (length `C(num_slots, order)`), only positions flagged 1 are kept,
/// in their relative order. Orders above the slot count yield an empty list.
///
/// ```rust
/// use autofm::search::generate_pairs;
///
/// let pairs = generate_pairs(4, Some(&[1, 0, 1, 0, 0, 1]), 2).unwrap();
/// assert_eq!(pairs.tuples(), vec![vec![0, 1], vec![0, 3], vec![2, 3]]);
/// ```
pub fn generate_pairs(num_slots: usize, mask: Option<&[u8]>, order: usize) -> Result<Combinations> {
    if order == 0 {
        return Err(SearchError::InvalidOrder { order, num_slots });
    }
    let total = num_combinations(num_slots, order);
    if let Some(mask) = mask {
        if mask.len() != total {
            return Err(SearchError::MaskLength {
                expected: total,
                actual: mask.len(),
            });
        }
    }

    let kept = mask.map_or(total, |m| m.iter().filter(|&&v| v != 0).count());
    let mut columns = vec![Vec::with_capacity(kept); order];
    if total > 0 {
        let mut indices: Vec<usize> = (0..order).collect();
        let mut position = 0;
        loop {
            if mask.is_none_or(|m| m[position] != 0) {
                for (column, &index) in columns.iter_mut().zip(&indices) {
                    column.push(index);
                }
            }
            position += 1;
            if !next_combination(&mut indices, num_slots) {
                break;
            }
        }
    }

    log::debug!("generated pairs {} (order {}, {} slots)", kept, order, num_slots);
    Ok(Combinations {
        order,
        num_slots,
        columns,
    })
}
