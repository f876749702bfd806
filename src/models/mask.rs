//! Shared observation inclusion mask.
//!
//! One mask is owned by the Gaussian filter and lent to every regression
//! model, so an elimination performed while processing one column also
//! removes the observation from later fits of other columns.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionMask {
    included: Vec<bool>,
}

impl InclusionMask {
    /// All `n` observations included.
    pub fn new(n: usize) -> Self {
        Self {
            included: vec![true; n],
        }
    }

    /// Resize to `n` and include everything again.
    pub fn reset(&mut self, n: usize) {
        self.included.clear();
        self.included.resize(n, true);
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Out-of-range indices read as excluded.
    pub fn is_included(&self, index: usize) -> bool {
        self.included.get(index).copied().unwrap_or(false)
    }

    /// Exclude `index`; returns true if it was included before.
    pub fn exclude(&mut self, index: usize) -> bool {
        match self.included.get_mut(index) {
            Some(flag) if *flag => {
                *flag = false;
                true
            }
            _ => false,
        }
    }

    pub fn count_included(&self) -> usize {
        self.included.iter().filter(|v| **v).count()
    }

    /// Indices still included.
    pub fn included_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.included
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.then_some(i))
    }
}
