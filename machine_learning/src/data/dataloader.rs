use std::num::NonZeroUsize;

use ml_core::{Rows, Tensor};

use super::dataset::InMemoryDataset;

/// Produces consecutive fixed-size batches in dataset order. The last batch
/// may be smaller.
#[derive(Debug, Clone)]
pub struct DataLoader<I> {
    dataset: InMemoryDataset<I>,
    batch_size: NonZeroUsize,
    cursor: usize,
}

impl<I: Rows> DataLoader<I> {
    pub fn new(dataset: InMemoryDataset<I>, batch_size: NonZeroUsize) -> Self {
        Self {
            dataset,
            batch_size,
            cursor: 0,
        }
    }

    pub fn dataset(&self) -> &InMemoryDataset<I> {
        &self.dataset
    }

    /// The amount of batches in a full pass.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size.get())
    }

    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Returns the next batch, or None if exhausted.
    pub fn next_batch(&mut self) -> Option<(I, Tensor)> {
        if self.cursor >= self.dataset.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size.get()).min(self.dataset.len());
        let batch = self.dataset.slice(self.cursor, end);

        self.cursor = end;
        Some(batch)
    }
}
