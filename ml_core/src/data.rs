use std::collections::BTreeMap;

use crate::Tensor;

/// Named sub-inputs of a multi-input model, e.g. `{"full_img": .., "crop_img": ..}`.
pub type NamedTensors = BTreeMap<String, Tensor>;

/// An input representation whose leading dimension can be sliced.
///
/// Datasets store their inputs behind this trait so they can hand out
/// row ranges without knowing whether the model takes one or many tensors.
pub trait Rows: Sized {
    /// The amount of examples held.
    fn num_rows(&self) -> usize;

    /// Copies the examples in `start..end`.
    fn slice_rows(&self, start: usize, end: usize) -> Self;
}

impl Rows for Tensor {
    fn num_rows(&self) -> usize {
        self.nrows()
    }

    fn slice_rows(&self, start: usize, end: usize) -> Self {
        Tensor::slice_rows(self, start, end)
    }
}

impl Rows for NamedTensors {
    fn num_rows(&self) -> usize {
        self.values().next().map_or(0, Tensor::nrows)
    }

    fn slice_rows(&self, start: usize, end: usize) -> Self {
        self.iter()
            .map(|(k, v)| (k.clone(), v.slice_rows(start, end)))
            .collect()
    }
}

/// A task-tagged mini-batch.
#[derive(Debug, Clone)]
pub struct Batch<I> {
    pub task: String,
    pub input: I,
    pub target: Tensor,
}

impl<I> Batch<I> {
    pub fn new(task: impl Into<String>, input: I, target: Tensor) -> Self {
        Self {
            task: task.into(),
            input,
            target,
        }
    }
}

/// A source of task-tagged mini-batches drawn from several per-task datasets.
///
/// Every call to `batches` starts a new pass; the returned iterator must be
/// drained before the next call. Within a single task, batches must arrive in
/// dataset order so that buffered predictions stay aligned with their labels.
pub trait BatchSource {
    /// The input representation of each batch.
    type Input;

    /// Starts a new pass over every per-task dataset.
    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch<Self::Input>> + '_>;

    /// The total amount of examples across all tasks.
    fn total_samples(&self) -> usize;

    /// The amount of examples in `task`'s dataset, or `None` if unknown.
    fn dataset_len(&self, task: &str) -> Option<usize>;
}
