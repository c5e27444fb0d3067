use std::collections::BTreeMap;

use log::debug;
use ndarray::{Array2, ArrayView2, Axis, concatenate};

use ml_core::{BatchSource, MlError, Result};

use crate::tasks::TaskSet;

#[derive(Debug, Clone, Copy, Default)]
struct TaskLoss {
    sum: f32,
    rows: usize,
    batches: usize,
}

/// Running per-task and overall loss sums of a single pass.
///
/// Built fresh for every epoch or validation pass and consumed by `finish`.
#[derive(Debug, Clone)]
pub struct LossAccumulator {
    tasks: BTreeMap<String, TaskLoss>,
    overall: f32,
}

/// Mean losses of a finished pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LossSummary {
    /// The loss sum over every task divided by the source's total sample count.
    pub overall: f32,
    /// Each task's loss sum divided by that task's dataset size.
    pub per_task: BTreeMap<String, f32>,
}

impl LossSummary {
    /// # Errors
    /// `UnknownTask` if `task` wasn't part of the pass.
    pub fn task(&self, task: &str) -> Result<f32> {
        self.per_task
            .get(task)
            .copied()
            .ok_or_else(|| MlError::UnknownTask(task.to_string()))
    }
}

impl LossAccumulator {
    /// Creates an accumulator holding a zero sum for every task of `tasks`.
    pub fn new(tasks: &TaskSet) -> Self {
        Self {
            tasks: tasks
                .names()
                .map(|t| (t.to_string(), TaskLoss::default()))
                .collect(),
            overall: 0.,
        }
    }

    /// Adds `value` to `task`'s sum and to the overall sum.
    ///
    /// # Arguments
    /// * `task` - The task the batch belongs to.
    /// * `value` - The amount to accumulate, already scaled by the caller if needed.
    /// * `rows` - The amount of examples in the batch.
    ///
    /// # Errors
    /// `UnknownTask` if `task` is not part of the task set.
    pub fn add(&mut self, task: &str, value: f32, rows: usize) -> Result<()> {
        let entry = self
            .tasks
            .get_mut(task)
            .ok_or_else(|| MlError::UnknownTask(task.to_string()))?;

        entry.sum += value;
        entry.rows += rows;
        entry.batches += 1;
        self.overall += value;
        Ok(())
    }

    /// The amount of examples seen for `task`.
    pub fn rows(&self, task: &str) -> Option<usize> {
        self.tasks.get(task).map(|t| t.rows)
    }

    /// Normalizes the sums by the sizes reported by `source`.
    ///
    /// # Errors
    /// `InvalidInput` if the source or one of its task datasets is empty,
    /// `UnknownTask` if the source doesn't know one of the tasks.
    pub fn finish<B: BatchSource + ?Sized>(self, source: &B) -> Result<LossSummary> {
        let total = source.total_samples();
        if total == 0 {
            return Err(MlError::InvalidInput("batch source holds no samples".into()));
        }

        let mut per_task = BTreeMap::new();
        for (task, loss) in self.tasks {
            let len = source
                .dataset_len(&task)
                .ok_or_else(|| MlError::UnknownTask(task.clone()))?;

            if len == 0 {
                let msg = format!("task {task} has an empty dataset");
                return Err(MlError::InvalidInput(msg));
            }

            debug!(task = task.as_str(), rows = loss.rows, batches = loss.batches; "task loss");
            per_task.insert(task, loss.sum / len as f32);
        }

        Ok(LossSummary {
            overall: self.overall / total as f32,
            per_task,
        })
    }
}

/// The buffered true labels and raw predictions of a single task.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub y_true: Array2<f32>,
    pub y_pred: Array2<f32>,
}

/// Per-task buffers of labels and predictions, in batch arrival order.
///
/// Buffered rows line up with the task's dataset only if the batch source
/// yields each task's batches in dataset order.
#[derive(Debug, Clone)]
pub struct PredictionBuffer {
    tasks: BTreeMap<String, (Vec<Array2<f32>>, Vec<Array2<f32>>)>,
}

impl PredictionBuffer {
    pub fn new(tasks: &TaskSet) -> Self {
        Self {
            tasks: tasks
                .names()
                .map(|t| (t.to_string(), (Vec::new(), Vec::new())))
                .collect(),
        }
    }

    /// Appends a batch's labels and raw outputs to `task`'s buffers.
    ///
    /// # Errors
    /// `UnknownTask` if `task` is not part of the task set, `ShapeMismatch`
    /// if labels and outputs hold a different amount of rows.
    pub fn push(
        &mut self,
        task: &str,
        y_true: ArrayView2<f32>,
        y_pred: ArrayView2<f32>,
    ) -> Result<()> {
        if y_true.nrows() != y_pred.nrows() {
            return Err(MlError::ShapeMismatch {
                what: "buffered labels",
                got: y_true.nrows(),
                expected: y_pred.nrows(),
            });
        }

        let (trues, preds) = self
            .tasks
            .get_mut(task)
            .ok_or_else(|| MlError::UnknownTask(task.to_string()))?;

        trues.push(y_true.to_owned());
        preds.push(y_pred.to_owned());
        Ok(())
    }

    /// Concatenates every task's buffers.
    ///
    /// # Errors
    /// `NoValidationBatches` if a task received no batch, `ShapeMismatch` if
    /// a task's batches disagree on their width.
    pub fn finish(self) -> Result<BTreeMap<String, Predictions>> {
        self.tasks
            .into_iter()
            .map(|(task, (trues, preds))| {
                if trues.is_empty() {
                    return Err(MlError::NoValidationBatches { task });
                }

                let predictions = Predictions {
                    y_true: stack(&trues)?,
                    y_pred: stack(&preds)?,
                };

                Ok((task, predictions))
            })
            .collect()
    }
}

fn stack(chunks: &[Array2<f32>]) -> Result<Array2<f32>> {
    let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
    let width = views[0].ncols();

    concatenate(Axis(0), &views).map_err(|_| {
        let got = views
            .iter()
            .map(|v| v.ncols())
            .find(|&c| c != width)
            .unwrap_or(width);

        MlError::ShapeMismatch {
            what: "buffered columns",
            got,
            expected: width,
        }
    })
}
