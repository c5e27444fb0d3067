use std::fmt;

use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A differentiable loss between a head's raw output and its target.
pub trait LossFn {
    /// The mean loss over the batch.
    ///
    /// # Errors
    /// `ShapeMismatch` if `y` doesn't fit `y_pred`.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32>;

    /// The derivative of `loss` w.r.t. `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>>;
}

/// The result of an accuracy function.
///
/// Most tasks produce a single number, some produce a matrix (e.g. a
/// confusion matrix) which can't be rendered as a fixed precision float.
#[derive(Debug, Clone, PartialEq)]
pub enum Score {
    Scalar(f32),
    Matrix(Array2<f32>),
}

impl Score {
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Score::Scalar(v) => Some(*v),
            Score::Matrix(_) => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Scalar(v) => write!(f, "{v}"),
            Score::Matrix(m) => write!(f, "{m}"),
        }
    }
}

/// Scores a task's full set of predictions at once.
pub trait AccuracyFn {
    /// Scores raw predictions against the true labels.
    ///
    /// # Arguments
    /// * `y_true` - The buffered true labels, one row per example.
    /// * `y_raw_pred` - The buffered raw model outputs, one row per example.
    ///
    /// # Returns
    /// The score along with the post-processed predictions.
    fn accuracy(
        &self,
        y_true: ArrayView2<f32>,
        y_raw_pred: ArrayView2<f32>,
    ) -> Result<(Score, Array2<f32>)>;
}
