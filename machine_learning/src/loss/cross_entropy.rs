use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use ml_core::{LossFn, MlError, Result};

/// Categorical cross entropy over raw logits, for multi-class tasks.
///
/// Targets hold one class index per row in a single column.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

/// Numerically stable softmax of a single row of logits.
fn softmax(logits: ArrayView1<f32>) -> Vec<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
    let exps: Vec<f32> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Reads the class index stored in a target row.
fn class_of(row: ArrayView1<f32>, nclasses: usize) -> Result<usize> {
    let label = row[0];

    if label < 0. || label.fract() != 0. || label as usize >= nclasses {
        return Err(MlError::InvalidInput(format!(
            "class label {label} is not an index below {nclasses}"
        )));
    }

    Ok(label as usize)
}

fn check_targets(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<()> {
    super::check_rows(y_pred, y)?;

    if y.ncols() != 1 {
        return Err(MlError::ShapeMismatch {
            what: "class label columns",
            got: y.ncols(),
            expected: 1,
        });
    }

    Ok(())
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        check_targets(y_pred, y)?;

        let mut total = 0.;
        for (logits, target) in y_pred.axis_iter(Axis(0)).zip(y.axis_iter(Axis(0))) {
            let class = class_of(target, logits.len())?;
            let p = softmax(logits)[class];
            total -= p.max(f32::MIN_POSITIVE).ln();
        }

        Ok(total / y_pred.nrows().max(1) as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        check_targets(y_pred, y)?;

        let n = y_pred.nrows().max(1) as f32;
        let mut d = Array2::zeros(y_pred.raw_dim());

        for ((logits, target), mut d_row) in y_pred
            .axis_iter(Axis(0))
            .zip(y.axis_iter(Axis(0)))
            .zip(d.axis_iter_mut(Axis(0)))
        {
            let class = class_of(target, logits.len())?;
            for (j, p) in softmax(logits).into_iter().enumerate() {
                let onehot = if j == class { 1. } else { 0. };
                d_row[j] = (p - onehot) / n;
            }
        }

        Ok(d)
    }
}
