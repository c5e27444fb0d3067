mod bce;
mod cross_entropy;
mod mse;

pub use bce::BceWithLogits;
pub use cross_entropy::CrossEntropy;
pub use mse::Mse;

use ndarray::ArrayView2;

use ml_core::{MlError, Result};

/// Fails unless `y_pred` and `y` hold the same amount of examples.
fn check_rows(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<()> {
    if y_pred.nrows() != y.nrows() {
        return Err(MlError::ShapeMismatch {
            what: "target rows",
            got: y.nrows(),
            expected: y_pred.nrows(),
        });
    }

    Ok(())
}

/// Fails unless `y_pred` and `y` have the same shape.
fn check_shape(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<()> {
    check_rows(y_pred, y)?;

    if y_pred.ncols() != y.ncols() {
        return Err(MlError::ShapeMismatch {
            what: "target columns",
            got: y.ncols(),
            expected: y_pred.ncols(),
        });
    }

    Ok(())
}
