use ndarray::{Array2, ArrayView2, Zip};

use ml_core::{LossFn, Result};

/// Binary cross entropy over raw logits, for multi-label tasks.
///
/// Targets hold a 0/1 indicator per label, with the same shape as the logits.
#[derive(Debug, Default, Clone, Copy)]
pub struct BceWithLogits;

impl BceWithLogits {
    /// Returns a new `BceWithLogits`.
    pub fn new() -> Self {
        Self
    }
}

fn sigmoid(z: f32) -> f32 {
    1. / (1. + (-z).exp())
}

impl LossFn for BceWithLogits {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        super::check_shape(y_pred, y)?;

        // max(z, 0) - z * y + ln(1 + e^-|z|)
        let mut total = 0.;
        Zip::from(&y_pred).and(&y).for_each(|&z, &t| {
            total += z.max(0.) - z * t + (-z.abs()).exp().ln_1p();
        });

        Ok(total / y_pred.len().max(1) as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        super::check_shape(y_pred, y)?;

        let n = y_pred.len().max(1) as f32;
        Ok(Zip::from(&y_pred)
            .and(&y)
            .map_collect(|&z, &t| (sigmoid(z) - t) / n))
    }
}
