use ndarray::{ArrayView2, Axis, CowArray, Ix2, concatenate};

use ml_core::{Device, MlError, NamedTensors, Result, Tensor};

/// An input representation a dense trunk can consume.
pub trait ModelInput {
    /// Returns the input as a single feature matrix, one row per example.
    ///
    /// # Errors
    /// `DeviceMismatch` if any tensor lives outside `device`, `ShapeMismatch` if
    /// the named tensors disagree on the amount of rows.
    fn features(&self, device: &Device) -> Result<CowArray<'_, f32, Ix2>>;
}

impl ModelInput for Tensor {
    fn features(&self, device: &Device) -> Result<CowArray<'_, f32, Ix2>> {
        self.expect_device(device)?;
        Ok(CowArray::from(self.view()))
    }
}

/// Named inputs are concatenated column-wise in key order.
impl ModelInput for NamedTensors {
    fn features(&self, device: &Device) -> Result<CowArray<'_, f32, Ix2>> {
        let mut views: Vec<ArrayView2<f32>> = Vec::with_capacity(self.len());
        let mut nrows = None;

        for tensor in self.values() {
            tensor.expect_device(device)?;

            let expected = *nrows.get_or_insert(tensor.nrows());
            if tensor.nrows() != expected {
                return Err(MlError::ShapeMismatch {
                    what: "named input rows",
                    got: tensor.nrows(),
                    expected,
                });
            }

            views.push(tensor.view());
        }

        if views.is_empty() {
            return Err(MlError::InvalidInput("no named inputs".into()));
        }

        let x = concatenate(Axis(1), &views)
            .map_err(|e| MlError::InvalidInput(format!("cannot join named inputs: {e}")))?;

        Ok(CowArray::from(x))
    }
}
