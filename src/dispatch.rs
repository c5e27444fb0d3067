use ml_core::{Device, MlError, NamedTensors, Result, Tensor};

/// How a batch's input is placed on a device and how its examples are counted.
///
/// A learner is built with the strategy matching its model's input convention.
pub trait InputDispatch {
    /// The input representation handled by this strategy.
    type Input;

    /// Places every tensor of `input` on `device`.
    fn move_to_device(&self, input: Self::Input, device: &Device) -> Self::Input;

    /// The amount of examples in `input`, read off the input alone.
    ///
    /// # Errors
    /// `InvalidInput` or `ShapeMismatch` if no consistent count exists.
    fn row_count(&self, input: &Self::Input) -> Result<usize>;
}

/// Models fed a single tensor.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleInput;

impl InputDispatch for SingleInput {
    type Input = Tensor;

    fn move_to_device(&self, input: Tensor, device: &Device) -> Tensor {
        input.to(device)
    }

    fn row_count(&self, input: &Tensor) -> Result<usize> {
        Ok(input.nrows())
    }
}

/// Models fed several named tensors, e.g. `{"full_img": .., "crop_img": ..}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiInput;

impl InputDispatch for MultiInput {
    type Input = NamedTensors;

    fn move_to_device(&self, input: NamedTensors, device: &Device) -> NamedTensors {
        input
            .into_iter()
            .map(|(k, v)| (k, v.to(device)))
            .collect()
    }

    /// Every named tensor must hold the same amount of rows.
    fn row_count(&self, input: &NamedTensors) -> Result<usize> {
        let mut values = input.values();
        let rows = values
            .next()
            .map(Tensor::nrows)
            .ok_or_else(|| MlError::InvalidInput("multi-input batch holds no tensors".into()))?;

        if let Some(other) = values.find(|v| v.nrows() != rows) {
            return Err(MlError::ShapeMismatch {
                what: "multi-input rows",
                got: other.nrows(),
                expected: rows,
            });
        }

        Ok(rows)
    }
}
