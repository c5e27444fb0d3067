use std::{fmt, str::FromStr};

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{MlError, Result};

const CPU: &str = "cpu";

/// A compute-target identifier such as `cpu` or `cuda:0`.
///
/// The identifier is opaque to the training loop; it is handed as-is to the
/// model and tensor layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Device(String);

impl Device {
    /// Creates a new `Device`.
    ///
    /// # Arguments
    /// * `name` - The compute-target identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The host device.
    pub fn cpu() -> Self {
        Self(CPU.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::cpu()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Device {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() {
            return Err(MlError::InvalidInput("empty device identifier".into()));
        }

        Ok(Self(s.to_string()))
    }
}

/// A two dimensional `f32` array placed on a `Device`.
///
/// Rows are examples, columns are features, logits or labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Array2<f32>,
    device: Device,
}

impl Tensor {
    /// Creates a new `Tensor` on the host device.
    ///
    /// # Arguments
    /// * `data` - The tensor's values.
    pub fn new(data: Array2<f32>) -> Self {
        Self {
            data,
            device: Device::cpu(),
        }
    }

    /// Builds a tensor from row-major values.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `cols` - The amount of columns.
    /// * `values` - `rows * cols` values in row-major order.
    ///
    /// # Returns
    /// The new tensor or a `ShapeMismatch` if the values don't fit the shape.
    pub fn from_shape_vec(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        let data = Array2::from_shape_vec((rows, cols), values).map_err(|_| {
            MlError::ShapeMismatch {
                what: "tensor values",
                got: len,
                expected: rows * cols,
            }
        })?;

        Ok(Self::new(data))
    }

    /// Places the tensor on `device`, keeping its values.
    pub fn to(mut self, device: &Device) -> Self {
        if &self.device != device {
            self.device = device.clone();
        }

        self
    }

    /// The leading dimension, that is, the amount of examples.
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f32> {
        self.data
    }

    /// Copies the rows in `start..end` into a new tensor on the same device.
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let data = self
            .data
            .slice_axis(Axis(0), (start..end).into())
            .to_owned();

        Self {
            data,
            device: self.device.clone(),
        }
    }

    /// Fails with `DeviceMismatch` unless the tensor lives on `device`.
    pub fn expect_device(&self, device: &Device) -> Result<()> {
        if &self.device != device {
            return Err(MlError::DeviceMismatch {
                expected: device.to_string(),
                got: self.device.to_string(),
            });
        }

        Ok(())
    }
}

impl From<Array2<f32>> for Tensor {
    fn from(data: Array2<f32>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn moving_a_tensor_keeps_its_values() {
        let t = Tensor::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let gpu = Device::new("cuda:0");

        let moved = t.clone().to(&gpu);

        assert_eq!(moved.device(), &gpu);
        assert_eq!(moved.data(), t.data());
        assert!(moved.expect_device(&Device::cpu()).is_err());
    }

    #[test]
    fn slicing_rows() {
        let t = Tensor::from_shape_vec(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
        let s = t.slice_rows(1, 3);
        assert_eq!(s.nrows(), 2);
        assert_eq!(s.data(), &array![[2.0], [3.0]]);
    }

    #[test]
    fn parsing_devices() {
        assert_eq!("cuda:1".parse::<Device>().unwrap(), Device::new("cuda:1"));
        assert!(" ".parse::<Device>().is_err());
        assert_eq!(Device::default().name(), "cpu");
    }
}
