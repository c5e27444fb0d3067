use ndarray::Array2;

use ml_core::{MlError, Result, Rows, Tensor};

/// A task's examples held in memory, inputs and targets row aligned.
#[derive(Debug, Clone)]
pub struct InMemoryDataset<I> {
    inputs: I,
    targets: Tensor,
}

impl<I: Rows> InMemoryDataset<I> {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Arguments
    /// * `inputs` - The model inputs, one example per row.
    /// * `targets` - The labels, one example per row.
    ///
    /// # Errors
    /// `ShapeMismatch` if `inputs` and `targets` hold a different amount of rows.
    pub fn new(inputs: I, targets: Array2<f32>) -> Result<Self> {
        if inputs.num_rows() != targets.nrows() {
            return Err(MlError::ShapeMismatch {
                what: "dataset targets",
                got: targets.nrows(),
                expected: inputs.num_rows(),
            });
        }

        Ok(Self {
            inputs,
            targets: Tensor::new(targets),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inputs(&self) -> &I {
        &self.inputs
    }

    pub fn targets(&self) -> &Tensor {
        &self.targets
    }

    /// Copies the examples in `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> (I, Tensor) {
        (
            self.inputs.slice_rows(start, end),
            self.targets.slice_rows(start, end),
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn rows_must_match() {
        let x = Tensor::new(Array2::zeros((3, 2)));
        assert!(InMemoryDataset::new(x.clone(), Array2::zeros((2, 1))).is_err());

        let ds = InMemoryDataset::new(x, array![[0.], [1.], [2.]]).unwrap();
        let (_, y) = ds.slice(1, 3);
        assert_eq!(ds.len(), 3);
        assert_eq!(y.data(), &array![[1.], [2.]]);
    }
}
