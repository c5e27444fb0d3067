use std::collections::BTreeMap;

use ndarray::ArrayView2;

use crate::{Device, MlError, Result, Tensor};

/// Whether a model records what it needs for a backward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

/// The raw outputs of a multi-task model, one tensor per task head.
#[derive(Debug, Clone, Default)]
pub struct TaskOutputs {
    outputs: BTreeMap<String, Tensor>,
}

impl TaskOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: impl Into<String>, output: Tensor) {
        self.outputs.insert(task.into(), output);
    }

    /// Returns the output of `task`'s head.
    ///
    /// # Errors
    /// `MlError::UnknownTask` if the model has no head for `task`.
    pub fn get(&self, task: &str) -> Result<&Tensor> {
        self.outputs
            .get(task)
            .ok_or_else(|| MlError::UnknownTask(task.to_string()))
    }

    /// Removes and returns the output of `task`'s head.
    pub fn take(&mut self, task: &str) -> Result<Tensor> {
        self.outputs
            .remove(task)
            .ok_or_else(|| MlError::UnknownTask(task.to_string()))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// An independent copy of a model's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDict {
    params: Vec<f32>,
}

impl StateDict {
    pub fn new(params: Vec<f32>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Copies the snapshot into `params`.
    ///
    /// # Errors
    /// `MlError::StateDictMismatch` if the lengths differ.
    pub fn copy_into(&self, params: &mut [f32]) -> Result<()> {
        if params.len() != self.params.len() {
            return Err(MlError::StateDictMismatch {
                got: self.params.len(),
                expected: params.len(),
            });
        }

        params.copy_from_slice(&self.params);
        Ok(())
    }
}

/// A trunk model shared by several task heads.
///
/// The model owns a flat parameter buffer and a gradient buffer of the same
/// length. Optimizers operate on those buffers through `params_and_grads`.
pub trait Model {
    /// The input representation consumed by `forward`.
    type Input;

    /// Places the model's parameters on `device`.
    fn to_device(&mut self, device: &Device);

    /// The device the model currently lives on.
    fn device(&self) -> &Device;

    fn set_mode(&mut self, mode: Mode);

    /// Computes every head's output for `input`.
    ///
    /// In `Mode::Train` the model keeps what it needs to run `backward`.
    ///
    /// # Errors
    /// `DeviceMismatch` or `ShapeMismatch` if the input doesn't fit the model.
    fn forward(&mut self, input: &Self::Input) -> Result<TaskOutputs>;

    /// Accumulates into the gradient buffer the gradient of the loss given
    /// its derivative w.r.t. `task`'s output on the last forward pass.
    ///
    /// # Errors
    /// `NotTraining` if there was no training-mode forward pass to consume.
    fn backward(&mut self, task: &str, d_output: ArrayView2<f32>) -> Result<()>;

    fn zero_grad(&mut self);

    /// Returns the parameter buffer along with the gradient buffer.
    fn params_and_grads(&mut self) -> (&mut [f32], &[f32]);

    /// Takes an independent deep copy of the parameters.
    fn state_dict(&self) -> StateDict;

    /// Overwrites the parameters with a snapshot.
    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_heads_are_unknown_tasks() {
        let outputs = TaskOutputs::new();
        assert_eq!(
            outputs.get("cat").unwrap_err(),
            MlError::UnknownTask("cat".into())
        );
    }

    #[test]
    fn state_dict_copy_checks_length() {
        let state = StateDict::new(vec![1.0, 2.0]);
        let mut params = [0.0; 3];
        assert!(state.copy_into(&mut params).is_err());

        let mut params = [0.0; 2];
        state.copy_into(&mut params).unwrap();
        assert_eq!(params, [1.0, 2.0]);
    }
}
