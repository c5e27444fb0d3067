use crate::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates the provided parameters using the accumulated gradients.
    ///
    /// # Arguments
    /// * `params` - The parameters to update.
    /// * `grad` - The model's gradient.
    ///
    /// # Errors
    /// `ShapeMismatch` if `grad` and `params` differ in length.
    fn step(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, lr: f32);
}

/// A learning-rate schedule advanced by the training loop.
pub trait LrScheduler {
    /// Advances the schedule one step and writes the new learning rate into `optimizer`.
    fn step(&mut self, optimizer: &mut dyn Optimizer);
}
