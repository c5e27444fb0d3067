use std::num::NonZeroUsize;

use ml_core::{LrScheduler, Optimizer};

/// Decays the learning rate by `gamma` every `step_size` steps.
#[derive(Debug, Clone)]
pub struct StepLr {
    step_size: NonZeroUsize,
    gamma: f32,
    steps: usize,
}

impl StepLr {
    /// Creates a new `StepLr` scheduler.
    ///
    /// # Arguments
    /// * `step_size` - The amount of steps between decays.
    /// * `gamma` - The multiplicative decay factor.
    pub fn new(step_size: NonZeroUsize, gamma: f32) -> Self {
        Self {
            step_size,
            gamma,
            steps: 0,
        }
    }
}

impl LrScheduler for StepLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        self.steps += 1;

        if self.steps % self.step_size.get() == 0 {
            let lr = optimizer.learning_rate() * self.gamma;
            optimizer.set_learning_rate(lr);
        }
    }
}
