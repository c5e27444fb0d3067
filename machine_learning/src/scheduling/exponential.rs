use ml_core::{LrScheduler, Optimizer};

/// Multiplies the learning rate by `gamma` on every step.
#[derive(Debug, Clone)]
pub struct ExponentialLr {
    gamma: f32,
}

impl ExponentialLr {
    pub fn new(gamma: f32) -> Self {
        Self { gamma }
    }
}

impl LrScheduler for ExponentialLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        let lr = optimizer.learning_rate() * self.gamma;
        optimizer.set_learning_rate(lr);
    }
}
