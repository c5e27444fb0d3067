use ml_core::{LrScheduler, Optimizer};

/// Leaves the learning rate untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantLr;

impl ConstantLr {
    pub fn new() -> Self {
        Self
    }
}

impl LrScheduler for ConstantLr {
    fn step(&mut self, _optimizer: &mut dyn Optimizer) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::GradientDescent;

    #[test]
    fn learning_rate_never_changes() {
        let mut opt = GradientDescent::new(0.3);
        let mut sched = ConstantLr::new();

        (0..5).for_each(|_| sched.step(&mut opt));

        assert_eq!(opt.learning_rate(), 0.3);
    }
}
