mod constant;
mod exponential;
mod step;

pub use constant::ConstantLr;
pub use exponential::ExponentialLr;
pub use step::StepLr;
