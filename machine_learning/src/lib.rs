pub mod arch;
pub mod data;
pub mod loss;
pub mod metrics;
pub mod optimization;
pub mod registry;
pub mod scheduling;

pub use registry::{LossRegistry, TaskFunctions};
