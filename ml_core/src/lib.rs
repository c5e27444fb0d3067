mod data;
mod error;
mod loss;
mod model;
mod optimizer;
mod tensor;

pub use data::{Batch, BatchSource, NamedTensors, Rows};
pub use error::{MlError, Result};
pub use loss::{AccuracyFn, LossFn, Score};
pub use model::{Mode, Model, StateDict, TaskOutputs};
pub use optimizer::{LrScheduler, Optimizer};
pub use tensor::{Device, Tensor};
