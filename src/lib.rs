pub mod accumulator;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod learner;
pub mod report;
pub mod tasks;

pub use accumulator::{LossAccumulator, LossSummary, PredictionBuffer, Predictions};
pub use config::LearnerConfig;
pub use dispatch::{InputDispatch, MultiInput, SingleInput};
pub use error::{Error, Result};
pub use learner::{BestEpoch, EpochRecord, FitConfig, FitSummary, MultiTaskLearner, Validation};
pub use report::{LogReporter, Reporter, TableReporter};
pub use tasks::{Task, TaskSet};
