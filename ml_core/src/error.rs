use std::fmt;

/// The result type used by the model, loss and data contracts.
pub type Result<T> = std::result::Result<T, MlError>;

/// Errors produced by models, losses and batch sources when inputs are invalid.
#[derive(Debug, Clone, PartialEq)]
pub enum MlError {
    /// An input is invalid for semantic or domain reasons.
    InvalidInput(String),

    /// A shape invariant was violated (e.g. mismatched lengths).
    ShapeMismatch {
        /// Human-readable context for the mismatch (e.g. "params", "batch").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },

    /// A tensor was handed to a model living on a different device.
    DeviceMismatch { expected: String, got: String },

    /// A task name is absent from the task set or the registry.
    UnknownTask(String),

    /// A task received no batch during a validation or prediction pass.
    NoValidationBatches { task: String },

    /// `backward` was called without a preceding training-mode forward pass.
    NotTraining,

    /// A parameter snapshot does not fit the model it is loaded into.
    StateDictMismatch { got: usize, expected: usize },
}

impl fmt::Display for MlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlError::ShapeMismatch {
                what,
                got,
                expected,
            } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            MlError::DeviceMismatch { expected, got } => {
                write!(f, "device mismatch: tensor on {got}, expected {expected}")
            }
            MlError::UnknownTask(task) => write!(f, "unknown task: {task}"),
            MlError::NoValidationBatches { task } => {
                write!(f, "task {task} received no validation batches")
            }
            MlError::NotTraining => {
                write!(f, "backward called without a training-mode forward pass")
            }
            MlError::StateDictMismatch { got, expected } => write!(
                f,
                "state dict holds {got} parameters but the model expects {expected}"
            ),
        }
    }
}

impl std::error::Error for MlError {}
