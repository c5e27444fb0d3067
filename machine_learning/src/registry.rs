use std::collections::BTreeMap;

use ml_core::{AccuracyFn, LossFn, MlError, Result};

use crate::{
    loss::{BceWithLogits, CrossEntropy, Mse},
    metrics::{MultiClassAccuracy, MultiLabelAccuracy, RoundedAccuracy},
};

/// Multi-class heads: softmax cross entropy scored by arg max.
pub const CATEGORICAL_CROSS_ENTROPY: &str = "categorical_cross_entropy";
/// Multi-label heads: binary cross entropy on logits scored by subset accuracy.
pub const BCE_LOGITS: &str = "bce_logits";
pub const MSE: &str = "mse";

/// The loss used by tasks that don't name one.
pub const DEFAULT_LOSS: &str = CATEGORICAL_CROSS_ENTROPY;

/// The loss and accuracy functions of a single task.
pub struct TaskFunctions {
    pub loss: Box<dyn LossFn>,
    pub accuracy: Box<dyn AccuracyFn>,
}

impl TaskFunctions {
    pub fn new(loss: impl LossFn + 'static, accuracy: impl AccuracyFn + 'static) -> Self {
        Self {
            loss: Box::new(loss),
            accuracy: Box::new(accuracy),
        }
    }

    /// Builds one of the named built-in pairs.
    ///
    /// # Errors
    /// `InvalidInput` if `name` is not a built-in loss.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            CATEGORICAL_CROSS_ENTROPY => Ok(Self::new(CrossEntropy, MultiClassAccuracy)),
            BCE_LOGITS => Ok(Self::new(BceWithLogits, MultiLabelAccuracy)),
            MSE => Ok(Self::new(Mse, RoundedAccuracy)),
            _ => Err(MlError::InvalidInput(format!("unknown loss {name}"))),
        }
    }

    pub fn is_known(name: &str) -> bool {
        matches!(name, CATEGORICAL_CROSS_ENTROPY | BCE_LOGITS | MSE)
    }
}

/// Maps every task to its `TaskFunctions`.
#[derive(Default)]
pub struct LossRegistry {
    tasks: BTreeMap<String, TaskFunctions>,
}

impl LossRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry out of `(task, loss name)` pairs, falling back to
    /// `DEFAULT_LOSS` when a task names none.
    ///
    /// # Errors
    /// `InvalidInput` if any name is not a built-in loss.
    pub fn from_names<'a, T>(tasks: T) -> Result<Self>
    where
        T: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut registry = Self::new();

        for (task, name) in tasks {
            let fns = TaskFunctions::from_name(name.unwrap_or(DEFAULT_LOSS))?;
            registry.insert(task, fns);
        }

        Ok(registry)
    }

    /// Registers `fns` for `task`, replacing any previous entry.
    pub fn insert(&mut self, task: impl Into<String>, fns: TaskFunctions) {
        self.tasks.insert(task.into(), fns);
    }

    /// # Errors
    /// `UnknownTask` if nothing is registered for `task`.
    pub fn get(&self, task: &str) -> Result<&TaskFunctions> {
        self.tasks
            .get(task)
            .ok_or_else(|| MlError::UnknownTask(task.to_string()))
    }

    /// Fails with `UnknownTask` on the first of `tasks` lacking an entry.
    pub fn ensure_covers<'a>(&self, tasks: impl IntoIterator<Item = &'a str>) -> Result<()> {
        tasks.into_iter().try_for_each(|task| self.get(task).map(|_| ()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_without_a_name_use_the_default() {
        let registry =
            LossRegistry::from_names([("cat_breed", None), ("tags", Some(BCE_LOGITS))]).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.ensure_covers(["cat_breed", "tags"]).is_ok());
        assert_eq!(
            registry.ensure_covers(["cat_breed", "dog_breed"]).unwrap_err(),
            MlError::UnknownTask("dog_breed".into())
        );
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(LossRegistry::from_names([("cat_breed", Some("hinge"))]).is_err());
        assert!(!TaskFunctions::is_known("hinge"));
        assert!(TaskFunctions::is_known(MSE));
    }
}
