use crate::error::{Error, Result};

/// A single prediction objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    /// The amount of classes or labels of the task's head.
    pub num_labels: usize,
}

/// The tasks of a training session, in registration order.
///
/// Registration order drives the column order of every report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSet {
    tasks: Vec<Task>,
}

impl TaskSet {
    /// Creates a new `TaskSet` out of `(name, num_labels)` pairs.
    ///
    /// # Errors
    /// `Error::Config` if there are no tasks, a name repeats or a task has no labels.
    pub fn new<S, T>(tasks: T) -> Result<Self>
    where
        S: Into<String>,
        T: IntoIterator<Item = (S, usize)>,
    {
        let mut set = Vec::<Task>::new();

        for (name, num_labels) in tasks {
            let name = name.into();

            if set.iter().any(|t| t.name == name) {
                return Err(Error::Config(format!("task {name} is registered twice")));
            }

            if num_labels == 0 {
                return Err(Error::Config(format!("task {name} has no labels")));
            }

            set.push(Task { name, num_labels });
        }

        if set.is_empty() {
            return Err(Error::Config("at least one task is required".into()));
        }

        Ok(Self { tasks: set })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
