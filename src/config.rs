use std::{fs, num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

use machine_learning::{
    LossRegistry, TaskFunctions,
    arch::activations::ActFn,
    data::SamplingPolicy,
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum},
    scheduling::{ConstantLr, ExponentialLr, StepLr},
};
use ml_core::{Device, LrScheduler, Optimizer};

use crate::{
    error::{Error, Result},
    learner::FitConfig,
    tasks::TaskSet,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    pub num_labels: usize,
    /// A built-in loss name, `categorical_cross_entropy` if absent.
    #[serde(default)]
    pub loss: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActFnConfig {
    Relu,
    Sigmoid { amp: f32 },
}

impl From<ActFnConfig> for ActFn {
    fn from(config: ActFnConfig) -> Self {
        match config {
            ActFnConfig::Relu => ActFn::relu(),
            ActFnConfig::Sigmoid { amp } => ActFn::sigmoid(amp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_dim: usize,
    pub hidden: Vec<usize>,
    pub act_fn: ActFnConfig,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_dim: 8,
            hidden: vec![16],
            act_fn: ActFnConfig::Relu,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    GradientDescent { lr: f32 },
    Momentum { lr: f32, mu: f32 },
    Adam { lr: f32, b1: f32, b2: f32, eps: f32 },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::GradientDescent { lr: 0.1 }
    }
}

impl OptimizerConfig {
    /// Builds the optimizer for a model of `len` parameters.
    pub fn build(&self, len: usize) -> Box<dyn Optimizer> {
        match *self {
            Self::GradientDescent { lr } => Box::new(GradientDescent::new(lr)),
            Self::Momentum { lr, mu } => Box::new(GradientDescentWithMomentum::new(len, lr, mu)),
            Self::Adam { lr, b1, b2, eps } => Box::new(Adam::new(len, lr, b1, b2, eps)),
        }
    }

    fn lr(&self) -> f32 {
        match *self {
            Self::GradientDescent { lr } | Self::Momentum { lr, .. } | Self::Adam { lr, .. } => lr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulerConfig {
    #[default]
    Constant,
    Step { step_size: NonZeroUsize, gamma: f32 },
    Exponential { gamma: f32 },
}

impl SchedulerConfig {
    pub fn build(&self) -> Box<dyn LrScheduler> {
        match *self {
            Self::Constant => Box::new(ConstantLr::new()),
            Self::Step { step_size, gamma } => Box::new(StepLr::new(step_size, gamma)),
            Self::Exponential { gamma } => Box::new(ExponentialLr::new(gamma)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub epochs: NonZeroUsize,
    pub step_scheduler_on_batch: bool,
    pub device: Device,
    pub best_model: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN),
            step_scheduler_on_batch: false,
            device: Device::cpu(),
            best_model: true,
        }
    }
}

/// Sizes of the synthetic per-task datasets used by the demo binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub train_samples: usize,
    pub val_samples: usize,
    pub batch_size: NonZeroUsize,
    pub sampling: SamplingPolicy,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_samples: 96,
            val_samples: 32,
            batch_size: NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN),
            sampling: SamplingPolicy::Shuffled { seed: 0 },
            seed: 0,
        }
    }
}

/// Everything needed to set up and run a training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fit: FitOptions,
    #[serde(default)]
    pub data: DataConfig,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        let task = |name: &str, num_labels| TaskConfig {
            name: name.to_string(),
            num_labels,
            loss: None,
        };

        Self {
            tasks: vec![task("cat_breed", 3), task("dog_breed", 2)],
            model: ModelConfig::default(),
            optimizer: OptimizerConfig::default(),
            scheduler: SchedulerConfig::default(),
            fit: FitOptions::default(),
            data: DataConfig::default(),
        }
    }
}

impl LearnerConfig {
    /// Parses and validates a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Checks the config before anything gets built.
    ///
    /// # Errors
    /// `Error::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.task_set()?;

        if let Some(t) = self.tasks.iter().find(|t| {
            t.loss
                .as_deref()
                .is_some_and(|name| !TaskFunctions::is_known(name))
        }) {
            return Err(Error::Config(format!(
                "task {} uses an unknown loss {:?}",
                t.name, t.loss
            )));
        }

        if self.model.input_dim == 0 || self.model.hidden.contains(&0) {
            return Err(Error::Config("layer widths must be positive".into()));
        }

        let lr = self.optimizer.lr();
        if !lr.is_finite() || lr <= 0. {
            return Err(Error::Config(format!("learning rate must be positive, got {lr}")));
        }

        if self.data.train_samples == 0 || self.data.val_samples == 0 {
            return Err(Error::Config("every task needs training and validation samples".into()));
        }

        Ok(())
    }

    pub fn task_set(&self) -> Result<TaskSet> {
        TaskSet::new(self.tasks.iter().map(|t| (t.name.as_str(), t.num_labels)))
    }

    /// Builds the registry out of every task's loss name.
    pub fn registry(&self) -> Result<LossRegistry> {
        let names = self
            .tasks
            .iter()
            .map(|t| (t.name.as_str(), t.loss.as_deref()));

        LossRegistry::from_names(names).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            num_epochs: self.fit.epochs,
            step_scheduler_on_batch: self.fit.step_scheduler_on_batch,
            device: self.fit.device.clone(),
            best_model: self.fit.best_model,
        }
    }
}
