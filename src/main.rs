use std::{env, io};

use anyhow::Context;
use log::info;
use ndarray::{Array2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};

use machine_learning::{
    arch::MultiHeadNet,
    data::{DataLoader, InMemoryDataset, MultiDatasetLoader, SamplingPolicy},
    registry::{BCE_LOGITS, MSE},
};
use ml_core::Tensor;
use multitask::{LearnerConfig, MultiTaskLearner, SingleInput, TableReporter, config::TaskConfig};

/// A fixed random linear map labeling one task's synthetic inputs.
struct Projection {
    w: Array2<f32>,
    loss: Option<String>,
}

impl Projection {
    fn new(task: &TaskConfig, input_dim: usize, rng: &mut StdRng) -> Self {
        let w: Array2<f32> =
            Array2::from_shape_fn((input_dim, task.num_labels), |_| rng.random_range(-1.0..1.0));

        Self {
            w,
            loss: task.loss.clone(),
        }
    }

    fn dataset(
        &self,
        samples: usize,
        rng: &mut StdRng,
    ) -> anyhow::Result<InMemoryDataset<Tensor>> {
        let x: Array2<f32> =
            Array2::from_shape_fn((samples, self.w.nrows()), |_| rng.random_range(-1.0..1.0));
        let scores = x.dot(&self.w);

        let y = match self.loss.as_deref() {
            Some(BCE_LOGITS) => scores.mapv(|s| if s > 0. { 1. } else { 0. }),
            Some(MSE) => scores,
            _ => scores
                .map_axis(Axis(1), |row| {
                    row.iter()
                        .enumerate()
                        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
                            if v > max { (i, v) } else { (best, max) }
                        })
                        .0 as f32
                })
                .insert_axis(Axis(1)),
        };

        Ok(InMemoryDataset::new(Tensor::new(x), y)?)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => {
            LearnerConfig::from_path(&path).with_context(|| format!("loading config {path}"))?
        }
        None => {
            info!("no config given, using defaults");
            LearnerConfig::default()
        }
    };

    let tasks = config.task_set()?;
    let registry = config.registry()?;
    let mut rng = StdRng::seed_from_u64(config.data.seed);

    let mut train_loaders = Vec::with_capacity(config.tasks.len());
    let mut val_loaders = Vec::with_capacity(config.tasks.len());
    for task in &config.tasks {
        let projection = Projection::new(task, config.model.input_dim, &mut rng);
        let train = projection.dataset(config.data.train_samples, &mut rng)?;
        let val = projection.dataset(config.data.val_samples, &mut rng)?;

        train_loaders.push((task.name.clone(), DataLoader::new(train, config.data.batch_size)));
        val_loaders.push((task.name.clone(), DataLoader::new(val, config.data.batch_size)));
    }

    let train = MultiDatasetLoader::new(train_loaders, config.data.sampling)?;
    let val = MultiDatasetLoader::new(val_loaders, SamplingPolicy::Sequential)?;

    let heads: Vec<(String, usize)> = config
        .tasks
        .iter()
        .map(|t| (t.name.clone(), t.num_labels))
        .collect();

    let mut init_rng = StdRng::seed_from_u64(config.model.seed);
    let model: MultiHeadNet<Tensor> = MultiHeadNet::new(
        config.model.input_dim,
        &config.model.hidden,
        config.model.act_fn.into(),
        &heads,
        &mut init_rng,
    );

    let mut optimizer = config.optimizer.build(model.size());
    let mut scheduler = config.scheduler.build();
    let fit = config.fit_config();

    let mut learner = MultiTaskLearner::new(model, SingleInput, train, val, tasks, registry)?
        .with_reporter(TableReporter::new(io::stdout()));

    let summary = learner.fit(&fit, scheduler.as_mut(), optimizer.as_mut())?;

    if let Some(best) = summary.best {
        info!(epoch = best.epoch, loss = best.loss; "restored best model");
    }

    for (task, preds) in learner.get_val_predictions(&fit.device)? {
        info!(task = task.as_str(), rows = preds.y_pred.nrows(); "validation predictions");
    }

    Ok(())
}
