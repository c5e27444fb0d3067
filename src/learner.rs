use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use machine_learning::LossRegistry;
use ml_core::{
    Batch, BatchSource, Device, LrScheduler, MlError, Mode, Model, Optimizer, Score, StateDict,
    Tensor,
};

use crate::{
    accumulator::{LossAccumulator, LossSummary, PredictionBuffer, Predictions},
    dispatch::InputDispatch,
    error::Result,
    report::{LogReporter, Reporter, format_score, format_stat, format_time},
    tasks::TaskSet,
};

/// The arguments of a `fit` run.
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub num_epochs: NonZeroUsize,
    /// Step the scheduler after every batch if set, once per epoch otherwise.
    pub step_scheduler_on_batch: bool,
    pub device: Device,
    /// Restore the parameters of the epoch with the lowest validation loss
    /// once training is over.
    pub best_model: bool,
}

impl FitConfig {
    /// Creates a new `FitConfig` stepping the scheduler per epoch on the host
    /// device, keeping the final weights.
    pub fn new(num_epochs: NonZeroUsize) -> Self {
        Self {
            num_epochs,
            step_scheduler_on_batch: false,
            device: Device::cpu(),
            best_model: false,
        }
    }
}

/// The outcome of a validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub losses: LossSummary,
    /// Every task's score over its full set of buffered predictions.
    pub accuracy: BTreeMap<String, Score>,
}

/// The stats of a single training epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train: LossSummary,
    pub val: Validation,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestEpoch {
    pub epoch: usize,
    pub loss: f32,
}

/// Everything a `fit` run measured.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub epochs: Vec<EpochRecord>,
    /// The restored epoch, only set when `best_model` was requested and a
    /// snapshot was taken.
    pub best: Option<BestEpoch>,
}

struct Snapshot {
    best: BestEpoch,
    state: StateDict,
}

impl Snapshot {
    /// Whether `loss` beats the snapshot. NaN never does.
    fn improves(current: Option<&Snapshot>, loss: f32) -> bool {
        !loss.is_nan() && current.is_none_or(|s| loss < s.best.loss)
    }
}

/// A batch after it went through the model.
struct Forwarded {
    task: String,
    rows: usize,
    target: Tensor,
    output: Tensor,
}

/// Places `batch` on `device` and runs it through `model`, keeping only the
/// output of the batch's task head.
fn forward_batch<M, D>(
    model: &mut M,
    dispatch: &D,
    batch: Batch<D::Input>,
    device: &Device,
) -> ml_core::Result<Forwarded>
where
    D: InputDispatch,
    M: Model<Input = D::Input>,
{
    let Batch {
        task,
        input,
        target,
    } = batch;

    let input = dispatch.move_to_device(input, device);
    let target = target.to(device);
    let rows = dispatch.row_count(&input)?;
    let output = model.forward(&input)?.take(&task)?;

    Ok(Forwarded {
        task,
        rows,
        target,
        output,
    })
}

/// Trains a shared-trunk model on several tasks at once.
///
/// Batches from the training source are routed to their task's loss, losses
/// are accumulated per task weighted by batch size, and every epoch ends with
/// a validation pass scored by each task's accuracy function.
pub struct MultiTaskLearner<M, D, B> {
    model: M,
    dispatch: D,
    train: B,
    val: B,
    tasks: TaskSet,
    registry: LossRegistry,
    reporter: Box<dyn Reporter>,
}

impl<M, D, B> MultiTaskLearner<M, D, B>
where
    D: InputDispatch,
    M: Model<Input = D::Input>,
    B: BatchSource<Input = D::Input>,
{
    /// Creates a new `MultiTaskLearner` reporting through the `log` facade.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `dispatch` - The input convention of the model.
    /// * `train` - The source of training batches.
    /// * `val` - The source of validation batches.
    /// * `tasks` - The tasks to train on, in reporting order.
    /// * `registry` - The loss and accuracy functions of every task.
    ///
    /// # Errors
    /// `UnknownTask` if the registry or either batch source lacks one of `tasks`.
    pub fn new(
        model: M,
        dispatch: D,
        train: B,
        val: B,
        tasks: TaskSet,
        registry: LossRegistry,
    ) -> Result<Self> {
        registry.ensure_covers(tasks.names())?;

        for task in tasks.names() {
            if train.dataset_len(task).is_none() || val.dataset_len(task).is_none() {
                return Err(MlError::UnknownTask(task.to_string()).into());
            }
        }

        Ok(Self {
            model,
            dispatch,
            train,
            val,
            tasks,
            registry,
            reporter: Box::new(LogReporter::new()),
        })
    }

    /// Replaces the reporter receiving the per-epoch table.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// The columns of the per-epoch table.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec!["train_loss".to_string(), "val_loss".to_string()];

        for task in self.tasks.names() {
            headers.push(format!("{task}_train_loss"));
            headers.push(format!("{task}_val_loss"));
            headers.push(format!("{task}_acc"));
        }

        headers.push("time".to_string());
        headers
    }

    /// Trains the model for `config.num_epochs` epochs, validating after each one.
    ///
    /// # Arguments
    /// * `config` - The run's options.
    /// * `scheduler` - The learning-rate schedule, stepped per batch or per epoch.
    /// * `optimizer` - Updates the parameters after every batch.
    ///
    /// # Returns
    /// The stats of every epoch along with the restored best epoch, if any.
    ///
    /// # Errors
    /// Any model, loss, accuracy or reporting failure aborts the run, leaving
    /// the parameters as the last optimizer step left them.
    pub fn fit(
        &mut self,
        config: &FitConfig,
        scheduler: &mut dyn LrScheduler,
        optimizer: &mut dyn Optimizer,
    ) -> Result<FitSummary> {
        self.model.to_device(&config.device);

        let headers = self.headers();
        self.reporter.header(&headers)?;

        let mut epochs = Vec::with_capacity(config.num_epochs.get());
        let mut snapshot: Option<Snapshot> = None;

        for epoch in 0..config.num_epochs.get() {
            let start = Instant::now();

            let train = self.train_epoch(config, scheduler, optimizer)?;
            let val = self.validate(&config.device)?;
            let record = EpochRecord {
                epoch,
                train,
                val,
                elapsed: start.elapsed(),
            };

            info!(
                epoch = epoch,
                train_loss = record.train.overall,
                val_loss = record.val.losses.overall;
                "epoch finished"
            );
            let row = self.stats_row(&record);
            self.reporter.row(&row)?;

            let val_loss = record.val.losses.overall;
            if config.best_model && Snapshot::improves(snapshot.as_ref(), val_loss) {
                debug!(epoch = epoch, loss = val_loss; "taking best model snapshot");
                snapshot = Some(Snapshot {
                    best: BestEpoch {
                        epoch,
                        loss: val_loss,
                    },
                    state: self.model.state_dict(),
                });
            }

            epochs.push(record);
        }

        let best = match (config.best_model, snapshot) {
            (true, Some(Snapshot { best, state })) => {
                self.model.load_state_dict(&state)?;

                let msg = format!(
                    "Epoch {} best model saved with loss of {}",
                    best.epoch, best.loss
                );
                info!("{msg}");
                self.reporter.message(&msg)?;
                Some(best)
            }
            (true, None) => {
                warn!("no epoch produced a comparable validation loss, keeping final weights");
                None
            }
            (false, _) => None,
        };

        Ok(FitSummary { epochs, best })
    }

    fn train_epoch(
        &mut self,
        config: &FitConfig,
        scheduler: &mut dyn LrScheduler,
        optimizer: &mut dyn Optimizer,
    ) -> Result<LossSummary> {
        let device = &config.device;
        self.model.set_mode(Mode::Train);

        let mut losses = LossAccumulator::new(&self.tasks);

        for batch in self.train.batches() {
            let fns = self.registry.get(&batch.task)?;
            let fwd = forward_batch(&mut self.model, &self.dispatch, batch, device)?;

            let loss = fns.loss.loss(fwd.output.view(), fwd.target.view())?;
            losses.add(&fwd.task, loss * fwd.rows as f32, fwd.rows)?;
            debug!(task = fwd.task.as_str(), rows = fwd.rows, loss = loss; "train batch");

            self.model.zero_grad();
            let d_output = fns.loss.loss_prime(fwd.output.view(), fwd.target.view())?;
            self.model.backward(&fwd.task, d_output.view())?;

            let (params, grads) = self.model.params_and_grads();
            optimizer.step(params, grads)?;

            if config.step_scheduler_on_batch {
                scheduler.step(optimizer);
            }
        }

        if !config.step_scheduler_on_batch {
            scheduler.step(optimizer);
        }

        Ok(losses.finish(&self.train)?)
    }

    /// Evaluates the model over the validation source.
    ///
    /// Per-batch losses are summed as they come, without weighting them by
    /// the batch's size, and then divided by the dataset sizes. Training
    /// losses are weighted by batch size instead.
    ///
    /// # Arguments
    /// * `device` - The device batches are placed on, it must be the model's.
    ///
    /// # Errors
    /// `NoValidationBatches` if some task received no batch, or any model,
    /// loss or accuracy failure.
    pub fn validate(&mut self, device: &Device) -> Result<Validation> {
        self.model.set_mode(Mode::Eval);

        let mut losses = LossAccumulator::new(&self.tasks);
        let mut buffer = PredictionBuffer::new(&self.tasks);

        for batch in self.val.batches() {
            let fns = self.registry.get(&batch.task)?;
            let fwd = forward_batch(&mut self.model, &self.dispatch, batch, device)?;

            let loss = fns.loss.loss(fwd.output.view(), fwd.target.view())?;
            losses.add(&fwd.task, loss, fwd.rows)?;
            buffer.push(&fwd.task, fwd.target.view(), fwd.output.view())?;
        }

        let predictions = buffer.finish()?;
        let losses = losses.finish(&self.val)?;

        let mut accuracy = BTreeMap::new();
        for (task, preds) in predictions {
            let fns = self.registry.get(&task)?;
            let (score, _) = fns.accuracy.accuracy(preds.y_true.view(), preds.y_pred.view())?;
            accuracy.insert(task, score);
        }

        Ok(Validation { losses, accuracy })
    }

    /// Collects the validation labels along with the post-processed
    /// predictions of every task.
    ///
    /// Rows follow the order in which the validation source yields each
    /// task's batches.
    ///
    /// # Errors
    /// `NoValidationBatches` if some task received no batch, or any model
    /// or accuracy failure.
    pub fn get_val_predictions(
        &mut self,
        device: &Device,
    ) -> Result<BTreeMap<String, Predictions>> {
        self.model.to_device(device);
        self.model.set_mode(Mode::Eval);

        let mut buffer = PredictionBuffer::new(&self.tasks);

        for batch in self.val.batches() {
            let fwd = forward_batch(&mut self.model, &self.dispatch, batch, device)?;
            buffer.push(&fwd.task, fwd.target.view(), fwd.output.view())?;
        }

        let mut predictions = buffer.finish()?;
        for (task, preds) in predictions.iter_mut() {
            let fns = self.registry.get(task)?;
            let (_, y_pred) = fns.accuracy.accuracy(preds.y_true.view(), preds.y_pred.view())?;
            preds.y_pred = y_pred;
        }

        Ok(predictions)
    }

    fn stats_row(&self, record: &EpochRecord) -> Vec<String> {
        let mut row = vec![
            format_stat(Some(record.train.overall)),
            format_stat(Some(record.val.losses.overall)),
        ];

        for task in self.tasks.names() {
            row.push(format_stat(record.train.per_task.get(task).copied()));
            row.push(format_stat(record.val.losses.per_task.get(task).copied()));
            row.push(
                record
                    .val
                    .accuracy
                    .get(task)
                    .map_or_else(|| format_stat(None), format_score),
            );
        }

        row.push(format_time(record.elapsed));
        row
    }
}
