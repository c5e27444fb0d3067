#![allow(dead_code)]

use std::{cell::RefCell, collections::BTreeMap, io, num::NonZeroUsize, rc::Rc};

use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use machine_learning::data::{DataLoader, InMemoryDataset, MultiDatasetLoader, SamplingPolicy};
use ml_core::{
    Batch, BatchSource, Device, LossFn, LrScheduler, MlError, Mode, Model, Optimizer, Result,
    StateDict, TaskOutputs, Tensor,
};
use multitask::Reporter;

pub type Log<T> = Rc<RefCell<Vec<T>>>;

/// Wraps a loss and records every value it returns.
pub struct Recording<L> {
    inner: L,
    log: Log<f32>,
}

impl<L> Recording<L> {
    pub fn new(inner: L) -> (Self, Log<f32>) {
        let log = Log::default();
        let recording = Self {
            inner,
            log: log.clone(),
        };

        (recording, log)
    }
}

impl<L: LossFn> LossFn for Recording<L> {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        let loss = self.inner.loss(y_pred, y)?;
        self.log.borrow_mut().push(loss);
        Ok(loss)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.inner.loss_prime(y_pred, y)
    }
}

/// Uniform features with class indices in `0..classes` as targets.
pub fn classification(
    rows: usize,
    input_dim: usize,
    classes: usize,
    rng: &mut StdRng,
) -> InMemoryDataset<Tensor> {
    let x: Array2<f32> = Array2::from_shape_fn((rows, input_dim), |_| rng.random_range(-1.0..1.0));
    let y = Array2::from_shape_fn((rows, 1), |_| rng.random_range(0..classes) as f32);
    InMemoryDataset::new(Tensor::new(x), y).unwrap()
}

/// One-hot features whose target is the hot column.
pub fn one_hot(rows: usize, classes: usize) -> InMemoryDataset<Tensor> {
    let x = Array2::from_shape_fn((rows, classes), |(i, j)| (i % classes == j) as u8 as f32);
    let y = Array2::from_shape_fn((rows, 1), |(i, _)| (i % classes) as f32);
    InMemoryDataset::new(Tensor::new(x), y).unwrap()
}

/// Rows whose target is zero, for models that ignore their input.
pub fn zeros(rows: usize) -> InMemoryDataset<Tensor> {
    let x = Tensor::new(Array2::zeros((rows, 1)));
    InMemoryDataset::new(x, Array2::zeros((rows, 1))).unwrap()
}

pub fn source<I: ml_core::Rows>(
    datasets: Vec<(&str, InMemoryDataset<I>)>,
    batch_size: usize,
    policy: SamplingPolicy,
) -> MultiDatasetLoader<I> {
    let batch_size = NonZeroUsize::new(batch_size).unwrap();
    let loaders = datasets
        .into_iter()
        .map(|(task, ds)| (task.to_string(), DataLoader::new(ds, batch_size)))
        .collect();

    MultiDatasetLoader::new(loaders, policy).unwrap()
}

/// Replays the same batches on every pass.
pub struct VecSource {
    pub batches: Vec<Batch<Tensor>>,
    pub sizes: BTreeMap<String, usize>,
}

impl BatchSource for VecSource {
    type Input = Tensor;

    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch<Tensor>> + '_> {
        Box::new(self.batches.iter().cloned())
    }

    fn total_samples(&self) -> usize {
        self.sizes.values().sum()
    }

    fn dataset_len(&self, task: &str) -> Option<usize> {
        self.sizes.get(task).copied()
    }
}

/// Hands its input back untouched as every head's output.
pub struct IdentityModel {
    tasks: Vec<String>,
    device: Device,
    mode: Mode,
    params: Vec<f32>,
    grads: Vec<f32>,
}

impl IdentityModel {
    pub fn new(tasks: &[&str]) -> Self {
        Self {
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            device: Device::cpu(),
            mode: Mode::Train,
            params: Vec::new(),
            grads: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl Model for IdentityModel {
    type Input = Tensor;

    fn to_device(&mut self, device: &Device) {
        self.device = device.clone();
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, input: &Tensor) -> Result<TaskOutputs> {
        input.expect_device(&self.device)?;

        let mut outputs = TaskOutputs::new();
        for task in &self.tasks {
            outputs.insert(task.clone(), input.clone());
        }

        Ok(outputs)
    }

    fn backward(&mut self, _task: &str, _d_output: ArrayView2<f32>) -> Result<()> {
        Ok(())
    }

    fn zero_grad(&mut self) {}

    fn params_and_grads(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grads)
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new(self.params.clone())
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        state.copy_into(&mut self.params)
    }
}

/// Outputs its single parameter on every row of every head.
pub struct ScalarModel {
    tasks: Vec<String>,
    params: Vec<f32>,
    grads: Vec<f32>,
    device: Device,
    mode: Mode,
}

impl ScalarModel {
    pub fn new(tasks: &[&str], value: f32) -> Self {
        Self {
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            params: vec![value],
            grads: vec![0.],
            device: Device::cpu(),
            mode: Mode::Train,
        }
    }

    pub fn value(&self) -> f32 {
        self.params[0]
    }
}

impl Model for ScalarModel {
    type Input = Tensor;

    fn to_device(&mut self, device: &Device) {
        self.device = device.clone();
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, input: &Tensor) -> Result<TaskOutputs> {
        input.expect_device(&self.device)?;

        let mut outputs = TaskOutputs::new();
        for task in &self.tasks {
            let y = Array2::from_elem((input.nrows(), 1), self.params[0]);
            outputs.insert(task.clone(), Tensor::new(y).to(&self.device));
        }

        Ok(outputs)
    }

    fn backward(&mut self, _task: &str, d_output: ArrayView2<f32>) -> Result<()> {
        if self.mode != Mode::Train {
            return Err(MlError::NotTraining);
        }

        self.grads[0] += d_output.sum();
        Ok(())
    }

    fn zero_grad(&mut self) {
        self.grads.fill(0.);
    }

    fn params_and_grads(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grads)
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new(self.params.clone())
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        state.copy_into(&mut self.params)
    }
}

/// Overwrites the first parameter with the next scripted value on every step.
pub struct ScriptedOptimizer {
    script: Vec<f32>,
    next: usize,
}

impl ScriptedOptimizer {
    pub fn new(script: Vec<f32>) -> Self {
        Self { script, next: 0 }
    }
}

impl Optimizer for ScriptedOptimizer {
    fn step(&mut self, params: &mut [f32], _grad: &[f32]) -> Result<()> {
        let idx = self.next.min(self.script.len() - 1);
        params[0] = self.script[idx];
        self.next += 1;
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        0.
    }

    fn set_learning_rate(&mut self, _lr: f32) {}
}

/// Counts its steps without touching the learning rate.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    pub steps: usize,
}

impl LrScheduler for CountingScheduler {
    fn step(&mut self, _optimizer: &mut dyn Optimizer) {
        self.steps += 1;
    }
}

/// Records everything written to it.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub header: Log<String>,
    pub rows: Log<Vec<String>>,
    pub messages: Log<String>,
}

impl Reporter for RecordingReporter {
    fn header(&mut self, columns: &[String]) -> io::Result<()> {
        self.header.borrow_mut().extend_from_slice(columns);
        Ok(())
    }

    fn row(&mut self, cells: &[String]) -> io::Result<()> {
        self.rows.borrow_mut().push(cells.to_vec());
        Ok(())
    }

    fn message(&mut self, msg: &str) -> io::Result<()> {
        self.messages.borrow_mut().push(msg.to_string());
        Ok(())
    }
}

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}
