use std::{marker::PhantomData, ops::Range};

use log::debug;
use ndarray::ArrayView2;
use rand::Rng;

use super::{ModelInput, activations::ActFn, layers::Dense};
use ml_core::{Device, MlError, Mode, Model, Result, StateDict, TaskOutputs, Tensor};

/// A dense trunk shared by one dense head per task.
///
/// Every parameter lives in a single flat buffer laid out trunk first, then
/// heads in registration order. The gradient buffer mirrors that layout.
pub struct MultiHeadNet<I> {
    trunk: Vec<Dense>,
    heads: Vec<(String, Dense)>,
    trunk_ranges: Vec<Range<usize>>,
    head_ranges: Vec<Range<usize>>,
    params: Vec<f32>,
    grads: Vec<f32>,
    device: Device,
    mode: Mode,
    _input: PhantomData<fn(&I)>,
}

impl<I> MultiHeadNet<I> {
    /// Creates a new `MultiHeadNet` with randomly initialized weights and zero biases.
    ///
    /// # Arguments
    /// * `input_dim` - The width of the (concatenated) input.
    /// * `hidden` - The widths of the trunk's hidden layers, may be empty.
    /// * `act_fn` - The activation of every trunk layer.
    /// * `heads` - The task names along with their amount of outputs.
    /// * `rng` - The random number generator used for initialization.
    pub fn new<R: Rng>(
        input_dim: usize,
        hidden: &[usize],
        act_fn: ActFn,
        heads: &[(String, usize)],
        rng: &mut R,
    ) -> Self {
        let mut widths = Vec::with_capacity(hidden.len() + 1);
        widths.push(input_dim);
        widths.extend_from_slice(hidden);

        let trunk: Vec<Dense> = widths
            .windows(2)
            .map(|w| Dense::new((w[0], w[1]), Some(act_fn)))
            .collect();

        let trunk_out = *widths.last().unwrap_or(&input_dim);
        let heads: Vec<(String, Dense)> = heads
            .iter()
            .map(|(task, n)| (task.clone(), Dense::new((trunk_out, *n), None)))
            .collect();

        let mut offset = 0;
        let mut next_range = |size: usize| {
            let range = offset..offset + size;
            offset += size;
            range
        };

        let trunk_ranges: Vec<_> = trunk.iter().map(|l| next_range(l.size())).collect();
        let head_ranges: Vec<_> = heads.iter().map(|(_, l)| next_range(l.size())).collect();
        let size = offset;

        let mut params = vec![0.; size];
        let layers = trunk.iter().chain(heads.iter().map(|(_, l)| l));
        let ranges = trunk_ranges.iter().chain(head_ranges.iter());

        for (layer, range) in layers.zip(ranges) {
            let (n, m) = layer.dim();
            let limit = (6. / (n + m) as f32).sqrt();
            let weights = &mut params[range.start..range.start + n * m];
            weights
                .iter_mut()
                .for_each(|w| *w = rng.random_range(-limit..limit));
        }

        Self {
            trunk,
            heads,
            trunk_ranges,
            head_ranges,
            grads: vec![0.; size],
            params,
            device: Device::cpu(),
            mode: Mode::Train,
            _input: PhantomData,
        }
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grads(&self) -> &[f32] {
        &self.grads
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl<I: ModelInput> Model for MultiHeadNet<I> {
    type Input = I;

    fn to_device(&mut self, device: &Device) {
        if &self.device != device {
            debug!(device = device.name(); "moving model");
            self.device = device.clone();
        }
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, input: &I) -> Result<TaskOutputs> {
        let keep = self.mode == Mode::Train;
        let x = input.features(&self.device)?;

        let mut a = x.into_owned();
        for (layer, range) in self.trunk.iter_mut().zip(&self.trunk_ranges) {
            a = layer.forward(&self.params[range.clone()], a.view(), keep)?;
        }

        let mut outputs = TaskOutputs::new();
        for ((task, head), range) in self.heads.iter_mut().zip(&self.head_ranges) {
            let y = head.forward(&self.params[range.clone()], a.view(), keep)?;
            outputs.insert(task.clone(), Tensor::new(y).to(&self.device));
        }

        Ok(outputs)
    }

    fn backward(&mut self, task: &str, d_output: ArrayView2<f32>) -> Result<()> {
        if self.mode != Mode::Train {
            return Err(MlError::NotTraining);
        }

        let idx = self
            .heads
            .iter()
            .position(|(name, _)| name == task)
            .ok_or_else(|| MlError::UnknownTask(task.to_string()))?;

        let range = self.head_ranges[idx].clone();
        let (_, head) = &mut self.heads[idx];
        let mut d = head.backward(
            &self.params[range.clone()],
            &mut self.grads[range],
            d_output.to_owned(),
        )?;

        for (layer, range) in self.trunk.iter_mut().zip(&self.trunk_ranges).rev() {
            d = layer.backward(
                &self.params[range.clone()],
                &mut self.grads[range.clone()],
                d,
            )?;
        }

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
