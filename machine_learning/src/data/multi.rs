use log::debug;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use ml_core::{Batch, BatchSource, MlError, Result, Rows};

use super::dataloader::DataLoader;

/// How the batches of different tasks are interleaved within a pass.
///
/// Batches of a single task always arrive in dataset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Every batch of the first task, then every batch of the second one, and so on.
    #[default]
    Sequential,
    /// A seeded shuffle of the task order. The seed is mixed with the pass
    /// counter, so every pass is reproducible yet differs from the last.
    Shuffled { seed: u64 },
}

/// Draws task-tagged batches from one `DataLoader` per task.
#[derive(Debug, Clone)]
pub struct MultiDatasetLoader<I> {
    loaders: Vec<(String, DataLoader<I>)>,
    policy: SamplingPolicy,
    pass: u64,
}

impl<I: Rows> MultiDatasetLoader<I> {
    /// Creates a new `MultiDatasetLoader`.
    ///
    /// # Arguments
    /// * `loaders` - One loader per task, in registration order.
    /// * `policy` - How tasks are interleaved.
    ///
    /// # Errors
    /// `InvalidInput` if a task name repeats.
    pub fn new(loaders: Vec<(String, DataLoader<I>)>, policy: SamplingPolicy) -> Result<Self> {
        for (i, (task, _)) in loaders.iter().enumerate() {
            if loaders[..i].iter().any(|(other, _)| other == task) {
                return Err(MlError::InvalidInput(format!("duplicate task {task}")));
            }
        }

        Ok(Self {
            loaders,
            policy,
            pass: 0,
        })
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    /// The loader index of every batch of the next pass, in arrival order.
    fn schedule(&self) -> Vec<usize> {
        let mut order: Vec<usize> = self
            .loaders
            .iter()
            .enumerate()
            .flat_map(|(i, (_, loader))| std::iter::repeat_n(i, loader.num_batches()))
            .collect();

        if let SamplingPolicy::Shuffled { seed } = self.policy {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(self.pass));
            order.shuffle(&mut rng);
        }

        order
    }
}

impl<I: Rows> BatchSource for MultiDatasetLoader<I> {
    type Input = I;

    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch<I>> + '_> {
        let order = self.schedule();
        debug!(pass = self.pass, batches = order.len(); "starting pass");

        self.pass += 1;
        self.loaders.iter_mut().for_each(|(_, l)| l.reset());

        let loaders = &mut self.loaders;
        Box::new(order.into_iter().filter_map(move |i| {
            let (task, loader) = &mut loaders[i];
            let (input, target) = loader.next_batch()?;
            Some(Batch::new(task.clone(), input, target))
        }))
    }

    fn total_samples(&self) -> usize {
        self.loaders.iter().map(|(_, l)| l.dataset().len()).sum()
    }

    fn dataset_len(&self, task: &str) -> Option<usize> {
        self.loaders
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, l)| l.dataset().len())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use ndarray::Array2;

    use super::*;
    use crate::data::InMemoryDataset;
    use ml_core::Tensor;

    fn loader(rows: usize, offset: f32) -> DataLoader<Tensor> {
        let x = Tensor::new(Array2::from_shape_fn((rows, 1), |(i, _)| i as f32 + offset));
        let y = Array2::zeros((rows, 1));
        let ds = InMemoryDataset::new(x, y).unwrap();
        DataLoader::new(ds, NonZeroUsize::new(2).unwrap())
    }

    fn multi(policy: SamplingPolicy) -> MultiDatasetLoader<Tensor> {
        let loaders = vec![
            ("cat_breed".to_string(), loader(6, 0.)),
            ("dog_breed".to_string(), loader(3, 100.)),
        ];
        MultiDatasetLoader::new(loaders, policy).unwrap()
    }

    fn tags(source: &mut MultiDatasetLoader<Tensor>) -> Vec<(String, f32)> {
        source
            .batches()
            .map(|b| (b.task, b.input.data()[[0, 0]]))
            .collect()
    }

    #[test]
    fn sequential_pass_visits_tasks_in_order() {
        let mut source = multi(SamplingPolicy::Sequential);

        let got = tags(&mut source);

        assert_eq!(got.len(), 5);
        assert!(got[..3].iter().all(|(t, _)| t == "cat_breed"));
        assert_eq!(got[3], ("dog_breed".to_string(), 100.));
        assert_eq!(source.total_samples(), 9);
        assert_eq!(source.dataset_len("dog_breed"), Some(3));
        assert_eq!(source.dataset_len("bird"), None);
    }

    #[test]
    fn shuffled_passes_keep_per_task_order() {
        let mut source = multi(SamplingPolicy::Shuffled { seed: 3 });

        for _ in 0..3 {
            let got = tags(&mut source);
            let cats: Vec<f32> = got
                .iter()
                .filter(|(t, _)| t == "cat_breed")
                .map(|(_, x)| *x)
                .collect();
            assert_eq!(cats, [0., 2., 4.]);
            assert_eq!(got.len(), 5);
        }
    }

    #[test]
    fn shuffled_passes_are_reproducible() {
        let mut a = multi(SamplingPolicy::Shuffled { seed: 11 });
        let mut b = multi(SamplingPolicy::Shuffled { seed: 11 });

        assert_eq!(tags(&mut a), tags(&mut b));
        assert_eq!(tags(&mut a), tags(&mut b));
    }

    #[test]
    fn duplicate_tasks_are_rejected() {
        let loaders = vec![
            ("cat_breed".to_string(), loader(2, 0.)),
            ("cat_breed".to_string(), loader(2, 0.)),
        ];
        assert!(MultiDatasetLoader::new(loaders, SamplingPolicy::Sequential).is_err());
    }
}
