mod common;

use std::num::NonZeroUsize;

use machine_learning::{
    LossRegistry, TaskFunctions,
    arch::{MultiHeadNet, activations::ActFn},
    data::{MultiDatasetLoader, SamplingPolicy},
    loss::CrossEntropy,
    metrics::MultiClassAccuracy,
    optimization::GradientDescent,
    scheduling::ConstantLr,
};
use ml_core::Tensor;
use multitask::{FitConfig, MultiTaskLearner, SingleInput, TaskSet};

use common::{CountingScheduler, Log, Recording, RecordingReporter};

const BATCH: usize = 4;
const TRAIN_ROWS: usize = 40;
const VAL_ROWS: usize = 12;

type Learner = MultiTaskLearner<MultiHeadNet<Tensor>, SingleInput, MultiDatasetLoader<Tensor>>;

/// Two tasks with 10 training batches of 4 rows each and 3 validation batches.
fn cat_and_dog() -> (Learner, Log<f32>, Log<f32>) {
    let mut rng = common::rng();

    let train = common::source(
        vec![
            ("cat_breed", common::classification(TRAIN_ROWS, 4, 3, &mut rng)),
            ("dog_breed", common::classification(TRAIN_ROWS, 4, 2, &mut rng)),
        ],
        BATCH,
        SamplingPolicy::Shuffled { seed: 5 },
    );
    let val = common::source(
        vec![
            ("cat_breed", common::classification(VAL_ROWS, 4, 3, &mut rng)),
            ("dog_breed", common::classification(VAL_ROWS, 4, 2, &mut rng)),
        ],
        BATCH,
        SamplingPolicy::Sequential,
    );

    let (cat_loss, cat_log) = Recording::new(CrossEntropy);
    let (dog_loss, dog_log) = Recording::new(CrossEntropy);
    let mut registry = LossRegistry::new();
    registry.insert("cat_breed", TaskFunctions::new(cat_loss, MultiClassAccuracy));
    registry.insert("dog_breed", TaskFunctions::new(dog_loss, MultiClassAccuracy));

    let heads = [("cat_breed".to_string(), 3), ("dog_breed".to_string(), 2)];
    let model = MultiHeadNet::new(4, &[6], ActFn::relu(), &heads, &mut rng);
    let tasks = TaskSet::new([("cat_breed", 3), ("dog_breed", 2)]).unwrap();

    let learner = MultiTaskLearner::new(model, SingleInput, train, val, tasks, registry).unwrap();
    (learner, cat_log, dog_log)
}

fn epochs(n: usize) -> FitConfig {
    FitConfig::new(NonZeroUsize::new(n).unwrap())
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-5 * b.abs().max(1.0)
}

#[test]
fn task_train_loss_is_weighted_by_rows_over_dataset_size() {
    let (mut learner, cat_log, dog_log) = cat_and_dog();

    let summary = learner
        .fit(&epochs(1), &mut ConstantLr::new(), &mut GradientDescent::new(0.05))
        .unwrap();

    let cat = cat_log.borrow();
    let dog = dog_log.borrow();
    assert_eq!(cat.len(), 10 + 3);
    assert_eq!(dog.len(), 10 + 3);

    let cat_train: f32 = cat[..10].iter().sum();
    let dog_train: f32 = dog[..10].iter().sum();
    let train = &summary.epochs[0].train;

    assert!(close(
        train.task("cat_breed").unwrap(),
        cat_train * BATCH as f32 / TRAIN_ROWS as f32
    ));
    assert!(close(
        train.task("dog_breed").unwrap(),
        dog_train * BATCH as f32 / TRAIN_ROWS as f32
    ));
    assert!(close(
        train.overall,
        (cat_train + dog_train) * BATCH as f32 / (2 * TRAIN_ROWS) as f32
    ));
}

#[test]
fn validation_loss_sums_batch_means_without_row_weighting() {
    let (mut learner, cat_log, dog_log) = cat_and_dog();

    let summary = learner
        .fit(&epochs(1), &mut ConstantLr::new(), &mut GradientDescent::new(0.05))
        .unwrap();

    let cat_val: f32 = cat_log.borrow()[10..].iter().sum();
    let dog_val: f32 = dog_log.borrow()[10..].iter().sum();
    let val = &summary.epochs[0].val.losses;

    // Unlike training, validation batch losses are not scaled by their row count.
    assert!(close(val.task("cat_breed").unwrap(), cat_val / VAL_ROWS as f32));
    assert!(close(val.task("dog_breed").unwrap(), dog_val / VAL_ROWS as f32));
    assert!(close(val.overall, (cat_val + dog_val) / (2 * VAL_ROWS) as f32));
    assert!(!close(
        val.task("cat_breed").unwrap(),
        cat_val * BATCH as f32 / VAL_ROWS as f32
    ));
}

#[test]
fn scheduler_steps_once_per_batch_or_once_per_epoch() {
    let (mut learner, _, _) = cat_and_dog();
    let mut per_epoch = CountingScheduler::default();
    learner
        .fit(&epochs(2), &mut per_epoch, &mut GradientDescent::new(0.05))
        .unwrap();
    assert_eq!(per_epoch.steps, 2);

    let (mut learner, _, _) = cat_and_dog();
    let mut per_batch = CountingScheduler::default();
    let config = FitConfig {
        step_scheduler_on_batch: true,
        ..epochs(2)
    };
    learner
        .fit(&config, &mut per_batch, &mut GradientDescent::new(0.05))
        .unwrap();
    assert_eq!(per_batch.steps, 2 * 20);
}

#[test]
fn every_epoch_reports_a_row_per_header() {
    let (learner, _, _) = cat_and_dog();
    let reporter = RecordingReporter::default();
    let mut learner = learner.with_reporter(reporter.clone());

    let summary = learner
        .fit(&epochs(2), &mut ConstantLr::new(), &mut GradientDescent::new(0.05))
        .unwrap();

    let header = reporter.header.borrow();
    assert_eq!(
        *header,
        [
            "train_loss",
            "val_loss",
            "cat_breed_train_loss",
            "cat_breed_val_loss",
            "cat_breed_acc",
            "dog_breed_train_loss",
            "dog_breed_val_loss",
            "dog_breed_acc",
            "time",
        ]
    );

    let rows = reporter.rows.borrow();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.len() == header.len()));
    assert_eq!(rows[1][0], format!("{:.6}", summary.epochs[1].train.overall));
    assert!(reporter.messages.borrow().is_empty());
    assert_eq!(summary.best, None);
}
