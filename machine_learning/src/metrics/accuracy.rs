use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};

use ml_core::{AccuracyFn, MlError, Result, Score};

fn check_scored(y_true: ArrayView2<f32>, y_raw_pred: ArrayView2<f32>) -> Result<()> {
    if y_raw_pred.nrows() == 0 {
        return Err(MlError::InvalidInput("no predictions to score".into()));
    }

    if y_true.nrows() != y_raw_pred.nrows() {
        return Err(MlError::ShapeMismatch {
            what: "scored rows",
            got: y_true.nrows(),
            expected: y_raw_pred.nrows(),
        });
    }

    Ok(())
}

fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

fn argmax_column(y_raw_pred: ArrayView2<f32>) -> Array2<f32> {
    let classes: Vec<f32> = y_raw_pred
        .axis_iter(Axis(0))
        .map(|row| argmax(row) as f32)
        .collect();

    let n = classes.len();
    Array2::from_shape_vec((n, 1), classes).unwrap_or_else(|_| Array2::zeros((n, 1)))
}

/// Fraction of rows where `y_pred` equals `y_true` in every column.
fn exact_match_rate(y_true: ArrayView2<f32>, y_pred: ArrayView2<f32>) -> f32 {
    let hits = y_true
        .axis_iter(Axis(0))
        .zip(y_pred.axis_iter(Axis(0)))
        .filter(|(t, p)| t == p)
        .count();

    hits as f32 / y_true.nrows() as f32
}

/// Accuracy of a multi-class head: the predicted class is the arg max of the logits.
///
/// The post-processed predictions hold one class index per row.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiClassAccuracy;

impl AccuracyFn for MultiClassAccuracy {
    fn accuracy(
        &self,
        y_true: ArrayView2<f32>,
        y_raw_pred: ArrayView2<f32>,
    ) -> Result<(Score, Array2<f32>)> {
        check_scored(y_true, y_raw_pred)?;

        let y_pred = argmax_column(y_raw_pred);
        let acc = exact_match_rate(y_true, y_pred.view());
        Ok((Score::Scalar(acc), y_pred))
    }
}

/// Subset accuracy of a multi-label head: a label is on when its logit is
/// positive (sigmoid above one half) and a row counts only if every label matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiLabelAccuracy;

impl AccuracyFn for MultiLabelAccuracy {
    fn accuracy(
        &self,
        y_true: ArrayView2<f32>,
        y_raw_pred: ArrayView2<f32>,
    ) -> Result<(Score, Array2<f32>)> {
        check_scored(y_true, y_raw_pred)?;

        let y_pred = y_raw_pred.mapv(|z| if z > 0. { 1. } else { 0. });
        let acc = exact_match_rate(y_true, y_pred.view());
        Ok((Score::Scalar(acc), y_pred))
    }
}

/// Exact-match accuracy after rounding every output, for regression-like heads.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundedAccuracy;

impl AccuracyFn for RoundedAccuracy {
    fn accuracy(
        &self,
        y_true: ArrayView2<f32>,
        y_raw_pred: ArrayView2<f32>,
    ) -> Result<(Score, Array2<f32>)> {
        check_scored(y_true, y_raw_pred)?;

        let y_pred = y_raw_pred.mapv(f32::round);
        let y_true = y_true.mapv(f32::round);
        let acc = exact_match_rate(y_true.view(), y_pred.view());
        Ok((Score::Scalar(acc), y_pred))
    }
}

/// Confusion matrix of a multi-class head, rows are true classes and columns
/// predicted ones.
#[derive(Debug, Clone, Copy)]
pub struct ConfusionMatrix {
    classes: usize,
}

impl ConfusionMatrix {
    pub fn new(classes: usize) -> Self {
        Self { classes }
    }
}

impl AccuracyFn for ConfusionMatrix {
    fn accuracy(
        &self,
        y_true: ArrayView2<f32>,
        y_raw_pred: ArrayView2<f32>,
    ) -> Result<(Score, Array2<f32>)> {
        check_scored(y_true, y_raw_pred)?;

        let y_pred = argmax_column(y_raw_pred);
        let mut matrix = Array2::zeros((self.classes, self.classes));
        let mut out_of_range = None;

        Zip::from(y_true.column(0))
            .and(y_pred.column(0))
            .for_each(|&t, &p| {
                let (t, p) = (t as usize, p as usize);
                if t < self.classes && p < self.classes {
                    matrix[[t, p]] += 1.;
                } else {
                    out_of_range = Some(t.max(p));
                }
            });

        if let Some(class) = out_of_range {
            return Err(MlError::InvalidInput(format!(
                "class {class} is outside the {} class confusion matrix",
                self.classes
            )));
        }

        Ok((Score::Matrix(matrix), y_pred))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn all_correct_multi_class_predictions_score_one() {
        let y_true = array![[0.], [2.], [1.]];
        let y_raw = array![[5., 1., 0.], [0., 1., 3.], [0., 2., 1.]];

        let (score, y_pred) = MultiClassAccuracy
            .accuracy(y_true.view(), y_raw.view())
            .unwrap();

        assert_eq!(score, Score::Scalar(1.0));
        assert_eq!(y_pred, y_true);
    }

    #[test]
    fn multi_label_uses_subset_accuracy() {
        let y_true = array![[1., 0.], [1., 1.]];
        let y_raw = array![[2., -1.], [3., -4.]];

        let (score, y_pred) = MultiLabelAccuracy
            .accuracy(y_true.view(), y_raw.view())
            .unwrap();

        assert_eq!(score, Score::Scalar(0.5));
        assert_eq!(y_pred, array![[1., 0.], [1., 0.]]);
    }

    #[test]
    fn empty_buffers_are_rejected() {
        let empty = Array2::<f32>::zeros((0, 2));
        assert!(
            MultiClassAccuracy
                .accuracy(empty.view(), empty.view())
                .is_err()
        );
    }

    #[test]
    fn confusion_matrix_counts_pairs() {
        let y_true = array![[0.], [1.], [1.]];
        let y_raw = array![[1., 0.], [1., 0.], [0., 1.]];

        let (score, _) = ConfusionMatrix::new(2)
            .accuracy(y_true.view(), y_raw.view())
            .unwrap();

        assert_eq!(score, Score::Matrix(array![[1., 0.], [1., 1.]]));
        assert_eq!(score.as_scalar(), None);
    }
}
