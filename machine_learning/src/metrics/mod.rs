mod accuracy;

pub use accuracy::{ConfusionMatrix, MultiClassAccuracy, MultiLabelAccuracy, RoundedAccuracy};
