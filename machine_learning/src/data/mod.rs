mod dataloader;
mod dataset;
mod multi;

pub use dataloader::DataLoader;
pub use dataset::InMemoryDataset;
pub use multi::{MultiDatasetLoader, SamplingPolicy};
