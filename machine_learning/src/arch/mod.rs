pub mod activations;
mod input;
pub mod layers;
mod multi_head;

pub use input::ModelInput;
pub use multi_head::MultiHeadNet;
