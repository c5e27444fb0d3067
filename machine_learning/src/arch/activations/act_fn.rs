use super::{Relu, Sigmoid};

/// An element-wise activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        ActFn::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        ActFn::Relu(Relu)
    }

    pub fn f(&self, z: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.f(z),
            ActFn::Relu(a) => a.f(z),
        }
    }

    pub fn df(&self, z: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.df(z),
            ActFn::Relu(a) => a.df(z),
        }
    }
}
