mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;

pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;

use ml_core::{MlError, Result};

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlError::ShapeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
