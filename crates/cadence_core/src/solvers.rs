//! Fixed-step time steppers.
//!
//! Every stepper owns its model and its committed `(x, t)`, and only
//! overwrites them once a step has fully succeeded.

pub mod backward_euler;
pub mod explicit_rk;
pub mod forward_euler;
pub mod implicit_rk;

use nalgebra::DVector;

use crate::error::{Error, Result};
use crate::traits::InitialCondition;

pub use backward_euler::BackwardEuler;
pub use explicit_rk::ExplicitRk;
pub use forward_euler::ForwardEuler;
pub use implicit_rk::ImplicitRk;

pub(crate) fn check_step_size(dt: f64) -> Result<()> {
    if dt > 0.0 && dt.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidStepSize(dt))
    }
}

pub(crate) fn check_initial_state(dim: usize, x: &DVector<f64>) -> Result<()> {
    if x.len() != dim {
        return Err(Error::dimension("initial state", dim, x.len()));
    }
    Ok(())
}

pub(crate) fn check_initial_condition(dim: usize, initial: &InitialCondition) -> Result<()> {
    check_initial_state(dim, &initial.x)?;
    if let Some(x_dot) = &initial.x_dot {
        if x_dot.len() != dim {
            return Err(Error::dimension("initial derivative", dim, x_dot.len()));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_models {
    use anyhow::{bail, Result};
    use nalgebra::{DMatrix, DVector};

    use crate::traits::{DynamicalSystem, ImplicitSystem};

    /// F = x_dot - rate * x, with its exact Jacobian.
    #[derive(Debug, Clone, Copy)]
    pub struct LinearResidual {
        pub rate: f64,
        pub x0: f64,
    }

    impl ImplicitSystem for LinearResidual {
        fn dimension(&self) -> usize {
            1
        }

        fn initial_state(&self) -> DVector<f64> {
            DVector::from_element(1, self.x0)
        }

        fn residual(
            &self,
            _t: f64,
            x: &DVector<f64>,
            x_dot: &DVector<f64>,
            out: &mut DVector<f64>,
        ) -> Result<()> {
            out[0] = x_dot[0] - self.rate * x[0];
            Ok(())
        }

        fn jacobian(
            &self,
            _t: f64,
            _x: &DVector<f64>,
            _x_dot: &DVector<f64>,
            alpha: f64,
            beta: f64,
        ) -> Result<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, alpha - beta * self.rate))
        }
    }

    /// dx/dt = rate * x
    #[derive(Debug, Clone, Copy)]
    pub struct LinearSystem {
        pub rate: f64,
        pub x0: f64,
    }

    impl DynamicalSystem for LinearSystem {
        fn dimension(&self) -> usize {
            1
        }

        fn initial_state(&self) -> DVector<f64> {
            DVector::from_element(1, self.x0)
        }

        fn apply(&self, _t: f64, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            out[0] = self.rate * x[0];
            Ok(())
        }
    }

    /// dx/dt = 1, failing once t passes `fail_after`.
    #[derive(Debug, Clone, Copy)]
    pub struct FailingSystem {
        pub fail_after: f64,
    }

    impl DynamicalSystem for FailingSystem {
        fn dimension(&self) -> usize {
            1
        }

        fn initial_state(&self) -> DVector<f64> {
            DVector::zeros(1)
        }

        fn apply(&self, t: f64, _x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            if t > self.fail_after {
                bail!("evaluation past t = {}", self.fail_after);
            }
            out[0] = 1.0;
            Ok(())
        }
    }

    /// Harmonic oscillator x'' = -x written as a first-order system.
    #[derive(Debug, Clone, Copy)]
    pub struct Oscillator;

    impl DynamicalSystem for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn initial_state(&self) -> DVector<f64> {
            DVector::from_vec(vec![1.0, 0.0])
        }

        fn apply(&self, _t: f64, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            out[0] = x[1];
            out[1] = -x[0];
            Ok(())
        }
    }
}
