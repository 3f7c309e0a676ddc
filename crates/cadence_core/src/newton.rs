use anyhow::Result as AnyResult;
use log::trace;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, SolveFailure};

/// A square system `G(x) = 0` handed to a nonlinear solver.
pub trait NonlinearProblem {
    fn dimension(&self) -> usize;

    /// Evaluate G(x) and write into `out`.
    fn residual(&mut self, x: &DVector<f64>, out: &mut DVector<f64>) -> AnyResult<()>;

    /// Compute dG/dx at `x`.
    fn jacobian(&mut self, x: &DVector<f64>) -> AnyResult<DMatrix<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveStatus {
    pub iterations: usize,
    pub residual_norm: f64,
}

pub trait NonlinearSolver {
    /// Solves in place, starting from the current contents of `x`.
    fn solve(&self, problem: &mut dyn NonlinearProblem, x: &mut DVector<f64>) -> Result<SolveStatus>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
        }
    }
}

impl NewtonSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::InvalidSettings(
                "max_steps must be greater than zero.".into(),
            ));
        }
        if !(self.damping > 0.0) {
            return Err(Error::InvalidSettings("damping must be positive.".into()));
        }
        if !(self.tolerance > 0.0) {
            return Err(Error::InvalidSettings("tolerance must be positive.".into()));
        }
        Ok(())
    }
}

/// Damped Newton iteration with a dense LU solve per step, converged when
/// `‖G(x)‖ <= tolerance`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonSolver {
    pub settings: NewtonSettings,
}

impl NewtonSolver {
    pub fn new(settings: NewtonSettings) -> Self {
        Self { settings }
    }
}

impl NonlinearSolver for NewtonSolver {
    fn solve(&self, problem: &mut dyn NonlinearProblem, x: &mut DVector<f64>) -> Result<SolveStatus> {
        let settings = self.settings;
        settings.validate()?;
        let dim = problem.dimension();
        if x.len() != dim {
            return Err(Error::dimension("Newton initial guess", dim, x.len()));
        }

        let mut residual = DVector::zeros(dim);
        problem.residual(x, &mut residual).map_err(Error::model)?;
        let mut residual_norm = residual.norm();
        let mut iterations = 0usize;

        loop {
            if !residual_norm.is_finite() {
                return Err(Error::SolveDidNotConverge {
                    reason: SolveFailure::NonFiniteResidual,
                    iterations,
                    residual_norm,
                });
            }
            if residual_norm <= settings.tolerance {
                break;
            }
            if iterations >= settings.max_steps {
                return Err(Error::SolveDidNotConverge {
                    reason: SolveFailure::MaxIterations,
                    iterations,
                    residual_norm,
                });
            }

            let jacobian = problem.jacobian(x).map_err(Error::model)?;
            if jacobian.shape() != (dim, dim) {
                return Err(Error::dimension("Newton Jacobian rows", dim, jacobian.nrows()));
            }
            let delta = jacobian.lu().solve(&residual).ok_or(Error::SolveDidNotConverge {
                reason: SolveFailure::SingularJacobian,
                iterations,
                residual_norm,
            })?;

            x.axpy(-settings.damping, &delta, 1.0);
            iterations += 1;
            problem.residual(x, &mut residual).map_err(Error::model)?;
            residual_norm = residual.norm();
            trace!("Newton iteration {iterations}: ‖G(x)‖ = {residual_norm:e}");
        }

        Ok(SolveStatus {
            iterations,
            residual_norm,
        })
    }
}
