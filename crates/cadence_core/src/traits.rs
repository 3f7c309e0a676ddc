use anyhow::{ensure, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// A system in explicit form, `dx/dt = f(x, t)`.
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// State at `initial_time`.
    fn initial_state(&self) -> DVector<f64>;

    fn initial_time(&self) -> f64 {
        0.0
    }

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt
    fn apply(&self, t: f64, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()>;
}

impl<S: DynamicalSystem + ?Sized> DynamicalSystem for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn initial_state(&self) -> DVector<f64> {
        (**self).initial_state()
    }

    fn initial_time(&self) -> f64 {
        (**self).initial_time()
    }

    fn apply(&self, t: f64, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
        (**self).apply(t, x, out)
    }
}

/// A system in residual form, `F(x_dot, x, t) = 0`.
pub trait ImplicitSystem {
    fn dimension(&self) -> usize;

    fn initial_state(&self) -> DVector<f64>;

    fn initial_time(&self) -> f64 {
        0.0
    }

    /// Evaluate F(x_dot, x, t) into `out`.
    fn residual(
        &self,
        t: f64,
        x: &DVector<f64>,
        x_dot: &DVector<f64>,
        out: &mut DVector<f64>,
    ) -> Result<()>;

    /// Returns `alpha * dF/dx_dot + beta * dF/dx`.
    ///
    /// The default differentiates the residual with forward differences, one
    /// column per state component.
    fn jacobian(
        &self,
        t: f64,
        x: &DVector<f64>,
        x_dot: &DVector<f64>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>> {
        let dim = self.dimension();
        ensure!(
            x.len() == dim && x_dot.len() == dim,
            "Jacobian evaluation dimension mismatch. Expected {}, got x = {}, x_dot = {}.",
            dim,
            x.len(),
            x_dot.len()
        );

        let mut base = DVector::zeros(dim);
        self.residual(t, x, x_dot, &mut base)?;

        let mut jacobian = DMatrix::zeros(dim, dim);
        let mut perturbed = DVector::zeros(dim);
        let mut x_work = x.clone();
        let mut x_dot_work = x_dot.clone();

        for j in 0..dim {
            if alpha != 0.0 {
                let h = fd_step(x_dot[j]);
                x_dot_work[j] = x_dot[j] + h;
                self.residual(t, x, &x_dot_work, &mut perturbed)?;
                x_dot_work[j] = x_dot[j];
                for i in 0..dim {
                    jacobian[(i, j)] += alpha * (perturbed[i] - base[i]) / h;
                }
            }
            if beta != 0.0 {
                let h = fd_step(x[j]);
                x_work[j] = x[j] + h;
                self.residual(t, &x_work, x_dot, &mut perturbed)?;
                x_work[j] = x[j];
                for i in 0..dim {
                    jacobian[(i, j)] += beta * (perturbed[i] - base[i]) / h;
                }
            }
        }

        Ok(jacobian)
    }
}

impl<S: ImplicitSystem + ?Sized> ImplicitSystem for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn initial_state(&self) -> DVector<f64> {
        (**self).initial_state()
    }

    fn initial_time(&self) -> f64 {
        (**self).initial_time()
    }

    fn residual(
        &self,
        t: f64,
        x: &DVector<f64>,
        x_dot: &DVector<f64>,
        out: &mut DVector<f64>,
    ) -> Result<()> {
        (**self).residual(t, x, x_dot, out)
    }

    fn jacobian(
        &self,
        t: f64,
        x: &DVector<f64>,
        x_dot: &DVector<f64>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>> {
        (**self).jacobian(t, x, x_dot, alpha, beta)
    }
}

fn fd_step(value: f64) -> f64 {
    f64::EPSILON.sqrt() * value.abs().max(1.0)
}

/// Presents an explicit system as the residual `x_dot - f(x, t)`.
#[derive(Debug, Clone)]
pub struct ExplicitResidual<S> {
    system: S,
}

impl<S: DynamicalSystem> ExplicitResidual<S> {
    pub fn new(system: S) -> Self {
        Self { system }
    }

    pub fn inner(&self) -> &S {
        &self.system
    }

    pub fn into_inner(self) -> S {
        self.system
    }
}

impl<S: DynamicalSystem> ImplicitSystem for ExplicitResidual<S> {
    fn dimension(&self) -> usize {
        self.system.dimension()
    }

    fn initial_state(&self) -> DVector<f64> {
        self.system.initial_state()
    }

    fn initial_time(&self) -> f64 {
        self.system.initial_time()
    }

    fn residual(
        &self,
        t: f64,
        x: &DVector<f64>,
        x_dot: &DVector<f64>,
        out: &mut DVector<f64>,
    ) -> Result<()> {
        self.system.apply(t, x, out)?;
        for i in 0..out.len() {
            out[i] = x_dot[i] - out[i];
        }
        Ok(())
    }

    /// `dF/dx_dot` is the identity and `dF/dx = -J_f`.
    fn jacobian(
        &self,
        t: f64,
        x: &DVector<f64>,
        _x_dot: &DVector<f64>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>> {
        let dim = self.system.dimension();
        ensure!(
            x.len() == dim,
            "Jacobian evaluation dimension mismatch. Expected {}, got {}.",
            dim,
            x.len()
        );

        let mut jacobian = DMatrix::identity(dim, dim) * alpha;
        if beta == 0.0 {
            return Ok(jacobian);
        }

        let mut base = DVector::zeros(dim);
        self.system.apply(t, x, &mut base)?;
        let mut perturbed = DVector::zeros(dim);
        let mut x_work = x.clone();
        for j in 0..dim {
            let h = fd_step(x[j]);
            x_work[j] = x[j] + h;
            self.system.apply(t, &x_work, &mut perturbed)?;
            x_work[j] = x[j];
            for i in 0..dim {
                jacobian[(i, j)] -= beta * (perturbed[i] - base[i]) / h;
            }
        }
        Ok(jacobian)
    }
}

/// Returned by steppers that cannot choose their own step size.
pub const VARIABLE_STEP_UNSUPPORTED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepSizeType {
    Fixed,
    Variable,
}

/// Outcome of the most recent `take_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// No step has been attempted since the last (re)initialization.
    Unknown,
    Converged,
    Failed,
}

/// State to (re)seed a stepper with.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialCondition {
    pub time: f64,
    pub x: DVector<f64>,
    pub x_dot: Option<DVector<f64>>,
}

impl From<Snapshot> for InitialCondition {
    fn from(value: Snapshot) -> Self {
        Self {
            time: value.time,
            x: value.x,
            x_dot: value.x_dot,
        }
    }
}

/// A solver that advances a model one step at a time.
pub trait Stepper {
    /// Advances by `dt` and returns the step actually taken.
    /// On error the committed `(x, t)` are left untouched.
    fn take_step(&mut self, dt: f64) -> crate::Result<f64>;

    fn take_step_with(&mut self, dt: f64, kind: StepSizeType) -> crate::Result<f64> {
        match kind {
            StepSizeType::Fixed => self.take_step(dt),
            StepSizeType::Variable => Ok(VARIABLE_STEP_UNSUPPORTED),
        }
    }

    fn take_variable_step(&mut self) -> crate::Result<f64> {
        Ok(VARIABLE_STEP_UNSUPPORTED)
    }

    fn solution(&self) -> &DVector<f64>;

    /// Latest model evaluation; its meaning depends on the scheme.
    fn residual(&self) -> &DVector<f64>;

    fn solution_dot(&self) -> Option<&DVector<f64>> {
        None
    }

    fn time(&self) -> f64;

    fn order(&self) -> usize;

    fn is_implicit(&self) -> bool;

    fn step_status(&self) -> StepStatus;

    fn set_initial_condition(&mut self, initial: InitialCondition) -> crate::Result<()>;

    /// Current state as an owned snapshot.
    fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.time(),
            self.solution().clone(),
            self.solution_dot().cloned(),
            0.0,
        )
    }
}

/// Re-seeds a stepper from its own current state, clearing any history the
/// scheme keeps between steps.
pub fn restart<S: Stepper + ?Sized>(stepper: &mut S) -> crate::Result<()> {
    let initial = InitialCondition::from(stepper.snapshot());
    stepper.set_initial_condition(initial)
}
