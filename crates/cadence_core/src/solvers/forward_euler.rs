use log::trace;
use nalgebra::DVector;

use crate::error::{Error, Result};
use crate::solvers::{check_initial_condition, check_initial_state, check_step_size};
use crate::traits::{DynamicalSystem, InitialCondition, StepStatus, Stepper};

/// Explicit Euler stepper.
///
/// The vector field is sampled at the end of the step, `f(x_n, t_n + dt)`.
/// For autonomous models this is the textbook method.
#[derive(Debug)]
pub struct ForwardEuler<S> {
    model: S,
    x: DVector<f64>,
    residual: DVector<f64>,
    t: f64,
    dt: f64,
    status: StepStatus,
}

impl<S: DynamicalSystem> ForwardEuler<S> {
    pub fn new(model: S) -> Result<Self> {
        let dim = model.dimension();
        let x = model.initial_state();
        check_initial_state(dim, &x)?;
        let t = model.initial_time();
        Ok(Self {
            model,
            x,
            residual: DVector::zeros(dim),
            t,
            dt: 0.0,
            status: StepStatus::Unknown,
        })
    }

    pub fn model(&self) -> &S {
        &self.model
    }

    /// Size of the last successful step.
    pub fn last_step_size(&self) -> f64 {
        self.dt
    }
}

impl<S: DynamicalSystem> Stepper for ForwardEuler<S> {
    fn take_step(&mut self, dt: f64) -> Result<f64> {
        check_step_size(dt)?;

        let mut f = DVector::zeros(self.x.len());
        if let Err(err) = self.model.apply(self.t + dt, &self.x, &mut f) {
            self.status = StepStatus::Failed;
            return Err(Error::model(err));
        }

        self.x.axpy(dt, &f, 1.0);
        self.residual = f;
        self.t += dt;
        self.dt = dt;
        self.status = StepStatus::Converged;
        trace!("forward Euler step to t = {}", self.t);
        Ok(dt)
    }

    fn solution(&self) -> &DVector<f64> {
        &self.x
    }

    fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn order(&self) -> usize {
        1
    }

    fn is_implicit(&self) -> bool {
        false
    }

    fn step_status(&self) -> StepStatus {
        self.status
    }

    fn set_initial_condition(&mut self, initial: InitialCondition) -> Result<()> {
        check_initial_condition(self.model.dimension(), &initial)?;
        self.x = initial.x;
        self.t = initial.time;
        self.residual.fill(0.0);
        self.dt = 0.0;
        self.status = StepStatus::Unknown;
        Ok(())
    }
}
