use anyhow::Result as AnyResult;
use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::newton::{NewtonSolver, NonlinearProblem, NonlinearSolver};
use crate::solvers::{check_initial_condition, check_initial_state, check_step_size};
use crate::traits::{ImplicitSystem, InitialCondition, StepStatus, Stepper};

/// `F((x - x_old) / dt, x, t_old + dt) = 0`, solved for `x`.
struct BackwardEulerProblem<'a, S> {
    model: &'a S,
    x_old: &'a DVector<f64>,
    t: f64,
    dt: f64,
}

impl<S: ImplicitSystem> BackwardEulerProblem<'_, S> {
    fn x_dot(&self, x: &DVector<f64>) -> DVector<f64> {
        (x - self.x_old) / self.dt
    }
}

impl<S: ImplicitSystem> NonlinearProblem for BackwardEulerProblem<'_, S> {
    fn dimension(&self) -> usize {
        self.model.dimension()
    }

    fn residual(&mut self, x: &DVector<f64>, out: &mut DVector<f64>) -> AnyResult<()> {
        let x_dot = self.x_dot(x);
        self.model.residual(self.t, x, &x_dot, out)
    }

    fn jacobian(&mut self, x: &DVector<f64>) -> AnyResult<DMatrix<f64>> {
        let x_dot = self.x_dot(x);
        self.model.jacobian(self.t, x, &x_dot, 1.0 / self.dt, 1.0)
    }
}

/// Implicit Euler stepper for models in residual form.
#[derive(Debug)]
pub struct BackwardEuler<S, N = NewtonSolver> {
    model: S,
    solver: N,
    x: DVector<f64>,
    x_dot: DVector<f64>,
    residual: DVector<f64>,
    t: f64,
    dt: f64,
    status: StepStatus,
}

impl<S: ImplicitSystem> BackwardEuler<S> {
    pub fn new(model: S) -> Result<Self> {
        Self::with_solver(model, NewtonSolver::default())
    }
}

impl<S: ImplicitSystem, N: NonlinearSolver> BackwardEuler<S, N> {
    pub fn with_solver(model: S, solver: N) -> Result<Self> {
        let dim = model.dimension();
        let x = model.initial_state();
        check_initial_state(dim, &x)?;
        let t = model.initial_time();
        Ok(Self {
            model,
            solver,
            x,
            x_dot: DVector::zeros(dim),
            residual: DVector::zeros(dim),
            t,
            dt: 0.0,
            status: StepStatus::Unknown,
        })
    }

    pub fn model(&self) -> &S {
        &self.model
    }

    pub fn solver(&self) -> &N {
        &self.solver
    }

    /// Size of the last successful step.
    pub fn last_step_size(&self) -> f64 {
        self.dt
    }
}

impl<S: ImplicitSystem, N: NonlinearSolver> Stepper for BackwardEuler<S, N> {
    fn take_step(&mut self, dt: f64) -> Result<f64> {
        check_step_size(dt)?;
        let mut problem = BackwardEulerProblem {
            model: &self.model,
            x_old: &self.x,
            t: self.t + dt,
            dt,
        };

        let mut x_new = self.x.clone();
        let status = match self.solver.solve(&mut problem, &mut x_new) {
            Ok(status) => status,
            Err(err) => {
                self.status = StepStatus::Failed;
                return Err(err);
            }
        };

        let mut residual = DVector::zeros(x_new.len());
        if let Err(err) = problem.residual(&x_new, &mut residual) {
            self.status = StepStatus::Failed;
            return Err(crate::Error::model(err));
        }
        self.x_dot = problem.x_dot(&x_new);
        self.residual = residual;
        self.x = x_new;
        self.t += dt;
        self.dt = dt;
        self.status = StepStatus::Converged;
        trace!(
            "backward Euler step to t = {} in {} Newton iterations",
            self.t,
            status.iterations
        );
        Ok(dt)
    }

    fn solution(&self) -> &DVector<f64> {
        &self.x
    }

    fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    fn solution_dot(&self) -> Option<&DVector<f64>> {
        Some(&self.x_dot)
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn order(&self) -> usize {
        1
    }

    fn is_implicit(&self) -> bool {
        true
    }

    fn step_status(&self) -> StepStatus {
        self.status
    }

    fn set_initial_condition(&mut self, initial: InitialCondition) -> Result<()> {
        let dim = self.model.dimension();
        check_initial_condition(dim, &initial)?;
        self.x = initial.x;
        self.x_dot = initial.x_dot.unwrap_or_else(|| DVector::zeros(dim));
        self.t = initial.time;
        self.residual.fill(0.0);
        self.dt = 0.0;
        self.status = StepStatus::Unknown;
        Ok(())
    }
}
