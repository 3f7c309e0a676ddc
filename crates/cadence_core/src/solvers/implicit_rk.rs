use anyhow::{ensure, Result as AnyResult};
use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::newton::{NewtonSolver, NonlinearProblem, NonlinearSolver};
use crate::solvers::{check_initial_condition, check_initial_state, check_step_size};
use crate::tableau::{assemble_irk_solution, assemble_irk_state, ButcherTableau};
use crate::traits::{ImplicitSystem, InitialCondition, StepStatus, Stepper};

/// Coupled stage system in the stage derivatives `K = [k_0, .., k_{s-1}]`:
/// `F(k_i, x + dt * sum_j A_ij k_j, t + c_i dt) = 0` for every stage `i`.
struct StageProblem<'a, S> {
    model: &'a S,
    tableau: &'a ButcherTableau,
    x_base: &'a DVector<f64>,
    t: f64,
    dt: f64,
}

impl<S: ImplicitSystem> StageProblem<'_, S> {
    fn dim(&self) -> usize {
        self.x_base.len()
    }

    fn split(&self, stacked: &DVector<f64>) -> Vec<DVector<f64>> {
        let dim = self.dim();
        (0..self.tableau.num_stages())
            .map(|i| stacked.rows(i * dim, dim).into_owned())
            .collect()
    }

    fn stage_time(&self, i: usize) -> f64 {
        self.t + self.tableau.c()[i] * self.dt
    }
}

impl<S: ImplicitSystem> NonlinearProblem for StageProblem<'_, S> {
    fn dimension(&self) -> usize {
        self.tableau.num_stages() * self.dim()
    }

    fn residual(&mut self, stacked: &DVector<f64>, out: &mut DVector<f64>) -> AnyResult<()> {
        let dim = self.dim();
        let stages = self.split(stacked);
        let mut block = DVector::zeros(dim);
        for i in 0..stages.len() {
            let x_i = assemble_irk_state(i, self.tableau.a(), self.dt, self.x_base, &stages)?;
            self.model.residual(self.stage_time(i), &x_i, &stages[i], &mut block)?;
            out.rows_mut(i * dim, dim).copy_from(&block);
        }
        Ok(())
    }

    /// Block `(i, j)` is `delta_ij dF/dx_dot + dt A_ij dF/dx` at stage `i`.
    fn jacobian(&mut self, stacked: &DVector<f64>) -> AnyResult<DMatrix<f64>> {
        let dim = self.dim();
        let s = self.tableau.num_stages();
        let a = self.tableau.a();
        let stages = self.split(stacked);
        let mut jacobian = DMatrix::zeros(s * dim, s * dim);
        for i in 0..s {
            let x_i = assemble_irk_state(i, a, self.dt, self.x_base, &stages)?;
            for j in 0..s {
                let alpha = if i == j { 1.0 } else { 0.0 };
                let beta = self.dt * a[(i, j)];
                if alpha == 0.0 && beta == 0.0 {
                    continue;
                }
                let block = self
                    .model
                    .jacobian(self.stage_time(i), &x_i, &stages[i], alpha, beta)?;
                ensure!(
                    block.shape() == (dim, dim),
                    "model Jacobian has shape {:?}, expected ({dim}, {dim})",
                    block.shape()
                );
                jacobian
                    .view_mut((i * dim, j * dim), (dim, dim))
                    .copy_from(&block);
            }
        }
        Ok(jacobian)
    }
}

/// Runge-Kutta stepper for any non-empty tableau, solving all stages at once
/// with a nonlinear solver.
#[derive(Debug)]
pub struct ImplicitRk<S, N = NewtonSolver> {
    model: S,
    solver: N,
    tableau: ButcherTableau,
    x: DVector<f64>,
    stages: DVector<f64>,
    residual: DVector<f64>,
    t: f64,
    dt: f64,
    status: StepStatus,
}

impl<S: ImplicitSystem> ImplicitRk<S> {
    pub fn new(model: S, tableau: ButcherTableau) -> Result<Self> {
        Self::with_solver(model, tableau, NewtonSolver::default())
    }
}

impl<S: ImplicitSystem, N: NonlinearSolver> ImplicitRk<S, N> {
    /// Fails with `StructuralViolation` if `tableau` is empty.
    pub fn with_solver(model: S, tableau: ButcherTableau, solver: N) -> Result<Self> {
        tableau.validate_irk()?;
        let dim = model.dimension();
        let x = model.initial_state();
        check_initial_state(dim, &x)?;
        let t = model.initial_time();
        let len = tableau.num_stages() * dim;
        Ok(Self {
            model,
            solver,
            tableau,
            x,
            stages: DVector::zeros(len),
            residual: DVector::zeros(len),
            t,
            dt: 0.0,
            status: StepStatus::Unknown,
        })
    }

    pub fn tableau(&self) -> &ButcherTableau {
        &self.tableau
    }

    /// Stage derivative `k_i` of the last converged step.
    pub fn stage_derivative(&self, i: usize) -> Result<DVector<f64>> {
        let dim = self.x.len();
        if i >= self.tableau.num_stages() {
            return Err(Error::index("stage index", i, self.tableau.num_stages()));
        }
        Ok(self.stages.rows(i * dim, dim).into_owned())
    }

    pub fn model(&self) -> &S {
        &self.model
    }

    /// Size of the last successful step.
    pub fn last_step_size(&self) -> f64 {
        self.dt
    }
}

impl<S: ImplicitSystem, N: NonlinearSolver> Stepper for ImplicitRk<S, N> {
    fn take_step(&mut self, dt: f64) -> Result<f64> {
        check_step_size(dt)?;
        let mut problem = StageProblem {
            model: &self.model,
            tableau: &self.tableau,
            x_base: &self.x,
            t: self.t,
            dt,
        };

        // Warm start from the previous step's stage derivatives.
        let mut stacked = self.stages.clone();
        let status = match self.solver.solve(&mut problem, &mut stacked) {
            Ok(status) => status,
            Err(err) => {
                self.status = StepStatus::Failed;
                return Err(err);
            }
        };

        let mut residual = DVector::zeros(stacked.len());
        if let Err(err) = problem.residual(&stacked, &mut residual) {
            self.status = StepStatus::Failed;
            return Err(Error::model(err));
        }
        let stages = problem.split(&stacked);
        let x_new = assemble_irk_solution(self.tableau.b(), dt, &self.x, &stages)?;

        self.x = x_new;
        self.stages = stacked;
        self.residual = residual;
        self.t += dt;
        self.dt = dt;
        self.status = StepStatus::Converged;
        trace!(
            "implicit RK step to t = {} in {} Newton iterations",
            self.t,
            status.iterations
        );
        Ok(dt)
    }

    fn solution(&self) -> &DVector<f64> {
        &self.x
    }

    /// Stacked stage residual at the converged stage derivatives.
    fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn order(&self) -> usize {
        self.tableau.order()
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
        match &initial.x_dot {
            Some(x_dot) => {
                for i in 0..self.tableau.num_stages() {
                    self.stages.rows_mut(i * dim, dim).copy_from(x_dot);
                }
            }
            None => self.stages.fill(0.0),
        }
        self.x = initial.x;
        self.t = initial.time;
        self.residual.fill(0.0);
        self.dt = 0.0;
        self.status = StepStatus::Unknown;
        Ok(())
    }
}
