use log::trace;
use nalgebra::DVector;

use crate::error::{Error, Result};
use crate::solvers::{check_initial_condition, check_initial_state, check_step_size};
use crate::tableau::{assemble_irk_solution, ButcherTableau, Scheme};
use crate::traits::{DynamicalSystem, InitialCondition, StepStatus, Stepper};

/// Runge-Kutta stepper for any explicit tableau.
#[derive(Debug)]
pub struct ExplicitRk<S> {
    model: S,
    tableau: ButcherTableau,
    x: DVector<f64>,
    stages: Vec<DVector<f64>>,
    scratch: Vec<DVector<f64>>,
    stage_x: DVector<f64>,
    t: f64,
    dt: f64,
    status: StepStatus,
}

impl<S: DynamicalSystem> ExplicitRk<S> {
    /// Fails with `StructuralViolation` unless `tableau` is explicit.
    pub fn new(model: S, tableau: ButcherTableau) -> Result<Self> {
        tableau.validate_erk()?;
        let dim = model.dimension();
        let x = model.initial_state();
        check_initial_state(dim, &x)?;
        let t = model.initial_time();
        let s = tableau.num_stages();
        Ok(Self {
            model,
            tableau,
            x,
            stages: vec![DVector::zeros(dim); s],
            scratch: vec![DVector::zeros(dim); s],
            stage_x: DVector::zeros(dim),
            t,
            dt: 0.0,
            status: StepStatus::Unknown,
        })
    }

    /// The classic fourth-order method.
    pub fn rk4(model: S) -> Result<Self> {
        Self::new(model, Scheme::Explicit4Stage.tableau())
    }

    pub fn tableau(&self) -> &ButcherTableau {
        &self.tableau
    }

    /// Stage derivatives `k_i` of the last step.
    pub fn stage_derivatives(&self) -> &[DVector<f64>] {
        &self.stages
    }

    pub fn model(&self) -> &S {
        &self.model
    }

    /// Size of the last successful step.
    pub fn last_step_size(&self) -> f64 {
        self.dt
    }
}

impl<S: DynamicalSystem> Stepper for ExplicitRk<S> {
    fn take_step(&mut self, dt: f64) -> Result<f64> {
        check_step_size(dt)?;
        let t0 = self.t;
        let a = self.tableau.a();
        let c = self.tableau.c();

        // Stage i only reads k_j for j < i. Stages land in `scratch` until the
        // whole step has succeeded.
        for i in 0..self.tableau.num_stages() {
            self.stage_x.copy_from(&self.x);
            for j in 0..i {
                let weight = a[(i, j)];
                if weight != 0.0 {
                    self.stage_x.axpy(dt * weight, &self.scratch[j], 1.0);
                }
            }
            if let Err(err) = self.model.apply(t0 + c[i] * dt, &self.stage_x, &mut self.scratch[i]) {
                self.status = StepStatus::Failed;
                return Err(Error::model(err));
            }
        }

        self.x = assemble_irk_solution(self.tableau.b(), dt, &self.x, &self.scratch)?;
        std::mem::swap(&mut self.stages, &mut self.scratch);
        self.t = t0 + dt;
        self.dt = dt;
        self.status = StepStatus::Converged;
        trace!("explicit RK step to t = {}", self.t);
        Ok(dt)
    }

    fn solution(&self) -> &DVector<f64> {
        &self.x
    }

    /// Derivative evaluated at the final stage.
    fn residual(&self) -> &DVector<f64> {
        &self.stages[self.stages.len() - 1]
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn order(&self) -> usize {
        self.tableau.order()
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
        for stage in &mut self.stages {
            stage.fill(0.0);
        }
        self.dt = 0.0;
        self.status = StepStatus::Unknown;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::test_models::{FailingSystem, LinearSystem, Oscillator};
    use approx::assert_relative_eq;

    /// dx/dt = t, failing once t passes `fail_after`.
    struct Ramp {
        fail_after: f64,
    }

    impl DynamicalSystem for Ramp {
        fn dimension(&self) -> usize {
            1
        }

        fn initial_state(&self) -> DVector<f64> {
            DVector::zeros(1)
        }

        fn apply(&self, t: f64, _x: &DVector<f64>, out: &mut DVector<f64>) -> anyhow::Result<()> {
            anyhow::ensure!(t <= self.fail_after, "ramp undefined past t = {}", self.fail_after);
            out[0] = t;
            Ok(())
        }
    }

    #[test]
    fn rejects_implicit_tableaus() {
        let err = ExplicitRk::new(
            LinearSystem { rate: -1.0, x0: 1.0 },
            Scheme::BackwardEuler.tableau(),
        )
        .expect_err("implicit tableau");
        assert!(matches!(err, Error::StructuralViolation { family: "ERK", .. }));
    }

    #[test]
    fn rk4_matches_its_stability_polynomial() {
        let (rate, dt) = (-2.0, 0.1);
        let mut stepper = ExplicitRk::rk4(LinearSystem { rate, x0: 1.0 }).expect("stepper");
        for _ in 0..10 {
            stepper.take_step(dt).expect("step");
        }
        let z: f64 = rate * dt;
        let amplification = 1.0 + z + z * z / 2.0 + z.powi(3) / 6.0 + z.powi(4) / 24.0;
        assert_relative_eq!(stepper.solution()[0], amplification.powi(10), epsilon = 1e-14);
        assert_eq!(stepper.order(), 4);
    }

    #[test]
    fn forward_euler_tableau_matches_the_map() {
        let mut stepper = ExplicitRk::new(
            LinearSystem { rate: -0.5, x0: 10.0 },
            Scheme::ForwardEuler.tableau(),
        )
        .expect("stepper");
        for _ in 0..10 {
            stepper.take_step(0.1).expect("step");
        }
        assert_relative_eq!(stepper.solution()[0], 10.0 * 0.95_f64.powi(10), epsilon = 1e-12);
    }

    #[test]
    fn explicit_schemes_converge_at_their_order() {
        let schemes = [
            Scheme::Explicit2Stage2ndOrderRunge,
            Scheme::Explicit3Stage3rdOrderHeun,
            Scheme::Explicit3Stage3rdOrder,
            Scheme::Explicit4Stage3rdOrderRunge,
            Scheme::Explicit38Rule,
        ];
        let exact = 1.0_f64.cos();
        for scheme in schemes {
            let error_at = |steps: usize| {
                let mut stepper = ExplicitRk::new(Oscillator, scheme.tableau()).expect("stepper");
                let dt = 1.0 / steps as f64;
                for _ in 0..steps {
                    stepper.take_step(dt).expect("step");
                }
                (stepper.solution()[0] - exact).abs()
            };
            let ratio = error_at(20) / error_at(40);
            let observed = ratio.log2();
            let expected = scheme.tableau().order() as f64;
            assert!(
                (observed - expected).abs() < 0.3,
                "{scheme}: observed order {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn failure_mid_stage_keeps_committed_state() {
        let mut stepper = ExplicitRk::rk4(FailingSystem { fail_after: 0.25 }).expect("stepper");
        stepper.take_step(0.2).expect("first step");
        let before = stepper.solution().clone();
        // The second stage is evaluated at t = 0.3.
        assert!(stepper.take_step(0.2).is_err());
        assert_eq!(stepper.solution(), &before);
        assert_relative_eq!(stepper.time(), 0.2);
        assert_eq!(stepper.step_status(), StepStatus::Failed);
    }

    #[test]
    fn failed_step_keeps_previous_stages() {
        let mut stepper = ExplicitRk::rk4(Ramp { fail_after: 0.25 }).expect("stepper");
        stepper.take_step(0.2).expect("first step");
        assert_eq!(stepper.last_step_size(), 0.2);
        let stages: Vec<f64> = stepper.stage_derivatives().iter().map(|k| k[0]).collect();
        assert_eq!(stages, vec![0.0, 0.1, 0.1, 0.2]);

        // Stage 0 succeeds at t = 0.2, stage 1 fails at t = 0.3.
        assert!(stepper.take_step(0.2).is_err());
        let after: Vec<f64> = stepper.stage_derivatives().iter().map(|k| k[0]).collect();
        assert_eq!(after, stages);
        assert_eq!(stepper.residual()[0], 0.2);
        assert_eq!(stepper.last_step_size(), 0.2);
        assert_relative_eq!(stepper.solution()[0], 0.02, epsilon = 1e-15);
    }
}
