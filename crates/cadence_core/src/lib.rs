pub mod buffer;
pub mod error;
pub mod integrator;
pub mod interpolation;
pub mod newton;
pub mod snapshot;
pub mod solvers;
pub mod tableau;
/// The `cadence_core` crate is the time-integration engine behind Cadence.
/// It advances models given in explicit (`dx/dt = f(x, t)`) or residual
/// (`F(x_dot, x, t) = 0`) form and keeps the resulting trajectory queryable.
///
/// Key components:
/// - **Traits**: `DynamicalSystem` and `ImplicitSystem` (models), `Stepper` (solvers).
/// - **Tableau**: Butcher tableaus, their classification, and the registry of named schemes.
/// - **Solvers**: Forward/backward Euler, explicit and implicit Runge-Kutta steppers.
/// - **Buffer**: Bounded interpolation buffers, with linear and cubic spline interpolators.
/// - **Integrator**: Steps on demand and answers time queries from a trailing buffer.
pub mod traits;

pub use error::{Error, Result};
