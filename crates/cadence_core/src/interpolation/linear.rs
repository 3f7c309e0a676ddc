use crate::error::Result;
use crate::interpolation::{sweep, Interpolator};
use crate::snapshot::Snapshot;

/// Piecewise linear interpolation between neighbouring nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl Interpolator for LinearInterpolator {
    fn interpolate(&self, nodes: &[Snapshot], times: &[f64]) -> Result<Vec<Snapshot>> {
        sweep(nodes, times, |i, t| {
            let left = &nodes[i];
            let right = &nodes[i + 1];
            let h = right.time - left.time;
            let frac = (t - left.time) / h;

            let x = &right.x * frac + &left.x * (1.0 - frac);
            let x_dot = match (&left.x_dot, &right.x_dot) {
                (Some(l), Some(r)) => Some(r * frac + l * (1.0 - frac)),
                _ => None,
            };
            Ok(Snapshot::new(t, x, x_dot, h))
        })
    }

    fn order(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
