//! Natural cubic spline through all nodes (zero curvature at both ends).
//!
//! On interval `j` the spline is
//! `S_j(t) = a_j + b_j dt + c_j dt^2 + d_j dt^3` with `dt = t - t_j`,
//! solved component-wise with the tridiagonal sweep of Burden & Faires.

use nalgebra::DVector;

use crate::error::{Error, Result};
use crate::interpolation::{sweep, Interpolator};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, Default)]
pub struct CubicSplineInterpolator;

/// Per-interval spline coefficients; `a`, `b`, `c`, `d` have one entry per
/// interval and `t` one per node.
#[derive(Debug, Clone, Default)]
pub struct CubicSplineCoeff {
    pub t: Vec<f64>,
    pub a: Vec<DVector<f64>>,
    pub b: Vec<DVector<f64>>,
    pub c: Vec<DVector<f64>>,
    pub d: Vec<DVector<f64>>,
}

impl CubicSplineCoeff {
    pub fn intervals(&self) -> usize {
        self.a.len()
    }
}

pub fn compute_cubic_spline_coeff(nodes: &[Snapshot]) -> Result<CubicSplineCoeff> {
    if nodes.len() < 2 {
        return Err(Error::dimension("spline nodes (at least)", 2, nodes.len()));
    }
    let dim = nodes[0].dimension();
    if let Some(bad) = nodes.iter().find(|node| node.dimension() != dim) {
        return Err(Error::dimension("spline node state", dim, bad.dimension()));
    }

    let n = nodes.len() - 1;
    let t: Vec<f64> = nodes.iter().map(|node| node.time).collect();
    let h: Vec<f64> = t.windows(2).map(|w| w[1] - w[0]).collect();
    let a: Vec<DVector<f64>> = nodes.iter().map(|node| node.x.clone()).collect();

    let zero = DVector::zeros(dim);
    let mut mu = vec![0.0; n + 1];
    let mut z = vec![zero.clone(); n + 1];
    for i in 1..n {
        let alpha = (&a[i + 1] - &a[i]) * (3.0 / h[i]) - (&a[i] - &a[i - 1]) * (3.0 / h[i - 1]);
        let l = 2.0 * (t[i + 1] - t[i - 1]) - h[i - 1] * mu[i - 1];
        mu[i] = h[i] / l;
        z[i] = (alpha - &z[i - 1] * h[i - 1]) / l;
    }

    let mut c = vec![zero.clone(); n + 1];
    let mut b = vec![zero.clone(); n];
    let mut d = vec![zero; n];
    for j in (0..n).rev() {
        c[j] = &z[j] - &c[j + 1] * mu[j];
        b[j] = (&a[j + 1] - &a[j]) / h[j] - (&c[j + 1] + &c[j] * 2.0) * (h[j] / 3.0);
        d[j] = (&c[j + 1] - &c[j]) / (3.0 * h[j]);
    }
    c.truncate(n);

    let mut a = a;
    a.truncate(n);
    Ok(CubicSplineCoeff { t, a, b, c, d })
}

/// Evaluates interval `j` of the spline at `time`; the returned snapshot
/// carries the spline derivative and the interval width as accuracy.
pub fn evaluate_cubic_spline(coeff: &CubicSplineCoeff, j: usize, time: f64) -> Result<Snapshot> {
    let n = coeff.intervals();
    if coeff.b.len() != n || coeff.c.len() != n || coeff.d.len() != n {
        return Err(Error::dimension("spline coefficient arrays", n, coeff.b.len()));
    }
    if coeff.t.len() != n + 1 {
        return Err(Error::dimension("spline node times", n + 1, coeff.t.len()));
    }
    if j >= n {
        return Err(Error::index("spline interval", j, n));
    }

    let dt = time - coeff.t[j];
    let (a, b, c, d) = (&coeff.a[j], &coeff.b[j], &coeff.c[j], &coeff.d[j]);
    let x = a + b * dt + c * (dt * dt) + d * (dt * dt * dt);
    let x_dot = b + c * (2.0 * dt) + d * (3.0 * dt * dt);
    Ok(Snapshot::new(time, x, Some(x_dot), coeff.t[j + 1] - coeff.t[j]))
}

impl Interpolator for CubicSplineInterpolator {
    fn interpolate(&self, nodes: &[Snapshot], times: &[f64]) -> Result<Vec<Snapshot>> {
        let mut coeff: Option<CubicSplineCoeff> = None;
        sweep(nodes, times, |i, t| {
            if coeff.is_none() {
                coeff = Some(compute_cubic_spline_coeff(nodes)?);
            }
            match coeff.as_ref() {
                Some(coeff) => evaluate_cubic_spline(coeff, i, t),
                None => Err(Error::dimension("spline nodes (at least)", 2, nodes.len())),
            }
        })
    }

    fn order(&self) -> usize {
        3
    }

    fn name(&self) -> &'static str {
        "natural cubic spline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hat() -> Vec<Snapshot> {
        [(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]
            .iter()
            .map(|&(t, v)| Snapshot::new(t, DVector::from_element(1, v), None, 0.0))
            .collect()
    }

    #[test]
    fn coefficients_for_hat_function() {
        let coeff = compute_cubic_spline_coeff(&hat()).expect("coefficients");
        assert_eq!(coeff.intervals(), 2);
        let expected = [(0.0, 1.5, 0.0, -0.5), (1.0, 0.0, -1.5, 0.5)];
        for (j, (a, b, c, d)) in expected.iter().enumerate() {
            assert_relative_eq!(coeff.a[j][0], *a, epsilon = 1e-12);
            assert_relative_eq!(coeff.b[j][0], *b, epsilon = 1e-12);
            assert_relative_eq!(coeff.c[j][0], *c, epsilon = 1e-12);
            assert_relative_eq!(coeff.d[j][0], *d, epsilon = 1e-12);
        }
    }

    #[test]
    fn interpolates_between_and_at_nodes() {
        let nodes = hat();
        let out = CubicSplineInterpolator
            .interpolate(&nodes, &[0.5, 1.0, 1.5])
            .expect("interpolate");
        // S_0(0.5) = 1.5 * 0.5 - 0.5 * 0.125
        assert_relative_eq!(out[0].x[0], 0.6875, epsilon = 1e-12);
        assert_eq!(out[1].x, nodes[1].x);
        assert!(out[1].x_dot.is_none());
        assert_relative_eq!(out[2].x[0], 0.6875, epsilon = 1e-12);
        assert_relative_eq!(out[0].accuracy, 1.0);
    }

    #[test]
    fn two_nodes_reduce_to_a_line() {
        let nodes = vec![
            Snapshot::new(0.0, DVector::from_element(1, 1.0), None, 0.0),
            Snapshot::new(2.0, DVector::from_element(1, 5.0), None, 0.0),
        ];
        let out = CubicSplineInterpolator
            .interpolate(&nodes, &[0.5])
            .expect("interpolate");
        assert_relative_eq!(out[0].x[0], 2.0, epsilon = 1e-12);
        let slope = out[0].x_dot.as_ref().expect("spline derivative");
        assert_relative_eq!(slope[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn evaluation_checks_interval_index() {
        let coeff = compute_cubic_spline_coeff(&hat()).expect("coefficients");
        assert!(matches!(
            evaluate_cubic_spline(&coeff, 2, 1.5),
            Err(Error::OutOfRange { .. })
        ));
        let mut broken = coeff.clone();
        broken.d.pop();
        assert!(matches!(
            evaluate_cubic_spline(&broken, 0, 0.5),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn coefficient_construction_needs_two_consistent_nodes() {
        let mut nodes = hat();
        assert!(compute_cubic_spline_coeff(&nodes[..1]).is_err());
        nodes[2].x = DVector::zeros(2);
        assert!(matches!(
            compute_cubic_spline_coeff(&nodes),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
