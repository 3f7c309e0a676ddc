//! Interpolators evaluate a sorted node list at arbitrary query times.

pub mod cubic_spline;
pub mod linear;

use std::cmp::Ordering;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snapshot::{compare_time_values, is_sorted, Snapshot};

pub use cubic_spline::CubicSplineInterpolator;
pub use linear::LinearInterpolator;

pub trait Interpolator: Debug + Send + Sync {
    /// Evaluates `nodes` (sorted, unique times) at sorted `times`. Every
    /// query time must lie within the node span; exact node times return a
    /// copy of that node.
    fn interpolate(&self, nodes: &[Snapshot], times: &[f64]) -> Result<Vec<Snapshot>>;

    /// Polynomial order of the interpolant.
    fn order(&self) -> usize;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationKind {
    #[default]
    Linear,
    CubicSpline,
}

impl InterpolationKind {
    pub fn build(self) -> Box<dyn Interpolator> {
        match self {
            InterpolationKind::Linear => Box::new(LinearInterpolator),
            InterpolationKind::CubicSpline => Box::new(CubicSplineInterpolator),
        }
    }
}

/// Shared argument checks. Returns `false` when there is nothing to do.
pub(crate) fn check_query(nodes: &[Snapshot], times: &[f64]) -> Result<bool> {
    if times.is_empty() {
        return Ok(false);
    }
    if !is_sorted(times) {
        return Err(Error::UnsortedTimes);
    }
    let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
        return Err(Error::OutOfRange {
            what: "interpolation time",
            value: times[0],
            lower: f64::NAN,
            upper: f64::NAN,
        });
    };
    for &t in [times[0], times[times.len() - 1]].iter() {
        if compare_time_values(t, first.time) == Ordering::Less
            || compare_time_values(t, last.time) == Ordering::Greater
        {
            return Err(Error::OutOfRange {
                what: "interpolation time",
                value: t,
                lower: first.time,
                upper: last.time,
            });
        }
    }
    Ok(true)
}

/// Walks sorted `times` through consecutive node intervals once, calling
/// `blend(i, t)` for times strictly inside `[t_i, t_{i+1}]` and copying nodes
/// verbatim on exact matches.
pub(crate) fn sweep<F>(nodes: &[Snapshot], times: &[f64], mut blend: F) -> Result<Vec<Snapshot>>
where
    F: FnMut(usize, f64) -> Result<Snapshot>,
{
    if !check_query(nodes, times)? {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(times.len());
    if nodes.len() == 1 {
        // check_query already pinned every time to the single node.
        out.extend(times.iter().map(|_| nodes[0].clone()));
        return Ok(out);
    }

    let mut i = 0;
    for &t in times {
        while i + 2 < nodes.len() && compare_time_values(t, nodes[i + 1].time) == Ordering::Greater
        {
            i += 1;
        }
        let left = &nodes[i];
        let right = &nodes[i + 1];
        if compare_time_values(t, left.time) == Ordering::Equal {
            out.push(left.clone());
        } else if compare_time_values(t, right.time) == Ordering::Equal {
            out.push(right.clone());
        } else {
            out.push(blend(i, t)?);
        }
    }
    Ok(out)
}
