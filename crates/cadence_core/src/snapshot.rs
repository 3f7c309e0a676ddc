//! Time-stamped samples of a trajectory.

use std::cmp::Ordering;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Exact ordering on time values; the only notion of "same time" in the crate.
pub fn compare_time_values(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

pub fn same_time(a: f64, b: f64) -> bool {
    compare_time_values(a, b) == Ordering::Equal
}

pub(crate) fn is_sorted(times: &[f64]) -> bool {
    times
        .windows(2)
        .all(|w| compare_time_values(w[0], w[1]) != Ordering::Greater)
}

/// One node of a trajectory: state, optional derivative and an accuracy
/// estimate at a single time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub x: DVector<f64>,
    #[serde(default)]
    pub x_dot: Option<DVector<f64>>,
    #[serde(default)]
    pub accuracy: f64,
}

impl Snapshot {
    pub fn new(time: f64, x: DVector<f64>, x_dot: Option<DVector<f64>>, accuracy: f64) -> Self {
        Self {
            time,
            x,
            x_dot,
            accuracy,
        }
    }

    pub fn dimension(&self) -> usize {
        self.x.len()
    }
}

// Snapshots are ordered and compared by time alone.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        same_time(self.time, other.time)
    }
}

impl Eq for Snapshot {}

impl PartialOrd for Snapshot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Snapshot {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_time_values(self.time, other.time)
    }
}

/// Parallel arrays view of a list of snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatPoints {
    pub times: Vec<f64>,
    pub x: Vec<DVector<f64>>,
    pub x_dot: Vec<Option<DVector<f64>>>,
    pub accuracy: Vec<f64>,
}

impl FlatPoints {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

pub fn to_flat(snapshots: &[Snapshot]) -> FlatPoints {
    let mut flat = FlatPoints::default();
    for snapshot in snapshots {
        flat.times.push(snapshot.time);
        flat.x.push(snapshot.x.clone());
        flat.x_dot.push(snapshot.x_dot.clone());
        flat.accuracy.push(snapshot.accuracy);
    }
    flat
}

/// Zips parallel arrays into snapshots. `x_dot` and `accuracy` may be empty,
/// meaning "absent" and "zero" respectively.
pub fn from_flat(
    times: &[f64],
    x: &[DVector<f64>],
    x_dot: &[Option<DVector<f64>>],
    accuracy: &[f64],
) -> Result<Vec<Snapshot>> {
    let n = times.len();
    if x.len() != n {
        return Err(Error::dimension("state list", n, x.len()));
    }
    if !x_dot.is_empty() && x_dot.len() != n {
        return Err(Error::dimension("derivative list", n, x_dot.len()));
    }
    if !accuracy.is_empty() && accuracy.len() != n {
        return Err(Error::dimension("accuracy list", n, accuracy.len()));
    }

    Ok((0..n)
        .map(|i| {
            Snapshot::new(
                times[i],
                x[i].clone(),
                x_dot.get(i).cloned().flatten(),
                accuracy.get(i).copied().unwrap_or(0.0),
            )
        })
        .collect())
}

/// Closed interval of time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub lower: f64,
    pub upper: f64,
}

impl TimeRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn is_valid(&self) -> bool {
        compare_time_values(self.lower, self.upper) != Ordering::Greater
    }

    pub fn contains(&self, time: f64) -> bool {
        compare_time_values(time, self.lower) != Ordering::Less
            && compare_time_values(time, self.upper) != Ordering::Greater
    }

    pub fn contains_range(&self, other: &TimeRange) -> bool {
        self.contains(other.lower) && self.contains(other.upper)
    }

    pub fn length(&self) -> f64 {
        self.upper - self.lower
    }
}
