//! Bounded, time-ordered trajectory storage with interpolated queries.

pub mod appender;

use log::{debug, trace, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::interpolation::{InterpolationKind, Interpolator, LinearInterpolator};
use crate::snapshot::{compare_time_values, from_flat, to_flat, FlatPoints, Snapshot, TimeRange};

pub use appender::{Appender, PointwiseAppender, SmartAppender};

/// Smallest storage limit a buffer accepts; interpolation needs an interval.
pub const MIN_STORAGE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferSettings {
    pub storage_limit: usize,
    #[serde(default)]
    pub interpolation: InterpolationKind,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            storage_limit: 100,
            interpolation: InterpolationKind::Linear,
        }
    }
}

#[derive(Debug)]
pub struct InterpolationBuffer {
    interpolator: Box<dyn Interpolator>,
    storage_limit: usize,
    nodes: Vec<Snapshot>,
}

impl InterpolationBuffer {
    /// Linear interpolation with room for `storage_limit` nodes.
    pub fn new(storage_limit: usize) -> Self {
        Self::with_interpolator(Box::new(LinearInterpolator), storage_limit)
    }

    pub fn with_interpolator(interpolator: Box<dyn Interpolator>, storage_limit: usize) -> Self {
        Self {
            interpolator,
            storage_limit: storage_limit.max(MIN_STORAGE),
            nodes: Vec::new(),
        }
    }

    pub fn from_settings(settings: &BufferSettings) -> Self {
        Self::with_interpolator(settings.interpolation.build(), settings.storage_limit)
    }

    /// `None` restores the default linear interpolator.
    pub fn set_interpolator(&mut self, interpolator: Option<Box<dyn Interpolator>>) {
        self.interpolator = interpolator.unwrap_or_else(|| Box::new(LinearInterpolator));
    }

    pub fn interpolator(&self) -> &dyn Interpolator {
        self.interpolator.as_ref()
    }

    /// Clamped to at least two nodes. Shrinking below the current node count
    /// drops the oldest nodes.
    pub fn set_storage_limit(&mut self, storage_limit: usize) {
        self.storage_limit = storage_limit.max(MIN_STORAGE);
        if self.nodes.len() > self.storage_limit {
            let excess = self.nodes.len() - self.storage_limit;
            warn!(
                "storage limit lowered to {}; evicting {} oldest nodes",
                self.storage_limit, excess
            );
            self.nodes.drain(..excess);
        }
    }

    pub fn storage_limit(&self) -> usize {
        self.storage_limit
    }

    pub fn order(&self) -> usize {
        self.interpolator.order()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.storage_limit
    }

    pub fn nodes(&self) -> &[Snapshot] {
        &self.nodes
    }

    pub fn node_times(&self) -> Vec<f64> {
        self.nodes.iter().map(|node| node.time).collect()
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => Some(TimeRange::new(first.time, last.time)),
            _ => None,
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.nodes.first().map(Snapshot::dimension)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Stores the given points. `x_dots` may be empty (no derivatives) and
    /// `accuracies` may be empty (zero accuracy).
    pub fn set_points(
        &mut self,
        times: &[f64],
        xs: &[DVector<f64>],
        x_dots: &[Option<DVector<f64>>],
        accuracies: &[f64],
    ) -> Result<()> {
        let snapshots = from_flat(times, xs, x_dots, accuracies)?;
        self.add_snapshots(snapshots)
    }

    /// Merges `candidates` into the buffer. Existing nodes with a matching
    /// time are replaced in place; new times must fit under the storage limit
    /// or nothing is changed.
    pub fn add_snapshots(&mut self, mut candidates: Vec<Snapshot>) -> Result<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        let dim = self.dimension().unwrap_or_else(|| candidates[0].dimension());
        if let Some(bad) = candidates.iter().find(|c| c.dimension() != dim) {
            return Err(Error::dimension("snapshot state", dim, bad.dimension()));
        }

        // Stable sort, so among duplicate times the last candidate wins.
        candidates.sort_by(|a, b| compare_time_values(a.time, b.time));
        let mut unique: Vec<Snapshot> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match unique.last_mut() {
                Some(last) if *last == candidate => *last = candidate,
                _ => unique.push(candidate),
            }
        }

        let mut replacements = Vec::new();
        let mut additions = Vec::new();
        for candidate in unique {
            match self.find(candidate.time) {
                Ok(index) => replacements.push((index, candidate)),
                Err(_) => additions.push(candidate),
            }
        }

        if self.nodes.len() + additions.len() > self.storage_limit {
            return Err(Error::StorageExceeded {
                limit: self.storage_limit,
                existing: self.nodes.len(),
                incoming: additions.len(),
            });
        }

        trace!(
            "buffer update: {} replaced, {} added",
            replacements.len(),
            additions.len()
        );
        for (index, candidate) in replacements {
            self.nodes[index] = candidate;
        }
        if !additions.is_empty() {
            self.nodes.extend(additions);
            self.nodes.sort_by(|a, b| compare_time_values(a.time, b.time));
        }
        Ok(())
    }

    /// Interpolated values at sorted `times` as parallel arrays.
    pub fn get_points(&self, times: &[f64]) -> Result<FlatPoints> {
        Ok(to_flat(&self.get_snapshots(times)?))
    }

    pub fn get_snapshots(&self, times: &[f64]) -> Result<Vec<Snapshot>> {
        let values = self.interpolator.interpolate(&self.nodes, times)?;
        if values.len() != times.len() {
            return Err(Error::dimension(
                "interpolated values",
                times.len(),
                values.len(),
            ));
        }
        Ok(values)
    }

    /// Removes nodes whose time exactly matches one of `times`; unknown times
    /// are ignored. Returns how many nodes were removed.
    pub fn remove_nodes(&mut self, times: &[f64]) -> usize {
        let before = self.nodes.len();
        for &time in times {
            if let Ok(index) = self.find(time) {
                self.nodes.remove(index);
            }
        }
        before - self.nodes.len()
    }

    /// Pulls `source`'s nodes within `[lower, upper]` into this buffer. When
    /// the source interpolates at an order at least this buffer's, each
    /// source interval of width `h0` is subdivided into `N` pieces with
    /// `h = h0^(p/r) / 2`, `N = ceil(h0 / h)`, so that the lower order
    /// interpolant here stays as accurate as the source.
    pub fn set_range(&mut self, lower: f64, upper: f64, source: &InterpolationBuffer) -> Result<()> {
        let range = TimeRange::new(lower, upper);
        if !range.is_valid() {
            return Err(Error::OutOfRange {
                what: "range lower bound",
                value: lower,
                lower: f64::NEG_INFINITY,
                upper,
            });
        }

        let node_times: Vec<f64> = source
            .nodes
            .iter()
            .map(|node| node.time)
            .filter(|&t| range.contains(t))
            .collect();
        if node_times.is_empty() {
            return Ok(());
        }

        let source_order = source.order();
        let sink_order = self.order();
        let times = if source_order >= sink_order {
            self.refine_times(&node_times, source_order, sink_order)?
        } else {
            node_times
        };

        debug!(
            "resampling {} times in [{lower}, {upper}] (source order {source_order}, sink order {sink_order})",
            times.len()
        );
        let values = source.get_snapshots(&times)?;
        self.add_snapshots(values)
    }

    fn refine_times(&self, node_times: &[f64], source_order: usize, sink_order: usize) -> Result<Vec<f64>> {
        let exponent = source_order as f64 / sink_order.max(1) as f64;

        let mut counts = Vec::with_capacity(node_times.len().saturating_sub(1));
        let mut total = node_times.len() as f64;
        for pair in node_times.windows(2) {
            let h0 = pair[1] - pair[0];
            let h = h0.powf(exponent) / 2.0;
            let pieces = (h0 / h).ceil();
            let pieces = if pieces.is_finite() && pieces >= 1.0 { pieces } else { 1.0 };
            total += pieces - 1.0;
            counts.push(pieces);
        }
        if total > self.storage_limit as f64 {
            return Err(Error::StorageExceeded {
                limit: self.storage_limit,
                existing: self.nodes.len(),
                incoming: total as usize,
            });
        }

        let mut times = Vec::with_capacity(total as usize);
        for (pair, &pieces) in node_times.windows(2).zip(counts.iter()) {
            let n = pieces as usize;
            let step = (pair[1] - pair[0]) / pieces;
            times.push(pair[0]);
            times.extend((1..n).map(|j| pair[0] + j as f64 * step));
        }
        if let Some(&last) = node_times.last() {
            times.push(last);
        }
        Ok(times)
    }

    fn find(&self, time: f64) -> std::result::Result<usize, usize> {
        self.nodes
            .binary_search_by(|node| compare_time_values(node.time, time))
    }
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self::from_settings(&BufferSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::CubicSplineInterpolator;
    use approx::assert_relative_eq;

    fn scalar(value: f64) -> DVector<f64> {
        DVector::from_element(1, value)
    }

    fn filled(times: &[f64], f: impl Fn(f64) -> f64, limit: usize) -> InterpolationBuffer {
        let mut buffer = InterpolationBuffer::new(limit);
        let xs: Vec<DVector<f64>> = times.iter().map(|&t| scalar(f(t))).collect();
        buffer.set_points(times, &xs, &[], &[]).expect("fill buffer");
        buffer
    }

    /// Linear interpolation that reports order 2.
    #[derive(Debug)]
    struct SecondOrderStub;

    impl Interpolator for SecondOrderStub {
        fn interpolate(&self, nodes: &[Snapshot], times: &[f64]) -> Result<Vec<Snapshot>> {
            LinearInterpolator.interpolate(nodes, times)
        }

        fn order(&self) -> usize {
            2
        }

        fn name(&self) -> &'static str {
            "second order stub"
        }
    }

    #[test]
    fn storage_limit_is_clamped() {
        assert_eq!(InterpolationBuffer::new(0).storage_limit(), 2);
        let mut buffer = InterpolationBuffer::new(10);
        buffer.set_storage_limit(1);
        assert_eq!(buffer.storage_limit(), 2);
    }

    #[test]
    fn set_points_keeps_nodes_sorted() {
        let buffer = filled(&[2.0, 0.0, 1.0], |t| t * t, 5);
        assert_eq!(buffer.node_times(), vec![0.0, 1.0, 2.0]);
        assert_eq!(buffer.nodes()[2].x[0], 4.0);
        assert_eq!(buffer.time_range(), Some(TimeRange::new(0.0, 2.0)));
    }

    #[test]
    fn overflow_leaves_buffer_untouched() {
        let mut buffer = filled(&[0.0, 1.0], |t| t, 3);
        let xs = vec![scalar(-1.0), scalar(7.0), scalar(9.0)];
        let err = buffer
            .set_points(&[1.0, 2.0, 3.0], &xs, &[], &[])
            .expect_err("two new nodes do not fit");
        assert!(matches!(
            err,
            Error::StorageExceeded {
                limit: 3,
                existing: 2,
                incoming: 2
            }
        ));
        assert_eq!(buffer.node_times(), vec![0.0, 1.0]);
        // The replacement that was part of the rejected batch is not applied.
        assert_eq!(buffer.nodes()[1].x[0], 1.0);
    }

    #[test]
    fn replacing_existing_times_does_not_count_against_limit() {
        let mut buffer = filled(&[0.0, 1.0], |t| t, 2);
        let xs = vec![scalar(5.0), scalar(6.0)];
        buffer
            .set_points(&[0.0, 1.0], &xs, &[], &[0.5, 0.5])
            .expect("in-place replacement");
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.nodes()[0].x[0], 5.0);
        assert_eq!(buffer.nodes()[1].accuracy, 0.5);
    }

    #[test]
    fn duplicate_candidates_keep_the_last() {
        let mut buffer = InterpolationBuffer::new(4);
        let xs = vec![scalar(1.0), scalar(2.0), scalar(3.0)];
        buffer
            .set_points(&[1.0, 0.0, 1.0], &xs, &[], &[])
            .expect("set points");
        assert_eq!(buffer.node_times(), vec![0.0, 1.0]);
        assert_eq!(buffer.nodes()[1].x[0], 3.0);
    }

    #[test]
    fn mismatched_state_sizes_are_rejected() {
        let mut buffer = filled(&[0.0], |t| t, 4);
        let err = buffer
            .set_points(&[1.0], &[DVector::zeros(3)], &[], &[])
            .expect_err("dimension mismatch");
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn get_points_interpolates_and_checks_span() {
        let buffer = filled(&[0.0, 1.0, 2.0], |t| 3.0 * t + 1.0, 5);
        let points = buffer.get_points(&[0.25, 1.0, 1.5]).expect("points");
        assert_eq!(points.times, vec![0.25, 1.0, 1.5]);
        assert_relative_eq!(points.x[0][0], 1.75);
        assert_relative_eq!(points.x[1][0], 4.0);
        assert_relative_eq!(points.accuracy[2], 1.0);

        assert!(matches!(
            buffer.get_points(&[2.5]),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn node_queries_are_idempotent() {
        let buffer = filled(&[0.0, 0.3, 0.7], |t| t.sin(), 5);
        let times = buffer.node_times();
        let points = buffer.get_points(&times).expect("points");
        for (value, node) in points.x.iter().zip(buffer.nodes()) {
            assert_eq!(value, &node.x);
        }
    }

    #[test]
    fn one_ulp_off_a_node_is_interpolated() {
        for interpolator in [InterpolationKind::Linear, InterpolationKind::CubicSpline] {
            let mut buffer = InterpolationBuffer::with_interpolator(interpolator.build(), 5);
            let xs = vec![scalar(0.0), scalar(0.5), scalar(2.0)];
            let x_dots = vec![Some(scalar(9.0)); 3];
            buffer
                .set_points(&[0.0, 0.5, 1.0], &xs, &x_dots, &[0.01, 0.02, 0.03])
                .expect("fill");
            let after = f64::from_bits(0.5_f64.to_bits() + 1);

            let points = buffer.get_snapshots(&[0.5, after]).expect("points");
            assert_eq!(points[0].x, scalar(0.5));
            assert_eq!(points[0].x_dot, Some(scalar(9.0)));
            assert_eq!(points[0].accuracy, 0.02);

            assert_eq!(points[1].time, after);
            assert_relative_eq!(points[1].accuracy, 0.5);
            assert_relative_eq!(points[1].x[0], 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn remove_nodes_is_best_effort() {
        let mut buffer = filled(&[0.0, 1.0, 2.0], |t| t, 5);
        assert_eq!(buffer.remove_nodes(&[1.0, 5.0, 1.0]), 1);
        assert_eq!(buffer.node_times(), vec![0.0, 2.0]);
    }

    #[test]
    fn shrinking_storage_evicts_oldest() {
        let mut buffer = filled(&[0.0, 1.0, 2.0, 3.0], |t| t, 4);
        buffer.set_storage_limit(2);
        assert_eq!(buffer.node_times(), vec![2.0, 3.0]);
    }

    #[test]
    fn set_range_with_equal_orders_inserts_midpoints() {
        let source = filled(&[0.0, 0.5, 1.0], |t| 2.0 * t, 10);
        let mut sink = InterpolationBuffer::new(10);
        sink.set_range(0.0, 1.0, &source).expect("set range");
        assert_eq!(sink.node_times(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_relative_eq!(sink.nodes()[1].x[0], 0.5);
    }

    #[test]
    fn set_range_refines_for_higher_order_source() {
        let mut source = InterpolationBuffer::with_interpolator(Box::new(CubicSplineInterpolator), 10);
        let xs: Vec<DVector<f64>> = [0.0, 0.5, 1.0].iter().map(|&t| scalar(t * t)).collect();
        source.set_points(&[0.0, 0.5, 1.0], &xs, &[], &[]).expect("fill");

        let mut sink = InterpolationBuffer::new(50);
        sink.set_range(0.0, 1.0, &source).expect("set range");
        // h = 0.5^3 / 2 = 1/16 gives eight pieces per interval.
        assert_eq!(sink.len(), 17);
        assert_relative_eq!(sink.node_times()[1], 0.0625);
    }

    #[test]
    fn set_range_uses_fractional_order_ratio() {
        let mut source = InterpolationBuffer::with_interpolator(Box::new(CubicSplineInterpolator), 10);
        source
            .set_points(&[0.0, 0.3], &[scalar(0.0), scalar(0.3)], &[], &[])
            .expect("fill");
        let mut sink = InterpolationBuffer::with_interpolator(Box::new(SecondOrderStub), 10);
        sink.set_range(0.0, 0.3, &source).expect("set range");
        // 0.3^1.5 / 2 ~ 0.082, so four pieces and three interior points.
        let times = sink.node_times();
        assert_eq!(times.len(), 5);
        assert_relative_eq!(times[1], 0.075, epsilon = 1e-15);
        assert_relative_eq!(times[2], 0.15, epsilon = 1e-15);
        assert_relative_eq!(times[3], 0.225, epsilon = 1e-15);
    }

    #[test]
    fn set_range_from_lower_order_source_copies_nodes() {
        let source = filled(&[0.0, 0.5, 1.0, 1.5], |t| t, 10);
        let mut sink = InterpolationBuffer::with_interpolator(Box::new(CubicSplineInterpolator), 10);
        sink.set_range(0.5, 1.5, &source).expect("set range");
        assert_eq!(sink.node_times(), vec![0.5, 1.0, 1.5]);
    }

    #[test]
    fn set_range_edge_cases() {
        let source = filled(&[0.0, 1.0], |t| t, 4);
        let mut sink = InterpolationBuffer::new(4);
        sink.set_range(2.0, 3.0, &source).expect("empty selection");
        assert!(sink.is_empty());
        assert!(matches!(
            sink.set_range(1.0, 0.0, &source),
            Err(Error::OutOfRange { .. })
        ));

        let dense = filled(&[0.0, 0.1, 0.2, 0.3], |t| t, 10);
        let mut small = InterpolationBuffer::new(3);
        assert!(matches!(
            small.set_range(0.0, 0.3, &dense),
            Err(Error::StorageExceeded { .. })
        ));
        assert!(small.is_empty());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: BufferSettings =
            serde_json::from_str(r#"{ "storage_limit": 8 }"#).expect("settings");
        assert_eq!(settings.interpolation, InterpolationKind::Linear);
        let buffer = InterpolationBuffer::from_settings(&settings);
        assert_eq!(buffer.storage_limit(), 8);
        assert_eq!(buffer.order(), 1);
    }
}
