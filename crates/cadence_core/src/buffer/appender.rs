//! Moving trajectory segments between buffers.

use log::debug;

use crate::buffer::InterpolationBuffer;
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, TimeRange};

pub trait Appender {
    /// Appends the part of `source` inside `range` to `sink`.
    fn append(
        &self,
        source: &InterpolationBuffer,
        range: TimeRange,
        sink: &mut InterpolationBuffer,
    ) -> Result<()>;
}

fn check_range(source: &InterpolationBuffer, range: TimeRange) -> Result<()> {
    if !range.is_valid() {
        return Err(Error::OutOfRange {
            what: "append range lower bound",
            value: range.lower,
            lower: f64::NEG_INFINITY,
            upper: range.upper,
        });
    }
    let span = source.time_range().ok_or(Error::OutOfRange {
        what: "append range lower bound",
        value: range.lower,
        lower: f64::NAN,
        upper: f64::NAN,
    })?;
    for bound in [range.lower, range.upper] {
        if !span.contains(bound) {
            return Err(Error::OutOfRange {
                what: "append range bound",
                value: bound,
                lower: span.lower,
                upper: span.upper,
            });
        }
    }
    Ok(())
}

/// Copies source nodes in the range as they are, without resampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointwiseAppender;

impl Appender for PointwiseAppender {
    fn append(
        &self,
        source: &InterpolationBuffer,
        range: TimeRange,
        sink: &mut InterpolationBuffer,
    ) -> Result<()> {
        check_range(source, range)?;
        let nodes: Vec<Snapshot> = source
            .nodes()
            .iter()
            .filter(|node| range.contains(node.time))
            .cloned()
            .collect();
        debug!("pointwise append of {} nodes", nodes.len());
        sink.add_snapshots(nodes)
    }
}

/// Copies nodes when the sink interpolates at least as accurately as the
/// source; otherwise resamples through `InterpolationBuffer::set_range`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartAppender;

impl Appender for SmartAppender {
    fn append(
        &self,
        source: &InterpolationBuffer,
        range: TimeRange,
        sink: &mut InterpolationBuffer,
    ) -> Result<()> {
        if sink.order() >= source.order() {
            PointwiseAppender.append(source, range, sink)
        } else {
            check_range(source, range)?;
            sink.set_range(range.lower, range.upper, source)
        }
    }
}
