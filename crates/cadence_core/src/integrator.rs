//! Drives a stepper forward on demand and answers time queries from a
//! trailing buffer of the steps it has taken.

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferSettings, InterpolationBuffer};
use crate::error::{Error, Result};
use crate::snapshot::{compare_time_values, is_sorted, Snapshot, TimeRange};
use crate::traits::Stepper;

const LANDING_SLACK: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegratorSettings {
    pub step_size: f64,
    pub max_steps_per_query: usize,
    #[serde(default)]
    pub buffer: BufferSettings,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            step_size: 0.1,
            max_steps_per_query: 10_000,
            buffer: BufferSettings::default(),
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(Error::InvalidSettings(
                "step_size must be positive and finite.".into(),
            ));
        }
        if self.max_steps_per_query == 0 {
            return Err(Error::InvalidSettings(
                "max_steps_per_query must be greater than zero.".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Integrator<S> {
    stepper: S,
    trailing: InterpolationBuffer,
    settings: IntegratorSettings,
}

impl<S: Stepper> Integrator<S> {
    pub fn new(stepper: S, settings: IntegratorSettings) -> Result<Self> {
        settings.validate()?;
        let mut trailing = InterpolationBuffer::from_settings(&settings.buffer);
        trailing.add_snapshots(vec![stepper.snapshot()])?;
        Ok(Self {
            stepper,
            trailing,
            settings,
        })
    }

    /// Values at sorted `times`, stepping forward as far as the last one.
    /// Times earlier than the oldest retained step are out of range, including
    /// times the trailing buffer would have to drop to reach the last one.
    pub fn get_fwd_points(&mut self, times: &[f64]) -> Result<Vec<Snapshot>> {
        let Some(&target) = times.last() else {
            return Ok(Vec::new());
        };
        if !is_sorted(times) {
            return Err(Error::UnsortedTimes);
        }
        let range = self.fwd_time_range();
        if !range.contains(times[0]) {
            return Err(Error::OutOfRange {
                what: "forward query time",
                value: times[0],
                lower: range.lower,
                upper: range.upper,
            });
        }

        let plan = self.plan_steps(target)?;
        let retained = self.retained_lower_bound(&plan).unwrap_or(range.lower);
        if compare_time_values(times[0], retained) == Ordering::Less {
            return Err(Error::OutOfRange {
                what: "forward query time",
                value: times[0],
                lower: retained,
                upper: target,
            });
        }

        for &(dt, _) in &plan {
            self.stepper.take_step(dt)?;
            self.store(self.stepper.snapshot())?;
        }
        if !plan.is_empty() {
            debug!(
                "took {} steps to reach t = {}",
                plan.len(),
                self.stepper.time()
            );
        }

        self.trailing.get_snapshots(times)
    }

    /// Step sizes and resulting times needed to reach `target`.
    fn plan_steps(&self, target: f64) -> Result<Vec<(f64, f64)>> {
        let step = self.settings.step_size;
        let mut plan = Vec::new();
        let mut t = self.stepper.time();
        while compare_time_values(t, target) == Ordering::Less {
            if plan.len() >= self.settings.max_steps_per_query {
                return Err(Error::MaxStepsExceeded {
                    limit: self.settings.max_steps_per_query,
                });
            }
            // Stretch the last step rather than leave a rounding-sized sliver.
            let remaining = target - t;
            let dt = if remaining <= step * (1.0 + LANDING_SLACK) {
                remaining
            } else {
                step
            };
            t += dt;
            plan.push((dt, t));
        }
        Ok(plan)
    }

    /// Oldest node time left in the trailing buffer once `plan` is stored.
    fn retained_lower_bound(&self, plan: &[(f64, f64)]) -> Option<f64> {
        let existing = self.trailing.nodes();
        let total = existing.len() + plan.len();
        let dropped = total.saturating_sub(self.trailing.storage_limit());
        match existing.get(dropped) {
            Some(node) => Some(node.time),
            None => plan.get(dropped - existing.len()).map(|&(_, t)| t),
        }
    }

    fn store(&mut self, snapshot: Snapshot) -> Result<()> {
        if self.trailing.is_full() {
            if let Some(oldest) = self.trailing.nodes().first().map(|node| node.time) {
                self.trailing.remove_nodes(&[oldest]);
            }
        }
        self.trailing.add_snapshots(vec![snapshot])
    }

    /// Times this integrator can still answer: from the oldest retained step
    /// onward.
    pub fn fwd_time_range(&self) -> TimeRange {
        let lower = self
            .trailing
            .time_range()
            .map_or(self.stepper.time(), |range| range.lower);
        TimeRange::new(lower, f64::INFINITY)
    }

    /// Span already covered by stored steps.
    pub fn time_range(&self) -> Option<TimeRange> {
        self.trailing.time_range()
    }

    pub fn stepper(&self) -> &S {
        &self.stepper
    }

    pub fn buffer(&self) -> &InterpolationBuffer {
        &self.trailing
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    pub fn into_parts(self) -> (S, InterpolationBuffer) {
        (self.stepper, self.trailing)
    }
}
