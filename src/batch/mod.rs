//! Per-metric batching core.
//!
//! [`BatchBuffer`] holds the not-yet-sent points of one metric, coalescing
//! points that share a group key via the metric kind's merge policy while
//! preserving the first-seen order of distinct groups. [`FlushCycle`] is the
//! shared completion handle of the next scheduled flush, and [`FlushTimer`]
//! the cancelable delay that triggers it.

pub(crate) use flush::{BatchResult, FlushCycle, FlushWaiter};
pub(crate) use timer::FlushTimer;

mod flush;
mod timer;

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::point::{DataPoint, MetricKind, PointData};

/// Group key applied when a metric has no grouping function configured.
pub(crate) const DEFAULT_GROUP_KEY: &str = "default";

/// Pending points of one metric, keyed by group.
///
/// Every push between two drains is represented exactly once in the next
/// drained sequence, either as its own entry or merged into the entry that
/// first claimed its group key.
#[derive(Default)]
pub(crate) struct BatchBuffer {
    index: FxHashMap<String, usize>,
    points: Vec<DataPoint>,
}

impl BatchBuffer {
    pub(crate) fn push(&mut self, key: String, point: DataPoint, kind: MetricKind) {
        match self.index.entry(key) {
            Entry::Occupied(slot) => kind.merge(&mut self.points[*slot.get()], point),
            Entry::Vacant(slot) => {
                slot.insert(self.points.len());
                self.points.push(point);
            }
        }
    }

    /// Takes the accumulated points in first-seen group order and resets the
    /// buffer, so pushes arriving afterwards open a fresh cycle.
    pub(crate) fn drain(&mut self) -> Vec<DataPoint> {
        self.index.clear();
        std::mem::take(&mut self.points)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl MetricKind {
    /// Collision policy for two points sharing a group key.
    ///
    /// Only `points` (interval and value) is replaced; the identity fields
    /// that determined the grouping stay untouched.
    pub(crate) fn merge(self, old: &mut DataPoint, new: DataPoint) {
        match self {
            // last value wins, verbatim
            MetricKind::Gauge => old.points = new.points,
            // running total since the tracked start, window end advances
            MetricKind::Cumulative => {
                let value = match old.points.value.saturating_add(&new.points.value) {
                    Some(total) => total,
                    None => new.points.value,
                };
                old.points = PointData {
                    interval: new.points.interval,
                    value,
                };
            }
        }
    }
}
