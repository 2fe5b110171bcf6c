use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::client::{CredentialProvider, MonitoringClient};
use crate::error::MetricError;
use crate::metric::{MetricCore, ReportParams};
use crate::point::{Labels, TypedValue};

/// Per-report options for a cumulative metric.
///
/// An explicit start time resets the accumulation window and is remembered
/// for subsequent reports. Without one, the window starts at the first report
/// (or at descriptor creation time) and is carried forward.
#[derive(Debug, Clone, Default)]
pub struct CumulativeOptions {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    labels: Labels,
}

impl CumulativeOptions {
    pub fn with_start_time(self, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start_time),
            ..self
        }
    }

    pub fn with_end_time(self, end_time: DateTime<Utc>) -> Self {
        Self {
            end_time: Some(end_time),
            ..self
        }
    }

    pub fn with_labels(self, labels: Labels) -> Self {
        Self { labels, ..self }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A monotonically accumulating measurement. Within a batching window the
/// values of each group are summed, and every point carries the interval
/// start of its accumulation window.
pub struct Cumulative<C, P> {
    core: Arc<MetricCore<C, P>>,
    start_time: Mutex<Option<DateTime<Utc>>>,
}

impl<C, P> Cumulative<C, P>
where
    C: MonitoringClient + Send + Sync + 'static,
    P: CredentialProvider + Send + Sync + 'static,
{
    pub(crate) fn new(core: Arc<MetricCore<C, P>>) -> Self {
        Self {
            core,
            start_time: Mutex::new(None),
        }
    }

    /// Fully qualified metric type, including the domain prefix.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Anchors the accumulation window at the given instant, used by the
    /// monitor right after the descriptor is registered.
    pub(crate) fn mark_created(&self, at: DateTime<Utc>) {
        *self.start_time.lock() = Some(at);
    }

    fn resolve_start_time(&self, explicit: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let mut tracked = self.start_time.lock();
        match explicit {
            Some(start_time) => {
                *tracked = Some(start_time);
                start_time
            }
            None => *tracked.get_or_insert_with(Utc::now),
        }
    }

    /// Reports a delta accumulated since the window start, stamped with the
    /// time of the call.
    pub async fn report(&self, value: impl Into<TypedValue>) -> Result<(), MetricError> {
        self.report_with(value, CumulativeOptions::default()).await
    }

    pub async fn report_with(
        &self,
        value: impl Into<TypedValue>,
        options: CumulativeOptions,
    ) -> Result<(), MetricError> {
        let params = ReportParams {
            start_time: Some(self.resolve_start_time(options.start_time)),
            end_time: options.end_time,
            labels: options.labels,
        };
        Arc::clone(&self.core).report(value.into(), params).await
    }

    /// Removes the metric descriptor remotely.
    pub async fn delete(&self) -> Result<(), MetricError> {
        self.core.delete().await
    }

    /// Cancels any armed flush timer; see [`Monitor::clear_timers`] for the
    /// contract.
    ///
    /// [`Monitor::clear_timers`]: crate::Monitor::clear_timers
    pub fn clear_timers(&self) {
        self.core.clear_timers();
    }
}
