use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::client::{CredentialProvider, MonitoringClient};
use crate::error::MetricError;
use crate::metric::{MetricCore, ReportParams};
use crate::point::{Labels, TypedValue};

/// Per-report options for a gauge: the observation time and metric labels.
///
/// When no end time is given the moment of the report call is used.
#[derive(Debug, Clone, Default)]
pub struct GaugeOptions {
    end_time: Option<DateTime<Utc>>,
    labels: Labels,
}

impl GaugeOptions {
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

/// A point-in-time measurement. Within a batching window only the latest
/// value of each group survives.
pub struct Gauge<C, P> {
    core: Arc<MetricCore<C, P>>,
}

impl<C, P> Gauge<C, P>
where
    C: MonitoringClient + Send + Sync + 'static,
    P: CredentialProvider + Send + Sync + 'static,
{
    pub(crate) fn new(core: Arc<MetricCore<C, P>>) -> Self {
        Self { core }
    }

    /// Fully qualified metric type, including the domain prefix.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Reports the current value, stamped with the time of the call.
    pub async fn report(&self, value: impl Into<TypedValue>) -> Result<(), MetricError> {
        self.report_with(value, GaugeOptions::default()).await
    }

    pub async fn report_with(
        &self,
        value: impl Into<TypedValue>,
        options: GaugeOptions,
    ) -> Result<(), MetricError> {
        let params = ReportParams {
            start_time: None,
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
