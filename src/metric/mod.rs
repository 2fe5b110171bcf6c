//! Public-facing metric entities and their reporting state machine.
//!
//! A metric moves between three states: idle (no buffer content, no timer),
//! accumulating (timer armed, one pending flush cycle shared by every report
//! in the window) and flushing (timer fired, batch send in flight, buffer
//! already reset so new reports open the next cycle). Without a throttle the
//! machine is bypassed and every report is sent immediately as a one-element
//! batch.

pub use cumulative::{Cumulative, CumulativeOptions};
pub use gauge::{Gauge, GaugeOptions};
pub use settings::{GroupBy, MetricSettings};

mod cumulative;
mod gauge;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::batch::{
    BatchBuffer, BatchResult, FlushCycle, FlushTimer, FlushWaiter, DEFAULT_GROUP_KEY,
};
use crate::client::{CredentialProvider, MetricDescriptor, MonitoringClient, TimeSeriesRequest};
use crate::error::{MetricError, ValidationError};
use crate::monitor::MonitorShared;
use crate::point::{
    DataPoint, Labels, MetricKind, MetricRef, PointData, TimeInterval, TypedValue, ValueType,
};

/// Namespace applied when a metric does not configure its own domain.
pub const CUSTOM_METRIC_DOMAIN: &str = "custom.googleapis.com";

/// Normalized arguments of one report call.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReportParams {
    pub(crate) start_time: Option<DateTime<Utc>>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) labels: Labels,
}

#[derive(Default)]
struct BatchState {
    buffer: BatchBuffer,
    pending: Option<FlushCycle>,
    timer: Option<FlushTimer>,
    next_cycle: u64,
    // cycles cleared by forced teardown, kept open so their waiters never
    // settle; see `clear_timers`
    abandoned: Vec<FlushCycle>,
}

/// Shared body of a declared metric: identity, descriptor payload and the
/// buffer-and-timer state guarded by one per-instance lock. Buffers of
/// different metrics are fully independent.
pub(crate) struct MetricCore<C, P> {
    shared: Arc<MonitorShared<C, P>>,
    kind: MetricKind,
    metric_name: String,
    resource_name: String,
    value_type: ValueType,
    throttle: Option<Duration>,
    group_by: Option<GroupBy>,
    descriptor: MetricDescriptor,
    state: Mutex<BatchState>,
}

impl<C, P> MetricCore<C, P>
where
    C: MonitoringClient + Send + Sync + 'static,
    P: CredentialProvider + Send + Sync + 'static,
{
    pub(crate) fn new(
        shared: Arc<MonitorShared<C, P>>,
        kind: MetricKind,
        metric_type: &str,
        settings: MetricSettings,
    ) -> Result<Self, ValidationError> {
        if metric_type.is_empty() {
            return Err(ValidationError::MissingField("metric_type"));
        }
        if kind == MetricKind::Cumulative && !settings.value_type.is_summable() {
            return Err(ValidationError::NonSummableValueType(settings.value_type));
        }

        let metric_domain = settings
            .metric_domain
            .unwrap_or_else(|| CUSTOM_METRIC_DOMAIN.to_string());
        let metric_name = format!("{metric_domain}/{metric_type}");
        let resource_name = format!(
            "{}/metricDescriptors/{}",
            shared.project_name(),
            metric_name
        );

        let descriptor = MetricDescriptor {
            name: resource_name.clone(),
            metric_type: metric_name.clone(),
            metric_kind: kind,
            value_type: settings.value_type,
            description: settings.description,
            display_name: settings.display_name,
            labels: settings.labels,
            unit: settings.unit,
        };

        let throttle = settings
            .throttle
            .or(shared.default_throttle())
            .filter(|throttle| !throttle.is_zero());

        Ok(Self {
            shared,
            kind,
            metric_name,
            resource_name,
            value_type: settings.value_type,
            throttle,
            group_by: settings.group_by,
            descriptor,
            state: Mutex::new(BatchState::default()),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.metric_name
    }

    pub(crate) fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Registers the metric descriptor remotely. The metric is usable for
    /// reporting only after this succeeds.
    pub(crate) async fn create(&self) -> Result<(), MetricError> {
        let credential = self.shared.credential().await?;
        self.shared
            .client()
            .create_descriptor(&credential, &self.descriptor)
            .await?;
        Ok(())
    }

    pub(crate) async fn delete(&self) -> Result<(), MetricError> {
        let credential = self.shared.credential().await?;
        self.shared
            .client()
            .delete_descriptor(&credential, &self.resource_name)
            .await?;
        Ok(())
    }

    /// Builds the wire-shaped point for one report. Pure; fails when the
    /// value does not match the metric's declared value type.
    pub(crate) fn format_data_point(
        &self,
        value: TypedValue,
        params: ReportParams,
    ) -> Result<DataPoint, ValidationError> {
        if value.value_type() != self.value_type {
            return Err(ValidationError::ValueTypeMismatch {
                expected: self.value_type,
                actual: value.value_type(),
            });
        }

        Ok(DataPoint {
            metric: MetricRef {
                metric_type: self.metric_name.clone(),
                labels: params.labels,
            },
            resource: self.shared.resource().clone(),
            metric_kind: self.kind,
            value_type: self.value_type,
            points: PointData {
                interval: TimeInterval {
                    start_time: params.start_time,
                    end_time: params.end_time.unwrap_or_else(Utc::now),
                },
                value,
            },
        })
    }

    pub(crate) async fn report(
        self: Arc<Self>,
        value: TypedValue,
        params: ReportParams,
    ) -> Result<(), MetricError> {
        let point = self.format_data_point(value, params)?;

        match self.throttle {
            None => self.send_batch(vec![point]).await,
            Some(throttle) => Self::enqueue(&self, point, throttle).wait().await,
        }
    }

    /// Cancels any armed flush timer and abandons the pending cycle.
    ///
    /// Reports awaiting the abandoned cycle are never settled; callers that
    /// cannot tolerate that must guard with their own timeout. An
    /// already-in-flight batch send is not affected, and buffered points stay
    /// in place for a later cycle.
    pub(crate) fn clear_timers(&self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        if let Some(cycle) = state.pending.take() {
            state.abandoned.push(cycle);
            debug!(
                metric = %self.metric_name,
                abandoned = state.abandoned.len(),
                "abandoning pending flush"
            );
        }
    }

    /// Pushes a point into the buffer and returns a waiter on the window's
    /// shared flush cycle, arming the timer when the window is new. One
    /// uninterrupted step under the state lock.
    fn enqueue(this: &Arc<Self>, point: DataPoint, throttle: Duration) -> FlushWaiter {
        let key = match &this.group_by {
            Some(group_by) => group_by(&point),
            None => DEFAULT_GROUP_KEY.to_string(),
        };

        let mut state = this.state.lock();
        state.buffer.push(key, point, this.kind);

        if let Some(pending) = &state.pending {
            return pending.waiter();
        }

        let cycle = FlushCycle::new(state.next_cycle);
        state.next_cycle += 1;
        let waiter = cycle.waiter();
        let cycle_id = cycle.id();

        debug!(metric = %this.metric_name, delay = ?throttle, "armed flush timer");
        let core = Arc::clone(this);
        state.timer = Some(FlushTimer::arm(throttle, async move {
            core.flush(cycle_id).await;
        }));
        state.pending = Some(cycle);

        waiter
    }

    /// Timer-fire path: clears the pending cycle and drains the buffer before
    /// the network call starts, then broadcasts the send result to every
    /// waiter of the drained cycle.
    async fn flush(&self, cycle_id: u64) {
        let drained = {
            let mut state = self.state.lock();
            match state.pending.take() {
                Some(cycle) if cycle.id() == cycle_id => {
                    state.timer = None;
                    if state.buffer.is_empty() {
                        cycle.complete(Ok(()));
                        None
                    } else {
                        Some((cycle, state.buffer.drain()))
                    }
                }
                other => {
                    // a newer cycle owns the buffer now
                    state.pending = other;
                    None
                }
            }
        };

        let Some((cycle, points)) = drained else {
            return;
        };

        debug!(metric = %self.metric_name, points = points.len(), "flushing batched points");
        let result = self.send_batch(points).await;
        if let Err(batch_error) = &result {
            error!(metric = %self.metric_name, error = %batch_error, "batch send failed");
        }
        cycle.complete(result);
    }

    async fn send_batch(&self, points: Vec<DataPoint>) -> BatchResult {
        let credential = self.shared.credential().await?;
        let request = TimeSeriesRequest {
            name: self.shared.project_name().to_string(),
            time_series: points,
        };
        self.shared
            .client()
            .create_time_series(&credential, &request)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::error::TransportError;
    use crate::monitor::{Monitor, MonitorSettings};
    use crate::test_util::{RecordingClient, StaticCredentials};

    fn monitor() -> (Monitor<RecordingClient, StaticCredentials>, RecordingClient) {
        let client = RecordingClient::new();
        let monitor = Monitor::new(
            MonitorSettings::new("acme"),
            client.clone(),
            StaticCredentials::new("token"),
        )
        .unwrap();
        (monitor, client)
    }

    fn throttled() -> MetricSettings {
        MetricSettings::default().with_throttle(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn sends_each_report_immediately_without_throttle() {
        let (monitor, client) = monitor();
        let gauge = monitor
            .create_gauge("jobs/active", MetricSettings::default())
            .await
            .unwrap();

        gauge.report(3).await.unwrap();
        gauge.report(5).await.unwrap();

        let batches = client.batches();
        assert_eq!(2, batches.len());
        assert_eq!(1, batches[0].len());
        assert_eq!(TypedValue::Int64Value(3), batches[0][0].points.value);
        assert_eq!(TypedValue::Int64Value(5), batches[1][0].points.value);
    }

    #[tokio::test(start_paused = true)]
    async fn merges_concurrent_reports_into_a_single_batch() {
        let (monitor, client) = monitor();
        let gauge = monitor
            .create_gauge("jobs/active", throttled())
            .await
            .unwrap();

        let (first, second, third) =
            tokio::join!(gauge.report(1), gauge.report(2), gauge.report(3));

        first.unwrap();
        second.unwrap();
        third.unwrap();

        let batches = client.batches();
        assert_eq!(1, batches.len());
        assert_eq!(1, batches[0].len());
        assert_eq!(TypedValue::Int64Value(3), batches[0][0].points.value);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_one_point_per_distinct_group_in_first_seen_order() {
        let (monitor, client) = monitor();
        let settings = throttled().with_group_by(|point| {
            point
                .metric
                .labels
                .get("queue")
                .cloned()
                .unwrap_or_default()
        });
        let gauge = monitor.create_gauge("queue/depth", settings).await.unwrap();

        let billing = GaugeOptions::default().with_label("queue", "billing");
        let mailer = GaugeOptions::default().with_label("queue", "mailer");

        let (first, second, third) = tokio::join!(
            gauge.report_with(4, billing.clone()),
            gauge.report_with(9, mailer),
            gauge.report_with(6, billing),
        );
        first.unwrap();
        second.unwrap();
        third.unwrap();

        let batches = client.batches();
        assert_eq!(1, batches.len());
        assert_eq!(2, batches[0].len());
        assert_eq!(TypedValue::Int64Value(6), batches[0][0].points.value);
        assert_eq!(TypedValue::Int64Value(9), batches[0][1].points.value);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_sequential_flush_windows_independently() {
        let (monitor, client) = monitor();
        let gauge = monitor
            .create_gauge("jobs/active", throttled())
            .await
            .unwrap();

        gauge.report(1).await.unwrap();
        gauge.report(2).await.unwrap();

        let batches = client.batches();
        assert_eq!(2, batches.len());
        assert_eq!(TypedValue::Int64Value(1), batches[0][0].points.value);
        assert_eq!(TypedValue::Int64Value(2), batches[1][0].points.value);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_every_waiter_of_a_failed_batch_with_the_same_error() {
        let (monitor, client) = monitor();
        let gauge = monitor
            .create_gauge("jobs/active", throttled())
            .await
            .unwrap();

        client.fail_next_send(TransportError::new("write failed"));

        let (first, second) = tokio::join!(gauge.report(1), gauge.report(2));

        assert_eq!(first, second);
        assert_eq!(
            Err(MetricError::Transport(TransportError::new("write failed"))),
            first
        );

        // the failed cycle does not poison the next one
        gauge.report(3).await.unwrap();
        assert_eq!(1, client.batches().len());
    }

    #[tokio::test]
    async fn fails_validation_without_entering_batching_state() {
        let (monitor, client) = monitor();
        let gauge = monitor
            .create_gauge("jobs/active", throttled())
            .await
            .unwrap();

        let result = gauge.report(0.5).await;

        assert_eq!(
            Err(MetricError::Validation(
                ValidationError::ValueTypeMismatch {
                    expected: ValueType::Int64,
                    actual: ValueType::Double,
                }
            )),
            result
        );
        assert!(client.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_timers_abandons_pending_reports_without_settling_them() {
        let (monitor, client) = monitor();
        let gauge = Arc::new(
            monitor
                .create_gauge("jobs/active", throttled())
                .await
                .unwrap(),
        );

        let report = tokio::spawn({
            let gauge = Arc::clone(&gauge);
            async move { gauge.report(1).await }
        });
        tokio::task::yield_now().await;

        gauge.clear_timers();

        let settled = timeout(Duration::from_secs(10), report).await;
        assert!(settled.is_err(), "abandoned report settled");
        assert!(client.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reports_arriving_during_flight_start_a_new_cycle() {
        let (monitor, client) = monitor();
        let gauge = Arc::new(
            monitor
                .create_gauge("jobs/active", throttled())
                .await
                .unwrap(),
        );

        client.hold_sends();

        let first = tokio::spawn({
            let gauge = Arc::clone(&gauge);
            async move { gauge.report(1).await }
        });

        // past the first window: flush fired, send is parked on the gate
        sleep(Duration::from_millis(150)).await;
        assert_eq!(1, client.sends_in_flight());

        let second = tokio::spawn({
            let gauge = Arc::clone(&gauge);
            async move { gauge.report(2).await }
        });
        tokio::task::yield_now().await;

        client.release_send();
        first.await.unwrap().unwrap();
        client.release_send();
        second.await.unwrap().unwrap();

        let batches = client.batches();
        assert_eq!(2, batches.len());
        assert_eq!(TypedValue::Int64Value(1), batches[0][0].points.value);
        assert_eq!(TypedValue::Int64Value(2), batches[1][0].points.value);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_throttle_disables_batching_despite_monitor_default() {
        let client = RecordingClient::new();
        let monitor = Monitor::new(
            MonitorSettings::new("acme").with_default_throttle(Duration::from_secs(1)),
            client.clone(),
            StaticCredentials::new("token"),
        )
        .unwrap();

        let gauge = monitor
            .create_gauge(
                "jobs/active",
                MetricSettings::default().with_throttle(Duration::ZERO),
            )
            .await
            .unwrap();

        gauge.report(1).await.unwrap();
        gauge.report(2).await.unwrap();

        assert_eq!(2, client.batches().len());
    }

    #[tokio::test(start_paused = true)]
    async fn inherits_the_monitor_default_throttle() {
        let client = RecordingClient::new();
        let monitor = Monitor::new(
            MonitorSettings::new("acme").with_default_throttle(Duration::from_millis(100)),
            client.clone(),
            StaticCredentials::new("token"),
        )
        .unwrap();

        let gauge = monitor
            .create_gauge("jobs/active", MetricSettings::default())
            .await
            .unwrap();

        let (first, second) = tokio::join!(gauge.report(1), gauge.report(2));
        first.unwrap();
        second.unwrap();

        assert_eq!(1, client.batches().len());
    }
}
