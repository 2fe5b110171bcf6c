//! Client-side batching and reporting of custom metrics for a remote
//! time-series ingestion API.
//!
//! A [`Monitor`] owns the transport client and credential provider and hands
//! out [`Gauge`] and [`Cumulative`] handles. Reports on a throttled metric
//! accumulate in a per-metric buffer, merge per group key and flush as one
//! batched write when the throttle window elapses; every report call resolves
//! with the outcome of the batch that carried its point.
//!
//! ```no_run
//! use std::time::Duration;
//! use telemeter::{Monitor, MonitorSettings, MetricSettings};
//! # use telemeter::{AuthError, Credential, CredentialProvider, MetricDescriptor,
//! #     MonitoringClient, TimeSeriesRequest, TransportError};
//! # struct HttpClient;
//! # impl MonitoringClient for HttpClient {
//! #     async fn create_descriptor(&self, _: &Credential, _: &MetricDescriptor)
//! #         -> Result<(), TransportError> { Ok(()) }
//! #     async fn delete_descriptor(&self, _: &Credential, _: &str)
//! #         -> Result<(), TransportError> { Ok(()) }
//! #     async fn create_time_series(&self, _: &Credential, _: &TimeSeriesRequest)
//! #         -> Result<(), TransportError> { Ok(()) }
//! # }
//! # struct TokenFile;
//! # impl CredentialProvider for TokenFile {
//! #     async fn credential(&self) -> Result<Credential, AuthError> {
//! #         Ok(Credential::new("token"))
//! #     }
//! # }
//!
//! # async fn example() -> Result<(), telemeter::MetricError> {
//! let monitor = Monitor::new(
//!     MonitorSettings::new("acme").with_default_throttle(Duration::from_secs(1)),
//!     HttpClient,
//!     TokenFile,
//! )?;
//!
//! let gauge = monitor
//!     .create_gauge("jobs/active", MetricSettings::default())
//!     .await?;
//! gauge.report(42).await?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
mod error;
mod metric;
mod monitor;
mod point;

#[cfg(any(test, feature = "test_util"))]
pub mod test_util;

pub use client::{
    Credential, CredentialProvider, LabelDescriptor, LocalCredentialProvider,
    LocalMonitoringClient, MetricDescriptor, MonitoringClient, TimeSeriesRequest,
};
pub use error::{AuthError, MetricError, TransportError, ValidationError};
pub use metric::{
    Cumulative, CumulativeOptions, Gauge, GaugeOptions, GroupBy, MetricSettings,
    CUSTOM_METRIC_DOMAIN,
};
pub use monitor::{Monitor, MonitorSettings};
pub use point::{
    DataPoint, Labels, MetricKind, MetricRef, MonitoredResource, PointData, TimeInterval,
    TypedValue, ValueType,
};
