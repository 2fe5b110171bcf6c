//! Interface boundary to the remote ingestion service.
//!
//! The crate never talks to the network itself. Implementations of
//! [`MonitoringClient`] and [`CredentialProvider`] perform the actual
//! descriptor registration, descriptor deletion, batch writes and credential
//! acquisition; the batching core treats them as opaque callables whose
//! errors pass through unchanged.

use serde::Serialize;

use crate::error::{AuthError, TransportError};
use crate::point::{DataPoint, MetricKind, ValueType};

/// Opaque credential token attached to every remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Schema of one label accepted by a metric descriptor.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelDescriptor {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LabelDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value_type: None,
            description: None,
        }
    }

    pub fn with_value_type(self, value_type: ValueType) -> Self {
        Self {
            value_type: Some(value_type),
            ..self
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }
}

/// Registered schema of a metric type, created remotely once per metric
/// before any points are sent for it.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub metric_kind: MetricKind,
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One batched write of accumulated points.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesRequest {
    pub name: String,
    pub time_series: Vec<DataPoint>,
}

/// Wire client for the ingestion service.
///
/// A batch send either fully succeeds or fails as a whole; the core performs
/// no retries and surfaces the returned [`TransportError`] to every caller
/// waiting on the affected flush cycle.
#[trait_variant::make(MonitoringClient: Send)]
pub trait LocalMonitoringClient {
    async fn create_descriptor(
        &self,
        credential: &Credential,
        descriptor: &MetricDescriptor,
    ) -> Result<(), TransportError>;

    async fn delete_descriptor(
        &self,
        credential: &Credential,
        name: &str,
    ) -> Result<(), TransportError>;

    async fn create_time_series(
        &self,
        credential: &Credential,
        request: &TimeSeriesRequest,
    ) -> Result<(), TransportError>;
}

/// Credential acquisition flow. Must be idempotent: the monitor memoizes the
/// first successful credential and coalesces concurrent first-time fetches.
#[trait_variant::make(CredentialProvider: Send)]
pub trait LocalCredentialProvider {
    async fn credential(&self) -> Result<Credential, AuthError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_descriptor_without_unset_optional_fields() {
        let descriptor = MetricDescriptor {
            name: "projects/acme/metricDescriptors/custom.googleapis.com/jobs/active".into(),
            metric_type: "custom.googleapis.com/jobs/active".into(),
            metric_kind: MetricKind::Gauge,
            value_type: ValueType::Int64,
            description: None,
            display_name: None,
            labels: Vec::new(),
            unit: None,
        };

        assert_eq!(
            json!({
                "name": "projects/acme/metricDescriptors/custom.googleapis.com/jobs/active",
                "type": "custom.googleapis.com/jobs/active",
                "metricKind": "GAUGE",
                "valueType": "INT64"
            }),
            serde_json::to_value(descriptor).unwrap()
        );
    }

    #[test]
    fn serializes_descriptor_metadata_when_present() {
        let descriptor = MetricDescriptor {
            name: "projects/acme/metricDescriptors/custom.googleapis.com/jobs/failed".into(),
            metric_type: "custom.googleapis.com/jobs/failed".into(),
            metric_kind: MetricKind::Cumulative,
            value_type: ValueType::Int64,
            description: Some("failed background jobs".into()),
            display_name: Some("Failed jobs".into()),
            labels: vec![LabelDescriptor::new("worker").with_description("worker pool")],
            unit: Some("1".into()),
        };

        assert_eq!(
            json!({
                "name": "projects/acme/metricDescriptors/custom.googleapis.com/jobs/failed",
                "type": "custom.googleapis.com/jobs/failed",
                "metricKind": "CUMULATIVE",
                "valueType": "INT64",
                "description": "failed background jobs",
                "displayName": "Failed jobs",
                "labels": [{"key": "worker", "description": "worker pool"}],
                "unit": "1"
            }),
            serde_json::to_value(descriptor).unwrap()
        );
    }

    #[test]
    fn serializes_batch_request_under_camel_case_keys() {
        let request = TimeSeriesRequest {
            name: "projects/acme".into(),
            time_series: Vec::new(),
        };

        assert_eq!(
            json!({"name": "projects/acme", "timeSeries": []}),
            serde_json::to_value(request).unwrap()
        );
    }
}
