use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metric and resource labels, keyed deterministically for stable payloads.
pub type Labels = BTreeMap<String, String>;

/// Kind of a declared time series, which also selects the collision policy
/// applied when two pending points share a group key.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    Gauge,
    Cumulative,
}

/// Declared type of the values a metric accepts.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    #[default]
    Int64,
    Double,
    Bool,
    String,
}

impl ValueType {
    /// Whether two values of this type can be accumulated by a cumulative
    /// metric's merge policy.
    pub(crate) fn is_summable(self) -> bool {
        matches!(self, ValueType::Int64 | ValueType::Double)
    }
}

/// One reported value, tagged on the wire with the field name matching its
/// type (`int64Value`, `doubleValue`, ...).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum TypedValue {
    Int64Value(i64),
    DoubleValue(f64),
    BoolValue(bool),
    StringValue(String),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Int64Value(_) => ValueType::Int64,
            TypedValue::DoubleValue(_) => ValueType::Double,
            TypedValue::BoolValue(_) => ValueType::Bool,
            TypedValue::StringValue(_) => ValueType::String,
        }
    }

    /// Sums two numeric values of the same variant. Returns `None` for
    /// non-numeric values or mismatched variants.
    pub(crate) fn saturating_add(&self, other: &TypedValue) -> Option<TypedValue> {
        match (self, other) {
            (TypedValue::Int64Value(left), TypedValue::Int64Value(right)) => {
                Some(TypedValue::Int64Value(left.saturating_add(*right)))
            }
            (TypedValue::DoubleValue(left), TypedValue::DoubleValue(right)) => {
                Some(TypedValue::DoubleValue(left + right))
            }
            _ => None,
        }
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Int64Value(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::DoubleValue(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::BoolValue(value)
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::StringValue(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::StringValue(value.to_string())
    }
}

/// Time window covered by one data point. Gauges carry only an end time,
/// cumulatives additionally the tracked running start time.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
}

/// The monitored entity points are attributed to.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    labels: Labels,
}

impl MonitoredResource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            labels: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }
}

impl Default for MonitoredResource {
    fn default() -> Self {
        Self::new("global")
    }
}

/// Fully qualified metric identity carried by each point.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MetricRef {
    #[serde(rename = "type")]
    pub metric_type: String,
    pub labels: Labels,
}

/// Interval and value of a point, the only part a merge replaces.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PointData {
    pub interval: TimeInterval,
    pub value: TypedValue,
}

/// One observation formatted into the wire shape accepted by the batch send.
///
/// Immutable once formatted except for `points`: merging two points under the
/// same group key replaces interval and value but never the identity fields
/// the grouping function may have inspected.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub metric: MetricRef,
    pub resource: MonitoredResource,
    pub metric_kind: MetricKind,
    pub value_type: ValueType,
    pub points: PointData,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_values_under_their_type_specific_field_name() {
        assert_eq!(
            json!({"int64Value": 42}),
            serde_json::to_value(TypedValue::Int64Value(42)).unwrap()
        );
        assert_eq!(
            json!({"doubleValue": 0.5}),
            serde_json::to_value(TypedValue::DoubleValue(0.5)).unwrap()
        );
        assert_eq!(
            json!({"boolValue": true}),
            serde_json::to_value(TypedValue::BoolValue(true)).unwrap()
        );
        assert_eq!(
            json!({"stringValue": "up"}),
            serde_json::to_value(TypedValue::StringValue("up".into())).unwrap()
        );
    }

    #[test]
    fn defaults_value_type_to_int64() {
        assert_eq!(ValueType::Int64, ValueType::default());
    }

    #[test]
    fn serializes_kinds_and_value_types_in_wire_casing() {
        assert_eq!(
            json!("CUMULATIVE"),
            serde_json::to_value(MetricKind::Cumulative).unwrap()
        );
        assert_eq!(
            json!("INT64"),
            serde_json::to_value(ValueType::Int64).unwrap()
        );
    }

    #[test]
    fn sums_matching_numeric_values() {
        let sum = TypedValue::Int64Value(2)
            .saturating_add(&TypedValue::Int64Value(3))
            .unwrap();

        assert_eq!(TypedValue::Int64Value(5), sum);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let sum = TypedValue::Int64Value(i64::MAX)
            .saturating_add(&TypedValue::Int64Value(1))
            .unwrap();

        assert_eq!(TypedValue::Int64Value(i64::MAX), sum);
    }

    #[test]
    fn refuses_to_sum_mismatched_or_non_numeric_values() {
        assert_eq!(
            None,
            TypedValue::Int64Value(1).saturating_add(&TypedValue::DoubleValue(1.0))
        );
        assert_eq!(
            None,
            TypedValue::BoolValue(true).saturating_add(&TypedValue::BoolValue(true))
        );
    }

    #[test]
    fn omits_absent_start_time_from_interval() {
        let interval = TimeInterval {
            start_time: None,
            end_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        assert_eq!(
            json!({"endTime": "2024-05-01T12:00:00Z"}),
            serde_json::to_value(interval).unwrap()
        );
    }

    #[test]
    fn serializes_data_point_in_full_wire_shape() {
        let point = DataPoint {
            metric: MetricRef {
                metric_type: "custom.googleapis.com/queue/depth".into(),
                labels: Labels::from([("queue".into(), "billing".into())]),
            },
            resource: MonitoredResource::default(),
            metric_kind: MetricKind::Gauge,
            value_type: ValueType::Int64,
            points: PointData {
                interval: TimeInterval {
                    start_time: None,
                    end_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                },
                value: TypedValue::Int64Value(7),
            },
        };

        assert_eq!(
            json!({
                "metric": {
                    "type": "custom.googleapis.com/queue/depth",
                    "labels": {"queue": "billing"}
                },
                "resource": {"type": "global"},
                "metricKind": "GAUGE",
                "valueType": "INT64",
                "points": {
                    "interval": {"endTime": "2024-05-01T12:00:00Z"},
                    "value": {"int64Value": 7}
                }
            }),
            serde_json::to_value(point).unwrap()
        );
    }
}
