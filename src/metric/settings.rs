use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::LabelDescriptor;
use crate::point::{DataPoint, ValueType};

/// Grouping function deciding which pending points coalesce before a flush.
///
/// Must be pure and deterministic for a given point's content: it runs once
/// per report to compute the merge key.
pub type GroupBy = Arc<dyn Fn(&DataPoint) -> String + Send + Sync>;

/// Per-metric configuration, all optional.
///
/// `throttle` enables batching; absent or zero means every report is sent
/// immediately as a one-element batch. Metadata fields are only used when
/// registering the metric descriptor.
#[derive(Clone, Default)]
pub struct MetricSettings {
    pub(crate) metric_domain: Option<String>,
    pub(crate) value_type: ValueType,
    pub(crate) throttle: Option<Duration>,
    pub(crate) group_by: Option<GroupBy>,
    pub(crate) description: Option<String>,
    pub(crate) display_name: Option<String>,
    pub(crate) labels: Vec<LabelDescriptor>,
    pub(crate) unit: Option<String>,
}

impl MetricSettings {
    pub fn with_metric_domain(self, metric_domain: impl Into<String>) -> Self {
        Self {
            metric_domain: Some(metric_domain.into()),
            ..self
        }
    }

    pub fn with_value_type(self, value_type: ValueType) -> Self {
        Self { value_type, ..self }
    }

    /// Accumulation window for batched sends. Zero disables batching even
    /// when the owning monitor configures a default throttle.
    pub fn with_throttle(self, throttle: Duration) -> Self {
        Self {
            throttle: Some(throttle),
            ..self
        }
    }

    pub fn with_group_by(
        self,
        group_by: impl Fn(&DataPoint) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            group_by: Some(Arc::new(group_by)),
            ..self
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_display_name(self, display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            ..self
        }
    }

    pub fn with_label(mut self, label: LabelDescriptor) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_unit(self, unit: impl Into<String>) -> Self {
        Self {
            unit: Some(unit.into()),
            ..self
        }
    }
}

impl fmt::Debug for MetricSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricSettings")
            .field("metric_domain", &self.metric_domain)
            .field("value_type", &self.value_type)
            .field("throttle", &self.throttle)
            .field("grouped", &self.group_by.is_some())
            .field("description", &self.description)
            .field("display_name", &self.display_name)
            .field("labels", &self.labels)
            .field("unit", &self.unit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_int64_without_throttle_or_grouping() {
        let settings = MetricSettings::default();

        assert_eq!(ValueType::Int64, settings.value_type);
        assert_eq!(None, settings.throttle);
        assert!(settings.group_by.is_none());
        assert_eq!(None, settings.metric_domain);
    }

    #[test]
    fn allows_chained_modification() {
        let settings = MetricSettings::default()
            .with_value_type(ValueType::Double)
            .with_throttle(Duration::from_secs(1))
            .with_unit("ms")
            .with_label(LabelDescriptor::new("queue"));

        assert_eq!(ValueType::Double, settings.value_type);
        assert_eq!(Some(Duration::from_secs(1)), settings.throttle);
        assert_eq!(Some("ms".to_string()), settings.unit);
        assert_eq!(1, settings.labels.len());
    }
}
