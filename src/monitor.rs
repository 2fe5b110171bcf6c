//! Entry point of the crate: owns the transport client, the credential
//! provider and the registry of declared metrics.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::client::{Credential, CredentialProvider, MonitoringClient};
use crate::error::{MetricError, ValidationError};
use crate::metric::{Cumulative, Gauge, MetricCore, MetricSettings};
use crate::point::{MetricKind, MonitoredResource};

/// Monitor-wide configuration: the project everything reports into, the
/// monitored resource attached to every point and an optional throttle
/// inherited by metrics that do not set their own.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    project: String,
    resource: MonitoredResource,
    default_throttle: Option<Duration>,
}

impl MonitorSettings {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            resource: MonitoredResource::default(),
            default_throttle: None,
        }
    }

    pub fn with_resource(self, resource: MonitoredResource) -> Self {
        Self { resource, ..self }
    }

    pub fn with_default_throttle(self, default_throttle: Duration) -> Self {
        Self {
            default_throttle: Some(default_throttle),
            ..self
        }
    }
}

/// State shared between the monitor and every metric it created.
pub(crate) struct MonitorShared<C, P> {
    client: C,
    credentials: P,
    credential: OnceCell<Credential>,
    project_name: String,
    resource: MonitoredResource,
    default_throttle: Option<Duration>,
}

impl<C, P> MonitorShared<C, P>
where
    C: MonitoringClient + Send + Sync + 'static,
    P: CredentialProvider + Send + Sync + 'static,
{
    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    pub(crate) fn project_name(&self) -> &str {
        &self.project_name
    }

    pub(crate) fn resource(&self) -> &MonitoredResource {
        &self.resource
    }

    pub(crate) fn default_throttle(&self) -> Option<Duration> {
        self.default_throttle
    }

    /// Resolves the credential once and serves the cached copy afterwards.
    /// Concurrent first calls share a single provider lookup. A failed
    /// lookup is not cached, so a later call retries the provider.
    pub(crate) async fn credential(&self) -> Result<Credential, MetricError> {
        let credential = self
            .credential
            .get_or_try_init(|| self.credentials.credential())
            .await?;
        Ok(credential.clone())
    }
}

/// Factory and registry for gauge and cumulative metrics reporting into one
/// project.
///
/// Metrics hold a shared handle to the monitor state, so a monitor can be
/// dropped before the metrics it created without affecting them.
pub struct Monitor<C, P> {
    shared: Arc<MonitorShared<C, P>>,
    metrics: Mutex<Vec<Weak<MetricCore<C, P>>>>,
}

impl<C, P> Monitor<C, P>
where
    C: MonitoringClient + Send + Sync + 'static,
    P: CredentialProvider + Send + Sync + 'static,
{
    pub fn new(
        settings: MonitorSettings,
        client: C,
        credentials: P,
    ) -> Result<Self, ValidationError> {
        if settings.project.is_empty() {
            return Err(ValidationError::MissingField("project"));
        }
        if settings.resource.resource_type().is_empty() {
            return Err(ValidationError::MissingField("resource.type"));
        }

        Ok(Self {
            shared: Arc::new(MonitorShared {
                client,
                credentials,
                credential: OnceCell::new(),
                project_name: format!("projects/{}", settings.project),
                resource: settings.resource,
                default_throttle: settings.default_throttle,
            }),
            metrics: Mutex::new(Vec::new()),
        })
    }

    /// `projects/{project}` name every request is addressed to.
    pub fn project_name(&self) -> &str {
        self.shared.project_name()
    }

    /// Declares a gauge metric and registers its descriptor remotely. The
    /// returned handle is ready for reporting.
    pub async fn create_gauge(
        &self,
        metric_type: &str,
        settings: MetricSettings,
    ) -> Result<Gauge<C, P>, MetricError> {
        let core = self.create_metric(MetricKind::Gauge, metric_type, settings).await?;
        Ok(Gauge::new(core))
    }

    /// Declares a cumulative metric and registers its descriptor remotely.
    /// Its accumulation window is anchored at the registration instant until
    /// a report overrides it.
    pub async fn create_cumulative(
        &self,
        metric_type: &str,
        settings: MetricSettings,
    ) -> Result<Cumulative<C, P>, MetricError> {
        let core = self
            .create_metric(MetricKind::Cumulative, metric_type, settings)
            .await?;
        let cumulative = Cumulative::new(core);
        cumulative.mark_created(Utc::now());
        Ok(cumulative)
    }

    async fn create_metric(
        &self,
        kind: MetricKind,
        metric_type: &str,
        settings: MetricSettings,
    ) -> Result<Arc<MetricCore<C, P>>, MetricError> {
        let core = Arc::new(MetricCore::new(
            Arc::clone(&self.shared),
            kind,
            metric_type,
            settings,
        )?);
        core.create().await?;

        debug!(metric = %core.name(), "registered metric descriptor");
        self.metrics.lock().push(Arc::downgrade(&core));
        Ok(core)
    }

    /// Cancels the flush timer of every metric created through this monitor.
    ///
    /// Reports awaiting an abandoned flush are never settled; intended for
    /// teardown paths where in-flight observations may be discarded.
    pub fn clear_timers(&self) {
        let mut metrics = self.metrics.lock();
        metrics.retain(|metric| match metric.upgrade() {
            Some(metric) => {
                metric.clear_timers();
                true
            }
            None => false,
        });
    }
}
