//! In-memory collaborator doubles for exercising the batching core without a
//! network. Available to downstream crates through the `test_util` feature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::client::{
    Credential, CredentialProvider, MetricDescriptor, MonitoringClient, TimeSeriesRequest,
};
use crate::error::{AuthError, TransportError};
use crate::point::DataPoint;

#[derive(Default)]
struct RecordingState {
    descriptors: Vec<MetricDescriptor>,
    deleted: Vec<String>,
    batches: Vec<Vec<DataPoint>>,
    fail_next_descriptor: Option<TransportError>,
    fail_next_send: Option<TransportError>,
    gate: Option<Arc<Semaphore>>,
}

/// Client double that records every call and can be told to fail or stall
/// the next batch send.
#[derive(Clone, Default)]
pub struct RecordingClient {
    state: Arc<Mutex<RecordingState>>,
    sends_in_flight: Arc<AtomicUsize>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptors registered so far, in call order.
    pub fn descriptors(&self) -> Vec<MetricDescriptor> {
        self.state.lock().descriptors.clone()
    }

    /// Resource names of deleted descriptors, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// Point batches written so far, in call order.
    pub fn batches(&self) -> Vec<Vec<DataPoint>> {
        self.state.lock().batches.clone()
    }

    pub fn fail_next_descriptor(&self, error: TransportError) {
        self.state.lock().fail_next_descriptor = Some(error);
    }

    pub fn fail_next_send(&self, error: TransportError) {
        self.state.lock().fail_next_send = Some(error);
    }

    /// Parks subsequent batch sends until [`release_send`] grants them
    /// through, one permit per send.
    ///
    /// [`release_send`]: RecordingClient::release_send
    pub fn hold_sends(&self) {
        self.state.lock().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets one parked batch send proceed.
    pub fn release_send(&self) {
        if let Some(gate) = &self.state.lock().gate {
            gate.add_permits(1);
        }
    }

    /// Number of batch sends currently awaiting completion.
    pub fn sends_in_flight(&self) -> usize {
        self.sends_in_flight.load(Ordering::SeqCst)
    }
}

impl MonitoringClient for RecordingClient {
    async fn create_descriptor(
        &self,
        _credential: &Credential,
        descriptor: &MetricDescriptor,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_descriptor.take() {
            return Err(error);
        }
        state.descriptors.push(descriptor.clone());
        Ok(())
    }

    async fn delete_descriptor(
        &self,
        _credential: &Credential,
        name: &str,
    ) -> Result<(), TransportError> {
        self.state.lock().deleted.push(name.to_string());
        Ok(())
    }

    async fn create_time_series(
        &self,
        _credential: &Credential,
        request: &TimeSeriesRequest,
    ) -> Result<(), TransportError> {
        self.sends_in_flight.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.lock().gate.clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.sends_in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_send.take() {
            return Err(error);
        }
        state.batches.push(request.time_series.clone());
        Ok(())
    }
}

/// Credential provider double serving a fixed token, counting lookups and
/// optionally failing the next one.
#[derive(Clone)]
pub struct StaticCredentials {
    token: String,
    fetches: Arc<AtomicUsize>,
    fail_next: Arc<Mutex<Option<AuthError>>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            fetches: Arc::new(AtomicUsize::new(0)),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    /// Number of provider lookups performed so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, error: AuthError) {
        *self.fail_next.lock() = Some(error);
    }
}

impl CredentialProvider for StaticCredentials {
    async fn credential(&self) -> Result<Credential, AuthError> {
        // suspend once so concurrent first lookups overlap in tests
        tokio::task::yield_now().await;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        Ok(Credential::new(self.token.clone()))
    }
}
