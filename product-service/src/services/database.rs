use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use mongodb::{
    bson::doc,
    event::sdam::{SdamEventHandler, ServerHeartbeatFailedEvent},
    options::{ClientOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use tokio::time::sleep;

use crate::models::Product;

/// Liveness of the MongoDB connection, as tracked by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

/// Shared handle to the current [`ConnectionStatus`].
///
/// Written by the connection bootstrap and by driver heartbeat events, read
/// by the health endpoint. Clones share the underlying state.
#[derive(Clone)]
pub struct ConnectionState {
    inner: Arc<RwLock<ConnectionStatus>>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ConnectionStatus::Connecting)),
        }
    }

    pub fn current(&self) -> ConnectionStatus {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.current() == ConnectionStatus::Connected
    }

    pub fn mark_connected(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = ConnectionStatus::Connected;
    }

    pub fn mark_failed(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = ConnectionStatus::Failed;
    }

    /// Records a post-connect loss. Only a live connection can become
    /// disconnected; heartbeat failures during the bootstrap window leave
    /// `Connecting` untouched.
    pub fn mark_disconnected(&self) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if *status == ConnectionStatus::Connected {
            *status = ConnectionStatus::Disconnected;
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Records driver-level connection loss into the shared state.
///
/// A loss observed here never triggers reconnection; the service keeps
/// serving and `/health` reports the degraded state until a restart.
struct HeartbeatListener {
    state: ConnectionState,
}

impl SdamEventHandler for HeartbeatListener {
    fn handle_server_heartbeat_failed_event(&self, event: ServerHeartbeatFailedEvent) {
        tracing::warn!(
            server = %event.server_address,
            error = %event.failure,
            "Server heartbeat failed"
        );
        self.state.mark_disconnected();
    }
}

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
    state: ConnectionState,
}

impl MongoDb {
    /// Build the client handle. The driver connects lazily, so no I/O
    /// happens here beyond parsing the connection string; [`Self::establish`]
    /// drives the actual connection attempts.
    pub async fn new(uri: &str, database: &str) -> Result<Self, AppError> {
        let state = ConnectionState::new();

        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            tracing::error!("Invalid MongoDB connection string: {}", e);
            AppError::from(e)
        })?;
        // Per-attempt budget; the bootstrap loop owns the overall budget.
        options.server_selection_timeout = Some(Duration::from_secs(5));
        options.retry_writes = Some(true);
        options.sdam_event_handler = Some(Arc::new(HeartbeatListener {
            state: state.clone(),
        }));

        let client = MongoClient::with_options(options).map_err(|e| {
            tracing::error!("Failed to build MongoDB client: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);

        Ok(Self { client, db, state })
    }

    /// The connection liveness handle shared with the health endpoint.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Bounded connection bootstrap: ping the server up to `max_attempts`
    /// times, `delay` apart. The delay is fixed; there is no backoff.
    ///
    /// Success flips the shared state to `Connected`. Exhaustion flips it to
    /// `Failed` and returns the error; the caller is expected to terminate
    /// the process, since the service cannot run without its datastore.
    pub async fn establish(&self, max_attempts: u32, delay: Duration) -> Result<(), AppError> {
        let client = self.client.clone();
        let result = connect_with_retry(max_attempts, delay, || {
            let client = client.clone();
            async move {
                client
                    .database("admin")
                    .run_command(doc! { "ping": 1 }, None)
                    .await
                    .map(|_| ())
            }
        })
        .await;

        match result {
            Ok(()) => {
                self.state.mark_connected();
                tracing::info!(database = %self.db.name(), "Database connected successfully");
                Ok(())
            }
            Err(e) => {
                self.state.mark_failed();
                Err(AppError::DatabaseError(anyhow::anyhow!(
                    "all {} connection attempts failed: {}",
                    max_attempts,
                    e
                )))
            }
        }
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        let created_at_index = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_desc".to_string())
                    .build(),
            )
            .build();

        self.products()
            .create_index(created_at_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create created_at index on products collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on products.created_at");

        Ok(())
    }

    pub fn products(&self) -> Collection<Product> {
        self.db.collection("products")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Run `connect` up to `max_attempts` times with a fixed `delay` between
/// attempts, returning the last error once the budget is spent.
async fn connect_with_retry<F, Fut, E>(max_attempts: u32, delay: Duration, connect: F) -> Result<(), E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 1;
    loop {
        match connect().await {
            Ok(()) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Connection established after retry");
                }
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Connection attempt failed");
                if attempt >= max_attempts {
                    tracing::error!(attempts = max_attempts, "All connection attempts failed");
                    return Err(e);
                }
                tracing::info!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn first_attempt_success_does_not_retry() {
        let calls = AtomicU32::new(0);
        let result = connect_with_retry(3, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), String>(()) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_the_primitive_succeeds() {
        let calls = AtomicU32::new(0);
        let result = connect_with_retry(5, Duration::from_millis(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("not ready".to_string())
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_makes_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = connect_with_retry(3, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("connection refused".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two inter-attempt delays of 10ms each.
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn state_starts_connecting() {
        let state = ConnectionState::new();
        assert_eq!(state.current(), ConnectionStatus::Connecting);
        assert!(!state.is_connected());
    }

    #[test]
    fn disconnect_is_only_recorded_from_connected() {
        let state = ConnectionState::new();

        state.mark_disconnected();
        assert_eq!(state.current(), ConnectionStatus::Connecting);

        state.mark_connected();
        state.mark_disconnected();
        assert_eq!(state.current(), ConnectionStatus::Disconnected);

        // Terminal: no transition resurrects a lost connection on its own.
        state.mark_disconnected();
        assert_eq!(state.current(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn failed_state_is_not_connected() {
        let state = ConnectionState::new();
        state.mark_failed();
        assert_eq!(state.current(), ConnectionStatus::Failed);
        assert!(!state.is_connected());
    }

    #[test]
    fn health_classification_is_stable_without_transitions() {
        let state = ConnectionState::new();
        state.mark_connected();
        for _ in 0..3 {
            assert!(state.is_connected());
        }
    }
}
