//! Lazily connected, expiry-aware session to the coordination store.
//!
//! One [`SessionManager`] is shared by every clock and lock in a process. The
//! first caller of [`SessionManager::get`] opens the session and waits for
//! the connected notification; later callers get the cached handle. When the
//! store reports the session expired, the cached handle is discarded and the
//! next `get` connects again.
//!
//! Notifications are tagged with a connection generation so that a late
//! event from an abandoned session never disturbs its replacement.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use ordinal_constants::session::DEFAULT_CONNECTION_TIMEOUT_MS;
use ordinal_constants::session::DEFAULT_ENSEMBLE;
use ordinal_constants::session::DEFAULT_SESSION_TIMEOUT_MS;
use ordinal_constants::session::MAX_SERVERS_FILE_SIZE;
use ordinal_store::CoordinationStore;
use ordinal_store::EventType;
use ordinal_store::KeeperState;
use ordinal_store::SessionConnector;
use ordinal_store::SessionWatcher;
use ordinal_store::WatchedEvent;
use parking_lot::Mutex;
use parking_lot::RwLock;
use snafu::ResultExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::ConnectSnafu;
use crate::error::ServerListSnafu;
use crate::error::SessionError;

/// Session manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// File whose first line is the ensemble address list; overrides
    /// `default_servers` when set.
    pub servers_file: Option<PathBuf>,
    /// Ensemble used when no file is configured.
    pub default_servers: String,
    /// Session timeout requested from the ensemble.
    pub session_timeout: Duration,
    /// How long `get` waits for the connected notification.
    pub connection_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            servers_file: None,
            default_servers: DEFAULT_ENSEMBLE.to_string(),
            session_timeout: Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MS),
            connection_timeout: Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS),
        }
    }
}

/// Lifecycle of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been opened, or the last attempt was abandoned.
    Disconnected,
    /// A session was opened and is waiting for the connected notification.
    Connecting,
    /// The cached handle is live.
    Connected,
    /// The store expired the session; the handle has been discarded.
    Expired,
}

struct CachedHandle {
    generation: u64,
    store: Arc<dyn CoordinationStore>,
}

struct SessionShared {
    handle: RwLock<Option<CachedHandle>>,
    generation: AtomicU64,
    state: watch::Sender<SessionState>,
}

impl SessionShared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn on_connected(&self, generation: u64) {
        if !self.is_current(generation) {
            debug!(generation, "ignoring connected event from abandoned session");
            return;
        }
        info!(generation, "received connected event, notifying waiting caller");
        self.state.send_replace(SessionState::Connected);
    }

    fn on_expired(&self, generation: u64) {
        if !self.is_current(generation) {
            debug!(generation, "ignoring expiry of abandoned session");
            return;
        }
        info!(generation, "session expired event, disposing of client instance");
        let mut handle = self.handle.write();
        if handle.as_ref().is_some_and(|cached| cached.generation == generation) {
            *handle = None;
        }
        self.state.send_replace(SessionState::Expired);
    }

    /// Cache `store` as the live handle unless its session already ended.
    ///
    /// Checked under the handle lock, which `on_expired` also holds while it
    /// publishes the expiry, so an expiry is either seen here or clears the
    /// handle afterwards.
    fn install(&self, generation: u64, store: &Arc<dyn CoordinationStore>) -> bool {
        let mut handle = self.handle.write();
        if !self.is_current(generation) || *self.state.borrow() != SessionState::Connected {
            return false;
        }
        *handle = Some(CachedHandle {
            generation,
            store: store.clone(),
        });
        true
    }

    fn abandon(&self, generation: u64) {
        if self
            .generation
            .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.state.send_replace(SessionState::Disconnected);
        }
    }
}

/// A connection attempt that has not been installed yet.
///
/// Dropping it unfinished (the caller of `get` went away) abandons the
/// generation and closes the half-built session in the background.
struct PendingConnect {
    shared: Arc<SessionShared>,
    generation: u64,
    store: Option<Arc<dyn CoordinationStore>>,
    armed: bool,
}

impl PendingConnect {
    fn new(shared: Arc<SessionShared>, generation: u64) -> Self {
        Self {
            shared,
            generation,
            store: None,
            armed: true,
        }
    }

    /// The attempt succeeded; leave everything in place.
    fn complete(mut self) {
        self.armed = false;
    }

    /// Abandon the attempt and wait for its session to close.
    async fn discard(mut self) {
        self.armed = false;
        self.shared.abandon(self.generation);
        if let Some(store) = self.store.take() {
            if let Err(err) = store.close().await {
                debug!(error = %err, "closing abandoned session failed");
            }
        }
    }
}

impl Drop for PendingConnect {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.shared.abandon(self.generation);
        let Some(store) = self.store.take() else {
            return;
        };
        warn!(generation = self.generation, "connect cancelled, closing half-built session");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            if let Err(err) = store.close().await {
                debug!(error = %err, "closing cancelled session failed");
            }
        });
    }
}

/// Watcher handed to the connector for one connection generation.
struct GenerationWatcher {
    shared: Weak<SessionShared>,
    generation: u64,
}

impl SessionWatcher for GenerationWatcher {
    fn process(&self, event: WatchedEvent) {
        if event.event_type != EventType::None {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match event.keeper_state {
            KeeperState::SyncConnected => shared.on_connected(self.generation),
            KeeperState::Expired => shared.on_expired(self.generation),
            _ => {}
        }
    }
}

/// Owner of the process-wide session.
pub struct SessionManager {
    connector: Arc<dyn SessionConnector>,
    config: SessionConfig,
    shared: Arc<SessionShared>,
    connect_gate: tokio::sync::Mutex<()>,
    ensemble: Mutex<Option<String>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn SessionConnector>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            connector,
            config,
            shared: Arc::new(SessionShared {
                handle: RwLock::new(None),
                generation: AtomicU64::new(0),
                state,
            }),
            connect_gate: tokio::sync::Mutex::new(()),
            ensemble: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Live store handle, connecting first if needed.
    ///
    /// Blocks until the connected notification arrives or the connection
    /// timeout elapses. Never retries on its own.
    pub async fn get(&self) -> Result<Arc<dyn CoordinationStore>, SessionError> {
        if let Some(store) = self.cached() {
            return Ok(store);
        }

        let _gate = self.connect_gate.lock().await;
        if let Some(store) = self.cached() {
            return Ok(store);
        }
        info!("no session cached, connecting");
        self.connect().await
    }

    /// Drop the cached handle if it belongs to `store`'s session.
    ///
    /// Used by callers that observe a fatal error before the expiry
    /// notification arrives.
    pub fn invalidate(&self, store: &Arc<dyn CoordinationStore>) {
        let mut handle = self.shared.handle.write();
        let matches = handle
            .as_ref()
            .is_some_and(|cached| cached.store.session_id() == store.session_id());
        if matches {
            warn!(session_id = store.session_id(), "invalidating cached session");
            *handle = None;
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            self.shared.state.send_replace(SessionState::Expired);
        }
    }

    /// Forget the cached handle and the cached ensemble list.
    pub fn reset(&self) {
        info!("resetting session manager");
        *self.ensemble.lock() = None;
        *self.shared.handle.write() = None;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.state.send_replace(SessionState::Disconnected);
    }

    /// Ensemble address list, read once and cached until [`Self::reset`].
    pub fn ensemble(&self) -> Result<String, SessionError> {
        let mut cached = self.ensemble.lock();
        if let Some(list) = cached.as_ref() {
            return Ok(list.clone());
        }
        let list = read_ensemble_list(&self.config)?;
        info!(ensemble = %list, "read ensemble list");
        *cached = Some(list.clone());
        Ok(list)
    }

    fn cached(&self) -> Option<Arc<dyn CoordinationStore>> {
        self.shared.handle.read().as_ref().map(|cached| cached.store.clone())
    }

    async fn connect(&self) -> Result<Arc<dyn CoordinationStore>, SessionError> {
        let ensemble = self.ensemble()?;
        let deadline = Instant::now() + self.config.connection_timeout;
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.shared.state.subscribe();
        self.shared.state.send_replace(SessionState::Connecting);
        let mut pending = PendingConnect::new(self.shared.clone(), generation);

        info!(
            ensemble = %ensemble,
            session_timeout_ms = self.config.session_timeout.as_millis() as u64,
            generation,
            "creating new session"
        );
        let watcher = Arc::new(GenerationWatcher {
            shared: Arc::downgrade(&self.shared),
            generation,
        });
        let opened = tokio::time::timeout_at(
            deadline,
            self.connector.connect(&ensemble, self.config.session_timeout, watcher),
        )
        .await;
        let store = match opened {
            Ok(Ok(store)) => store,
            Ok(Err(err)) => {
                pending.discard().await;
                return Err(err).context(ConnectSnafu { ensemble });
            }
            Err(_) => {
                pending.discard().await;
                return Err(self.timed_out(ensemble));
            }
        };
        pending.store = Some(store.clone());

        info!("waiting for connection to ensemble");
        let outcome = tokio::time::timeout_at(deadline, async {
            state
                .wait_for(|s| matches!(s, SessionState::Connected | SessionState::Expired))
                .await
                .map(|reached| *reached)
        })
        .await;

        let failure = match outcome {
            Ok(Ok(SessionState::Connected)) if self.shared.install(generation, &store) => None,
            Ok(Ok(_)) => Some(SessionError::ExpiredWhileConnecting {
                ensemble: ensemble.clone(),
            }),
            Ok(Err(_)) | Err(_) => Some(self.timed_out(ensemble.clone())),
        };
        if let Some(err) = failure {
            warn!(error = %err, "discarding half-built session");
            pending.discard().await;
            return Err(err);
        }

        pending.complete();
        info!(session_id = store.session_id(), "session connected");
        Ok(store)
    }

    fn timed_out(&self, ensemble: String) -> SessionError {
        SessionError::ConnectionTimeout {
            ensemble,
            timeout_ms: self.config.connection_timeout.as_millis() as u64,
        }
    }
}

fn read_ensemble_list(config: &SessionConfig) -> Result<String, SessionError> {
    let (raw, origin) = match &config.servers_file {
        Some(path) => {
            info!(path = %path.display(), "initialising server list from file");
            let size = std::fs::metadata(path).context(ServerListSnafu { path: path.clone() })?.len();
            if size > MAX_SERVERS_FILE_SIZE {
                return Err(SessionError::ServerListTooLarge {
                    path: path.clone(),
                    size,
                    max: MAX_SERVERS_FILE_SIZE,
                });
            }
            let contents = std::fs::read_to_string(path).context(ServerListSnafu { path: path.clone() })?;
            (contents, path.display().to_string())
        }
        None => {
            info!("no server list file configured, using default");
            (config.default_servers.clone(), "default configuration".to_string())
        }
    };

    let list = raw.lines().next().unwrap_or_default().trim().to_string();
    if list.is_empty() {
        return Err(SessionError::EmptyServerList { origin });
    }
    Ok(list)
}
