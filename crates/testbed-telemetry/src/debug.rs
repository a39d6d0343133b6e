//! Remote debugger arbitration
//!
//! Exactly one process per session may own the debug listener: the
//! controller. Workers must never bind it, since every worker would race for
//! the same port. The arbiter starts the listener at most once per process
//! and optionally blocks the controller until a client attaches.

use crate::config::DebuggerConfig;
use crate::error::{Result, TelemetryError};
use crate::logging::{heading_block, BANNER_WIDTH};
use crate::session::ProcessRole;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::net::{TcpListener, TcpStream};

/// Listener that a remote debugger client connects to
#[async_trait]
pub trait DebugBackend: Send + Sync {
    /// Start listening; returns the bound address
    async fn listen(&self, host: &str, port: u16) -> Result<SocketAddr>;

    /// Block until a client attaches; returns the client address
    async fn wait_for_client(&self) -> Result<SocketAddr>;

    /// Whether a client is already attached
    fn is_client_connected(&self) -> bool;
}

/// Plain TCP listener backend
///
/// The accepted client stream is held for the life of the backend; dropping
/// it would hang up on the debugger.
#[derive(Default)]
pub struct TcpDebugBackend {
    listener: tokio::sync::Mutex<Option<TcpListener>>,
    client: parking_lot::Mutex<Option<(TcpStream, SocketAddr)>>,
}

impl TcpDebugBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the attached client, if any
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client.lock().as_ref().map(|(_, peer)| *peer)
    }
}

#[async_trait]
impl DebugBackend for TcpDebugBackend {
    async fn listen(&self, host: &str, port: u16) -> Result<SocketAddr> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| TelemetryError::Debugger(format!("bind {}:{} failed: {}", host, port, e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| TelemetryError::Debugger(e.to_string()))?;
        *self.listener.lock().await = Some(listener);
        Ok(addr)
    }

    async fn wait_for_client(&self) -> Result<SocketAddr> {
        let guard = self.listener.lock().await;
        let listener = guard
            .as_ref()
            .ok_or_else(|| TelemetryError::Debugger("listener not started".to_string()))?;
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| TelemetryError::Debugger(format!("accept failed: {}", e)))?;
        *self.client.lock() = Some((stream, peer));
        Ok(peer)
    }

    fn is_client_connected(&self) -> bool {
        self.client.lock().is_some()
    }
}

/// What `maybe_attach` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// `auto_debug` is off
    Disabled,
    /// Called from a worker; nothing was started
    SkippedOnWorker,
    /// An earlier call already started the listener or a client is attached
    AlreadyActive,
    /// Listener started, not waiting for a client
    Listening { addr: SocketAddr },
    /// Listener started and a client attached
    ClientConnected { addr: SocketAddr, client: SocketAddr },
    /// The listener could not be started; the session carries on without it
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArbiterState {
    Idle,
    Listening,
    Failed,
}

/// Decides once whether to start the debug listener.
///
/// Clones share state. [`DebugArbiter::process`] hands out the one arbiter
/// every session in this process goes through, so a second session never
/// binds a second listener.
#[derive(Clone)]
pub struct DebugArbiter {
    backend: Arc<dyn DebugBackend>,
    state: Arc<tokio::sync::Mutex<ArbiterState>>,
}

static PROCESS_ARBITER: OnceLock<DebugArbiter> = OnceLock::new();

impl DebugArbiter {
    /// Arbiter with its own state, independent of the process-wide one
    pub fn new(backend: Arc<dyn DebugBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(tokio::sync::Mutex::new(ArbiterState::Idle)),
        }
    }

    /// The process-wide arbiter over a TCP backend
    pub fn process() -> Self {
        PROCESS_ARBITER
            .get_or_init(|| Self::new(Arc::new(TcpDebugBackend::new())))
            .clone()
    }

    /// Start the listener if configured to.
    ///
    /// Errors are logged and reported through the outcome; they never abort
    /// the session.
    pub async fn maybe_attach(&self, config: &DebuggerConfig, role: &ProcessRole) -> AttachOutcome {
        if !config.auto_debug {
            return AttachOutcome::Disabled;
        }
        if let ProcessRole::Worker(worker) = role {
            tracing::debug!(worker = %worker, "debugger arbitration skipped on worker");
            return AttachOutcome::SkippedOnWorker;
        }

        // Held for the whole attach so concurrent callers cannot both bind.
        let mut state = self.state.lock().await;
        match *state {
            ArbiterState::Listening => return AttachOutcome::AlreadyActive,
            ArbiterState::Failed => {
                return AttachOutcome::Failed {
                    reason: "an earlier attempt to start the listener failed".to_string(),
                }
            }
            ArbiterState::Idle => {}
        }
        if self.backend.is_client_connected() {
            *state = ArbiterState::Listening;
            return AttachOutcome::AlreadyActive;
        }

        let addr = match self.backend.listen(&config.host, config.port).await {
            Ok(addr) => addr,
            Err(e) => {
                *state = ArbiterState::Failed;
                tracing::error!("Error trying to invoke the auto-debugging functionality: {}", e);
                return AttachOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };
        *state = ArbiterState::Listening;

        let banner = heading_block(
            &[
                "debugger is ON".to_string(),
                format!("Host = {}", config.host),
                format!("Port = {}", addr.port()),
            ],
            BANNER_WIDTH,
        );
        tracing::warn!("\n{}", banner);

        if !config.wait_for_connect {
            return AttachOutcome::Listening { addr };
        }

        tracing::warn!("Waiting for debugger to connect...");
        match self.backend.wait_for_client().await {
            Ok(client) => {
                tracing::info!(%client, "debugger client attached");
                AttachOutcome::ClientConnected { addr, client }
            }
            Err(e) => {
                tracing::error!("Error while waiting for debugger client: {}", e);
                AttachOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
