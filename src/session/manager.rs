//! Session lifecycle state machine.
//!
//! One [`SessionManager`] owns one logical conversation: its phase, its
//! current configuration, and the transport underneath. Every lifecycle
//! change goes through a named operation on the manager; there are no
//! free-floating connection flags anywhere else.
//!
//! The phase carries the disconnect origin as data: a server-initiated
//! drop lands in the same `Disconnected` phase as a user stop, but the
//! two are distinguishable and a server drop never re-enters `Active`
//! on its own. Reconnection happens only through [`SessionManager::reconnect`],
//! which re-derives the configuration from the current context.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::core::live::{
    BoxedLiveTransport, CloseCallback, CloseEvent, LiveConfig, LiveError, ToolCallCallback,
    ToolInvocation,
};

use super::builder::{SessionContext, build_config};
use super::handler::ToolCallHandler;
use super::store::ResultStore;

// =============================================================================
// Phase Model
// =============================================================================

/// Who ended the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOrigin {
    /// The local user asked for the stop
    Local,
    /// The remote side dropped the connection
    Remote,
}

impl DisconnectOrigin {
    /// Stable name for logging and wire messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Lifecycle phase of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session yet
    #[default]
    Idle,
    /// Connect in flight
    Connecting,
    /// Live conversation in progress
    Active,
    /// Connection ended without a result; `origin` says by whom
    Disconnected {
        /// Who ended the connection
        origin: DisconnectOrigin,
    },
    /// A tool result was produced; terminal until reset
    Completed,
}

impl SessionPhase {
    /// Phase name without origin detail.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Disconnected { .. } => "disconnected",
            Self::Completed => "completed",
        }
    }

    /// Disconnect origin, when in the disconnected phase.
    pub fn disconnect_origin(&self) -> Option<DisconnectOrigin> {
        match self {
            Self::Disconnected { origin } => Some(*origin),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected { origin } => write!(f, "disconnected({})", origin.as_str()),
            other => write!(f, "{}", other.name()),
        }
    }
}

// =============================================================================
// Errors and Observers
// =============================================================================

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation is not valid in the current phase
    #[error("cannot {action} while session is {from}")]
    InvalidTransition {
        /// Phase the session was in
        from: &'static str,
        /// Operation that was attempted
        action: &'static str,
    },

    /// The transport failed
    #[error(transparent)]
    Transport(#[from] LiveError),
}

/// Where a delivered result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Extracted from the live session
    Live,
    /// Recovered from the durable store at session start
    Recovered,
}

/// Observer for extracted or recovered tool results.
pub type ResultObserver = Arc<dyn Fn(Value, ResultSource) + Send + Sync>;

/// Observer for phase changes.
pub type PhaseObserver = Arc<dyn Fn(SessionPhase) + Send + Sync>;

// =============================================================================
// Manager
// =============================================================================

struct ManagerState {
    phase: SessionPhase,
    /// Config of the current (or last) established session
    config: Option<LiveConfig>,
}

struct ManagerInner {
    store: Arc<dyn ResultStore>,
    state: Mutex<ManagerState>,
    result_observer: Mutex<Option<ResultObserver>>,
    phase_observer: Mutex<Option<PhaseObserver>>,
}

impl ManagerInner {
    fn notify_phase(&self, phase: SessionPhase) {
        let observer = self.phase_observer.lock().clone();
        if let Some(observer) = observer {
            observer(phase);
        }
    }

    fn notify_result(&self, result: Value, source: ResultSource) {
        let observer = self.result_observer.lock().clone();
        if let Some(observer) = observer {
            observer(result, source);
        }
    }

    /// A tool result was extracted: terminal completion when Active.
    fn complete(&self, result: Value) {
        let transitioned = {
            let mut st = self.state.lock();
            if st.phase == SessionPhase::Active {
                st.phase = SessionPhase::Completed;
                true
            } else {
                false
            }
        };
        if transitioned {
            tracing::info!("Session completed with tool result");
            self.notify_phase(SessionPhase::Completed);
        } else {
            tracing::debug!("Tool result received outside an active session");
        }
        self.notify_result(result, ResultSource::Live);
    }

    /// The server dropped the connection out from under an active session.
    fn remote_drop(&self, event: &CloseEvent) {
        let transitioned = {
            let mut st = self.state.lock();
            if st.phase == SessionPhase::Active {
                st.phase = SessionPhase::Disconnected {
                    origin: DisconnectOrigin::Remote,
                };
                true
            } else {
                false
            }
        };
        if transitioned {
            tracing::warn!(
                code = ?event.code,
                reason = ?event.reason,
                "Server ended the session"
            );
            self.notify_phase(SessionPhase::Disconnected {
                origin: DisconnectOrigin::Remote,
            });
        }
    }
}

/// Session lifecycle state machine over one transport.
pub struct SessionManager {
    inner: Arc<ManagerInner>,
    transport: Arc<AsyncMutex<BoxedLiveTransport>>,
}

impl SessionManager {
    /// Create a manager over `transport`, persisting results to `store`.
    pub fn new(transport: BoxedLiveTransport, store: Arc<dyn ResultStore>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                state: Mutex::new(ManagerState {
                    phase: SessionPhase::Idle,
                    config: None,
                }),
                result_observer: Mutex::new(None),
                phase_observer: Mutex::new(None),
            }),
            transport: Arc::new(AsyncMutex::new(transport)),
        }
    }

    /// Register the result observer (replaces any existing one).
    pub fn on_result(&self, observer: ResultObserver) {
        *self.inner.result_observer.lock() = Some(observer);
    }

    /// Register the phase observer (replaces any existing one).
    pub fn on_phase_change(&self, observer: PhaseObserver) {
        *self.inner.phase_observer.lock() = Some(observer);
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase
    }

    /// Config of the current (or last established) session.
    pub fn current_config(&self) -> Option<LiveConfig> {
        self.inner.state.lock().config.clone()
    }

    /// Start the session: `Idle -> Connecting -> Active`.
    ///
    /// Idempotent while a session is connecting or active: re-running the
    /// trigger that started the session must not reconnect. Before the
    /// connection attempt, the durable store is read once and a stranded
    /// result from a previous session is delivered through the result
    /// observer exactly like a live one.
    pub async fn start(&self, ctx: &SessionContext) -> Result<(), SessionError> {
        {
            let mut st = self.inner.state.lock();
            match st.phase {
                SessionPhase::Idle => {
                    st.phase = SessionPhase::Connecting;
                }
                SessionPhase::Connecting | SessionPhase::Active => return Ok(()),
                other => {
                    return Err(SessionError::InvalidTransition {
                        from: other.name(),
                        action: "start",
                    });
                }
            }
        }
        self.inner.notify_phase(SessionPhase::Connecting);

        if let Some(stranded) = self.inner.store.load_and_clear() {
            tracing::info!("Recovered stranded result from a previous session");
            self.inner.notify_result(stranded, ResultSource::Recovered);
        }

        self.establish(ctx).await
    }

    /// Reconnect after a disconnect: `Disconnected -> Connecting -> Active`.
    ///
    /// Only ever triggered by this explicit call; a server drop does not
    /// lead back here on its own. The configuration is re-derived from
    /// `ctx`, so context changed since the last session (another model, an
    /// edited resume) takes effect instead of replaying the old config.
    pub async fn reconnect(&self, ctx: &SessionContext) -> Result<(), SessionError> {
        {
            let mut st = self.inner.state.lock();
            match st.phase {
                SessionPhase::Disconnected { .. } => {
                    st.phase = SessionPhase::Connecting;
                }
                other => {
                    return Err(SessionError::InvalidTransition {
                        from: other.name(),
                        action: "reconnect",
                    });
                }
            }
        }
        self.inner.notify_phase(SessionPhase::Connecting);
        self.establish(ctx).await
    }

    /// User-initiated stop: `Active -> Disconnected(local)`.
    ///
    /// Also aborts an in-flight connect. No-op in any other phase, so
    /// repeated teardown is safe.
    pub async fn disconnect(&self) {
        let should_teardown = {
            let mut st = self.inner.state.lock();
            match st.phase {
                SessionPhase::Active | SessionPhase::Connecting => {
                    st.phase = SessionPhase::Disconnected {
                        origin: DisconnectOrigin::Local,
                    };
                    true
                }
                _ => false,
            }
        };
        if should_teardown {
            let mut transport = self.transport.lock().await;
            transport.off_tool_call();
            transport.disconnect().await;
            drop(transport);
            tracing::info!("Session disconnected by local request");
            self.inner.notify_phase(SessionPhase::Disconnected {
                origin: DisconnectOrigin::Local,
            });
        }
    }

    /// Full session reset: `Completed -> Idle`.
    pub fn reset(&self) -> Result<(), SessionError> {
        {
            let mut st = self.inner.state.lock();
            match st.phase {
                SessionPhase::Completed => {
                    st.phase = SessionPhase::Idle;
                    st.config = None;
                }
                other => {
                    return Err(SessionError::InvalidTransition {
                        from: other.name(),
                        action: "reset",
                    });
                }
            }
        }
        self.inner.notify_phase(SessionPhase::Idle);
        Ok(())
    }

    /// Tear everything down without phase bookkeeping. For end-of-life of
    /// the owning connection; idempotent.
    pub async fn shutdown(&self) {
        let mut transport = self.transport.lock().await;
        transport.off_tool_call();
        transport.disconnect().await;
    }

    /// Forward one input audio chunk. Quietly dropped unless Active.
    pub async fn send_audio(&self, chunk: Bytes) -> Result<(), SessionError> {
        if self.phase() != SessionPhase::Active {
            tracing::trace!("Dropping audio outside an active session");
            return Ok(());
        }
        self.transport
            .lock()
            .await
            .send_audio(chunk)
            .await
            .map_err(SessionError::from)
    }

    /// Forward a user text turn. Only valid while Active.
    pub async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        let phase = self.phase();
        if phase != SessionPhase::Active {
            return Err(SessionError::InvalidTransition {
                from: phase.name(),
                action: "send text",
            });
        }
        self.transport
            .lock()
            .await
            .send_text(text)
            .await
            .map_err(SessionError::from)
    }

    /// Build the config, wire the protocol callbacks and connect.
    async fn establish(&self, ctx: &SessionContext) -> Result<(), SessionError> {
        let config = build_config(ctx);
        let handler = Arc::new(ToolCallHandler::new(&config, self.inner.store.clone()));

        {
            let mut transport = self.transport.lock().await;
            // Registration replaces the previous session's handlers; nothing
            // leaks across reconnects.
            transport.on_tool_call(Self::tool_call_callback(
                handler,
                self.inner.clone(),
                self.transport.clone(),
            ));
            transport.on_close(Self::close_callback(self.inner.clone()));
        }

        let connected = self.transport.lock().await.connect(config.clone()).await;

        match connected {
            Ok(()) => {
                let became_active = {
                    let mut st = self.inner.state.lock();
                    if st.phase == SessionPhase::Connecting {
                        st.phase = SessionPhase::Active;
                        st.config = Some(config);
                        true
                    } else {
                        false
                    }
                };
                if became_active {
                    self.inner.notify_phase(SessionPhase::Active);
                } else {
                    // Disconnected while the connect was in flight; tear the
                    // fresh socket back down.
                    self.transport.lock().await.disconnect().await;
                }
                Ok(())
            }
            Err(e) => {
                let reverted = {
                    let mut st = self.inner.state.lock();
                    if st.phase == SessionPhase::Connecting {
                        st.phase = SessionPhase::Idle;
                        true
                    } else {
                        false
                    }
                };
                if reverted {
                    self.inner.notify_phase(SessionPhase::Idle);
                }
                tracing::warn!("Session connect failed: {}", e);
                Err(SessionError::Transport(e))
            }
        }
    }

    /// Tool-call handling for the Active session.
    ///
    /// Runs inline in the transport's read pass: extraction and
    /// persistence happen synchronously, the acknowledgments go out in the
    /// same pass, and only then do observers hear about the result.
    fn tool_call_callback(
        handler: Arc<ToolCallHandler>,
        inner: Arc<ManagerInner>,
        transport: Arc<AsyncMutex<BoxedLiveTransport>>,
    ) -> ToolCallCallback {
        Arc::new(move |invocations: Vec<ToolInvocation>| {
            let handler = handler.clone();
            let inner = inner.clone();
            let transport = transport.clone();
            Box::pin(async move {
                let outcome = handler.process(&invocations);

                if !outcome.acks.is_empty() {
                    let sent = transport.lock().await.send_tool_response(outcome.acks).await;
                    if let Err(e) = sent {
                        // An unanswered tool call must not end an otherwise
                        // healthy session.
                        tracing::error!("Failed to send tool acknowledgment: {}", e);
                    }
                }

                if let Some(result) = outcome.result {
                    inner.complete(result);
                }
            })
        })
    }

    /// Close handling: a remote drop moves Active to Disconnected(remote);
    /// local teardown was already recorded by `disconnect`.
    fn close_callback(inner: Arc<ManagerInner>) -> CloseCallback {
        Arc::new(move |event: CloseEvent| {
            let inner = inner.clone();
            Box::pin(async move {
                if !event.initiated_locally {
                    inner.remote_drop(&event);
                }
            })
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
