//! Connection handle: lifecycle control plus status visibility.
//!
//! The handle never dispatches application events and never retries. Status
//! changes come only from transport callbacks via [`StatusRecorder`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use super::transport::{self, Command};
use super::{ConnectionError, ConnectionStatus, InboundEvent, TransportEvent};
use crate::config::RealtimeConfig;
use crate::observable::Observable;

/// Applies transport callbacks to the published status.
///
/// Holds no reference to the handle's control channel, so a running worker
/// does not keep a dropped handle alive.
///
/// Each worker gets its own epoch. Connects and events are taken only from
/// the newest worker; a disconnect only from the worker that last connected.
#[derive(Clone)]
pub(crate) struct StatusRecorder {
    status: Observable<ConnectionStatus>,
    capacity: usize,
    /// Epoch of the most recently spawned worker.
    generation: Arc<AtomicU64>,
    /// Epoch of the worker that last reported `Connect`.
    owner: Arc<AtomicU64>,
    epoch: u64,
}

impl StatusRecorder {
    fn new(capacity: usize) -> Self {
        Self {
            status: Observable::default(),
            capacity,
            generation: Arc::new(AtomicU64::new(0)),
            owner: Arc::new(AtomicU64::new(0)),
            epoch: 0,
        }
    }

    /// Recorder for a newly spawned worker; supersedes every earlier one.
    fn next_worker(&self) -> Self {
        let epoch = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Self { epoch, ..self.clone() }
    }

    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.epoch
    }

    pub(crate) fn apply(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connect { socket_id } => {
                if !self.is_current() {
                    tracing::debug!(epoch = self.epoch, %socket_id, "ignoring connect from replaced transport");
                    return;
                }
                self.owner.store(self.epoch, Ordering::SeqCst);
                self.status.update(|s| s.connected = true);
                tracing::info!(%socket_id, "realtime connected");
            }
            TransportEvent::Disconnect { reason } => {
                if self.owner.load(Ordering::SeqCst) != self.epoch {
                    tracing::debug!(epoch = self.epoch, %reason, "ignoring disconnect from replaced transport");
                    return;
                }
                self.status.update(|s| s.connected = false);
                tracing::info!(%reason, "realtime disconnected");
            }
            TransportEvent::ConnectError { message } => {
                tracing::error!(error = %message, "realtime connection error");
            }
            TransportEvent::Event { name, args } => {
                if !self.is_current() {
                    return;
                }
                tracing::info!(event = %name, ?args, "realtime event received");
                if self.capacity == 0 {
                    return;
                }
                let capacity = self.capacity;
                self.status.update(|s| {
                    s.recent_events.push(InboundEvent { name, args });
                    let overflow = s.recent_events.len().saturating_sub(capacity);
                    if overflow > 0 {
                        s.recent_events.drain(..overflow);
                    }
                });
            }
        }
    }
}

/// Handle over one realtime connection. Clones control the same connection.
#[derive(Clone)]
pub struct RealtimeHandle {
    config: Arc<RealtimeConfig>,
    recorder: StatusRecorder,
    control: Arc<Mutex<Option<mpsc::UnboundedSender<Command>>>>,
}

impl std::fmt::Debug for RealtimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHandle")
            .field("url", &self.config.url)
            .field("status", &self.recorder.status)
            .finish_non_exhaustive()
    }
}

impl RealtimeHandle {
    /// Build the handle. Nothing is started unless `config.auto_connect` is set,
    /// in which case this must run inside a tokio runtime.
    #[must_use]
    pub fn new(config: RealtimeConfig) -> Self {
        let handle = Self {
            recorder: StatusRecorder::new(config.recent_event_capacity),
            config: Arc::new(config),
            control: Arc::new(Mutex::new(None)),
        };
        if handle.config.auto_connect {
            handle.connect();
        }
        handle
    }

    #[must_use]
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Start the transport worker. No-op while a worker is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if control.as_ref().is_some_and(|tx| !tx.is_closed()) {
            tracing::debug!("realtime transport already running");
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *control = Some(tx);
        tokio::spawn(transport::run(
            Arc::clone(&self.config),
            rx,
            self.recorder.next_worker(),
        ));
    }

    /// Close the connection and stop reconnecting. No-op if not started.
    pub fn disconnect(&self) {
        let taken = self.control.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tx) = taken {
            let _ = tx.send(Command::Close);
        }
    }

    /// Send an event to the server. Queued while the transport is between
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotStarted`] if the handle was never
    /// connected, was disconnected, or its worker has stopped.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> Result<(), ConnectionError> {
        let control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = control.as_ref().ok_or(ConnectionError::NotStarted)?;
        tx.send(Command::Emit {
            name: event.to_owned(),
            args,
        })
        .map_err(|_| ConnectionError::NotStarted)
    }

    /// Wait until the status reports disconnected, for at most `limit`.
    /// Returns `false` on timeout.
    #[must_use]
    pub async fn wait_disconnected(&self, limit: Duration) -> bool {
        let mut rx = self.subscribe();
        matches!(tokio::time::timeout(limit, rx.wait_for(|s| !s.connected)).await, Ok(Ok(_)))
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.recorder.status.get()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.recorder.status.with(|s| s.connected)
    }

    #[must_use]
    pub fn recent_events(&self) -> Vec<InboundEvent> {
        self.recorder.status.with(|s| s.recent_events.clone())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.recorder.status.subscribe()
    }

    /// Apply a callback as the most recent worker would.
    #[cfg(test)]
    pub(crate) fn apply(&self, event: TransportEvent) {
        let epoch = self.recorder.generation.load(Ordering::SeqCst);
        StatusRecorder { epoch, ..self.recorder.clone() }.apply(event);
    }
}

#[cfg(test)]
#[path = "handle_test.rs"]
mod tests;
