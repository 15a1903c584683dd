//! # sgs-client
//!
//! Native client layer for the SGS card game server: the authentication
//! session store and the realtime (Socket.IO) connection handle.
//!
//! The two halves are independent. `session` talks to the HTTP auth API and
//! persists the access token through a [`storage::KeyValueStore`]; `realtime`
//! owns one websocket connection and exposes its status. Both publish their
//! state through [`observable::Observable`] so consumers can read the current
//! value or subscribe to changes.

pub mod config;
pub mod observable;
pub mod realtime;
pub mod session;
pub mod storage;

pub use config::{ClientConfig, ConfigError, RealtimeConfig, ReconnectPolicy};
pub use observable::Observable;
pub use realtime::{ConnectionError, ConnectionStatus, InboundEvent, RealtimeHandle};
pub use session::{AuthError, AuthOutcome, Session, SessionStore, UserProfile};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
