//! Veneer Remote Interface: the remote-control capability seam
//!
//! This crate defines the traits through which the styling engine talks to a
//! remote-controllable process. The engine never opens sockets or frames
//! commands itself; a transport driver implements these traits and the engine
//! consumes them.
//!
//! # Architecture
//!
//! - **RemoteTransport**: locates a live session satisfying a caller-supplied
//!   predicate (connect-by-predicate)
//! - **RemoteSession**: one live remote-controllable surface with a display
//!   name, an address, and an openable/closable connection over which script
//!   can be evaluated
//!
//! # Design Philosophy
//!
//! The traits are object-safe so the engine can hold `Arc<dyn RemoteSession>`
//! handles that outlive any particular transport implementation. Connection
//! teardown is reported structurally: a session that can no longer be written
//! to surfaces [`RemoteError::ConnectionClosing`] (and answers `true` from
//! [`RemoteSession::is_closing`]) rather than a free-form error message, so
//! callers never have to sniff error text to decide whether a handle is dead.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("no live session matched the predicate")]
    NoSessionFound,

    #[error("connection is closing and can no longer be used")]
    ConnectionClosing,

    #[error("remote evaluation produced no outcome")]
    NoOutcome,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Metadata describing a candidate session, handed to match predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Human-readable title of the surface (e.g. a window or page title)
    pub display_name: String,

    /// Address the surface is serving (e.g. a URL)
    pub address: String,
}

/// Predicate over candidate sessions, used for connect-by-predicate lookups.
pub type SessionPredicate = dyn Fn(&SessionInfo) -> bool + Send + Sync;

/// One live remote-controllable surface.
///
/// The connection underneath a session is opened lazily and may die at any
/// time; `is_open`/`is_closing` report the current connection state without
/// touching the wire.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Current display name and address of the surface.
    fn info(&self) -> SessionInfo;

    /// Whether the underlying connection is currently open.
    fn is_open(&self) -> bool;

    /// Whether the underlying connection is mid-teardown. A closing
    /// connection must not be written to, but `is_open` may still report
    /// `true` for it.
    fn is_closing(&self) -> bool;

    /// Open (or re-open) the underlying connection.
    async fn open_connection(&self) -> Result<()>;

    /// Close the underlying connection. The session handle itself stays
    /// valid; the connection can be re-opened later.
    async fn close_connection(&self) -> Result<()>;

    /// Evaluate script on the surface and return its outcome.
    ///
    /// `Ok(None)` means the evaluation completed without producing an
    /// outcome; callers treat that as a failure.
    async fn evaluate(&self, code: &str, run_async: bool, opaque: bool) -> Result<Option<Value>>;

    /// Whether an element with the given name exists on the surface.
    async fn has_element(&self, name: &str, wait: bool) -> Result<bool>;
}

/// Locates live sessions.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Return a session satisfying `predicate`, or
    /// [`RemoteError::NoSessionFound`] when none does.
    async fn resolve_session(&self, predicate: &SessionPredicate)
        -> Result<Arc<dyn RemoteSession>>;
}
