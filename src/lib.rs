//! Veneer: styling injection for remote-controllable surfaces
//!
//! Veneer resolves logical, human-named "targets" (a UI surface identified by
//! title pattern, address fragment, or alias) to live remote-controllable
//! sessions and manages injecting/removing CSS payloads into those sessions
//! over a persistent remote-control connection. Pending changes are buffered
//! per target and committed atomically through a single idempotent remote
//! command, with transient failures retried.
//!
//! # Architecture
//!
//! - **TargetIdentity**: fuzzy three-way identity rules (name patterns, url
//!   parts, alias keywords) matching targets to sessions and query strings
//! - **Target**: one logical destination: lazy connection lifecycle plus
//!   the pending-change transaction engine
//! - **TargetRegistry**: process-wide cache resolving names to targets,
//!   creating them on miss, merging duplicates, and fanning out batch
//!   commits across all connected targets
//!
//! The remote-control transport itself is an external capability: implement
//! the traits in [`veneer_remote_interface`] and hand the transport to the
//! registry.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use veneer::{RegistryConfig, TargetRegistry, DEFAULT_MAX_ATTEMPTS};
//! use veneer_remote_interface::RemoteTransport;
//!
//! async fn restyle(transport: Arc<dyn RemoteTransport>) -> anyhow::Result<()> {
//!     let registry = TargetRegistry::new(transport);
//!     registry.init(&RegistryConfig::default()).await?;
//!
//!     let target = registry
//!         .resolve_single("QuickAccess")
//!         .await
//!         .ok_or_else(|| anyhow::anyhow!("ambiguous target"))?;
//!
//!     let change_id = target.inject_style("body { background: #111; }").await;
//!     target.commit(DEFAULT_MAX_ATTEMPTS).await?;
//!
//!     // later: schedule removal of the committed node
//!     target.remove_style(&change_id).await;
//!     registry.commit_all().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
mod mapping;
pub mod matcher;
pub mod registry;
pub mod script;
pub mod target;

// Re-export commonly used types
pub use config::RegistryConfig;
pub use error::{Result, StyleError};
pub use matcher::{literal_address, TargetIdentity, LITERAL_ADDRESS_MARKER};
pub use registry::TargetRegistry;
pub use script::STYLE_CLASS;
pub use target::{CommitOutcome, Target, DEFAULT_MAX_ATTEMPTS};
pub use veneer_remote_interface::{
    RemoteError, RemoteSession, RemoteTransport, SessionInfo, SessionPredicate,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
