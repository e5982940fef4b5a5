//! Target: one logical styling destination.
//!
//! A target owns the identity rules that bind it to at most one live remote
//! session, the lazily resolved session handle, and the pending style-change
//! buffers that [`commit`](Target::commit) flushes as a single idempotent
//! remote command.
//!
//! Targets are shared as `Arc<Target>`. When the registry merges two targets
//! that turned out to refer to the same live session, the absorbed target
//! keeps a pointer to its surviving primary; every style, commit and clear
//! operation first follows that pointer chain to its terminal target, so a
//! stale `Arc<Target>` held by a caller keeps working after a merge.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;
use veneer_remote_interface::{RemoteError, RemoteSession, RemoteTransport, SessionInfo};

use crate::error::{Result, StyleError};
use crate::matcher::TargetIdentity;
use crate::script::{self, AddEntry, StylePatch};

/// Default bounded attempt count for commit/clear transactions.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed wait between failed transaction attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
struct PendingStyles {
    /// change-id -> css payload, not yet committed
    add: HashMap<String, String>,
    /// change-ids of previously committed nodes scheduled for removal
    remove: Vec<String>,
}

impl PendingStyles {
    fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Result of the most recent commit/clear transaction on a target.
///
/// `commit_all`/`clear_all` on the registry do not propagate individual
/// failures; this record is the only place a fan-out outcome is observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub success: bool,
    pub message: Option<String>,
}

pub struct Target {
    id: Uuid,
    transport: Arc<dyn RemoteTransport>,
    identity: RwLock<TargetIdentity>,
    session: RwLock<Option<Arc<dyn RemoteSession>>>,
    pending: Mutex<PendingStyles>,
    absorbed_into: RwLock<Option<Arc<Target>>>,
    last_outcome: RwLock<Option<CommitOutcome>>,
}

impl Target {
    pub fn new(transport: Arc<dyn RemoteTransport>, identity: TargetIdentity) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            transport,
            identity: RwLock::new(identity),
            session: RwLock::new(None),
            pending: Mutex::new(PendingStyles::default()),
            absorbed_into: RwLock::new(None),
            last_outcome: RwLock::new(None),
        })
    }

    /// Opaque id, unique for the process lifetime. Survives merges.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn identity(&self) -> TargetIdentity {
        self.identity.read().await.clone()
    }

    /// Display name of the resolved session, `None` while unresolved.
    pub async fn display_name(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.info().display_name)
    }

    /// Outcome of the most recent commit/clear transaction, if any ran.
    pub async fn last_outcome(&self) -> Option<CommitOutcome> {
        self.last_outcome.read().await.clone()
    }

    /// Current pending buffer sizes as `(adds, removes)`.
    pub async fn pending_counts(&self) -> (usize, usize) {
        let pending = self.pending.lock().await;
        (pending.add.len(), pending.remove.len())
    }

    pub(crate) async fn identifies(&self, query: &str) -> bool {
        let resolved = self.display_name().await;
        self.identity.read().await.identifies(query, resolved.as_deref())
    }

    pub(crate) async fn add_name_pattern(&self, pattern: &str) {
        let mut identity = self.identity.write().await;
        if !identity.name_patterns.iter().any(|p| p == pattern) {
            identity.name_patterns.push(pattern.to_string());
        }
    }

    pub(crate) async fn absorb_identity(&self, other: &TargetIdentity) {
        self.identity.write().await.absorb(other);
    }

    // ── merge pointer ──────────────────────────────────────────────────

    /// The target this one was merged into, if any.
    pub async fn absorbed_into(&self) -> Option<Arc<Target>> {
        self.absorbed_into.read().await.clone()
    }

    pub(crate) async fn set_absorbed_into(&self, primary: Arc<Target>) {
        *self.absorbed_into.write().await = Some(primary);
    }

    /// Terminal target of the merge-pointer chain hanging off this one, or
    /// `None` when this target has not been absorbed and operations apply
    /// here directly.
    async fn forward_target(&self) -> Option<Arc<Target>> {
        let mut current = self.absorbed_into.read().await.clone()?;
        loop {
            let next = current.absorbed_into.read().await.clone();
            match next {
                Some(primary) => current = primary,
                None => return Some(current),
            }
        }
    }

    /// Move this target's pending buffers onto `primary` (used by merge so
    /// changes buffered before the merge are not orphaned).
    pub(crate) async fn migrate_pending(&self, primary: &Target) {
        let (add, remove) = {
            let mut pending = self.pending.lock().await;
            if pending.is_empty() {
                return;
            }
            (
                std::mem::take(&mut pending.add),
                std::mem::take(&mut pending.remove),
            )
        };

        let mut dst = primary.pending.lock().await;
        dst.add.extend(add);
        dst.remove.extend(remove);
    }

    // ── connection lifecycle ───────────────────────────────────────────

    /// Resolve a live session satisfying this target's identity rules and
    /// store the handle. With `skip_if_resolved`, a held handle is kept
    /// without asking the transport.
    pub async fn ensure_resolved(&self, skip_if_resolved: bool) -> Result<()> {
        if skip_if_resolved && self.session.read().await.is_some() {
            return Ok(());
        }

        let identity = self.identity.read().await.clone();
        let patterns = identity.name_patterns.clone();
        let predicate = move |candidate: &SessionInfo| identity.matches_session(candidate);

        match self.transport.resolve_session(&predicate).await {
            Ok(session) => {
                info!(
                    target_id = %self.id,
                    name = %session.info().display_name,
                    "resolved target to live session"
                );
                *self.session.write().await = Some(session);
                Ok(())
            }
            Err(err) => Err(StyleError::Resolution {
                reason: err.to_string(),
                patterns,
            }),
        }
    }

    /// Open the connection on the held session handle.
    ///
    /// The attempt order is intentional: try the held handle first, and only
    /// on failure (or when no handle is held) re-resolve once and retry the
    /// open. This favors the common case of an already-resolved, momentarily
    /// unopened connection over always re-resolving.
    pub async fn ensure_open(&self) -> Result<()> {
        let held = self.session.read().await.clone();
        if let Some(session) = held {
            match session.open_connection().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!(target_id = %self.id, "open on held session failed: {err}");
                }
            }
        }

        self.ensure_resolved(false).await?;

        let session = self
            .current_session()
            .await
            .ok_or_else(|| StyleError::Transport("session handle lost after resolution".into()))?;
        session.open_connection().await?;

        Ok(())
    }

    /// Whether a session is held, its connection open, and not mid-teardown.
    pub async fn is_operational(&self) -> bool {
        match self.session.read().await.as_ref() {
            Some(session) => session.is_open() && !session.is_closing(),
            None => false,
        }
    }

    /// Gate every remote operation passes through first.
    pub async fn ensure_operational(&self) -> Result<()> {
        if self.is_operational().await {
            return Ok(());
        }
        self.ensure_open().await
    }

    /// Best-effort close of the held session's connection; failures are
    /// swallowed and the handle stays held for later re-opening.
    pub async fn close_connection(&self) {
        if let Some(session) = self.current_session().await {
            if let Err(err) = session.close_connection().await {
                debug!(target_id = %self.id, "close failed: {err}");
            }
        }
    }

    /// Whether the target can currently accept remote operations, repairing
    /// the connection if needed.
    pub async fn available(&self) -> bool {
        self.ensure_operational().await.is_ok()
    }

    /// Whether an element with the given name exists on the resolved surface.
    /// Unreachable targets answer `false`.
    pub async fn has_element(&self, name: &str) -> bool {
        if let Some(primary) = self.forward_target().await {
            return primary.has_element_local(name).await;
        }
        self.has_element_local(name).await
    }

    async fn has_element_local(&self, name: &str) -> bool {
        if self.ensure_operational().await.is_err() {
            return false;
        }
        let Some(session) = self.current_session().await else {
            return false;
        };

        match session.has_element(name, false).await {
            Ok(found) => found,
            Err(RemoteError::ConnectionClosing) => {
                self.close_connection().await;
                false
            }
            Err(err) => {
                debug!(target_id = %self.id, "has_element failed: {err}");
                false
            }
        }
    }

    async fn current_session(&self) -> Option<Arc<dyn RemoteSession>> {
        self.session.read().await.clone()
    }

    // ── transaction engine ─────────────────────────────────────────────

    /// Buffer a style payload for injection and return its change-id. No
    /// remote call is made; the change lands on the next commit.
    pub async fn inject_style(&self, css: impl Into<String>) -> String {
        let css = css.into();
        if let Some(primary) = self.forward_target().await {
            return primary.inject_style_local(css).await;
        }
        self.inject_style_local(css).await
    }

    async fn inject_style_local(&self, css: String) -> String {
        let id = Uuid::new_v4().to_string();
        self.pending.lock().await.add.insert(id.clone(), css);
        id
    }

    /// Schedule removal of a style change. An uncommitted add is cancelled in
    /// place; anything else is scheduled for removal of the committed node on
    /// the next commit.
    pub async fn remove_style(&self, change_id: &str) {
        if let Some(primary) = self.forward_target().await {
            return primary.remove_style_local(change_id).await;
        }
        self.remove_style_local(change_id).await
    }

    async fn remove_style_local(&self, change_id: &str) {
        let mut pending = self.pending.lock().await;
        if pending.add.remove(change_id).is_none() {
            pending.remove.push(change_id.to_string());
        }
    }

    /// Flush the pending buffers as one idempotent remote command, retrying
    /// transient failures up to `max_attempts` times with a fixed backoff.
    ///
    /// The buffers are snapshot-and-cleared up front: style operations issued
    /// while the remote call is in flight land in a fresh buffer and are
    /// deferred to the next commit. A commit that exhausts its attempts drops
    /// the snapshot rather than requeueing it.
    pub async fn commit(&self, max_attempts: u32) -> Result<()> {
        if let Some(primary) = self.forward_target().await {
            return primary.commit_local(max_attempts).await;
        }
        self.commit_local(max_attempts).await
    }

    async fn commit_local(&self, max_attempts: u32) -> Result<()> {
        let patch = {
            let mut pending = self.pending.lock().await;
            if pending.is_empty() {
                return Ok(());
            }
            StylePatch {
                add: pending
                    .add
                    .drain()
                    .map(|(id, css)| AddEntry { id, css })
                    .collect(),
                remove: std::mem::take(&mut pending.remove),
            }
        };

        debug!(
            target_id = %self.id,
            adds = patch.add.len(),
            removes = patch.remove.len(),
            "committing style transaction"
        );

        let code = script::commit_script(&patch)?;
        let result = self.execute_with_retry(&code, max_attempts).await;
        self.record_outcome(&result).await;
        result
    }

    /// Discard the pending buffers and remove every previously injected style
    /// node on the surface, matched by the shared marker class.
    pub async fn clear_all(&self, max_attempts: u32) -> Result<()> {
        if let Some(primary) = self.forward_target().await {
            return primary.clear_all_local(max_attempts).await;
        }
        self.clear_all_local(max_attempts).await
    }

    async fn clear_all_local(&self, max_attempts: u32) -> Result<()> {
        {
            let mut pending = self.pending.lock().await;
            pending.add.clear();
            pending.remove.clear();
        }

        let result = self
            .execute_with_retry(&script::clear_script(), max_attempts)
            .await;
        self.record_outcome(&result).await;
        result
    }

    async fn execute_with_retry(&self, code: &str, max_attempts: u32) -> Result<()> {
        for attempt in 1..=max_attempts {
            match self.evaluate(code).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        target_id = %self.id,
                        attempt,
                        "style transaction failed, retrying in {}ms: {err}",
                        RETRY_BACKOFF.as_millis()
                    );
                    sleep(RETRY_BACKOFF).await;
                }
            }
        }

        Err(StyleError::RetryExhausted {
            attempts: max_attempts,
        })
    }

    /// One evaluation attempt: repair the connection, then run the script.
    /// An absent outcome is a failure; a closing connection is forced shut so
    /// the next attempt re-opens instead of writing to a half-dead handle.
    async fn evaluate(&self, code: &str) -> Result<()> {
        self.ensure_operational().await?;

        let session = self
            .current_session()
            .await
            .ok_or_else(|| StyleError::Transport("session handle lost after open".into()))?;

        match session.evaluate(code, false, false).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(RemoteError::NoOutcome.into()),
            Err(RemoteError::ConnectionClosing) => {
                self.close_connection().await;
                Err(RemoteError::ConnectionClosing.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn record_outcome(&self, result: &Result<()>) {
        let outcome = match result {
            Ok(()) => CommitOutcome {
                success: true,
                message: None,
            },
            Err(err) => CommitOutcome {
                success: false,
                message: Some(err.to_string()),
            },
        };
        *self.last_outcome.write().await = Some(outcome);
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use veneer_remote_interface::SessionPredicate;

    /// Transport that never finds a session.
    struct EmptyTransport;

    #[async_trait]
    impl RemoteTransport for EmptyTransport {
        async fn resolve_session(
            &self,
            _predicate: &SessionPredicate,
        ) -> veneer_remote_interface::Result<Arc<dyn RemoteSession>> {
            Err(RemoteError::NoSessionFound)
        }
    }

    fn unresolved_target() -> Arc<Target> {
        Target::new(
            Arc::new(EmptyTransport),
            TargetIdentity::from_name_pattern("Store.*"),
        )
    }

    #[tokio::test]
    async fn test_inject_then_remove_cancels_in_place() {
        let target = unresolved_target();

        let id = target.inject_style("body {}").await;
        assert_eq!(target.pending_counts().await, (1, 0));

        target.remove_style(&id).await;
        assert_eq!(target.pending_counts().await, (0, 0));
    }

    #[tokio::test]
    async fn test_remove_unknown_id_schedules_removal() {
        let target = unresolved_target();

        target.remove_style("missing-id").await;
        assert_eq!(target.pending_counts().await, (0, 1));
    }

    #[tokio::test]
    async fn test_commit_with_empty_buffers_is_a_no_op() {
        let target = unresolved_target();

        // would fail on resolution if it reached the transport
        target.commit(DEFAULT_MAX_ATTEMPTS).await.unwrap();
        assert!(target.last_outcome().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_without_any_session_exhausts_retries() {
        let target = unresolved_target();
        target.inject_style("body {}").await;

        let err = target.commit(DEFAULT_MAX_ATTEMPTS).await.unwrap_err();
        assert!(matches!(err, StyleError::RetryExhausted { attempts: 3 }));

        // snapshot dropped, not requeued
        assert_eq!(target.pending_counts().await, (0, 0));
        let outcome = target.last_outcome().await.unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_resolution_failure_carries_patterns() {
        let target = unresolved_target();

        let err = target.ensure_resolved(false).await.unwrap_err();
        match err {
            StyleError::Resolution { patterns, .. } => {
                assert_eq!(patterns, vec!["Store.*"]);
            }
            other => panic!("expected resolution failure, got {other:?}"),
        }
    }
}
