//! TargetRegistry: process-wide cache of styling targets.
//!
//! The registry resolves human-supplied names to targets (creating ephemeral
//! targets on miss), merges targets that turn out to refer to the same live
//! session, and fans out commit/clear transactions across every operational
//! target. It is an explicit instance injected into callers rather than a
//! global cache, with an `init`/`reset` lifecycle so tests run isolated.

use std::path::Path;
use std::sync::Arc;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use veneer_remote_interface::RemoteTransport;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::mapping::{self, MappingEntry};
use crate::matcher::{self, TargetIdentity};
use crate::target::{Target, DEFAULT_MAX_ATTEMPTS};

pub struct TargetRegistry {
    transport: Arc<dyn RemoteTransport>,
    /// Cached targets in insertion order. Order matters only for iteration
    /// and merge determinism.
    targets: RwLock<Vec<Arc<Target>>>,
}

impl TargetRegistry {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            transport,
            targets: RwLock::new(Vec::new()),
        }
    }

    /// Drop every cached target and re-create the registry from `config`:
    /// seed targets first, then the optional mapping file.
    pub async fn init(&self, config: &RegistryConfig) -> Result<()> {
        self.reset().await;

        {
            let mut targets = self.targets.write().await;
            for seed in &config.seeds {
                targets.push(Target::new(Arc::clone(&self.transport), seed.clone()));
            }
        }

        if let Some(path) = &config.mapping_file {
            self.load_mapping_file(path).await?;
        }

        debug!("mapped targets:");
        for target in self.list_cached().await {
            let identity = target.identity().await;
            debug!(
                target_id = %target.id(),
                "{:?} -> {:?}/{:?}",
                identity.keywords,
                identity.name_patterns,
                identity.url_parts
            );
        }

        Ok(())
    }

    /// Drop every cached target.
    pub async fn reset(&self) {
        self.targets.write().await.clear();
    }

    /// Every cached target whose identity the query names. When none match,
    /// a new target is synthesized from the query (literal-address semantics
    /// when wrapped in `~...~`), cached, and returned as a singleton, so a
    /// second lookup with the same unmatched name returns the same target.
    pub async fn resolve_by_name(&self, name: &str) -> Vec<Arc<Target>> {
        let mut targets = self.targets.write().await;

        let mut matches = Vec::new();
        for target in targets.iter() {
            if target.identifies(name).await {
                matches.push(Arc::clone(target));
            }
        }

        if matches.is_empty() {
            let identity = match matcher::literal_address(name) {
                Some(inner) => TargetIdentity::from_url_part(inner),
                None => TargetIdentity::from_name_pattern(name),
            };
            let target = Target::new(Arc::clone(&self.transport), identity);
            debug!(name, target_id = %target.id(), "no cached target matched, synthesizing one");
            targets.push(Arc::clone(&target));
            matches.push(target);
        }

        matches
    }

    /// The sole target the query names, or `None` when the query is missing
    /// or ambiguous.
    pub async fn resolve_single(&self, name: &str) -> Option<Arc<Target>> {
        let mut matches = self.resolve_by_name(name).await;
        if matches.len() == 1 {
            matches.pop()
        } else {
            None
        }
    }

    /// Union of `resolve_by_name` across all names, de-duplicated by target
    /// identity (not value) in first-seen order.
    pub async fn resolve_many<S: AsRef<str>>(&self, names: &[S]) -> Vec<Arc<Target>> {
        let mut combined: Vec<Arc<Target>> = Vec::new();
        for name in names {
            for target in self.resolve_by_name(name.as_ref()).await {
                if !combined.iter().any(|t| Arc::ptr_eq(t, &target)) {
                    combined.push(target);
                }
            }
        }
        combined
    }

    pub async fn list_cached(&self) -> Vec<Arc<Target>> {
        self.targets.read().await.clone()
    }

    /// One pairwise de-duplication pass: operational targets with equal,
    /// non-empty display names are merged, the absorbed target's identity
    /// and pending buffers migrating onto the survivor. Returns whether the
    /// cache changed; callers loop to a fixed point when more than two
    /// targets may alias the same session.
    pub async fn optimize(&self) -> bool {
        let mut live = Vec::new();
        for target in self.list_cached().await {
            if !target.is_operational().await {
                continue;
            }
            match target.display_name().await {
                Some(name) if !name.is_empty() => live.push((target, name)),
                _ => {}
            }
        }

        let mut changed = false;
        for (absorbed, absorbed_name) in &live {
            for (primary, primary_name) in &live {
                if Arc::ptr_eq(absorbed, primary)
                    || absorbed.absorbed_into().await.is_some()
                    || primary.absorbed_into().await.is_some()
                {
                    continue;
                }

                if absorbed_name == primary_name {
                    info!(
                        absorbed = %absorbed.id(),
                        primary = %primary.id(),
                        name = %absorbed_name,
                        "merging duplicate targets"
                    );

                    absorbed.set_absorbed_into(Arc::clone(primary)).await;

                    let identity = absorbed.identity().await;
                    primary.absorb_identity(&identity).await;
                    absorbed.migrate_pending(primary).await;

                    let mut targets = self.targets.write().await;
                    targets.retain(|t| !Arc::ptr_eq(t, absorbed));
                    changed = true;
                }
            }
        }

        changed
    }

    /// Commit every operational target's pending changes concurrently. Waits
    /// for all of them; a failing target neither cancels nor fails the
    /// others, and no failure is propagated; each target's outcome is
    /// recorded on the target itself.
    pub async fn commit_all(&self) {
        let tasks = self.operational_targets().await.into_iter().map(|target| {
            async move {
                if let Err(err) = target.commit(DEFAULT_MAX_ATTEMPTS).await {
                    warn!(target_id = %target.id(), "commit failed: {err}");
                }
            }
        });

        join_all(tasks).await;
    }

    /// Remove every injected style node on every operational target
    /// concurrently, with the same isolation as [`commit_all`](Self::commit_all).
    pub async fn clear_all(&self) {
        let tasks = self.operational_targets().await.into_iter().map(|target| {
            async move {
                if let Err(err) = target.clear_all(DEFAULT_MAX_ATTEMPTS).await {
                    warn!(target_id = %target.id(), "clear failed: {err}");
                }
            }
        });

        join_all(tasks).await;
    }

    async fn operational_targets(&self) -> Vec<Arc<Target>> {
        let mut operational = Vec::new();
        for target in self.list_cached().await {
            if target.is_operational().await {
                operational.push(target);
            }
        }
        operational
    }

    /// Apply a mapping file: each valid line either extends one existing
    /// target's name patterns or seeds a new target. Malformed lines are
    /// skipped with a warning; a missing file is not an error.
    pub async fn load_mapping_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            debug!(path = %path.display(), "no mapping file present");
            return Ok(());
        }

        let contents = std::fs::read_to_string(path)?;
        for line in contents.lines() {
            match mapping::parse_line(line) {
                Ok(Some(entry)) => self.apply_mapping_entry(entry).await,
                Ok(None) => {}
                Err(err) => warn!("skipping mapping line {line:?}: {err}"),
            }
        }

        Ok(())
    }

    async fn apply_mapping_entry(&self, entry: MappingEntry) {
        match self.resolve_single(&entry.query).await {
            Some(target) => target.add_name_pattern(&entry.pattern).await,
            None => {
                let identity = TargetIdentity {
                    name_patterns: vec![entry.pattern],
                    url_parts: Vec::new(),
                    keywords: vec![entry.query],
                };
                let target = Target::new(Arc::clone(&self.transport), identity);
                self.targets.write().await.push(target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use veneer_remote_interface::{
        RemoteError, RemoteSession, SessionPredicate,
    };

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

    fn registry() -> TargetRegistry {
        TargetRegistry::new(Arc::new(EmptyTransport))
    }

    fn seed(patterns: &[&str], keywords: &[&str]) -> TargetIdentity {
        TargetIdentity {
            name_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            url_parts: Vec::new(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_resolve_by_name_synthesizes_once() {
        let registry = registry();

        let first = registry.resolve_by_name("Unknown").await;
        assert_eq!(first.len(), 1);
        assert_eq!(registry.list_cached().await.len(), 1);

        let second = registry.resolve_by_name("Unknown").await;
        assert_eq!(second.len(), 1);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(registry.list_cached().await.len(), 1);
    }

    #[tokio::test]
    async fn test_literal_address_query_seeds_url_part() {
        let registry = registry();

        let targets = registry.resolve_by_name("~store.example.com~").await;
        let identity = targets[0].identity().await;
        assert!(identity.name_patterns.is_empty());
        assert_eq!(identity.url_parts, vec!["store.example.com"]);
    }

    #[tokio::test]
    async fn test_resolve_single_is_none_on_ambiguity() {
        let registry = registry();
        registry
            .init(&RegistryConfig::with_seeds(vec![
                seed(&["QuickAccess.*"], &["All"]),
                seed(&["MainMenu.*"], &["All"]),
            ]))
            .await
            .unwrap();

        assert!(registry.resolve_single("All").await.is_none());
        assert!(registry.resolve_single("QuickAccess.*").await.is_some());
    }

    #[tokio::test]
    async fn test_resolve_many_dedupes_by_identity() {
        let registry = registry();
        registry
            .init(&RegistryConfig::with_seeds(vec![seed(
                &["QuickAccess.*"],
                &["All", "QuickAccess"],
            )]))
            .await
            .unwrap();

        let targets = registry.resolve_many(&["All", "QuickAccess"]).await;
        assert_eq!(targets.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_drops_all_targets() {
        let registry = registry();
        registry.resolve_by_name("Something").await;
        assert_eq!(registry.list_cached().await.len(), 1);

        registry.reset().await;
        assert!(registry.list_cached().await.is_empty());
    }

    #[tokio::test]
    async fn test_init_reinitializes_from_scratch() {
        let registry = registry();
        registry.resolve_by_name("Leftover").await;

        registry
            .init(&RegistryConfig::with_seeds(vec![seed(&["Fresh.*"], &[])]))
            .await
            .unwrap();

        let cached = registry.list_cached().await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].identity().await.name_patterns, vec!["Fresh.*"]);
    }
}
