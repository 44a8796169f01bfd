//! Permission resolver over the tree and grant stores.
//!
//! Resolution order:
//! 1. Enforcement disabled: staff and superusers may do anything, others nothing.
//! 2. Superuser bypass.
//! 3. Closest explicit grant on the anchor folder's ancestor chain.
//! 4. Ownership fallback.
//! 5. Deny.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use filer_core::config::FilerConfig;
use filer_core::error::AppError;
use filer_core::result::AppResult;
use filer_core::types::FolderId;
use filer_database::store::{GrantStore, TreeStore};
use filer_entity::node::Node;
use filer_entity::permission::Right;
use filer_entity::user::Actor;

use super::snapshot::{EffectiveRights, PermissionSnapshot};

/// Resolves folder permissions with a fixed number of store round-trips.
#[derive(Clone)]
pub struct PermissionResolver {
    enabled: bool,
    max_depth: usize,
    tree: Arc<dyn TreeStore>,
    grants: Arc<dyn GrantStore>,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("enabled", &self.enabled)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl PermissionResolver {
    /// Creates a new resolver.
    pub fn new(
        config: &FilerConfig,
        tree: Arc<dyn TreeStore>,
        grants: Arc<dyn GrantStore>,
    ) -> Self {
        Self {
            enabled: config.enable_permissions,
            max_depth: config.max_tree_depth,
            tree,
            grants,
        }
    }

    /// Prefetch everything needed to decide any right on `nodes`.
    ///
    /// Costs at most one ancestor query and one grant query, whatever the
    /// number of nodes.
    pub async fn snapshot(&self, actor: &Actor, nodes: &[Node]) -> AppResult<PermissionSnapshot> {
        let anchors: Vec<FolderId> = nodes.iter().filter_map(Node::anchor_folder).collect();
        self.snapshot_folders(actor, &anchors).await
    }

    /// Prefetch the chains of the given folders.
    pub async fn snapshot_folders(
        &self,
        actor: &Actor,
        folder_ids: &[FolderId],
    ) -> AppResult<PermissionSnapshot> {
        if !self.enabled || actor.is_superuser {
            return Ok(PermissionSnapshot::empty(actor.clone(), self.enabled, self.max_depth));
        }

        let anchors: Vec<FolderId> = folder_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if anchors.is_empty() {
            return Ok(PermissionSnapshot::empty(actor.clone(), self.enabled, self.max_depth));
        }

        let chains = self.tree.ancestors_of(&anchors).await?;
        let chain_folders: Vec<FolderId> = chains
            .values()
            .flatten()
            .map(|f| f.id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let grants = self
            .grants
            .grants_for(&chain_folders, &actor.principals())
            .await?;

        debug!(
            user_id = %actor.user_id,
            anchors = anchors.len(),
            chain_folders = chain_folders.len(),
            grants = grants.len(),
            "Prefetched permission snapshot"
        );

        Ok(PermissionSnapshot::new(
            actor.clone(),
            self.enabled,
            self.max_depth,
            chains,
            grants,
        ))
    }

    /// Whether `actor` may exercise `right` on `node`.
    pub async fn resolve(&self, actor: &Actor, node: &Node, right: Right) -> AppResult<bool> {
        let snapshot = self.snapshot(actor, std::slice::from_ref(node)).await?;
        let decision = snapshot.decide(node, right);
        debug!(
            user_id = %actor.user_id,
            node = %node.node_ref(),
            right = %right,
            allowed = decision.allowed,
            source = ?decision.source,
            "Resolved permission"
        );
        Ok(decision.allowed)
    }

    /// All rights of `actor` on `node`, with the deciding rule of each.
    pub async fn effective(&self, actor: &Actor, node: &Node) -> AppResult<EffectiveRights> {
        let snapshot = self.snapshot(actor, std::slice::from_ref(node)).await?;
        Ok(snapshot.effective(node))
    }

    /// Fail with an authorization error unless `right` is granted.
    pub async fn require(&self, actor: &Actor, node: &Node, right: Right) -> AppResult<()> {
        if self.resolve(actor, node, right).await? {
            Ok(())
        } else {
            Err(AppError::authorization(format!(
                "Missing {right} permission on {}",
                node.node_ref()
            )))
        }
    }

    /// Whether `actor` may delete `node` itself.
    pub async fn can_delete(&self, actor: &Actor, node: &Node) -> AppResult<bool> {
        self.resolve(actor, node, Right::Edit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filer_core::types::UserId;
    use filer_database::MemoryStore;
    use filer_entity::file::File;
    use filer_entity::folder::Folder;
    use filer_entity::permission::{FolderPermission, PermissionScope, Principal};

    fn resolver(store: &Arc<MemoryStore>, config: &FilerConfig) -> PermissionResolver {
        PermissionResolver::new(config, store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_snapshot_costs_two_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let actor = Actor::staff(UserId::new());
        let root = store.seed_folder(Folder::new("root", None, None)).await.unwrap();
        store
            .seed_grant(
                FolderPermission::new(
                    root.id,
                    Principal::User(actor.user_id),
                    PermissionScope::Children,
                )
                .allow(Right::Read),
            )
            .await
            .unwrap();

        let mut nodes = Vec::new();
        for i in 0..25 {
            let folder = store
                .seed_folder(Folder::new(format!("f{i}"), Some(root.id), None))
                .await
                .unwrap();
            let file = store
                .seed_file(File::new(format!("{i}.txt"), Some(folder.id), None))
                .await
                .unwrap();
            nodes.push(Node::Folder(folder));
            nodes.push(Node::File(file));
        }

        let resolver = resolver(&store, &FilerConfig::default());
        store.reset_round_trips();
        let snapshot = resolver.snapshot(&actor, &nodes).await.unwrap();
        assert!(nodes.iter().all(|n| snapshot.resolve(n, Right::Read)));
        assert!(nodes.iter().all(|n| !snapshot.resolve(n, Right::Edit)));
        assert_eq!(store.round_trips(), 2);
    }

    #[tokio::test]
    async fn test_superuser_needs_no_store_access() {
        let store = Arc::new(MemoryStore::new());
        let folder = store.seed_folder(Folder::new("x", None, None)).await.unwrap();
        let resolver = resolver(&store, &FilerConfig::default());

        store.reset_round_trips();
        let allowed = resolver
            .resolve(&Actor::superuser(UserId::new()), &Node::Folder(folder), Right::Edit)
            .await
            .unwrap();
        assert!(allowed);
        assert_eq!(store.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_require_reports_authorization() {
        let store = Arc::new(MemoryStore::new());
        let folder = store.seed_folder(Folder::new("x", None, None)).await.unwrap();
        let resolver = resolver(&store, &FilerConfig::default());

        let err = resolver
            .require(&Actor::staff(UserId::new()), &Node::Folder(folder), Right::Edit)
            .await
            .unwrap_err();
        assert_eq!(err.kind, filer_core::error::ErrorKind::Authorization);
    }
}
