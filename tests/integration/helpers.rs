//! Shared test helpers for integration tests.

use std::sync::Arc;

use filer_auth::PermissionResolver;
use filer_core::config::FilerConfig;
use filer_core::types::UserId;
use filer_database::{MemoryStore, TreeStore};
use filer_entity::file::{File, ImageInfo};
use filer_entity::folder::Folder;
use filer_entity::node::NodeRef;
use filer_entity::permission::{FolderPermission, PermissionScope, Principal, Right};
use filer_entity::user::Actor;
use filer_service::bulk::{BulkOperation, BulkParams, BulkResult};
use filer_service::{BulkEngine, FolderService, RequestContext, TreeInvariantChecker, TreeService};

/// Test application context
pub struct TestApp {
    /// The in-memory tree and grant store
    pub store: Arc<MemoryStore>,
    /// Permission resolver
    pub resolver: Arc<PermissionResolver>,
    /// Bulk engine
    pub bulk: BulkEngine,
    /// Folder service
    pub folders: FolderService,
    /// Tree walks
    pub tree: TreeService,
    /// Invariant checks
    pub checker: TreeInvariantChecker,
}

impl TestApp {
    /// Create a new test application with default settings
    pub fn new() -> Self {
        Self::with_config(FilerConfig::default())
    }

    /// Create a new test application with the given settings
    pub fn with_config(config: FilerConfig) -> Self {
        let store = Arc::new(MemoryStore::new().with_max_depth(config.max_tree_depth));
        let resolver = Arc::new(PermissionResolver::new(&config, store.clone(), store.clone()));
        Self {
            bulk: BulkEngine::new(&config, store.clone(), resolver.clone()),
            folders: FolderService::new(&config, store.clone(), store.clone(), resolver.clone()),
            tree: TreeService::new(&config, store.clone()),
            checker: TreeInvariantChecker::new(store.clone()),
            resolver,
            store,
        }
    }

    /// Seed a folder
    pub async fn folder(
        &self,
        name: &str,
        parent: Option<&Folder>,
        owner: Option<UserId>,
    ) -> Folder {
        self.store
            .seed_folder(Folder::new(name, parent.map(|p| p.id), owner))
            .await
            .expect("Failed to seed folder")
    }

    /// Seed a plain file
    pub async fn file(&self, name: &str, parent: Option<&Folder>, owner: Option<UserId>) -> File {
        self.store
            .seed_file(File::new(name, parent.map(|p| p.id), owner))
            .await
            .expect("Failed to seed file")
    }

    /// Seed an image file
    pub async fn image(
        &self,
        name: &str,
        parent: Option<&Folder>,
        owner: Option<UserId>,
        image: ImageInfo,
    ) -> File {
        self.store
            .seed_file(File::new(name, parent.map(|p| p.id), owner).with_image(image))
            .await
            .expect("Failed to seed image")
    }

    /// Seed a grant allowing `allow` and denying `deny`
    pub async fn grant(
        &self,
        folder: &Folder,
        principal: Principal,
        scope: PermissionScope,
        allow: &[Right],
        deny: &[Right],
    ) -> FolderPermission {
        let mut grant = FolderPermission::new(folder.id, principal, scope);
        for right in allow {
            grant = grant.allow(*right);
        }
        for right in deny {
            grant = grant.deny(*right);
        }
        self.store.seed_grant(grant).await.expect("Failed to seed grant")
    }

    /// Run a bulk operation, panicking on fatal errors
    pub async fn bulk(
        &self,
        actor: &Actor,
        operation: BulkOperation,
        selection: &[NodeRef],
        params: &BulkParams,
    ) -> BulkResult {
        self.bulk
            .execute(&RequestContext::new(actor.clone()), operation, selection, params)
            .await
            .expect("Bulk operation failed")
    }

    /// Reload a folder
    pub async fn reload_folder(&self, folder: &Folder) -> Option<Folder> {
        self.store.folder(folder.id).await.expect("Store failure")
    }

    /// Reload a file
    pub async fn reload_file(&self, file: &File) -> Option<File> {
        self.store.file(file.id).await.expect("Store failure")
    }

    /// Effective names of the children of `parent`
    pub async fn child_names(&self, parent: Option<&Folder>) -> Vec<String> {
        self.store
            .children(parent.map(|p| p.id))
            .await
            .expect("Store failure")
            .iter()
            .map(|n| n.effective_name().to_string())
            .collect()
    }
}

/// A staff user without grants
pub fn staff() -> Actor {
    Actor::staff(UserId::new())
}

/// A superuser
pub fn superuser() -> Actor {
    Actor::superuser(UserId::new())
}

/// A user that is not staff
pub fn outsider() -> Actor {
    let mut actor = Actor::staff(UserId::new());
    actor.is_staff = false;
    actor
}
