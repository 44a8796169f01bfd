//! Single-node folder and file operations with permission enforcement.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use filer_auth::{EffectiveRights, PermissionResolver};
use filer_core::config::FilerConfig;
use filer_core::error::AppError;
use filer_core::result::AppResult;
use filer_core::types::sorting::SortKey;
use filer_core::types::{
    FileId, FolderId, FolderPermissionId, PageRequest, PageResponse, SortDirection, SortField,
    UserId,
};
use filer_database::store::{ChangeSet, GrantStore, TreeStore};
use filer_entity::file::{File, SubjectLocation};
use filer_entity::folder::Folder;
use filer_entity::node::{Node, NodeRef};
use filer_entity::permission::{FolderPermission, Right};

use crate::context::RequestContext;

use super::invariant::{TreeCheck, TreeInvariantChecker};

/// Manages folder creation, listings, ownership and grants.
#[derive(Clone)]
pub struct FolderService {
    /// Tree store.
    tree: Arc<dyn TreeStore>,
    /// Grant store.
    grants: Arc<dyn GrantStore>,
    /// Permission resolver.
    resolver: Arc<PermissionResolver>,
    /// Name precondition checks.
    checker: TreeInvariantChecker,
    /// Page size when the caller does not ask for one.
    paginate_by: u64,
}

impl std::fmt::Debug for FolderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderService")
            .field("paginate_by", &self.paginate_by)
            .finish()
    }
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(
        config: &FilerConfig,
        tree: Arc<dyn TreeStore>,
        grants: Arc<dyn GrantStore>,
        resolver: Arc<PermissionResolver>,
    ) -> Self {
        Self {
            checker: TreeInvariantChecker::new(tree.clone()),
            tree,
            grants,
            resolver,
            paginate_by: config.paginate_by,
        }
    }

    /// Creates a folder under `parent`, or at root level for `None`.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        parent: Option<FolderId>,
        name: &str,
    ) -> AppResult<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Folder name cannot be empty"));
        }
        if name.contains('/') {
            return Err(AppError::validation("Folder names cannot contain '/'"));
        }

        let parent_folder = match parent {
            Some(id) => Some(self.load_folder(id).await?),
            None => None,
        };
        let anchors: Vec<FolderId> = parent.into_iter().collect();
        let snapshot = self.resolver.snapshot_folders(&ctx.actor, &anchors).await?;
        if !snapshot.resolve_container(parent_folder.as_ref(), Right::AddChildren) {
            return Err(AppError::authorization(match parent {
                Some(id) => format!("Missing add_children permission on folder {id}"),
                None => "Only staff can create root-level folders".to_string(),
            }));
        }

        if let TreeCheck::NameConflict { existing } =
            self.checker.check_create(parent, name).await?
        {
            return Err(AppError::conflict(format!("'{name}' is already used by {existing}")));
        }

        let folder = Folder::new(name, parent, Some(ctx.user_id()));
        self.tree
            .apply(ChangeSet::new().insert_folder(folder.clone()))
            .await?;

        info!(
            user_id = %ctx.user_id(),
            folder_id = %folder.id,
            parent = ?parent,
            name = %folder.name,
            "Folder created"
        );

        Ok(folder)
    }

    /// Gets a node the actor may read.
    pub async fn get_node(&self, ctx: &RequestContext, node: NodeRef) -> AppResult<Node> {
        let node = self.load_node(node).await?;
        self.resolver.require(&ctx.actor, &node, Right::Read).await?;
        Ok(node)
    }

    /// Lists the readable children of `folder` (or the root), folders first.
    ///
    /// Costs the same number of store round-trips whatever the number of
    /// children.
    pub async fn list_directory(
        &self,
        ctx: &RequestContext,
        folder: Option<FolderId>,
        sort: SortField,
        page: Option<PageRequest>,
    ) -> AppResult<PageResponse<Node>> {
        let page = page.unwrap_or_else(|| PageRequest::new(1, self.paginate_by));
        let container = match folder {
            Some(id) => Some(self.load_folder(id).await?),
            None => None,
        };
        let children = self.tree.children(folder).await?;

        let mut involved = children.clone();
        involved.extend(container.clone().map(Node::Folder));
        let snapshot = self.resolver.snapshot(&ctx.actor, &involved).await?;

        if !snapshot.resolve_container(container.as_ref(), Right::Read) {
            return Err(AppError::authorization(match folder {
                Some(id) => format!("Missing read permission on folder {id}"),
                None => "Only staff can browse the root".to_string(),
            }));
        }

        let mut visible: Vec<Node> = children
            .into_iter()
            .filter(|n| snapshot.resolve(n, Right::Read))
            .collect();
        sort_listing(&mut visible, sort);

        Ok(PageResponse::from_slice(visible, &page))
    }

    /// Gives `node` a new owner. The name is kept.
    pub async fn change_owner(
        &self,
        ctx: &RequestContext,
        node: NodeRef,
        new_owner: Option<UserId>,
    ) -> AppResult<Node> {
        let node = self.load_node(node).await?;
        self.resolver.require(&ctx.actor, &node, Right::Edit).await?;

        let now = Utc::now();
        let (changes, updated) = match node {
            Node::Folder(mut folder) => {
                folder.owner_id = new_owner;
                folder.updated_at = now;
                (ChangeSet::new().update_folder(folder.clone()), Node::Folder(folder))
            }
            Node::File(mut file) => {
                file.owner_id = new_owner;
                file.updated_at = now;
                (ChangeSet::new().update_file(file.clone()), Node::File(file))
            }
        };
        self.tree.apply(changes).await?;

        info!(
            user_id = %ctx.user_id(),
            node = %updated.node_ref(),
            owner = ?new_owner,
            "Owner changed"
        );

        Ok(updated)
    }

    /// Sets the focal point of an image from its `"x,y"` text form. An empty
    /// string clears it. Invalid input leaves the stored value unchanged.
    pub async fn set_subject_location(
        &self,
        ctx: &RequestContext,
        file_id: FileId,
        text: &str,
    ) -> AppResult<File> {
        let mut file = self
            .tree
            .file(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;
        self.resolver
            .require(&ctx.actor, &Node::File(file.clone()), Right::Edit)
            .await?;

        let Some(mut image) = file.image else {
            return Err(AppError::validation(format!(
                "File {file_id} is not an image"
            )));
        };
        image.subject_location = SubjectLocation::parse(text, &image)?;
        file.image = Some(image);
        file.updated_at = Utc::now();

        self.tree
            .apply(ChangeSet::new().update_file(file.clone()))
            .await?;

        info!(
            user_id = %ctx.user_id(),
            file_id = %file.id,
            subject_location = ?image.subject_location,
            "Subject location updated"
        );

        Ok(file)
    }

    /// All rights of the actor on `node`, with the rule behind each.
    pub async fn effective_rights(
        &self,
        ctx: &RequestContext,
        node: NodeRef,
    ) -> AppResult<EffectiveRights> {
        let node = self.load_node(node).await?;
        self.resolver.effective(&ctx.actor, &node).await
    }

    /// Attaches a grant to its folder. Superusers only.
    pub async fn add_grant(
        &self,
        ctx: &RequestContext,
        grant: FolderPermission,
    ) -> AppResult<FolderPermission> {
        require_superuser(ctx)?;
        self.load_folder(grant.folder_id).await?;

        let grant = self.grants.create(grant).await?;
        info!(
            user_id = %ctx.user_id(),
            grant_id = %grant.id,
            folder_id = %grant.folder_id,
            scope = %grant.scope,
            "Folder permission added"
        );
        Ok(grant)
    }

    /// Removes a grant. Superusers only.
    pub async fn remove_grant(
        &self,
        ctx: &RequestContext,
        grant_id: FolderPermissionId,
    ) -> AppResult<()> {
        require_superuser(ctx)?;
        if !self.grants.delete(grant_id).await? {
            return Err(AppError::not_found(format!(
                "Folder permission {grant_id} not found"
            )));
        }
        info!(user_id = %ctx.user_id(), grant_id = %grant_id, "Folder permission removed");
        Ok(())
    }

    /// Grants attached directly to `folder`. Superusers only.
    pub async fn grants_on(
        &self,
        ctx: &RequestContext,
        folder: FolderId,
    ) -> AppResult<Vec<FolderPermission>> {
        require_superuser(ctx)?;
        self.load_folder(folder).await?;
        self.grants.for_folder(folder).await
    }

    async fn load_folder(&self, id: FolderId) -> AppResult<Folder> {
        self.tree
            .folder(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))
    }

    async fn load_node(&self, node: NodeRef) -> AppResult<Node> {
        self.tree
            .node(node)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{node} not found")))
    }
}

fn require_superuser(ctx: &RequestContext) -> AppResult<()> {
    if ctx.is_superuser() {
        Ok(())
    } else {
        Err(AppError::authorization(
            "Only superusers can manage folder permissions",
        ))
    }
}

/// Order a listing: folders before files, each group by `sort`, ties
/// broken by name.
pub(crate) fn sort_listing(nodes: &mut [Node], sort: SortField) {
    nodes.sort_by(|a, b| {
        b.is_container()
            .cmp(&a.is_container())
            .then_with(|| {
                let ord = compare_by(a, b, sort.key);
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .then_with(|| compare_by(a, b, SortKey::Name))
    });
}

fn compare_by(a: &Node, b: &Node, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a
            .effective_name()
            .to_lowercase()
            .cmp(&b.effective_name().to_lowercase())
            .then_with(|| a.effective_name().cmp(b.effective_name())),
        SortKey::Owner => a.owner_id().cmp(&b.owner_id()),
        SortKey::Modified => a.updated_at().cmp(&b.updated_at()),
        SortKey::Size => a.size_bytes().cmp(&b.size_bytes()),
    }
}
