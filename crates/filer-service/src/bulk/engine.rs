//! Bulk operation engine.
//!
//! Flow of a request:
//! 1. Validate parameters. Any failure aborts before an item is touched.
//! 2. Load the selection, the destination and (for recursive operations)
//!    the ancestor chains needed to find nested items and cycles.
//! 3. Build one permission snapshot for everything involved.
//! 4. Process each top-level item as one atomic change set. Items nested in
//!    another selected folder share the outcome of that folder.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use filer_auth::PermissionResolver;
use filer_auth::PermissionSnapshot;
use filer_core::config::FilerConfig;
use filer_core::error::{AppError, ErrorKind};
use filer_core::result::AppResult;
use filer_core::types::{FileId, FolderId};
use filer_database::store::{Change, ChangeSet, TreeStore};
use filer_entity::file::{File, insert_suffix};
use filer_entity::folder::{Folder, Subtree};
use filer_entity::node::{Node, NodeRef};
use filer_entity::permission::Right;

use crate::context::RequestContext;
use crate::folder::invariant::{TreeCheck, TreeInvariantChecker, is_cyclic_move};

use super::params::{BulkOperation, BulkParams, DeletePhase};
use super::resize::{ResizeSpec, resize};
use super::result::{BulkResult, ItemOutcome, ItemStatus};

/// Everything loaded before items are processed.
struct Prepared {
    nodes: HashMap<NodeRef, Node>,
    destination: Option<Folder>,
    destination_chain: Vec<Folder>,
    covered_by: HashMap<NodeRef, NodeRef>,
    subtrees: HashMap<FolderId, Subtree>,
    too_deep: HashMap<FolderId, String>,
    snapshot: PermissionSnapshot,
}

impl Prepared {
    fn destination_id(&self) -> Option<FolderId> {
        self.destination.as_ref().map(|f| f.id)
    }

    fn destination_allows(&self, right: Right) -> bool {
        self.snapshot.resolve_container(self.destination.as_ref(), right)
    }

    /// Every node an item stands for: the subtree of a folder, or the file.
    fn affected(&self, node: &Node) -> Vec<Node> {
        match node {
            Node::Folder(folder) => match self.subtrees.get(&folder.id) {
                Some(subtree) => std::iter::once(Node::Folder(subtree.root.clone()))
                    .chain(subtree.folders.iter().cloned().map(Node::Folder))
                    .chain(subtree.files.iter().cloned().map(Node::File))
                    .collect(),
                None => vec![node.clone()],
            },
            Node::File(_) => vec![node.clone()],
        }
    }

    /// A failed outcome when the store refused to load the folder's subtree
    /// because it is deeper than allowed.
    fn refuse_too_deep(&self, node: &Node) -> Option<ItemOutcome> {
        let Node::Folder(folder) = node else {
            return None;
        };
        self.too_deep.get(&folder.id).map(|detail| {
            ItemOutcome::failed(node.node_ref(), ItemStatus::Forbidden, detail.clone())
        })
    }

    /// The first node in the item's subtree lacking `right`.
    fn first_denied(&self, node: &Node, right: Right) -> Option<NodeRef> {
        self.affected(node)
            .iter()
            .find(|n| !self.snapshot.resolve(n, right))
            .map(Node::node_ref)
    }
}

/// Executes bulk operations over mixed selections of folders and files.
#[derive(Clone)]
pub struct BulkEngine {
    tree: Arc<dyn TreeStore>,
    resolver: Arc<PermissionResolver>,
    checker: TreeInvariantChecker,
    default_copy_suffix: String,
}

impl std::fmt::Debug for BulkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkEngine")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl BulkEngine {
    /// Creates a new bulk engine.
    pub fn new(
        config: &FilerConfig,
        tree: Arc<dyn TreeStore>,
        resolver: Arc<PermissionResolver>,
    ) -> Self {
        Self {
            checker: TreeInvariantChecker::new(tree.clone()),
            tree,
            resolver,
            default_copy_suffix: config.default_copy_suffix.clone(),
        }
    }

    /// Run `operation` over `selection`.
    ///
    /// Returns an error only for invalid parameters, a missing destination
    /// or a store failure. Everything else is reported per item.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        operation: BulkOperation,
        selection: &[NodeRef],
        params: &BulkParams,
    ) -> AppResult<BulkResult> {
        params.validate(operation)?;

        let mut seen = HashSet::with_capacity(selection.len());
        let selection: Vec<NodeRef> = selection
            .iter()
            .copied()
            .filter(|r| seen.insert(*r))
            .collect();
        let prepared = self.prepare(ctx, operation, &selection, params).await?;

        info!(
            user_id = %ctx.user_id(),
            request_id = %ctx.request_id,
            operation = %operation,
            items = selection.len(),
            destination = ?prepared.destination_id(),
            "Executing bulk operation"
        );

        if operation == BulkOperation::Copy {
            if let Some(result) = self.reject_copy_in_place(&selection, &prepared) {
                return Ok(result);
            }
        }

        let preview =
            operation == BulkOperation::Delete && params.phase == Some(DeletePhase::Preview);
        let mut outcomes: HashMap<NodeRef, ItemOutcome> = HashMap::with_capacity(selection.len());

        for node_ref in &selection {
            if prepared.covered_by.contains_key(node_ref) {
                continue;
            }
            let Some(node) = prepared.nodes.get(node_ref) else {
                outcomes.insert(
                    *node_ref,
                    ItemOutcome::failed(*node_ref, ItemStatus::NotFound, "Node does not exist"),
                );
                continue;
            };

            let outcome = match operation {
                BulkOperation::Move => self.move_item(ctx, &prepared, node).await?,
                BulkOperation::Copy => self.copy_item(ctx, &prepared, node, params).await?,
                BulkOperation::Rename => {
                    let name = params.name.as_deref().unwrap_or_default().trim();
                    self.rename_item(ctx, &prepared, node, name).await?
                }
                BulkOperation::Delete => {
                    self.delete_item(ctx, &prepared, node, preview).await?
                }
                BulkOperation::SetPublic => {
                    self.set_visibility(ctx, &prepared, node, true).await?
                }
                BulkOperation::SetPrivate => {
                    self.set_visibility(ctx, &prepared, node, false).await?
                }
                BulkOperation::Resize => {
                    let spec = params.resize_spec()?;
                    self.resize_item(ctx, &prepared, node, &spec).await?
                }
            };

            if !outcome.status.is_success() {
                warn!(
                    user_id = %ctx.user_id(),
                    operation = %operation,
                    node = %node_ref,
                    status = %outcome.status,
                    detail = outcome.detail.as_deref().unwrap_or(""),
                    "Bulk item failed"
                );
            }
            outcomes.insert(*node_ref, outcome);
        }

        let items = selection
            .iter()
            .filter_map(|node_ref| match prepared.covered_by.get(node_ref) {
                Some(parent) => outcomes.get(parent).map(|o| o.covering(*node_ref)),
                None => outcomes.get(node_ref).cloned(),
            })
            .collect();

        Ok(BulkResult::new(operation, preview, items))
    }

    async fn prepare(
        &self,
        ctx: &RequestContext,
        operation: BulkOperation,
        selection: &[NodeRef],
        params: &BulkParams,
    ) -> AppResult<Prepared> {
        let destination = match params.destination.and_then(|d| d.folder_id()) {
            Some(id) if matches!(operation, BulkOperation::Move | BulkOperation::Copy) => {
                let folder = self.tree.folder(id).await?.ok_or_else(|| {
                    AppError::not_found(format!("Destination folder {id} not found"))
                })?;
                Some(folder)
            }
            _ => None,
        };

        let nodes = self.tree.nodes(selection).await?;

        let mut covered_by = HashMap::new();
        let mut destination_chain = Vec::new();
        if operation.is_recursive() {
            let mut anchors: Vec<FolderId> =
                nodes.values().filter_map(Node::anchor_folder).collect();
            anchors.extend(destination.as_ref().map(|f| f.id));
            anchors.sort();
            anchors.dedup();
            let mut chains = self.tree.ancestors_of(&anchors).await?;

            let selected: HashSet<FolderId> = nodes.keys().filter_map(NodeRef::as_folder).collect();
            for (node_ref, node) in &nodes {
                let Some(chain) = node.anchor_folder().and_then(|a| chains.get(&a)) else {
                    continue;
                };
                // Outermost selected folder strictly above the node.
                let above = match node {
                    Node::Folder(_) => chain.get(1..).unwrap_or_default(),
                    Node::File(_) => chain.as_slice(),
                };
                if let Some(cover) = above.iter().rev().find(|f| selected.contains(&f.id)) {
                    covered_by.insert(*node_ref, NodeRef::Folder(cover.id));
                }
            }

            if let Some(dest) = &destination {
                destination_chain = chains.remove(&dest.id).unwrap_or_default();
            }
        }

        let mut subtrees = HashMap::new();
        let mut too_deep = HashMap::new();
        if matches!(operation, BulkOperation::Copy | BulkOperation::Delete) {
            for node_ref in selection {
                if covered_by.contains_key(node_ref) {
                    continue;
                }
                let Some(id) = node_ref.as_folder() else {
                    continue;
                };
                match self.tree.descendants(id).await {
                    Ok(Some(subtree)) => {
                        subtrees.insert(id, subtree);
                    }
                    Ok(None) => {}
                    Err(err) if err.kind == ErrorKind::Validation => {
                        warn!(folder_id = %id, error = %err, "Subtree refused by store");
                        too_deep.insert(id, err.message);
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        let mut involved: Vec<Node> = nodes.values().cloned().collect();
        involved.extend(destination.clone().map(Node::Folder));
        for subtree in subtrees.values() {
            involved.extend(subtree.folders.iter().cloned().map(Node::Folder));
            involved.extend(subtree.files.iter().cloned().map(Node::File));
        }
        let snapshot = self.resolver.snapshot(&ctx.actor, &involved).await?;

        Ok(Prepared {
            nodes,
            destination,
            destination_chain,
            covered_by,
            subtrees,
            too_deep,
            snapshot,
        })
    }

    /// Copying into an item's own parent rejects the whole request.
    fn reject_copy_in_place(
        &self,
        selection: &[NodeRef],
        prepared: &Prepared,
    ) -> Option<BulkResult> {
        let dest = prepared.destination_id();
        let in_place = selection.iter().any(|r| {
            !prepared.covered_by.contains_key(r)
                && prepared.nodes.get(r).is_some_and(|n| n.parent_id() == dest)
        });
        if !in_place {
            return None;
        }

        warn!(destination = ?dest, "Rejected copy into the items' own folder");
        let items = selection
            .iter()
            .map(|r| {
                ItemOutcome::failed(
                    *r,
                    ItemStatus::Forbidden,
                    "Items cannot be copied into the folder that already contains them",
                )
            })
            .collect();
        Some(BulkResult::new(BulkOperation::Copy, false, items))
    }

    async fn move_item(
        &self,
        ctx: &RequestContext,
        prepared: &Prepared,
        node: &Node,
    ) -> AppResult<ItemOutcome> {
        let node_ref = node.node_ref();
        let dest = prepared.destination_id();

        if !prepared.snapshot.resolve(node, Right::Edit) {
            return Ok(denied(node_ref, "Edit permission required"));
        }
        if !prepared.destination_allows(Right::AddChildren) {
            return Ok(denied(node_ref, "Add-children permission required on destination"));
        }
        if is_cyclic_move(node_ref, &prepared.destination_chain) {
            return Ok(ItemOutcome::failed(
                node_ref,
                ItemStatus::CyclicMove,
                "A folder cannot be moved into itself or its subtree",
            ));
        }
        if node.parent_id() == dest {
            return Ok(ItemOutcome::success(node_ref));
        }
        if let TreeCheck::NameConflict { existing } =
            self.checker.check_move_name(node, dest).await?
        {
            return Ok(name_conflict(node_ref, node.effective_name(), existing));
        }

        let now = Utc::now();
        let changes = match node.clone() {
            Node::Folder(mut folder) => {
                folder.parent_id = dest;
                folder.updated_at = now;
                ChangeSet::new().update_folder(folder)
            }
            Node::File(mut file) => {
                file.folder_id = dest;
                file.updated_at = now;
                ChangeSet::new().update_file(file)
            }
        };

        match self.tree.apply(changes).await {
            Ok(()) => {
                info!(
                    user_id = %ctx.user_id(),
                    node = %node_ref,
                    destination = ?dest,
                    "Moved node"
                );
                Ok(ItemOutcome::success(node_ref))
            }
            Err(err) if err.kind == ErrorKind::Validation => Ok(ItemOutcome::failed(
                node_ref,
                ItemStatus::CyclicMove,
                err.message,
            )),
            Err(err) => store_failure(node_ref, err),
        }
    }

    async fn copy_item(
        &self,
        ctx: &RequestContext,
        prepared: &Prepared,
        node: &Node,
        params: &BulkParams,
    ) -> AppResult<ItemOutcome> {
        let node_ref = node.node_ref();
        let dest = prepared.destination_id();
        let suffix = params.suffix.as_deref().unwrap_or(&self.default_copy_suffix);

        if let Some(refused) = prepared.refuse_too_deep(node) {
            return Ok(refused);
        }

        if let Some(blocked) = prepared.first_denied(node, Right::Read) {
            return Ok(denied(node_ref, format!("Read permission required on {blocked}")));
        }
        if !prepared.destination_allows(Right::AddChildren) {
            return Ok(denied(node_ref, "Add-children permission required on destination"));
        }
        if is_cyclic_move(node_ref, &prepared.destination_chain) {
            return Ok(ItemOutcome::failed(
                node_ref,
                ItemStatus::CyclicMove,
                "A folder cannot be copied into itself or its subtree",
            ));
        }

        let (changes, created, name) = match node {
            Node::Folder(folder) => {
                let Some(subtree) = prepared.subtrees.get(&folder.id) else {
                    return Ok(ItemOutcome::failed(
                        node_ref,
                        ItemStatus::NotFound,
                        "Folder vanished",
                    ));
                };
                let (changes, created) = copy_subtree(subtree, dest, suffix);
                (changes, created, folder.name.clone())
            }
            Node::File(file) => {
                let copy = copy_file(file, dest, suffix);
                let name = copy.effective_name().to_string();
                let created = vec![NodeRef::File(copy.id)];
                (ChangeSet::new().insert_file(copy), created, name)
            }
        };

        if let TreeCheck::NameConflict { existing } =
            self.checker.check_create(dest, &name).await?
        {
            return Ok(name_conflict(node_ref, &name, existing));
        }

        match self.tree.apply(changes).await {
            Ok(()) => {
                info!(
                    user_id = %ctx.user_id(),
                    node = %node_ref,
                    destination = ?dest,
                    created = created.len(),
                    "Copied node"
                );
                Ok(ItemOutcome::success(node_ref).with_affected(created))
            }
            Err(err) => store_failure(node_ref, err),
        }
    }

    async fn rename_item(
        &self,
        ctx: &RequestContext,
        prepared: &Prepared,
        node: &Node,
        name: &str,
    ) -> AppResult<ItemOutcome> {
        let node_ref = node.node_ref();

        if !prepared.snapshot.resolve(node, Right::Edit) {
            return Ok(denied(node_ref, "Edit permission required"));
        }
        if node.effective_name() == name {
            return Ok(ItemOutcome::success(node_ref));
        }
        if let TreeCheck::NameConflict { existing } = self.checker.check_rename(node, name).await? {
            return Ok(name_conflict(node_ref, name, existing));
        }

        let now = Utc::now();
        let changes = match node.clone() {
            Node::Folder(mut folder) => {
                folder.name = name.to_string();
                folder.updated_at = now;
                ChangeSet::new().update_folder(folder)
            }
            Node::File(mut file) => {
                file.name = Some(name.to_string());
                file.updated_at = now;
                ChangeSet::new().update_file(file)
            }
        };

        match self.tree.apply(changes).await {
            Ok(()) => {
                info!(
                    user_id = %ctx.user_id(),
                    node = %node_ref,
                    old_name = %node.effective_name(),
                    new_name = %name,
                    "Renamed node"
                );
                Ok(ItemOutcome::success(node_ref))
            }
            Err(err) => store_failure(node_ref, err),
        }
    }

    async fn delete_item(
        &self,
        ctx: &RequestContext,
        prepared: &Prepared,
        node: &Node,
        preview: bool,
    ) -> AppResult<ItemOutcome> {
        let node_ref = node.node_ref();

        if let Some(refused) = prepared.refuse_too_deep(node) {
            return Ok(refused);
        }
        if let Node::Folder(folder) = node {
            if !prepared.subtrees.contains_key(&folder.id) {
                return Ok(ItemOutcome::failed(node_ref, ItemStatus::NotFound, "Folder vanished"));
            }
        }

        let subtree = prepared.affected(node);
        let affected: Vec<NodeRef> = subtree.iter().map(Node::node_ref).collect();
        if let Some(blocked) = subtree
            .iter()
            .find(|n| !prepared.snapshot.can_delete(n))
            .map(Node::node_ref)
        {
            return Ok(denied(node_ref, format!("Delete permission required on {blocked}")));
        }
        if preview {
            return Ok(ItemOutcome::success(node_ref).with_affected(affected));
        }

        let changes = match node {
            Node::Folder(folder) => ChangeSet::new().delete_folder(folder.id),
            Node::File(file) => ChangeSet::new().delete_file(file.id),
        };

        match self.tree.apply(changes).await {
            Ok(()) => {
                info!(
                    user_id = %ctx.user_id(),
                    node = %node_ref,
                    removed = affected.len(),
                    "Deleted node"
                );
                Ok(ItemOutcome::success(node_ref).with_affected(affected))
            }
            Err(err) => store_failure(node_ref, err),
        }
    }

    async fn set_visibility(
        &self,
        ctx: &RequestContext,
        prepared: &Prepared,
        node: &Node,
        public: bool,
    ) -> AppResult<ItemOutcome> {
        let node_ref = node.node_ref();
        let Node::File(file) = node else {
            return Ok(ItemOutcome::failed(
                node_ref,
                ItemStatus::NotApplicable,
                "Only files have a visibility",
            ));
        };

        if !prepared.snapshot.resolve(node, Right::Edit) {
            return Ok(denied(node_ref, "Edit permission required"));
        }
        if file.is_public == public {
            return Ok(ItemOutcome::success(node_ref));
        }

        let mut file = file.clone();
        file.is_public = public;
        file.updated_at = Utc::now();

        match self.tree.apply(ChangeSet::new().update_file(file)).await {
            Ok(()) => {
                info!(
                    user_id = %ctx.user_id(),
                    node = %node_ref,
                    public,
                    "Changed file visibility"
                );
                Ok(ItemOutcome::success(node_ref))
            }
            Err(err) => store_failure(node_ref, err),
        }
    }

    async fn resize_item(
        &self,
        ctx: &RequestContext,
        prepared: &Prepared,
        node: &Node,
        spec: &ResizeSpec,
    ) -> AppResult<ItemOutcome> {
        let node_ref = node.node_ref();
        let Some((file, image)) = (match node {
            Node::File(file) => file.image.as_ref().map(|image| (file, image)),
            Node::Folder(_) => None,
        }) else {
            return Ok(ItemOutcome::failed(
                node_ref,
                ItemStatus::NotApplicable,
                "Only image files can be resized",
            ));
        };

        if !prepared.snapshot.resolve(node, Right::Edit) {
            return Ok(denied(node_ref, "Edit permission required"));
        }
        let Some(resized) = resize(image, spec) else {
            return Ok(ItemOutcome::failed(
                node_ref,
                ItemStatus::NotApplicable,
                "Image has no dimensions",
            ));
        };

        let mut file = file.clone();
        file.image = Some(resized);
        file.updated_at = Utc::now();

        match self.tree.apply(ChangeSet::new().update_file(file)).await {
            Ok(()) => {
                info!(
                    user_id = %ctx.user_id(),
                    node = %node_ref,
                    width = resized.width,
                    height = resized.height,
                    crop = spec.crop,
                    "Resized image"
                );
                Ok(ItemOutcome::success(node_ref))
            }
            Err(err) => store_failure(node_ref, err),
        }
    }
}

/// Duplicate `file` under `dest` with `suffix` inserted into its names.
fn copy_file(file: &File, dest: Option<FolderId>, suffix: &str) -> File {
    let now = Utc::now();
    let mut copy = file.clone();
    copy.id = FileId::new();
    copy.folder_id = dest;
    copy.original_filename = insert_suffix(&file.original_filename, suffix);
    copy.name = file
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| insert_suffix(n, suffix));
    copy.created_at = now;
    copy.updated_at = now;
    copy
}

/// Duplicate a whole subtree under `dest`. Folder names are kept; files get
/// `suffix`.
fn copy_subtree(
    subtree: &Subtree,
    dest: Option<FolderId>,
    suffix: &str,
) -> (ChangeSet, Vec<NodeRef>) {
    let now = Utc::now();
    let mut ids: HashMap<FolderId, FolderId> = HashMap::new();
    let mut changes = ChangeSet::new();
    let mut created = Vec::with_capacity(subtree.node_count());

    for (index, folder) in std::iter::once(&subtree.root).chain(&subtree.folders).enumerate() {
        let parent = if index == 0 {
            dest
        } else {
            folder.parent_id.and_then(|p| ids.get(&p).copied())
        };
        let mut copy = Folder::new(folder.name.clone(), parent, folder.owner_id);
        copy.created_at = now;
        copy.updated_at = now;
        ids.insert(folder.id, copy.id);
        created.push(NodeRef::Folder(copy.id));
        changes.push(Change::InsertFolder(copy));
    }

    for file in &subtree.files {
        let parent = file.folder_id.and_then(|p| ids.get(&p).copied());
        let copy = copy_file(file, parent, suffix);
        created.push(NodeRef::File(copy.id));
        changes.push(Change::InsertFile(copy));
    }

    (changes, created)
}

fn denied(node: NodeRef, detail: impl Into<String>) -> ItemOutcome {
    ItemOutcome::failed(node, ItemStatus::PermissionDenied, detail)
}

fn name_conflict(node: NodeRef, name: &str, existing: NodeRef) -> ItemOutcome {
    ItemOutcome::failed(
        node,
        ItemStatus::NameConflict,
        format!("'{name}' is already used by {existing}"),
    )
}

/// Map store errors that concern a single item to an outcome; anything else
/// aborts the request.
fn store_failure(node: NodeRef, err: AppError) -> AppResult<ItemOutcome> {
    match err.kind {
        ErrorKind::Conflict => {
            warn!(node = %node, error = %err, "Store rejected change set");
            Ok(ItemOutcome::failed(node, ItemStatus::NameConflict, err.message))
        }
        ErrorKind::NotFound => Ok(ItemOutcome::failed(node, ItemStatus::NotFound, err.message)),
        _ => Err(err),
    }
}
