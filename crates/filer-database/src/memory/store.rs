//! In-process tree and grant store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use filer_core::error::AppError;
use filer_core::result::AppResult;
use filer_core::types::{FileId, FolderId, FolderPermissionId};
use filer_entity::file::File;
use filer_entity::folder::{Folder, Subtree};
use filer_entity::node::{Node, NodeRef};
use filer_entity::permission::{FolderPermission, Principal};

use crate::store::{Change, ChangeSet, GrantStore, TreeStore, sort_by_name, subtree_too_deep};

/// Upper bound on the chains returned by [`TreeStore::ancestors_of`].
const MAX_CHAIN_LEN: usize = 4097;

/// Tables held by the memory store.
#[derive(Debug, Clone, Default)]
struct State {
    folders: HashMap<FolderId, Folder>,
    files: HashMap<FileId, File>,
    grants: HashMap<FolderPermissionId, FolderPermission>,
}

impl State {
    fn child_folders(&self, parent: Option<FolderId>) -> impl Iterator<Item = &Folder> {
        self.folders.values().filter(move |f| f.parent_id == parent)
    }

    fn child_files(&self, parent: Option<FolderId>) -> impl Iterator<Item = &File> {
        self.files.values().filter(move |f| f.folder_id == parent)
    }

    fn require_parent(&self, parent: Option<FolderId>) -> AppResult<()> {
        match parent {
            Some(id) if !self.folders.contains_key(&id) => {
                Err(AppError::not_found(format!("Parent folder {id} not found")))
            }
            _ => Ok(()),
        }
    }

    /// Whether `candidate` is `folder` or lies below it.
    fn is_within(&self, candidate: Option<FolderId>, folder: FolderId) -> bool {
        let mut seen = HashSet::new();
        let mut current = candidate;
        while let Some(id) = current {
            if id == folder {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.folders.get(&id).and_then(|f| f.parent_id);
        }
        false
    }

    /// Folder ids of `root` and every descendant, parents first.
    fn subtree_folder_ids(&self, root: FolderId) -> Vec<FolderId> {
        let mut ids = vec![root];
        let mut seen = HashSet::from([root]);
        let mut idx = 0;
        while idx < ids.len() {
            let parent = ids[idx];
            let mut children: Vec<&Folder> = self.child_folders(Some(parent)).collect();
            children.sort_by(|a, b| a.name.cmp(&b.name));
            ids.extend(children.into_iter().map(|f| f.id).filter(|id| seen.insert(*id)));
            idx += 1;
        }
        ids
    }

    fn apply_change(&mut self, change: Change) -> AppResult<()> {
        match change {
            Change::InsertFolder(folder) => {
                if self.folders.contains_key(&folder.id) {
                    return Err(AppError::conflict(format!("Folder {} already exists", folder.id)));
                }
                self.require_parent(folder.parent_id)?;
                self.folders.insert(folder.id, folder);
            }
            Change::UpdateFolder(folder) => {
                if !self.folders.contains_key(&folder.id) {
                    return Err(AppError::not_found(format!("Folder {} not found", folder.id)));
                }
                self.require_parent(folder.parent_id)?;
                if self.is_within(folder.parent_id, folder.id) {
                    return Err(AppError::validation(format!(
                        "Folder {} cannot be placed inside itself",
                        folder.id
                    )));
                }
                self.folders.insert(folder.id, folder);
            }
            Change::DeleteFolder(id) => {
                if !self.folders.contains_key(&id) {
                    return Err(AppError::not_found(format!("Folder {id} not found")));
                }
                let doomed: HashSet<FolderId> = self.subtree_folder_ids(id).into_iter().collect();
                self.folders.retain(|fid, _| !doomed.contains(fid));
                self.files
                    .retain(|_, f| f.folder_id.is_none_or(|fid| !doomed.contains(&fid)));
                self.grants.retain(|_, g| !doomed.contains(&g.folder_id));
            }
            Change::InsertFile(file) => {
                if self.files.contains_key(&file.id) {
                    return Err(AppError::conflict(format!("File {} already exists", file.id)));
                }
                self.require_parent(file.folder_id)?;
                self.files.insert(file.id, file);
            }
            Change::UpdateFile(file) => {
                if !self.files.contains_key(&file.id) {
                    return Err(AppError::not_found(format!("File {} not found", file.id)));
                }
                self.require_parent(file.folder_id)?;
                self.files.insert(file.id, file);
            }
            Change::DeleteFile(id) => {
                if self.files.remove(&id).is_none() {
                    return Err(AppError::not_found(format!("File {id} not found")));
                }
            }
        }
        Ok(())
    }

    fn check_unique_names(&self, parent: Option<FolderId>) -> AppResult<()> {
        let mut seen = HashSet::new();
        let names = self
            .child_folders(parent)
            .map(|f| f.name.as_str())
            .chain(self.child_files(parent).map(File::effective_name));
        for name in names {
            if !seen.insert(name) {
                return Err(AppError::conflict(format!(
                    "A node named '{name}' already exists in this folder"
                )));
            }
        }
        Ok(())
    }
}

/// Tree and grant store backed by process memory.
///
/// Every trait call counts as one store round-trip, which lets tests assert
/// the fixed query budget of permission prefetching.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    round_trips: AtomicU64,
    max_depth: Option<usize>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse subtrees reaching more than `max_depth` levels below their
    /// root, like [`crate::PgTreeStore`] does.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Number of trait calls served since creation or the last reset.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Reset the round-trip counter.
    pub fn reset_round_trips(&self) {
        self.round_trips.store(0, Ordering::Relaxed);
    }

    /// Store a folder without counting a round-trip.
    pub async fn seed_folder(&self, folder: Folder) -> AppResult<Folder> {
        let mut state = self.state.write().await;
        commit(&mut state, ChangeSet::new().insert_folder(folder.clone()))?;
        Ok(folder)
    }

    /// Store a file without counting a round-trip.
    pub async fn seed_file(&self, file: File) -> AppResult<File> {
        let mut state = self.state.write().await;
        commit(&mut state, ChangeSet::new().insert_file(file.clone()))?;
        Ok(file)
    }

    /// Store a grant without counting a round-trip.
    pub async fn seed_grant(&self, grant: FolderPermission) -> AppResult<FolderPermission> {
        let mut state = self.state.write().await;
        state.require_parent(Some(grant.folder_id))?;
        state.grants.insert(grant.id, grant.clone());
        Ok(grant)
    }

    /// Number of stored folders and files.
    pub async fn node_count(&self) -> usize {
        let state = self.state.read().await;
        state.folders.len() + state.files.len()
    }

    fn hit(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }
}

/// Apply `changes` to a copy of `state` and swap it in only when every
/// change and every name check succeeded.
fn commit(state: &mut State, changes: ChangeSet) -> AppResult<()> {
    let mut next = state.clone();
    let parents = changes.touched_parents();
    for change in changes {
        next.apply_change(change)?;
    }
    for parent in parents {
        // The parent may have been deleted later in the same set.
        if parent.is_none_or(|id| next.folders.contains_key(&id)) {
            next.check_unique_names(parent)?;
        }
    }
    *state = next;
    Ok(())
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn folder(&self, id: FolderId) -> AppResult<Option<Folder>> {
        self.hit();
        Ok(self.state.read().await.folders.get(&id).cloned())
    }

    async fn file(&self, id: FileId) -> AppResult<Option<File>> {
        self.hit();
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn folders(&self, ids: &[FolderId]) -> AppResult<Vec<Folder>> {
        self.hit();
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.folders.get(id).cloned()).collect())
    }

    async fn files(&self, ids: &[FileId]) -> AppResult<Vec<File>> {
        self.hit();
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.files.get(id).cloned()).collect())
    }

    async fn ancestors_of(&self, ids: &[FolderId]) -> AppResult<HashMap<FolderId, Vec<Folder>>> {
        self.hit();
        let state = self.state.read().await;
        let mut chains = HashMap::with_capacity(ids.len());

        for &start in ids {
            let Some(first) = state.folders.get(&start) else {
                continue;
            };
            let mut seen = HashSet::from([start]);
            let mut chain = vec![first.clone()];
            let mut parent = first.parent_id;

            while let Some(pid) = parent {
                let Some(folder) = state.folders.get(&pid) else {
                    break;
                };
                chain.push(folder.clone());
                if !seen.insert(pid) || chain.len() >= MAX_CHAIN_LEN {
                    break;
                }
                parent = folder.parent_id;
            }
            chains.insert(start, chain);
        }

        debug!(requested = ids.len(), resolved = chains.len(), "Loaded ancestor chains");
        Ok(chains)
    }

    async fn children(&self, parent: Option<FolderId>) -> AppResult<Vec<Node>> {
        self.hit();
        let state = self.state.read().await;
        let mut nodes: Vec<Node> = state
            .child_folders(parent)
            .cloned()
            .map(Node::Folder)
            .chain(state.child_files(parent).cloned().map(Node::File))
            .collect();
        sort_by_name(&mut nodes);
        Ok(nodes)
    }

    async fn descendants(&self, id: FolderId) -> AppResult<Option<Subtree>> {
        self.hit();
        let state = self.state.read().await;
        let Some(root) = state.folders.get(&id).cloned() else {
            return Ok(None);
        };

        let folder_ids = state.subtree_folder_ids(id);
        if let Some(max_depth) = self.max_depth {
            let mut depths = HashMap::from([(id, 0usize)]);
            for fid in &folder_ids[1..] {
                let depth = state
                    .folders
                    .get(fid)
                    .and_then(|f| f.parent_id)
                    .and_then(|p| depths.get(&p))
                    .map_or(0, |d| d + 1);
                if depth > max_depth {
                    return Err(subtree_too_deep(id, max_depth));
                }
                depths.insert(*fid, depth);
            }
        }
        let folders = folder_ids[1..]
            .iter()
            .filter_map(|fid| state.folders.get(fid).cloned())
            .collect();
        let mut files = Vec::new();
        for fid in &folder_ids {
            let mut here: Vec<File> = state.child_files(Some(*fid)).cloned().collect();
            here.sort_by(|a, b| a.effective_name().cmp(b.effective_name()));
            files.extend(here);
        }

        Ok(Some(Subtree { root, folders, files }))
    }

    async fn sibling_named(
        &self,
        parent: Option<FolderId>,
        name: &str,
        exclude: Option<NodeRef>,
    ) -> AppResult<Option<NodeRef>> {
        self.hit();
        let state = self.state.read().await;
        let folder = state
            .child_folders(parent)
            .filter(|f| f.name == name)
            .map(|f| NodeRef::Folder(f.id));
        let file = state
            .child_files(parent)
            .filter(|f| f.effective_name() == name)
            .map(|f| NodeRef::File(f.id));
        Ok(folder.chain(file).find(|r| Some(*r) != exclude))
    }

    async fn apply(&self, changes: ChangeSet) -> AppResult<()> {
        self.hit();
        let count = changes.len();
        let mut state = self.state.write().await;
        commit(&mut state, changes)?;
        debug!(changes = count, "Applied change set");
        Ok(())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn grants_for(
        &self,
        folder_ids: &[FolderId],
        principals: &[Principal],
    ) -> AppResult<Vec<FolderPermission>> {
        self.hit();
        let state = self.state.read().await;
        let folders: HashSet<&FolderId> = folder_ids.iter().collect();
        let mut grants: Vec<FolderPermission> = state
            .grants
            .values()
            .filter(|g| folders.contains(&g.folder_id) && principals.contains(&g.principal))
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn for_folder(&self, folder_id: FolderId) -> AppResult<Vec<FolderPermission>> {
        self.hit();
        let state = self.state.read().await;
        let mut grants: Vec<FolderPermission> = state
            .grants
            .values()
            .filter(|g| g.folder_id == folder_id)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn create(&self, grant: FolderPermission) -> AppResult<FolderPermission> {
        self.hit();
        let mut state = self.state.write().await;
        state.require_parent(Some(grant.folder_id))?;
        state.grants.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn delete(&self, id: FolderPermissionId) -> AppResult<bool> {
        self.hit();
        Ok(self.state.write().await.grants.remove(&id).is_some())
    }
}
