//! Bulk operations: move, copy, rename, delete, visibility and resize.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use filer_auth::PermissionResolver;
use filer_core::config::FilerConfig;
use filer_core::error::ErrorKind;
use filer_core::result::AppResult;
use filer_core::types::{FileId, FolderId};
use filer_database::{ChangeSet, MemoryStore, TreeStore};
use filer_entity::file::{File, ImageInfo, SubjectLocation};
use filer_entity::folder::{Folder, Subtree};
use filer_entity::node::{Node, NodeRef};
use filer_entity::permission::{PermissionScope, Principal, Right};
use filer_service::{BulkEngine, RequestContext};
use filer_service::bulk::{
    BulkOperation, BulkParams, DeletePhase, Destination, ItemStatus, ResizeSpec,
};

use crate::helpers::{self, TestApp};

#[tokio::test]
async fn test_move_folder_keeps_subtree() {
    let app = TestApp::new();
    let a = app.folder("A", None, None).await;
    let b = app.folder("B", None, None).await;
    let f = app.folder("F", Some(&a), None).await;
    let x = app.file("x.txt", Some(&f), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Move,
            &[NodeRef::Folder(f.id)],
            &BulkParams::to(b.id),
        )
        .await;

    assert!(result.all_succeeded());
    assert_eq!(app.child_names(Some(&b)).await, ["F"]);
    assert!(app.child_names(Some(&a)).await.is_empty());
    assert_eq!(app.reload_file(&x).await.unwrap().folder_id, Some(f.id));
}

#[tokio::test]
async fn test_move_to_root() {
    let app = TestApp::new();
    let a = app.folder("A", None, None).await;
    let x = app.file("x.txt", Some(&a), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Move,
            &[NodeRef::File(x.id)],
            &BulkParams::to(Destination::Root),
        )
        .await;

    assert!(result.all_succeeded());
    assert_eq!(app.reload_file(&x).await.unwrap().folder_id, None);
}

#[tokio::test]
async fn test_move_requires_add_children_on_destination() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let mine = app.folder("mine", None, Some(actor.user_id)).await;
    let x = app.file("x.txt", Some(&mine), Some(actor.user_id)).await;
    let theirs = app.folder("theirs", None, None).await;

    let selection = [NodeRef::File(x.id)];
    let result = app
        .bulk(&actor, BulkOperation::Move, &selection, &BulkParams::to(theirs.id))
        .await;
    assert_eq!(result.status_of(selection[0]), Some(ItemStatus::PermissionDenied));
    assert_eq!(app.reload_file(&x).await.unwrap().folder_id, Some(mine.id));

    app.grant(
        &theirs,
        Principal::User(actor.user_id),
        PermissionScope::This,
        &[Right::AddChildren],
        &[],
    )
    .await;
    let result = app
        .bulk(&actor, BulkOperation::Move, &selection, &BulkParams::to(theirs.id))
        .await;
    assert!(result.all_succeeded());
    assert_eq!(app.reload_file(&x).await.unwrap().folder_id, Some(theirs.id));
}

#[tokio::test]
async fn test_move_name_clash_at_destination() {
    let app = TestApp::new();
    let a = app.folder("A", None, None).await;
    let b = app.folder("B", None, None).await;
    let moving = app.file("same.txt", Some(&a), None).await;
    app.file("same.txt", Some(&b), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Move,
            &[NodeRef::File(moving.id)],
            &BulkParams::to(b.id),
        )
        .await;
    assert_eq!(result.status_of(NodeRef::File(moving.id)), Some(ItemStatus::NameConflict));
    assert_eq!(app.reload_file(&moving).await.unwrap().folder_id, Some(a.id));
}

#[tokio::test]
async fn test_copy_into_same_parent_is_forbidden() {
    let app = TestApp::new();
    let a = app.folder("A", None, None).await;
    let b = app.folder("B", None, None).await;
    let in_a = app.file("photo.jpg", Some(&a), None).await;
    let in_b = app.file("other.jpg", Some(&b), None).await;
    let before = app.store.node_count().await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Copy,
            &[NodeRef::File(in_b.id), NodeRef::File(in_a.id)],
            &BulkParams::to(a.id).with_suffix("test"),
        )
        .await;

    assert!(!result.preview);
    assert_eq!(result.failed, 2);
    assert!(result.items.iter().all(|i| i.status == ItemStatus::Forbidden));
    assert_eq!(app.store.node_count().await, before);
}

#[tokio::test]
async fn test_copy_inserts_suffix() {
    let app = TestApp::new();
    let a = app.folder("A", None, None).await;
    let b = app.folder("B", None, None).await;
    let photo = app.file("photo.jpg", Some(&a), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Copy,
            &[NodeRef::File(photo.id)],
            &BulkParams::to(b.id).with_suffix("test"),
        )
        .await;

    assert!(result.all_succeeded());
    assert_eq!(result.items[0].affected.len(), 1);
    assert_eq!(app.child_names(Some(&b)).await, ["phototest.jpg"]);
    assert_eq!(app.child_names(Some(&a)).await, ["photo.jpg"]);
}

#[tokio::test]
async fn test_copy_folder_recursively() {
    let app = TestApp::new();
    let src = app.folder("album", None, None).await;
    let raw = app.folder("raw", Some(&src), None).await;
    app.file("a.png", Some(&src), None).await;
    app.file("b.png", Some(&raw), None).await;
    let dest = app.folder("backup", None, None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Copy,
            &[NodeRef::Folder(src.id), NodeRef::Folder(raw.id)],
            &BulkParams::to(dest.id).with_suffix("_copy"),
        )
        .await;

    assert!(result.all_succeeded());
    assert_eq!(result.items[1].covered_by, Some(NodeRef::Folder(src.id)));
    assert_eq!(result.items[0].affected.len(), 4);

    let copied = app
        .store
        .children(Some(dest.id))
        .await
        .unwrap()
        .into_iter()
        .find_map(|n| n.node_ref().as_folder())
        .unwrap();
    let subtree = app.store.descendants(copied).await.unwrap().unwrap();
    assert_eq!(subtree.root.name, "album");
    assert_eq!(subtree.folders[0].name, "raw");
    let mut names: Vec<&str> = subtree.files.iter().map(|f| f.effective_name()).collect();
    names.sort();
    assert_eq!(names, ["a_copy.png", "b_copy.png"]);
}

#[tokio::test]
async fn test_copy_folder_name_clash() {
    let app = TestApp::new();
    let src = app.folder("docs", None, None).await;
    let dest = app.folder("dest", None, None).await;
    app.folder("docs", Some(&dest), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Copy,
            &[NodeRef::Folder(src.id)],
            &BulkParams::to(dest.id),
        )
        .await;
    assert_eq!(result.status_of(NodeRef::Folder(src.id)), Some(ItemStatus::NameConflict));
    assert_eq!(app.child_names(Some(&dest)).await, ["docs"]);
}

#[tokio::test]
async fn test_copy_requires_read_on_whole_subtree() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let src = app.folder("src", None, Some(actor.user_id)).await;
    app.file("secret.txt", Some(&src), None).await;
    let dest = app.folder("dest", None, Some(actor.user_id)).await;

    let result = app
        .bulk(&actor, BulkOperation::Copy, &[NodeRef::Folder(src.id)], &BulkParams::to(dest.id))
        .await;
    assert_eq!(result.status_of(NodeRef::Folder(src.id)), Some(ItemStatus::PermissionDenied));
    assert!(app.child_names(Some(&dest)).await.is_empty());
}

#[tokio::test]
async fn test_rename_folder_only_renames_itself() {
    let app = TestApp::new();
    let folder = app.folder("old", None, None).await;
    let inner = app.file("inner.txt", Some(&folder), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Rename,
            &[NodeRef::Folder(folder.id)],
            &BulkParams::named("new"),
        )
        .await;

    assert!(result.all_succeeded());
    assert_eq!(app.reload_folder(&folder).await.unwrap().name, "new");
    assert_eq!(app.reload_file(&inner).await.unwrap().effective_name(), "inner.txt");
}

#[tokio::test]
async fn test_invalid_params_are_fatal() {
    let app = TestApp::new();
    let file = app.file("keep.txt", None, None).await;
    let ctx = RequestContext::new(helpers::superuser());
    let selection = [NodeRef::File(file.id)];

    let err = app
        .bulk
        .execute(&ctx, BulkOperation::Rename, &selection, &BulkParams::named("  "))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = app
        .bulk
        .execute(&ctx, BulkOperation::Delete, &selection, &BulkParams::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(app.reload_file(&file).await.is_some());
}

#[tokio::test]
async fn test_delete_preview_then_confirm() {
    let app = TestApp::new();
    let folder = app.folder("trash", None, None).await;
    let inner = app.folder("inner", Some(&folder), None).await;
    let file = app.file("old.log", Some(&inner), None).await;
    let selection = [NodeRef::Folder(folder.id)];
    let admin = helpers::superuser();

    let preview = app
        .bulk(&admin, BulkOperation::Delete, &selection, &BulkParams::delete(DeletePhase::Preview))
        .await;
    assert!(preview.preview);
    let affected = &preview.items[0].affected;
    assert_eq!(affected.len(), 3);
    assert!(affected.contains(&NodeRef::File(file.id)));
    assert_eq!(app.store.node_count().await, 3);

    let confirmed = app
        .bulk(
            &admin,
            BulkOperation::Delete,
            &selection,
            &BulkParams::delete(DeletePhase::Confirmed),
        )
        .await;
    assert!(!confirmed.preview);
    assert!(confirmed.all_succeeded());
    assert_eq!(app.store.node_count().await, 0);
}

#[tokio::test]
async fn test_mixed_delete_skips_forbidden_item() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let mine = app.folder("mine", None, Some(actor.user_id)).await;
    app.file("mine.txt", Some(&mine), Some(actor.user_id)).await;
    let guarded = app.folder("guarded", None, Some(actor.user_id)).await;
    app.file("theirs.txt", Some(&guarded), None).await;
    let loose = app.file("loose.txt", None, Some(actor.user_id)).await;

    let selection = [
        NodeRef::Folder(mine.id),
        NodeRef::Folder(guarded.id),
        NodeRef::File(loose.id),
    ];
    let result = app
        .bulk(
            &actor,
            BulkOperation::Delete,
            &selection,
            &BulkParams::delete(DeletePhase::Confirmed),
        )
        .await;

    assert_eq!(result.status_of(selection[0]), Some(ItemStatus::Success));
    assert_eq!(result.status_of(selection[1]), Some(ItemStatus::PermissionDenied));
    assert_eq!(result.status_of(selection[2]), Some(ItemStatus::Success));
    assert!(app.reload_folder(&mine).await.is_none());
    assert!(app.reload_file(&loose).await.is_none());
    assert!(app.reload_folder(&guarded).await.is_some());
    assert_eq!(app.child_names(Some(&guarded)).await, ["theirs.txt"]);
}

#[tokio::test]
async fn test_missing_item_reported_not_found() {
    let app = TestApp::new();
    let file = app.file("here.txt", None, None).await;
    let gone = NodeRef::File(FileId::new());

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::SetPrivate,
            &[gone, NodeRef::File(file.id)],
            &BulkParams::default(),
        )
        .await;
    assert_eq!(result.status_of(gone), Some(ItemStatus::NotFound));
    assert_eq!(result.status_of(NodeRef::File(file.id)), Some(ItemStatus::Success));
}

#[tokio::test]
async fn test_visibility_applies_to_files_only() {
    let app = TestApp::new();
    let folder = app.folder("public", None, None).await;
    let file = app.file("page.html", Some(&folder), None).await;
    let selection = [NodeRef::Folder(folder.id), NodeRef::File(file.id)];
    let admin = helpers::superuser();

    let result = app
        .bulk(&admin, BulkOperation::SetPrivate, &selection, &BulkParams::default())
        .await;
    assert_eq!(result.status_of(selection[0]), Some(ItemStatus::NotApplicable));
    assert_eq!(result.status_of(selection[1]), Some(ItemStatus::Success));
    assert!(!app.reload_file(&file).await.unwrap().is_public);

    app.bulk(&admin, BulkOperation::SetPublic, &selection[1..], &BulkParams::default())
        .await;
    assert!(app.reload_file(&file).await.unwrap().is_public);
}

#[tokio::test]
async fn test_resize_without_crop() {
    let app = TestApp::new();
    let photo = app
        .image(
            "photo.jpg",
            None,
            None,
            ImageInfo::new(800, 600).with_subject_location(SubjectLocation::new(100, 200)),
        )
        .await;
    let admin = helpers::superuser();
    let selection = [NodeRef::File(photo.id)];

    let params = BulkParams::resize(ResizeSpec::fit(400, 60));
    app.bulk(&admin, BulkOperation::Resize, &selection, &params).await;
    let image = app.reload_file(&photo).await.unwrap().image.unwrap();
    assert_eq!((image.width, image.height), (80, 60));
    assert_eq!(image.subject_location, Some(SubjectLocation::new(10, 20)));
}

#[tokio::test]
async fn test_resize_without_crop_width_bound() {
    let app = TestApp::new();
    let photo = app
        .image(
            "photo.jpg",
            None,
            None,
            ImageInfo::new(800, 600).with_subject_location(SubjectLocation::new(100, 200)),
        )
        .await;

    app.bulk(
        &helpers::superuser(),
        BulkOperation::Resize,
        &[NodeRef::File(photo.id)],
        &BulkParams::resize(ResizeSpec::fit(40, 300)),
    )
    .await;
    let image = app.reload_file(&photo).await.unwrap().image.unwrap();
    assert_eq!((image.width, image.height), (40, 30));
    assert_eq!(image.subject_location, Some(SubjectLocation::new(5, 10)));
}

#[tokio::test]
async fn test_resize_with_crop() {
    let app = TestApp::new();
    let photo = app
        .image(
            "photo.jpg",
            None,
            None,
            ImageInfo::new(800, 600).with_subject_location(SubjectLocation::new(100, 200)),
        )
        .await;

    app.bulk(
        &helpers::superuser(),
        BulkOperation::Resize,
        &[NodeRef::File(photo.id)],
        &BulkParams::resize(ResizeSpec::fill(40, 300)),
    )
    .await;
    let image = app.reload_file(&photo).await.unwrap().image.unwrap();
    assert_eq!((image.width, image.height), (40, 300));
    assert_eq!(image.subject_location, Some(SubjectLocation::new(20, 150)));
}

#[tokio::test]
async fn test_resize_skips_non_images() {
    let app = TestApp::new();
    let folder = app.folder("pics", None, None).await;
    let text = app.file("readme.txt", Some(&folder), None).await;
    let selection = [NodeRef::Folder(folder.id), NodeRef::File(text.id)];

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Resize,
            &selection,
            &BulkParams::resize(ResizeSpec::fit(10, 10)),
        )
        .await;
    assert!(result.items.iter().all(|i| i.status == ItemStatus::NotApplicable));
}

#[tokio::test]
async fn test_bulk_round_trips_do_not_grow_with_permission_checks() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let folder = app.folder("batch", None, Some(actor.user_id)).await;
    let mut selection = Vec::new();
    for i in 0..20 {
        let file = app.file(&format!("{i}.txt"), Some(&folder), Some(actor.user_id)).await;
        selection.push(NodeRef::File(file.id));
    }

    app.store.reset_round_trips();
    let result = app
        .bulk(&actor, BulkOperation::SetPrivate, &selection, &BulkParams::default())
        .await;
    assert!(result.all_succeeded());
    // One load, one ancestor query, one grant query, then one commit per item.
    assert_eq!(app.store.round_trips(), 3 + 20);
}

#[tokio::test]
async fn test_copy_clash_inside_new_folder_is_name_conflict() {
    let app = TestApp::new();
    let album = app.folder("album", None, None).await;
    app.folder("xtest.jpg", Some(&album), None).await;
    app.file("x.jpg", Some(&album), None).await;
    let dest = app.folder("dest", None, None).await;
    let before = app.store.node_count().await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Copy,
            &[NodeRef::Folder(album.id)],
            &BulkParams::to(dest.id).with_suffix("test"),
        )
        .await;

    assert_eq!(result.status_of(NodeRef::Folder(album.id)), Some(ItemStatus::NameConflict));
    assert_eq!(app.store.node_count().await, before);
    assert!(app.child_names(Some(&dest)).await.is_empty());
}

/// A tree store whose name lookups miss every sibling, as if the clashing
/// node was inserted between the precheck and the commit.
struct StaleNames(Arc<MemoryStore>);

#[async_trait]
impl TreeStore for StaleNames {
    async fn folder(&self, id: FolderId) -> AppResult<Option<Folder>> {
        self.0.folder(id).await
    }

    async fn file(&self, id: FileId) -> AppResult<Option<File>> {
        self.0.file(id).await
    }

    async fn folders(&self, ids: &[FolderId]) -> AppResult<Vec<Folder>> {
        self.0.folders(ids).await
    }

    async fn files(&self, ids: &[FileId]) -> AppResult<Vec<File>> {
        self.0.files(ids).await
    }

    async fn ancestors_of(&self, ids: &[FolderId]) -> AppResult<HashMap<FolderId, Vec<Folder>>> {
        self.0.ancestors_of(ids).await
    }

    async fn children(&self, parent: Option<FolderId>) -> AppResult<Vec<Node>> {
        self.0.children(parent).await
    }

    async fn descendants(&self, id: FolderId) -> AppResult<Option<Subtree>> {
        self.0.descendants(id).await
    }

    async fn sibling_named(
        &self,
        _parent: Option<FolderId>,
        _name: &str,
        _exclude: Option<NodeRef>,
    ) -> AppResult<Option<NodeRef>> {
        Ok(None)
    }

    async fn apply(&self, changes: ChangeSet) -> AppResult<()> {
        self.0.apply(changes).await
    }
}

fn stale_engine(app: &TestApp) -> BulkEngine {
    let config = FilerConfig::default();
    let tree = Arc::new(StaleNames(app.store.clone()));
    let resolver = Arc::new(PermissionResolver::new(&config, tree.clone(), app.store.clone()));
    BulkEngine::new(&config, tree, resolver)
}

#[tokio::test]
async fn test_store_rejected_rename_is_name_conflict() {
    let app = TestApp::new();
    let parent = app.folder("parent", None, None).await;
    let one = app.file("one.txt", Some(&parent), None).await;
    app.file("two.txt", Some(&parent), None).await;
    let ctx = RequestContext::new(helpers::superuser());

    let result = stale_engine(&app)
        .execute(
            &ctx,
            BulkOperation::Rename,
            &[NodeRef::File(one.id)],
            &BulkParams::named("two.txt"),
        )
        .await
        .unwrap();

    assert_eq!(result.status_of(NodeRef::File(one.id)), Some(ItemStatus::NameConflict));
    assert_eq!(app.reload_file(&one).await.unwrap().effective_name(), "one.txt");
}

#[tokio::test]
async fn test_store_rejected_move_is_name_conflict() {
    let app = TestApp::new();
    let a = app.folder("A", None, None).await;
    let b = app.folder("B", None, None).await;
    let moving = app.file("x.txt", Some(&a), None).await;
    app.file("x.txt", Some(&b), None).await;
    let ctx = RequestContext::new(helpers::superuser());

    let result = stale_engine(&app)
        .execute(&ctx, BulkOperation::Move, &[NodeRef::File(moving.id)], &BulkParams::to(b.id))
        .await
        .unwrap();

    assert_eq!(result.status_of(NodeRef::File(moving.id)), Some(ItemStatus::NameConflict));
    assert_eq!(app.reload_file(&moving).await.unwrap().folder_id, Some(a.id));
    assert_eq!(app.child_names(Some(&b)).await, ["x.txt"]);
}

#[tokio::test]
async fn test_subtree_past_depth_limit_is_refused() {
    let app = TestApp::with_config(FilerConfig {
        max_tree_depth: 2,
        ..FilerConfig::default()
    });
    let a = app.folder("a", None, None).await;
    let b = app.folder("b", Some(&a), None).await;
    let c = app.folder("c", Some(&b), None).await;
    app.folder("d", Some(&c), None).await;
    let dest = app.folder("dest", None, None).await;
    let before = app.store.node_count().await;

    for (operation, params) in [
        (BulkOperation::Copy, BulkParams::to(dest.id)),
        (BulkOperation::Delete, BulkParams::delete(DeletePhase::Confirmed)),
    ] {
        let result = app
            .bulk(&helpers::superuser(), operation, &[NodeRef::Folder(a.id)], &params)
            .await;
        assert_eq!(
            result.status_of(NodeRef::Folder(a.id)),
            Some(ItemStatus::Forbidden),
            "{operation}"
        );
    }
    assert_eq!(app.store.node_count().await, before);

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Copy,
            &[NodeRef::Folder(b.id)],
            &BulkParams::to(dest.id),
        )
        .await;
    assert!(result.all_succeeded());
    assert_eq!(app.store.node_count().await, before + 3);
}
