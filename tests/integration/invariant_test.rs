//! Tree invariants: cyclic moves and sibling name uniqueness.

use filer_entity::node::{Node, NodeRef};
use filer_service::TreeCheck;
use filer_service::bulk::{BulkOperation, BulkParams, ItemStatus};

use crate::helpers::{self, TestApp};

#[tokio::test]
async fn test_move_into_subtree_is_cyclic() {
    let app = TestApp::new();
    let n = app.folder("n", None, None).await;
    let child = app.folder("child", Some(&n), None).await;
    let grandchild = app.folder("grandchild", Some(&child), None).await;
    let elsewhere = app.folder("elsewhere", None, None).await;

    let node = Node::Folder(n.clone());
    for dest in [&n, &child, &grandchild] {
        assert_eq!(
            app.checker.check_move(&node, Some(dest.id)).await.unwrap(),
            TreeCheck::CyclicMove
        );
    }
    assert!(app.checker.check_move(&node, Some(elsewhere.id)).await.unwrap().is_ok());
    assert!(app.checker.check_move(&Node::Folder(child), None).await.unwrap().is_ok());
}

#[tokio::test]
async fn test_bulk_move_into_subtree_reports_cyclic_move() {
    let app = TestApp::new();
    let n = app.folder("n", None, None).await;
    let child = app.folder("child", Some(&n), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Move,
            &[NodeRef::Folder(n.id)],
            &BulkParams::to(child.id),
        )
        .await;

    assert_eq!(result.status_of(NodeRef::Folder(n.id)), Some(ItemStatus::CyclicMove));
    assert_eq!(app.reload_folder(&n).await.unwrap().parent_id, None);
}

#[tokio::test]
async fn test_renaming_two_siblings_to_same_name() {
    let app = TestApp::new();
    let parent = app.folder("parent", None, None).await;
    let first = app.file("one.txt", Some(&parent), None).await;
    let second = app.file("two.txt", Some(&parent), None).await;

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Rename,
            &[NodeRef::File(first.id), NodeRef::File(second.id)],
            &BulkParams::named("same.txt"),
        )
        .await;

    assert_eq!(result.status_of(NodeRef::File(first.id)), Some(ItemStatus::Success));
    assert_eq!(result.status_of(NodeRef::File(second.id)), Some(ItemStatus::NameConflict));
    assert_eq!(app.reload_file(&first).await.unwrap().effective_name(), "same.txt");
    assert_eq!(app.reload_file(&second).await.unwrap().effective_name(), "two.txt");
}

#[tokio::test]
async fn test_rename_is_case_sensitive() {
    let app = TestApp::new();
    let parent = app.folder("parent", None, None).await;
    let docs = app.folder("docs", Some(&parent), None).await;
    let other = app.folder("other", Some(&parent), None).await;

    assert!(!app.checker.check_rename(&Node::Folder(other.clone()), "docs").await.unwrap().is_ok());
    assert!(app.checker.check_rename(&Node::Folder(other), "Docs").await.unwrap().is_ok());
    assert!(app.checker.check_rename(&Node::Folder(docs), "docs").await.unwrap().is_ok());
}

#[tokio::test]
async fn test_root_level_names_are_unique() {
    let app = TestApp::new();
    app.folder("shared", None, None).await;
    let loose = app.file("loose.txt", None, None).await;

    assert!(matches!(
        app.checker.check_create(None, "shared").await.unwrap(),
        TreeCheck::NameConflict { .. }
    ));

    let result = app
        .bulk(
            &helpers::superuser(),
            BulkOperation::Rename,
            &[NodeRef::File(loose.id)],
            &BulkParams::named("shared"),
        )
        .await;
    assert_eq!(result.status_of(NodeRef::File(loose.id)), Some(ItemStatus::NameConflict));
    assert_eq!(app.reload_file(&loose).await.unwrap().effective_name(), "loose.txt");
}

#[tokio::test]
async fn test_audit_reports_clean_tree() {
    let app = TestApp::new();
    let a = app.folder("a", None, None).await;
    app.folder("b", Some(&a), None).await;
    app.file("x.txt", Some(&a), None).await;

    let report = app.tree.audit(None).await.unwrap();
    assert!(report.is_clean());
    assert_eq!((report.folders, report.files), (2, 1));

    let below = app.tree.audit(Some(a.id)).await.unwrap();
    assert_eq!((below.folders, below.files), (1, 1));
}
