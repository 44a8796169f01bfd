//! Permission resolution: inheritance, precedence, ownership and bypasses.

use filer_auth::PermissionSource;
use filer_core::config::FilerConfig;
use filer_core::types::GroupId;
use filer_entity::node::Node;
use filer_entity::permission::{PermissionScope, Principal, Right};

use crate::helpers::{self, TestApp};

#[tokio::test]
async fn test_superuser_always_allowed() {
    let app = TestApp::new();
    let other = helpers::staff();
    let folder = app.folder("locked", None, Some(other.user_id)).await;
    let admin = helpers::superuser();
    app.grant(&folder, Principal::User(admin.user_id), PermissionScope::Children, &[], &Right::ALL)
        .await;

    for right in Right::ALL {
        let node = Node::Folder(folder.clone());
        assert!(app.resolver.resolve(&admin, &node, right).await.unwrap());
        // Same inputs, same answer.
        assert!(app.resolver.resolve(&admin, &node, right).await.unwrap());
    }
}

#[tokio::test]
async fn test_closer_deny_beats_farther_allow() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let top = app.folder("top", None, None).await;
    let mid = app.folder("mid", Some(&top), None).await;
    let leaf = app.folder("leaf", Some(&mid), None).await;
    let file = app.file("report.pdf", Some(&leaf), None).await;

    // Deny created before the farther allow.
    app.grant(&mid, Principal::User(actor.user_id), PermissionScope::Children, &[], &[Right::Read])
        .await;
    app.grant(&top, Principal::User(actor.user_id), PermissionScope::Children, &[Right::Read], &[])
        .await;

    assert!(app.resolver.resolve(&actor, &Node::Folder(top.clone()), Right::Read).await.unwrap());
    assert!(!app.resolver.resolve(&actor, &Node::Folder(leaf.clone()), Right::Read).await.unwrap());
    assert!(!app.resolver.resolve(&actor, &Node::File(file), Right::Read).await.unwrap());
}

#[tokio::test]
async fn test_closer_allow_beats_farther_deny() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let top = app.folder("top", None, None).await;
    let mid = app.folder("mid", Some(&top), None).await;
    let leaf = app.folder("leaf", Some(&mid), None).await;

    app.grant(&mid, Principal::User(actor.user_id), PermissionScope::Children, &[Right::Edit], &[])
        .await;
    app.grant(&top, Principal::User(actor.user_id), PermissionScope::Children, &[], &[Right::Edit])
        .await;

    assert!(app.resolver.resolve(&actor, &Node::Folder(leaf), Right::Edit).await.unwrap());
    assert!(!app.resolver.resolve(&actor, &Node::Folder(top), Right::Edit).await.unwrap());
}

#[tokio::test]
async fn test_deny_wins_at_same_level() {
    let app = TestApp::new();
    let group = GroupId::new();
    let actor = helpers::staff().with_groups([group]);
    let folder = app.folder("shared", None, None).await;

    app.grant(&folder, Principal::User(actor.user_id), PermissionScope::This, &[Right::Read], &[])
        .await;
    app.grant(&folder, Principal::Group(group), PermissionScope::Children, &[], &[Right::Read])
        .await;

    let rights = app.resolver.effective(&actor, &Node::Folder(folder)).await.unwrap();
    assert!(!rights.read.allowed);
    assert_eq!(rights.read.source, PermissionSource::Grant);
}

#[tokio::test]
async fn test_this_scope_stops_at_the_folder() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let parent = app.folder("parent", None, None).await;
    let child = app.folder("child", Some(&parent), None).await;
    let direct = app.file("direct.txt", Some(&parent), None).await;

    app.grant(&parent, Principal::User(actor.user_id), PermissionScope::This, &[Right::Read], &[])
        .await;

    assert!(app.resolver.resolve(&actor, &Node::Folder(parent), Right::Read).await.unwrap());
    assert!(app.resolver.resolve(&actor, &Node::File(direct), Right::Read).await.unwrap());
    assert!(!app.resolver.resolve(&actor, &Node::Folder(child), Right::Read).await.unwrap());
}

#[tokio::test]
async fn test_grants_for_other_principals_are_ignored() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let folder = app.folder("theirs", None, None).await;
    let group = Principal::Group(GroupId::new());
    app.grant(&folder, group, PermissionScope::Children, &Right::ALL, &[]).await;

    assert!(!app.resolver.resolve(&actor, &Node::Folder(folder), Right::Read).await.unwrap());
}

#[tokio::test]
async fn test_owner_fallback() {
    let app = TestApp::new();
    let owner = helpers::staff();
    let folder = app.folder("mine", None, Some(owner.user_id)).await;
    let file = app.file("notes.txt", Some(&folder), Some(owner.user_id)).await;

    let folder_rights = app.resolver.effective(&owner, &Node::Folder(folder)).await.unwrap();
    assert!(folder_rights.read.allowed);
    assert!(folder_rights.edit.allowed && folder_rights.add_children.allowed);
    assert_eq!(folder_rights.edit.source, PermissionSource::Owner);

    let file_rights = app.resolver.effective(&owner, &Node::File(file.clone())).await.unwrap();
    assert!(file_rights.read.allowed && file_rights.edit.allowed);
    assert!(!file_rights.add_children.allowed);

    let stranger = helpers::staff();
    assert!(!app.resolver.resolve(&stranger, &Node::File(file), Right::Read).await.unwrap());
}

#[tokio::test]
async fn test_explicit_deny_overrides_ownership() {
    let app = TestApp::new();
    let owner = helpers::staff();
    let folder = app.folder("mine", None, Some(owner.user_id)).await;
    app.grant(&folder, Principal::User(owner.user_id), PermissionScope::This, &[], &[Right::Edit])
        .await;

    let node = Node::Folder(folder);
    assert!(!app.resolver.resolve(&owner, &node, Right::Edit).await.unwrap());
    assert!(app.resolver.resolve(&owner, &node, Right::Read).await.unwrap());
}

#[tokio::test]
async fn test_disabled_permissions_allow_staff_only() {
    let app = TestApp::with_config(FilerConfig {
        enable_permissions: false,
        ..FilerConfig::default()
    });
    let folder = app.folder("anything", None, None).await;
    let group = Principal::Group(GroupId::new());
    app.grant(&folder, group, PermissionScope::Children, &[], &Right::ALL).await;

    let node = Node::Folder(folder);
    let rights = app.resolver.effective(&helpers::staff(), &node).await.unwrap();
    assert!(rights.edit.allowed);
    assert_eq!(rights.edit.source, PermissionSource::Disabled);
    assert!(!app.resolver.resolve(&helpers::outsider(), &node, Right::Read).await.unwrap());
}

#[tokio::test]
async fn test_over_deep_chain_resolves_to_deny() {
    let app = TestApp::with_config(FilerConfig {
        max_tree_depth: 2,
        ..FilerConfig::default()
    });
    let actor = helpers::staff();
    let a = app.folder("a", None, None).await;
    let b = app.folder("b", Some(&a), None).await;
    let c = app.folder("c", Some(&b), None).await;
    app.grant(&a, Principal::User(actor.user_id), PermissionScope::Children, &[Right::Read], &[])
        .await;

    assert!(app.resolver.resolve(&actor, &Node::Folder(b), Right::Read).await.unwrap());
    assert!(!app.resolver.resolve(&actor, &Node::Folder(c), Right::Read).await.unwrap());
}

#[tokio::test]
async fn test_require_returns_authorization_error() {
    let app = TestApp::new();
    let folder = app.folder("private", None, None).await;
    let err = app
        .resolver
        .require(&helpers::staff(), &Node::Folder(folder), Right::Edit)
        .await
        .unwrap_err();
    assert_eq!(err.kind, filer_core::error::ErrorKind::Authorization);
}
