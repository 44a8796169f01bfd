//! Directory listing: read filtering, ordering, pagination and query counts.

use filer_core::error::ErrorKind;
use filer_core::types::{PageRequest, SortField};
use filer_entity::file::File;
use filer_entity::permission::{PermissionScope, Principal, Right};
use filer_service::RequestContext;

use crate::helpers::{self, TestApp};

fn names(page: &filer_core::types::PageResponse<filer_entity::node::Node>) -> Vec<&str> {
    page.items.iter().map(|n| n.effective_name()).collect()
}

#[tokio::test]
async fn test_listing_hides_unreadable_children() {
    let app = TestApp::new();
    let actor = helpers::staff();
    let home = app.folder("home", None, Some(actor.user_id)).await;
    app.file("mine.txt", Some(&home), Some(actor.user_id)).await;
    app.file("theirs.txt", Some(&home), None).await;
    let shared = app.folder("shared", Some(&home), None).await;
    app.folder("private", Some(&home), None).await;
    app.grant(&shared, Principal::User(actor.user_id), PermissionScope::This, &[Right::Read], &[])
        .await;

    let page = app
        .folders
        .list_directory(&RequestContext::new(actor), Some(home.id), SortField::default(), None)
        .await
        .unwrap();

    assert_eq!(names(&page), ["shared", "mine.txt"]);
    assert_eq!(page.total_items, 2);
}

#[tokio::test]
async fn test_listing_puts_folders_first() {
    let app = TestApp::new();
    let parent = app.folder("parent", None, None).await;
    app.file("b.txt", Some(&parent), None).await;
    app.folder("zeta", Some(&parent), None).await;
    app.file("A.txt", Some(&parent), None).await;
    app.folder("alpha", Some(&parent), None).await;
    let ctx = RequestContext::new(helpers::superuser());

    let page = app
        .folders
        .list_directory(&ctx, Some(parent.id), SortField::default(), None)
        .await
        .unwrap();
    assert_eq!(names(&page), ["alpha", "zeta", "A.txt", "b.txt"]);

    let page = app
        .folders
        .list_directory(&ctx, Some(parent.id), "-name".parse().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(names(&page), ["zeta", "alpha", "b.txt", "A.txt"]);
}

#[tokio::test]
async fn test_listing_sorts_by_size() {
    let app = TestApp::new();
    let parent = app.folder("parent", None, None).await;
    for (name, size) in [("big.bin", 300), ("small.bin", 10), ("mid.bin", 50)] {
        let mut file = File::new(name, Some(parent.id), None);
        file.size_bytes = size;
        app.store.seed_file(file).await.unwrap();
    }

    let page = app
        .folders
        .list_directory(
            &RequestContext::new(helpers::superuser()),
            Some(parent.id),
            "-size".parse().unwrap(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(names(&page), ["big.bin", "mid.bin", "small.bin"]);
}

#[tokio::test]
async fn test_listing_paginates() {
    let app = TestApp::new();
    let parent = app.folder("parent", None, None).await;
    for i in 0..25 {
        app.file(&format!("{i:02}.txt"), Some(&parent), None).await;
    }
    let ctx = RequestContext::new(helpers::superuser());

    let page = app
        .folders
        .list_directory(&ctx, Some(parent.id), SortField::default(), Some(PageRequest::new(3, 10)))
        .await
        .unwrap();

    assert_eq!(page.total_items, 25);
    assert_eq!(page.total_pages, 3);
    assert!(!page.has_next);
    assert!(page.has_previous);
    assert_eq!(names(&page), ["20.txt", "21.txt", "22.txt", "23.txt", "24.txt"]);
}

#[tokio::test]
async fn test_listing_query_count_is_fixed() {
    for count in [10, 100] {
        let app = TestApp::new();
        let actor = helpers::staff();
        let parent = app.folder("parent", None, Some(actor.user_id)).await;
        for i in 0..count {
            app.folder(&format!("dir{i}"), Some(&parent), Some(actor.user_id)).await;
            app.file(&format!("file{i}"), Some(&parent), Some(actor.user_id)).await;
        }

        app.store.reset_round_trips();
        let page = app
            .folders
            .list_directory(
                &RequestContext::new(actor),
                Some(parent.id),
                SortField::default(),
                Some(PageRequest::new(1, 500)),
            )
            .await
            .unwrap();

        assert_eq!(page.total_items, count as u64 * 2);
        // Folder, children, ancestor chains, grants.
        assert_eq!(app.store.round_trips(), 4, "{count} children");
    }
}

#[tokio::test]
async fn test_root_listing_requires_staff() {
    let app = TestApp::new();
    let actor = helpers::outsider();
    app.folder("top", None, Some(actor.user_id)).await;

    let err = app
        .folders
        .list_directory(&RequestContext::new(actor.clone()), None, SortField::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);

    let staff = helpers::staff();
    app.folder("staff-owned", None, Some(staff.user_id)).await;
    let page = app
        .folders
        .list_directory(&RequestContext::new(staff), None, SortField::default(), None)
        .await
        .unwrap();
    assert_eq!(names(&page), ["staff-owned"]);
}
