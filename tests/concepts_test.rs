//! Integration tests for the individual concepts against a real database.

use lenspost::concepts::badging::BadgeType;
use lenspost::concepts::{
    Authenticating, Badging, Blurring, Commenting, Friending, Liking, Posting, Reporting,
    Sessioning,
};
use lenspost::db::Database;
use lenspost::error::ApiError;
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

// ========== Authenticating ==========

#[tokio::test]
async fn test_duplicate_username_fails_not_allowed() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    authing
        .create("alice", "password1")
        .await
        .expect("Failed to create first user");

    let err = authing.create("alice", "password2").await.unwrap_err();
    assert!(matches!(err, ApiError::NotAllowed(_)));
}

#[tokio::test]
async fn test_empty_credentials_fail_bad_input() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    assert!(matches!(
        authing.create("", "password1").await.unwrap_err(),
        ApiError::BadInput(_)
    ));
    assert!(matches!(
        authing.create("alice", "").await.unwrap_err(),
        ApiError::BadInput(_)
    ));
}

#[tokio::test]
async fn test_authenticate_does_not_reveal_which_field_was_wrong() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    authing.create("alice", "correct_password").await.unwrap();

    let wrong_password = authing
        .authenticate("alice", "wrong_password")
        .await
        .unwrap_err();
    let wrong_username = authing
        .authenticate("nobody", "correct_password")
        .await
        .unwrap_err();

    assert_eq!(wrong_password.to_string(), wrong_username.to_string());
}

#[tokio::test]
async fn test_update_password_wrong_current_leaves_password_unchanged() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    let user = authing.create("alice", "original_pw").await.unwrap();

    let err = authing
        .update_password(&user.id, "wrong_pw", "new_pw")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotAllowed(_)));

    // Old password still works, new one does not.
    assert!(authing.authenticate("alice", "original_pw").await.is_ok());
    assert!(authing.authenticate("alice", "new_pw").await.is_err());
}

#[tokio::test]
async fn test_update_password_with_correct_current() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    let user = authing.create("alice", "original_pw").await.unwrap();
    authing
        .update_password(&user.id, "original_pw", "new_pw")
        .await
        .unwrap();

    assert!(authing.authenticate("alice", "new_pw").await.is_ok());
    assert!(authing.authenticate("alice", "original_pw").await.is_err());
}

#[tokio::test]
async fn test_ids_to_usernames_preserves_order_and_marks_deleted() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    let alice = authing.create("alice", "password1").await.unwrap();
    let bob = authing.create("bob", "password1").await.unwrap();

    let names = authing
        .ids_to_usernames(&[
            bob.id.clone(),
            "no-such-id".to_string(),
            alice.id.clone(),
        ])
        .await
        .unwrap();

    assert_eq!(names, vec!["bob", "DELETED_USER", "alice"]);
}

#[tokio::test]
async fn test_seed_admin_is_idempotent() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    authing.seed_admin("root", "rootpass123").await.unwrap();
    authing.seed_admin("root", "rootpass123").await.unwrap();

    let admins = authing.get_admins().await.unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].username, "root");
    assert_eq!(admins[0].role, "admin");
}

#[tokio::test]
async fn test_update_username_enforces_uniqueness() {
    let (db, _temp_dir) = setup_db().await;
    let authing = Authenticating::new(db.pool().clone());

    let alice = authing.create("alice", "password1").await.unwrap();
    authing.create("bob", "password1").await.unwrap();

    let err = authing.update_username(&alice.id, "bob").await.unwrap_err();
    assert!(matches!(err, ApiError::NotAllowed(_)));

    authing.update_username(&alice.id, "alice2").await.unwrap();
    assert!(authing.get_user_by_username("alice2").await.is_ok());
    assert!(authing.get_user_by_username("alice").await.is_err());
}

// ========== Posting ==========

#[tokio::test]
async fn test_post_create_rewrites_drive_link() {
    let (db, _temp_dir) = setup_db().await;
    let posting = Posting::new(db.pool().clone());

    let post = posting
        .create(
            "user-1",
            "https://drive.google.com/file/d/ABC123/view",
            "my caption",
            None,
        )
        .await
        .unwrap();

    assert_eq!(post.image, "https://drive.google.com/uc?export=view&id=ABC123");
    assert_eq!(post.caption, "my caption");
}

#[tokio::test]
async fn test_post_create_rejects_unmatched_link() {
    let (db, _temp_dir) = setup_db().await;
    let posting = Posting::new(db.pool().clone());

    let err = posting
        .create("user-1", "https://example.com/cat.png", "caption", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_posts_returned_in_reverse_creation_order() {
    let (db, _temp_dir) = setup_db().await;
    let posting = Posting::new(db.pool().clone());

    for i in 0..3 {
        posting
            .create(
                "user-1",
                &format!("https://drive.google.com/file/d/F{i}/view"),
                &format!("caption {i}"),
                None,
            )
            .await
            .unwrap();
    }

    let posts = posting.get_posts().await.unwrap();
    let captions: Vec<&str> = posts.iter().map(|p| p.caption.as_str()).collect();
    assert_eq!(captions, vec!["caption 2", "caption 1", "caption 0"]);
}

#[tokio::test]
async fn test_post_partial_update_leaves_omitted_fields() {
    let (db, _temp_dir) = setup_db().await;
    let posting = Posting::new(db.pool().clone());

    let post = posting
        .create(
            "user-1",
            "https://drive.google.com/file/d/ABC/view",
            "original",
            Some(&lenspost::concepts::posting::PostOptions {
                background_color: Some("red".to_string()),
            }),
        )
        .await
        .unwrap();

    posting.update(&post.id, Some("updated"), None).await.unwrap();

    let updated = posting.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(updated.caption, "updated");
    assert_eq!(updated.background_color.as_deref(), Some("red"));
    assert_eq!(updated.image, post.image);
}

#[tokio::test]
async fn test_post_author_assertion() {
    let (db, _temp_dir) = setup_db().await;
    let posting = Posting::new(db.pool().clone());

    let post = posting
        .create("user-1", "https://drive.google.com/file/d/A/view", "c", None)
        .await
        .unwrap();

    assert!(posting.assert_author_is_user(&post.id, "user-1").await.is_ok());

    let err = posting
        .assert_author_is_user(&post.id, "user-2")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AuthorMismatch { .. }));

    let err = posting
        .assert_author_is_user("no-such-post", "user-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ========== Liking ==========

#[tokio::test]
async fn test_double_like_increments_counter_once() {
    let (db, _temp_dir) = setup_db().await;
    let liking = Liking::new(db.pool().clone());

    liking.init_item("item-1").await.unwrap();
    liking.like("user-1", "item-1").await.unwrap();
    liking.like("user-1", "item-1").await.unwrap();

    assert_eq!(liking.get_item_like_count("item-1").await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_unlike_after_double_like_decrements_once() {
    let (db, _temp_dir) = setup_db().await;
    let liking = Liking::new(db.pool().clone());

    liking.init_item("item-1").await.unwrap();
    liking.like("user-1", "item-1").await.unwrap();
    liking.like("user-1", "item-1").await.unwrap();
    liking.unlike("user-1", "item-1").await.unwrap();

    assert_eq!(liking.get_item_like_count("item-1").await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_unlike_without_like_is_silent_noop() {
    let (db, _temp_dir) = setup_db().await;
    let liking = Liking::new(db.pool().clone());

    liking.init_item("item-1").await.unwrap();
    liking.like("user-1", "item-1").await.unwrap();

    // A user who never liked the item must not disturb the counter.
    liking.unlike("user-2", "item-1").await.unwrap();
    assert_eq!(liking.get_item_like_count("item-1").await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_like_seeds_counter_when_init_was_missed() {
    let (db, _temp_dir) = setup_db().await;
    let liking = Liking::new(db.pool().clone());

    liking.like("user-1", "item-never-seeded").await.unwrap();
    assert_eq!(
        liking.get_item_like_count("item-never-seeded").await.unwrap(),
        Some(1)
    );
}

#[tokio::test]
async fn test_get_item_likers() {
    let (db, _temp_dir) = setup_db().await;
    let liking = Liking::new(db.pool().clone());

    liking.init_item("item-1").await.unwrap();
    liking.like("user-1", "item-1").await.unwrap();
    liking.like("user-2", "item-1").await.unwrap();
    liking.like("user-2", "item-2").await.unwrap();

    let likers = liking.get_item_likers("item-1").await.unwrap();
    assert_eq!(likers, vec!["user-1", "user-2"]);

    assert_eq!(liking.get_user_likes("user-2").await.unwrap().len(), 2);
}

// ========== Badging ==========

#[tokio::test]
async fn test_double_badge_grant_yields_single_record() {
    let (db, _temp_dir) = setup_db().await;
    let badging = Badging::new(db.pool().clone());

    let first = badging.give("user-1", BadgeType::Shame).await.unwrap();
    let second = badging.give("user-1", BadgeType::Shame).await.unwrap();
    assert_eq!(first.id, second.id);

    let badges = badging.get_by_author("user-1").await.unwrap();
    assert_eq!(badges.len(), 1);

    // A different type is a separate badge.
    badging.give("user-1", BadgeType::Verified).await.unwrap();
    assert_eq!(badging.get_by_author("user-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_badge_remove_unknown_fails_not_found() {
    let (db, _temp_dir) = setup_db().await;
    let badging = Badging::new(db.pool().clone());

    let err = badging.remove("no-such-badge").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ========== Commenting ==========

#[tokio::test]
async fn test_item_comments_filtered_and_ordered() {
    let (db, _temp_dir) = setup_db().await;
    let commenting = Commenting::new(db.pool().clone());

    commenting.create("user-1", "item-1", "first").await.unwrap();
    commenting.create("user-2", "item-1", "second").await.unwrap();
    commenting.create("user-1", "item-2", "other item").await.unwrap();

    let comments = commenting.get_item_comments("item-1").await.unwrap();
    let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["second", "first"]);

    commenting.delete_item_comments("item-1").await.unwrap();
    assert!(commenting.get_item_comments("item-1").await.unwrap().is_empty());
    assert_eq!(commenting.get_comments().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_comment_author_assertion() {
    let (db, _temp_dir) = setup_db().await;
    let commenting = Commenting::new(db.pool().clone());

    let comment = commenting.create("user-1", "item-1", "hello").await.unwrap();

    let err = commenting
        .assert_author_is_user(&comment.id, "user-2")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AuthorMismatch { .. }));
}

// ========== Reporting ==========

#[tokio::test]
async fn test_report_create_and_remove() {
    let (db, _temp_dir) = setup_db().await;
    let reporting = Reporting::new(db.pool().clone());

    let report = reporting.create("item-1", Some("spam")).await.unwrap();
    assert_eq!(report.item, "item-1");
    assert_eq!(report.info.as_deref(), Some("spam"));

    reporting.remove(&report.id).await.unwrap();
    let err = reporting.remove(&report.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ========== Friending ==========

#[tokio::test]
async fn test_friend_request_accept_establishes_symmetric_friendship() {
    let (db, _temp_dir) = setup_db().await;
    let friending = Friending::new(db.pool().clone());

    friending.send_request("alice", "bob").await.unwrap();
    friending.accept_request("alice", "bob").await.unwrap();

    assert_eq!(friending.get_friends("alice").await.unwrap(), vec!["bob"]);
    assert_eq!(friending.get_friends("bob").await.unwrap(), vec!["alice"]);

    // Request is consumed by acceptance.
    let err = friending.remove_request("alice", "bob").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_friend_request_rejected_while_already_pending() {
    let (db, _temp_dir) = setup_db().await;
    let friending = Friending::new(db.pool().clone());

    friending.send_request("alice", "bob").await.unwrap();

    // Duplicate in either direction is refused.
    assert!(matches!(
        friending.send_request("alice", "bob").await.unwrap_err(),
        ApiError::NotAllowed(_)
    ));
    assert!(matches!(
        friending.send_request("bob", "alice").await.unwrap_err(),
        ApiError::NotAllowed(_)
    ));
}

#[tokio::test]
async fn test_friend_request_to_self_not_allowed() {
    let (db, _temp_dir) = setup_db().await;
    let friending = Friending::new(db.pool().clone());

    let err = friending.send_request("alice", "alice").await.unwrap_err();
    assert!(matches!(err, ApiError::NotAllowed(_)));
}

#[tokio::test]
async fn test_remove_friend() {
    let (db, _temp_dir) = setup_db().await;
    let friending = Friending::new(db.pool().clone());

    friending.send_request("alice", "bob").await.unwrap();
    friending.accept_request("alice", "bob").await.unwrap();

    friending.remove_friend("bob", "alice").await.unwrap();
    assert!(friending.get_friends("alice").await.unwrap().is_empty());

    let err = friending.remove_friend("bob", "alice").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_reject_request_allows_resend() {
    let (db, _temp_dir) = setup_db().await;
    let friending = Friending::new(db.pool().clone());

    friending.send_request("alice", "bob").await.unwrap();
    friending.reject_request("alice", "bob").await.unwrap();

    assert!(friending.get_friends("alice").await.unwrap().is_empty());

    // Rejection clears the pending request, so a new one can be sent.
    friending.send_request("alice", "bob").await.unwrap();
}

// ========== Blurring filters ==========

#[tokio::test]
async fn test_add_filter_is_idempotent() {
    let (db, _temp_dir) = setup_db().await;
    let blurring = Blurring::new(db.pool().clone());

    blurring.add_filter("alice", "bob").await.unwrap();
    blurring.add_filter("alice", "bob").await.unwrap();

    assert_eq!(blurring.get_filters("alice").await.unwrap(), vec!["bob"]);
    assert!(blurring.in_filter("alice", "bob").await.unwrap());
    // Directed relation: bob does not filter alice.
    assert!(!blurring.in_filter("bob", "alice").await.unwrap());

    blurring.remove_filter("alice", "bob").await.unwrap();
    assert!(!blurring.in_filter("alice", "bob").await.unwrap());
}

// ========== Sessioning ==========

#[tokio::test]
async fn test_session_lifecycle() {
    let (db, _temp_dir) = setup_db().await;
    let sessioning = Sessioning::new(db.pool().clone());

    // Unauthenticated is a valid state, but get_user refuses it.
    assert!(matches!(
        sessioning.get_user(None).await.unwrap_err(),
        ApiError::NotAllowed(_)
    ));
    sessioning.is_logged_out(None).await.unwrap();

    let token = sessioning.start(None, "user-1").await.unwrap();
    assert_eq!(sessioning.get_user(Some(&token)).await.unwrap(), "user-1");

    // Double login on the same session is refused.
    assert!(matches!(
        sessioning.start(Some(&token), "user-2").await.unwrap_err(),
        ApiError::NotAllowed(_)
    ));

    sessioning.end(Some(&token)).await.unwrap();
    assert!(sessioning.get_user(Some(&token)).await.is_err());

    // Ending an already-ended session is refused.
    assert!(matches!(
        sessioning.end(Some(&token)).await.unwrap_err(),
        ApiError::NotAllowed(_)
    ));
}

#[tokio::test]
async fn test_end_user_sessions_clears_all_tokens() {
    let (db, _temp_dir) = setup_db().await;
    let sessioning = Sessioning::new(db.pool().clone());

    let token1 = sessioning.start(None, "user-1").await.unwrap();
    let token2 = sessioning.start(None, "user-1").await.unwrap();

    sessioning.end_user_sessions("user-1").await.unwrap();
    assert!(sessioning.get_user(Some(&token1)).await.is_err());
    assert!(sessioning.get_user(Some(&token2)).await.is_err());
}
