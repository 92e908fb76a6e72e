mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{Form, TestApp};

#[tokio::test]
async fn liking_twice_is_rejected_without_state_change() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;
    let like = format!("/api/posts/{}/like", post);

    let first = app.post_json(&like, Some(&bob.cookie), json!({})).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["likes"], 1);
    assert_eq!(first.body["isLiked"], true);

    let second = app.post_json(&like, Some(&bob.cookie), json!({})).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.message(), "Post already liked");

    let detail = app.get(&format!("/api/posts/{}", post), Some(&bob.cookie)).await;
    assert_eq!(detail.body["likes"], 1);
    assert_eq!(detail.body["isLiked"], true);
}

#[tokio::test]
async fn unliking_twice_is_rejected_without_state_change() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;
    let unlike = format!("/api/posts/{}/unlike", post);

    app.post_json(&format!("/api/posts/{}/like", post), Some(&alice.cookie), json!({}))
        .await;

    let first = app.delete(&unlike, Some(&alice.cookie)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["likes"], 0);
    assert_eq!(first.body["isLiked"], false);

    let second = app.delete(&unlike, Some(&alice.cookie)).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.count("SELECT COUNT(*) FROM likes WHERE post_id = ?", post).await, 0);
}

#[tokio::test]
async fn deleting_a_post_cascades() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let carol = app.signup("carol", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;

    let root = app.comment(&bob, post, "first", None).await.body["id"].as_i64().unwrap();
    app.comment(&carol, post, "second", None).await;
    app.comment(&alice, post, "a reply", Some(root)).await;
    for user in [&alice, &bob, &carol] {
        let liked = app
            .post_json(&format!("/api/posts/{}/like", post), Some(&user.cookie), json!({}))
            .await;
        assert_eq!(liked.status, StatusCode::OK);
    }
    app.post_json(&format!("/api/comments/{}/like", root), Some(&carol.cookie), json!({}))
        .await;

    let denied = app.delete(&format!("/api/posts/{}/delete", post), Some(&bob.cookie)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let deleted = app.delete(&format!("/api/posts/{}/delete", post), Some(&alice.cookie)).await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = app.get(&format!("/api/posts/{}", post), None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(app.count("SELECT COUNT(*) FROM comments WHERE post_id = ?", post).await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM likes WHERE post_id = ?", post).await, 0);
    assert_eq!(
        app.count("SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?", root).await,
        0
    );
}

#[tokio::test]
async fn only_the_creator_edits_a_post() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;
    let path = format!("/api/users/{}/posts/{}", alice.id, post);

    let form = Form::new().text("title", "Stolen title").text("caption", "Not mine to edit.");
    let denied = app.post_form(&path, Some(&bob.cookie), form).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let form = Form::new()
        .text("title", "Better week")
        .text("caption", "Things are looking up.")
        .image("image");
    let edited = app.post_form(&path, Some(&alice.cookie), form).await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["title"], "Better week");
    assert_eq!(edited.body["user"]["username"], "alice");
}

#[tokio::test]
async fn posts_are_created_for_yourself_only() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;

    let form = Form::new()
        .text("title", "Not my post")
        .text("caption", "Posting as someone else.")
        .image("image");
    let denied = app
        .post_form(&format!("/api/users/{}/posts/create", alice.id), Some(&bob.cookie), form)
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn post_validation_and_image_format() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let path = format!("/api/users/{}/posts/create", alice.id);

    let short = Form::new().text("title", "Hi").text("caption", "Too short a title.").image("image");
    let response = app.post_form(&path, Some(&alice.cookie), short).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let missing_image = Form::new().text("title", "Valid title").text("caption", "No picture here.");
    let response = app.post_form(&path, Some(&alice.cookie), missing_image).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.count("SELECT COUNT(*) FROM posts WHERE creator = ?", alice.id).await, 0);
}

#[tokio::test]
async fn profile_feed_lists_a_users_posts() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let first = app.create_post(&alice, "First post").await;
    let second = app.create_post(&alice, "Second post").await;
    app.create_post(&bob, "Bobs post").await;

    let feed = app.get(&format!("/api/users/{}/posts", alice.id), None).await;
    assert_eq!(feed.status, StatusCode::OK);
    let ids: Vec<i64> = feed.body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);
    assert_eq!(feed.body["pagination"]["total"], 2);
}
