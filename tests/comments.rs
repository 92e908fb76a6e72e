mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn threaded_comment_and_like_toggle() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;

    let root = app.comment(&bob, post, "root", None).await;
    assert_eq!(root.status, StatusCode::CREATED);
    let root_id = root.body["id"].as_i64().unwrap();
    assert!(root.body["parentId"].is_null());

    let reply = app.comment(&bob, post, "reply", Some(root_id)).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["parentId"].as_i64(), Some(root_id));

    let liked = app
        .post_json(&format!("/api/comments/{}/like", root_id), Some(&bob.cookie), json!({}))
        .await;
    assert_eq!(liked.status, StatusCode::OK);
    assert_eq!(liked.body["isLiked"], true);
    assert_eq!(liked.body["likeCount"], 1);

    let unliked = app
        .post_json(&format!("/api/comments/{}/like", root_id), Some(&bob.cookie), json!({}))
        .await;
    assert_eq!(unliked.body["isLiked"], false);
    assert_eq!(unliked.body["likeCount"], 0);
}

#[tokio::test]
async fn post_detail_nests_replies() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;

    let root = app.comment(&alice, post, "root", None).await;
    let root_id = root.body["id"].as_i64().unwrap();
    app.comment(&alice, post, "reply", Some(root_id)).await;

    let detail = app.get(&format!("/api/posts/{}", post), None).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.body["comments"], 2);
    let tree = detail.body["postComments"].as_array().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["replies"][0]["comment"], "reply");

    let replies = app.get(&format!("/api/comments/{}/replies", root_id), None).await;
    assert_eq!(replies.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reply_must_share_the_parents_post() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let first = app.create_post(&alice, "First post").await;
    let second = app.create_post(&alice, "Second post").await;

    let root = app.comment(&alice, first, "on the first post", None).await;
    let root_id = root.body["id"].as_i64().unwrap();

    let crossed = app.comment(&alice, second, "wrong post", Some(root_id)).await;
    assert_eq!(crossed.status, StatusCode::BAD_REQUEST);
    assert_eq!(crossed.body["errors"]["code"], "ParentMismatch");

    let dangling = app.comment(&alice, first, "no parent", Some(9999)).await;
    assert_eq!(dangling.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.count("SELECT COUNT(*) FROM comments WHERE post_id = ?", second).await, 0);
}

#[tokio::test]
async fn deleting_a_comment_removes_its_subtree() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;

    let root = app.comment(&alice, post, "root", None).await;
    let root_id = root.body["id"].as_i64().unwrap();
    let child = app.comment(&bob, post, "child", Some(root_id)).await;
    let child_id = child.body["id"].as_i64().unwrap();
    let grandchild = app.comment(&alice, post, "grandchild", Some(child_id)).await;
    let grandchild_id = grandchild.body["id"].as_i64().unwrap();
    app.comment(&bob, post, "sibling root", None).await;
    app.post_json(&format!("/api/comments/{}/like", grandchild_id), Some(&bob.cookie), json!({}))
        .await;

    let denied = app
        .delete(&format!("/api/comments/posts/{}/comments/{}", post, root_id), Some(&bob.cookie))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let deleted = app
        .delete(&format!("/api/comments/posts/{}/comments/{}", post, root_id), Some(&alice.cookie))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["deleted"], 3);

    for id in [root_id, child_id, grandchild_id] {
        let gone = app.get(&format!("/api/comments/{}", id), None).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
    }
    assert_eq!(app.count("SELECT COUNT(*) FROM comments WHERE post_id = ?", post).await, 1);
    assert_eq!(
        app.count("SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?", grandchild_id)
            .await,
        0
    );
}

#[tokio::test]
async fn edit_is_author_only_and_bounded() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;
    let comment = app.comment(&alice, post, "first draft", None).await;
    let id = comment.body["id"].as_i64().unwrap();
    let path = format!("/api/comments/{}/edit", id);

    let denied = app
        .json(Method::PUT, &path, Some(&bob.cookie), json!({ "comment": "hijack" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let too_long = app
        .json(Method::PUT, &path, Some(&alice.cookie), json!({ "comment": "x".repeat(501) }))
        .await;
    assert_eq!(too_long.status, StatusCode::BAD_REQUEST);

    let edited = app
        .json(Method::PUT, &path, Some(&alice.cookie), json!({ "comment": "second draft" }))
        .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["comment"], "second draft");
}

#[tokio::test]
async fn like_status_and_likers() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;
    let first = app.comment(&alice, post, "one", None).await.body["id"].as_i64().unwrap();
    let second = app.comment(&alice, post, "two", None).await.body["id"].as_i64().unwrap();

    app.post_json(&format!("/api/comments/{}/like", first), Some(&bob.cookie), json!({}))
        .await;

    let status = app
        .get(&format!("/api/comments/{}/like-status", first), Some(&bob.cookie))
        .await;
    assert_eq!(status.body["isLiked"], true);
    assert_eq!(status.body["likeCount"], 1);

    let anonymous = app.get(&format!("/api/comments/{}/like-status", first), None).await;
    assert_eq!(anonymous.body["isLiked"], false);
    assert_eq!(anonymous.body["likeCount"], 1);

    let likers = app.get(&format!("/api/comments/{}/likes", first), None).await;
    let likers = likers.body["likers"].as_array().unwrap();
    assert_eq!(likers.len(), 1);
    assert_eq!(likers[0]["user"]["username"], "bobby");

    let batch = app
        .post_json(
            "/api/comments/batch-like-status",
            Some(&bob.cookie),
            json!({ "comment_ids": [first, second] }),
        )
        .await;
    assert_eq!(batch.status, StatusCode::OK);
    let statuses = &batch.body["likeStatuses"];
    assert_eq!(statuses[first.to_string()]["isLiked"], true);
    assert_eq!(statuses[second.to_string()]["isLiked"], false);
    assert_eq!(statuses[second.to_string()]["likeCount"], 0);
}

#[tokio::test]
async fn recent_comments_newest_first() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;
    app.comment(&alice, post, "older", None).await;
    app.comment(&alice, post, "newer", None).await;

    let recent = app.get("/api/comments/recent?limit=1", None).await;
    let recent = recent.body.as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["comment"], "newer");
}

#[tokio::test]
async fn commenting_requires_a_session() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;

    let response = app
        .post_json(
            &format!("/api/posts/{}/comments", post),
            None,
            json!({ "comment": "hello" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn root_comments_page_newest_first() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let post = app.create_post(&alice, "Rough week").await;

    let mut roots = Vec::new();
    for n in 0..4 {
        let root = app.comment(&bob, post, &format!("root {}", n), None).await;
        roots.push(root.body["id"].as_i64().unwrap());
    }
    for text in ["first reply", "second reply"] {
        app.comment(&alice, post, text, Some(roots[3])).await;
    }
    app.comment(&alice, post, "lone reply", Some(roots[0])).await;
    roots.reverse();

    let path = |query: &str| format!("/api/comments/posts/{}/comments?{}", post, query);
    let ids = |body: &serde_json::Value| -> Vec<i64> {
        body["comments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_i64().unwrap())
            .collect()
    };

    let first = app.get(&path("page=1&per_page=2"), None).await;
    let second = app.get(&path("page=2&per_page=2"), None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(ids(&first.body), roots[..2].to_vec());
    assert_eq!(ids(&second.body), roots[2..].to_vec());
    assert_eq!(first.body["comments"][0]["replies"].as_array().unwrap().len(), 2);

    let pagination = &first.body["pagination"];
    assert_eq!(pagination["total"], 4);
    assert_eq!(pagination["pages"], 2);
    assert_eq!(pagination["hasNext"], true);

    let flat = app
        .get(&path("page=1&per_page=10&include_replies=false"), None)
        .await;
    assert_eq!(flat.status, StatusCode::OK);
    assert_eq!(ids(&flat.body), roots);
    let comments = flat.body["comments"].as_array().unwrap();
    assert!(comments.iter().all(|c| c["replies"].as_array().unwrap().is_empty()));
    let reply_counts: Vec<i64> = comments.iter().map(|c| c["replyCount"].as_i64().unwrap()).collect();
    assert_eq!(reply_counts, vec![2, 0, 0, 1]);
    assert_eq!(flat.body["pagination"]["total"], 4);
}
