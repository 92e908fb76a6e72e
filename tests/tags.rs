mod common;

use axum::http::StatusCode;

use common::TestApp;

#[tokio::test]
async fn vocabulary_is_seeded() {
    let app = TestApp::spawn().await;
    let tags = app.get("/api/tags", None).await;
    assert_eq!(tags.status, StatusCode::OK);
    let names: Vec<&str> = tags
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 10);
    assert!(names.contains(&"ANXIETY"));
    assert!(names.contains(&"GRIEF"));
}

#[tokio::test]
async fn popular_tags_rank_by_usage() {
    let app = TestApp::spawn().await;
    app.signup("alice", &["GRIEF", "STRESS"]).await;
    app.signup("bobby", &["GRIEF"]).await;

    let popular = app.get("/api/tags/popular?limit=2", None).await;
    let ranked = popular.body.as_array().unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0]["name"], "GRIEF");
    assert_eq!(ranked[0]["userCount"], 2);
    assert_eq!(ranked[1]["name"], "STRESS");

    let id = ranked[0]["id"].as_i64().unwrap();
    let single = app.get(&format!("/api/tags/{}", id), None).await;
    assert_eq!(single.body["userCount"], 2);

    let missing = app.get("/api/tags/9999", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_matches_case_insensitively() {
    let app = TestApp::spawn().await;
    let found = app.get("/api/tags/search?q=anx", None).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body[0]["name"], "ANXIETY");

    let blank = app.get("/api/tags/search?q=", None).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tags_of_a_user() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &["STRESS", "ANXIETY"]).await;

    let tags = app.get(&format!("/api/tags/user/{}", alice.id), None).await;
    let names: Vec<&str> = tags
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ANXIETY", "STRESS"]);

    let nobody = app.get("/api/tags/user/9999", None).await;
    assert_eq!(nobody.status, StatusCode::NOT_FOUND);
}
