// Shared harness for the HTTP integration tests.
// Each test gets its own in-memory database and upload directory.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use std::sync::Arc;

use mencrytoo::{
    app_state::AppState,
    build_router,
    config::Config,
    infrastructure::{Database, LocalImageStore, Mailer},
};

pub const BIO: &str = "Here to listen, share and get through the hard weeks together.";
pub const EVENT_DESCRIPTION: &str =
    "A relaxed evening check-in for anyone who wants to talk things through with peers.";

/// Smallest byte sequence that passes as a PNG upload.
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n0000";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    uploads: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` pair from the session `Set-Cookie` header, ready for a `Cookie` header.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .find(|pair| pair.starts_with("session="))
            .map(str::to_string)
    }

    pub fn message(&self) -> &str {
        self.body["errors"]["message"]
            .as_str()
            .or_else(|| self.body["message"].as_str())
            .unwrap_or_default()
    }
}

/// A signed-up user and the cookie that authenticates as them.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub cookie: String,
}

/// Hand-assembled `multipart/form-data` body.
pub struct Form {
    boundary: String,
    body: Vec<u8>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    pub fn new() -> Self {
        Self {
            boundary: format!("----mencrytoo-{}", uuid::Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn image(mut self, name: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"photo.png\"\r\nContent-Type: image/png\r\n\r\n",
                self.boundary, name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(PNG_BYTES);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let uploads = TempDir::new().unwrap();
        let config = Config::for_tests(uploads.path().to_str().unwrap());
        let state = AppState::new(config).await.unwrap();
        Self {
            router: build_router(state.clone()),
            state,
            uploads,
        }
    }

    /// Same wiring as `spawn`, with a caller-supplied mailer.
    pub async fn spawn_with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        let uploads = TempDir::new().unwrap();
        let config = Config::for_tests(uploads.path().to_str().unwrap());
        let db = Database::connect(&config).await.unwrap();
        db.initialize().await.unwrap();
        let images = LocalImageStore::new(uploads.path(), &config.storage.public_url)
            .await
            .unwrap();
        let state = AppState::from_parts(db, Arc::new(images), mailer, config);
        Self {
            router: build_router(state.clone()),
            state,
            uploads,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn builder(method: Method, path: &str, cookie: Option<&str>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let request = Self::builder(Method::GET, path, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let request = Self::builder(Method::DELETE, path, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn json(&self, method: Method, path: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        let request = Self::builder(method, path, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.json(Method::POST, path, cookie, body).await
    }

    pub async fn post_form(&self, path: &str, cookie: Option<&str>, form: Form) -> TestResponse {
        let (content_type, body) = form.finish();
        let request = Self::builder(Method::POST, path, cookie)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn signup(&self, username: &str, tags: &[&str]) -> TestUser {
        let mut form = Form::new()
            .text("first_name", "Test")
            .text("last_name", "User")
            .text("username", username)
            .text("email", &format!("{}@example.com", username))
            .text("password", "pw")
            .text("bio", BIO);
        for tag in tags {
            form = form.text("tags", tag);
        }
        let response = self
            .post_form("/api/auth/signup", None, form.image("profile_image"))
            .await;
        assert_eq!(response.status, StatusCode::OK, "signup failed: {}", response.body);

        TestUser {
            id: response.body["user"]["id"].as_i64().unwrap(),
            username: username.to_string(),
            cookie: response.session_cookie().unwrap(),
        }
    }

    pub async fn create_post(&self, author: &TestUser, title: &str) -> i64 {
        let form = Form::new()
            .text("title", title)
            .text("caption", "Some words about how the week went.")
            .image("image");
        let response = self
            .post_form(
                &format!("/api/users/{}/posts/create", author.id),
                Some(&author.cookie),
                form,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "post failed: {}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    pub async fn comment(&self, user: &TestUser, post_id: i64, text: &str, parent_id: Option<i64>) -> TestResponse {
        self.post_json(
            &format!("/api/comments/posts/{}/comments", post_id),
            Some(&user.cookie),
            json!({ "comment": text, "parent_id": parent_id }),
        )
        .await
    }

    pub async fn create_group(&self, organizer: &TestUser, name: &str) -> i64 {
        let form = Form::new()
            .text("name", name)
            .text("about", "A weekly circle for talking openly and listening.")
            .text("type", "online")
            .text("city", "Denver")
            .text("state", "CO")
            .image("image");
        let response = self
            .post_form("/api/groups/new", Some(&organizer.cookie), form)
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "group failed: {}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    pub fn event_form(name: &str, start: &str, end: &str) -> Form {
        Form::new()
            .text("name", name)
            .text("description", EVENT_DESCRIPTION)
            .text("type", "online")
            .text("capacity", "10")
            .text("start_date", start)
            .text("end_date", end)
            .image("image")
    }

    pub async fn create_event(&self, organizer: &TestUser, group_id: i64) -> i64 {
        let form = Self::event_form("Evening check-in", "2030-01-01T18:00:00Z", "2030-01-01T20:00:00Z");
        let response = self
            .post_form(
                &format!("/api/groups/{}/events/new", group_id),
                Some(&organizer.cookie),
                form,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "event failed: {}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    /// Whether an image URL handed out by the API still has a stored object behind it.
    pub fn stored(&self, url: &str) -> bool {
        let name = url.trim_start_matches("/uploads/");
        self.uploads.path().join(name).exists()
    }

    /// Direct row count, bypassing the API.
    pub async fn count(&self, sql: &str, id: i64) -> i64 {
        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(id)
            .fetch_one(self.state.db.pool())
            .await
            .unwrap();
        count
    }
}
