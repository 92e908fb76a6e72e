mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mencrytoo::infrastructure::{MailMessage, Mailer};
use mencrytoo::AppResult;

use common::TestApp;

const TEAM: &str = "team@example.org";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Delivery runs on a spawned task; give it a moment to land.
    async fn wait_for(&self, count: usize) -> Vec<MailMessage> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> AppResult<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn notification_address(&self) -> Option<&str> {
        Some(TEAM)
    }
}

fn partnership(email: &str) -> Value {
    json!({
        "firstName": "Dana",
        "lastName": "Reyes",
        "email": email,
        "organization": "Mile High Counseling",
        "subject": "Referral partnership",
        "message": "We would like to refer clients to your groups."
    })
}

#[tokio::test]
async fn partnership_is_stored_and_team_notified() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::spawn_with_mailer(mailer.clone()).await;

    let created = app
        .post_json("/api/partnerships", None, partnership("dana@clinic.org"))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "pending");
    assert_eq!(created.body["organization"], "Mile High Counseling");

    let sent = mailer.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, TEAM);
    assert_eq!(sent[0].reply_to.as_deref(), Some("dana@clinic.org"));
}

#[tokio::test]
async fn partnership_email_is_unique_and_organization_required() {
    let app = TestApp::spawn().await;
    app.post_json("/api/partnerships", None, partnership("dana@clinic.org"))
        .await;

    let duplicate = app
        .post_json("/api/partnerships", None, partnership("dana@clinic.org"))
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);

    let mut anonymous_org = partnership("other@clinic.org");
    anonymous_org.as_object_mut().unwrap().remove("organization");
    let missing = app.post_json("/api/partnerships", None, anonymous_org).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.message(), "Organization is required");
}

#[tokio::test]
async fn contact_messages_are_separate_from_partnerships() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;

    let contact = json!({
        "first_name": "Sam",
        "last_name": "Lee",
        "email": "sam@example.com",
        "subject": "Thank you",
        "message": "The Tuesday group has helped a lot."
    });
    let created = app.post_json("/api/contact", None, contact.clone()).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let again = app.post_json("/api/contact", None, contact).await;
    assert_eq!(again.status, StatusCode::CREATED);

    let contacts = app.get("/api/contact", Some(&alice.cookie)).await;
    assert_eq!(contacts.body["inquiries"].as_array().unwrap().len(), 2);
    let partnerships = app.get("/api/partnerships", Some(&alice.cookie)).await;
    assert!(partnerships.body["inquiries"].as_array().unwrap().is_empty());

    let id = created.body["id"].as_i64().unwrap();
    let wrong_family = app.get(&format!("/api/partnerships/{}", id), Some(&alice.cookie)).await;
    assert_eq!(wrong_family.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn administration_requires_a_session() {
    let app = TestApp::spawn().await;
    let listing = app.get("/api/partnerships", None).await;
    assert_eq!(listing.status, StatusCode::UNAUTHORIZED);
    let stats = app.get("/api/contact/stats", None).await;
    assert_eq!(stats.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn responding_marks_the_inquiry_and_mails_the_sender() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::spawn_with_mailer(mailer.clone()).await;
    let alice = app.signup("alice", &[]).await;

    let created = app
        .post_json("/api/partnerships", None, partnership("dana@clinic.org"))
        .await;
    let id = created.body["id"].as_i64().unwrap();

    let empty = app
        .post_json(
            &format!("/api/partnerships/{}/respond", id),
            Some(&alice.cookie),
            json!({ "response": "" }),
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let responded = app
        .post_json(
            &format!("/api/partnerships/{}/respond", id),
            Some(&alice.cookie),
            json!({ "response": "Happy to talk, we will call you this week." }),
        )
        .await;
    assert_eq!(responded.status, StatusCode::OK);
    assert_eq!(responded.body["status"], "responded");
    assert!(responded.body["respondedAt"].is_string());

    let sent = mailer.wait_for(2).await;
    let reply = sent.iter().find(|m| m.to == "dana@clinic.org").unwrap();
    assert_eq!(reply.subject, "Re: Referral partnership");

    let pending = app.get("/api/partnerships?status=pending", Some(&alice.cookie)).await;
    assert!(pending.body["inquiries"].as_array().unwrap().is_empty());
    let stats = app.get("/api/partnerships/stats", Some(&alice.cookie)).await;
    assert_eq!(stats.body["total"], 1);
    assert_eq!(stats.body["responded"], 1);
    assert_eq!(stats.body["pending"], 0);

    let unknown = app.get("/api/partnerships?status=archived", Some(&alice.cookie)).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_and_single_delete() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let mut ids = Vec::new();
    for n in 0..3 {
        let created = app
            .post_json("/api/partnerships", None, partnership(&format!("p{}@clinic.org", n)))
            .await;
        ids.push(created.body["id"].as_i64().unwrap());
    }

    let single = app
        .delete(&format!("/api/partnerships/{}", ids[0]), Some(&alice.cookie))
        .await;
    assert_eq!(single.status, StatusCode::OK);
    let again = app
        .delete(&format!("/api/partnerships/{}", ids[0]), Some(&alice.cookie))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let bulk = app
        .post_json(
            "/api/partnerships/bulk-delete",
            Some(&alice.cookie),
            json!({ "ids": [ids[0], ids[1], ids[2]] }),
        )
        .await;
    assert_eq!(bulk.status, StatusCode::OK);
    assert_eq!(bulk.body["deleted"], 2);
    assert_eq!(bulk.body["requested"], 3);

    let none = app
        .post_json("/api/partnerships/bulk-delete", Some(&alice.cookie), json!({ "ids": [] }))
        .await;
    assert_eq!(none.status, StatusCode::BAD_REQUEST);
}
