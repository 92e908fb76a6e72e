mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{Form, TestApp};

#[tokio::test]
async fn organizer_is_implicitly_attending() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;
    let event = app.create_event(&alice, group).await;
    let attend = format!("/api/events/{}/attend-event", event);

    let organizer = app.post_json(&attend, Some(&alice.cookie), json!({})).await;
    assert_eq!(organizer.status, StatusCode::FORBIDDEN);
    assert_eq!(organizer.body["errors"]["code"], "OrganizerAttending");

    let attending = app.post_json(&attend, Some(&bob.cookie), json!({})).await;
    assert_eq!(attending.status, StatusCode::OK);
    assert_eq!(attending.body["numAttendees"], 1);

    let again = app.post_json(&attend, Some(&bob.cookie), json!({})).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.message(), "Already attending this event");

    assert_eq!(
        app.count("SELECT COUNT(*) FROM attendances WHERE user_id = ?", alice.id).await,
        0
    );

    let detail = app.get(&format!("/api/events/{}", event), None).await;
    assert_eq!(detail.body["numAttendees"], 1);
    assert_eq!(detail.body["group"]["organizerId"].as_i64(), Some(alice.id));
    assert_eq!(detail.body["attendees"][0]["id"].as_i64(), Some(bob.id));
}

#[tokio::test]
async fn leaving_an_event() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let carol = app.signup("carol", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;
    let event = app.create_event(&alice, group).await;
    for user in [&bob, &carol] {
        app.post_json(&format!("/api/events/{}/attend-event", event), Some(&user.cookie), json!({}))
            .await;
    }
    let leave = |attendee: i64| format!("/api/events/{}/leave-event/{}", event, attendee);

    let organizer = app.delete(&leave(alice.id), Some(&bob.cookie)).await;
    assert_eq!(organizer.body["errors"]["code"], "OrganizerCannotBeRemoved");

    let peer = app.delete(&leave(carol.id), Some(&bob.cookie)).await;
    assert_eq!(peer.status, StatusCode::FORBIDDEN);

    let own = app.delete(&leave(bob.id), Some(&bob.cookie)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["numAttendees"], 1);

    let removed = app.delete(&leave(carol.id), Some(&alice.cookie)).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["numAttendees"], 0);
}

#[tokio::test]
async fn events_are_created_by_the_organizer_only() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;

    let form = TestApp::event_form("Evening check-in", "2030-01-01T18:00:00Z", "2030-01-01T20:00:00Z");
    let response = app
        .post_form(&format!("/api/groups/{}/events/new", group), Some(&bob.cookie), form)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn event_validation() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;
    let path = format!("/api/groups/{}/events/new", group);

    let backwards = TestApp::event_form("Evening check-in", "2030-01-01T20:00:00Z", "2030-01-01T18:00:00Z");
    let response = app.post_form(&path, Some(&alice.cookie), backwards).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "End date must be after start date");

    let crowd = Form::new()
        .text("name", "Evening check-in")
        .text("description", common::EVENT_DESCRIPTION)
        .text("type", "online")
        .text("capacity", "1")
        .text("start_date", "2030-01-01T18:00:00Z")
        .text("end_date", "2030-01-01T20:00:00Z")
        .image("image");
    let response = app.post_form(&path, Some(&alice.cookie), crowd).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let outdoor = Form::new()
        .text("name", "Evening check-in")
        .text("description", common::EVENT_DESCRIPTION)
        .text("type", "outdoor")
        .text("capacity", "10")
        .text("start_date", "2030-01-01T18:00:00Z")
        .text("end_date", "2030-01-01T20:00:00Z")
        .image("image");
    let response = app.post_form(&path, Some(&alice.cookie), outdoor).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.count("SELECT COUNT(*) FROM events WHERE group_id = ?", group).await, 0);
}

#[tokio::test]
async fn venue_must_belong_to_the_events_group() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let home = app.create_group(&alice, "Denver Dads").await;
    let other = app.create_group(&alice, "Grief Circle").await;
    let venue = app
        .post_json(
            &format!("/api/groups/{}/venues", other),
            Some(&alice.cookie),
            json!({ "address": "100 Main St", "city": "Denver", "state": "CO", "zip_code": "80202" }),
        )
        .await;
    let venue_id = venue.body["id"].as_i64().unwrap();

    let form = TestApp::event_form("Evening check-in", "2030-01-01T18:00:00Z", "2030-01-01T20:00:00Z")
        .text("venue_id", &venue_id.to_string());
    let response = app
        .post_form(&format!("/api/groups/{}/events/new", home), Some(&alice.cookie), form)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_an_event_releases_everything() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let bob = app.signup("bobby", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;
    let event = app.create_event(&alice, group).await;
    app.post_json(&format!("/api/events/{}/attend-event", event), Some(&bob.cookie), json!({}))
        .await;

    let image = app
        .post_form(
            &format!("/api/events/{}/images", event),
            Some(&alice.cookie),
            Form::new().image("image"),
        )
        .await;
    assert_eq!(image.status, StatusCode::CREATED);
    let url = image.body["eventImage"].as_str().unwrap().to_string();
    assert!(app.stored(&url));

    let denied = app.delete(&format!("/api/events/{}/delete", event), Some(&bob.cookie)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let deleted = app.delete(&format!("/api/events/{}/delete", event), Some(&alice.cookie)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(app.count("SELECT COUNT(*) FROM attendances WHERE event_id = ?", event).await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM event_images WHERE event_id = ?", event).await, 0);
    assert!(!app.stored(&url));
}

#[tokio::test]
async fn event_images_can_be_replaced_and_removed() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;
    let event = app.create_event(&alice, group).await;

    let added = app
        .post_form(
            &format!("/api/events/{}/images", event),
            Some(&alice.cookie),
            Form::new().image("image"),
        )
        .await;
    let image_id = added.body["id"].as_i64().unwrap();
    let original = added.body["eventImage"].as_str().unwrap().to_string();

    let replaced = app
        .post_form(
            &format!("/api/event-images/{}/edit", image_id),
            Some(&alice.cookie),
            Form::new().image("image"),
        )
        .await;
    assert_eq!(replaced.status, StatusCode::OK);
    let current = replaced.body["eventImage"].as_str().unwrap().to_string();
    assert_ne!(current, original);
    assert!(!app.stored(&original));
    assert!(app.stored(&current));

    let deleted = app
        .delete(&format!("/api/event-images/{}/delete", image_id), Some(&alice.cookie))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    let gone = app.get(&format!("/api/event-images/{}", image_id), None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert!(!app.stored(&current));
}

#[tokio::test]
async fn deleting_a_group_removes_its_events() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;
    let event = app.create_event(&alice, group).await;

    let deleted = app.delete(&format!("/api/groups/{}/delete", group), Some(&alice.cookie)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    let gone = app.get(&format!("/api/events/{}", event), None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_listing() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice", &[]).await;
    let group = app.create_group(&alice, "Denver Dads").await;
    app.create_event(&alice, group).await;

    let all = app.get("/api/events", None).await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["events"].as_array().unwrap().len(), 1);
    assert_eq!(all.body["events"][0]["group"]["id"].as_i64(), Some(group));

    let in_person = app.get("/api/events?type=in-person", None).await;
    assert!(in_person.body["events"].as_array().unwrap().is_empty());
}
