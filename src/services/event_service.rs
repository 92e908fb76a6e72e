// EventService - events within groups, attendances and event images

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use crate::entities::ent_event::{AttendeeRow, EventFields, EventFilter};
use crate::entities::{EntEvent, EntGroup, EntVenue, EventImage};
use crate::error::{AppError, AppResult};
use crate::framework::pagination::{Page, PageInfo};
use crate::framework::privacy::{authorize, Action, Target};
use crate::framework::validation::MeetingType;
use crate::infrastructure::storage::{ImageStore, ImageUpload};
use crate::services::{keep_or_release, Outcome};

pub const IMAGE_FIELDS: &[&str] = &["image", "event_image"];

#[derive(Debug, Clone, Validate)]
pub struct EventInput {
    pub venue_id: Option<i64>,
    #[validate(length(min = 5, max = 50, message = "Name must be between 5 and 50 characters"))]
    pub name: String,
    #[validate(length(min = 50, max = 150, message = "Description must be between 50 and 150 characters"))]
    pub description: String,
    pub event_type: MeetingType,
    #[validate(range(min = 2, max = 300, message = "Capacity must be between 2 and 300"))]
    pub capacity: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl EventInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        if self.end_date <= self.start_date {
            return Err(AppError::Validation("End date must be after start date".to_string()));
        }
        Ok(())
    }

    fn fields(&self, image: String) -> EventFields {
        EventFields {
            venue_id: self.venue_id,
            name: self.name.clone(),
            description: self.description.clone(),
            event_type: self.event_type.as_str().to_string(),
            capacity: self.capacity,
            image,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGroup {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub organizer_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCard {
    pub id: i64,
    pub group_id: i64,
    pub venue_id: Option<i64>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub capacity: i64,
    pub image: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub num_attendees: i64,
    pub group: EventGroup,
    pub venue: Option<EntVenue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: EventCard,
    pub attendees: Vec<AttendeeRow>,
    pub event_images: Vec<EventImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    pub events: Vec<EventCard>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceState {
    pub event_id: i64,
    pub user_id: i64,
    pub num_attendees: i64,
}

/// Attendee counts and venues for a page of events, batched over the page.
pub async fn cards(conn: &mut SqliteConnection, events: Vec<EntEvent>) -> AppResult<Vec<EventCard>> {
    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
    let mut venue_ids: Vec<i64> = events.iter().filter_map(|e| e.venue_id).collect();
    venue_ids.sort_unstable();
    venue_ids.dedup();

    let attendees = EntEvent::attendee_counts(conn, &ids).await?;
    let venues = EntVenue::gen_multi(conn, &venue_ids).await?;

    Ok(events
        .into_iter()
        .map(|event| EventCard {
            num_attendees: attendees.get(&event.id).copied().unwrap_or(0),
            venue: event.venue_id.and_then(|id| venues.get(&id).cloned()),
            group: EventGroup {
                id: event.group_id,
                name: event.group_name,
                city: event.group_city,
                state: event.group_state,
                organizer_id: event.organizer_id,
            },
            id: event.id,
            group_id: event.group_id,
            venue_id: event.venue_id,
            name: event.name,
            description: event.description,
            event_type: event.event_type,
            capacity: event.capacity,
            image: event.image,
            start_date: event.start_date,
            end_date: event.end_date,
            created_at: event.created_at,
            updated_at: event.updated_at,
        })
        .collect())
}

async fn card(conn: &mut SqliteConnection, id: i64) -> AppResult<EventCard> {
    let event = EntEvent::gen_enforce(conn, id).await?;
    cards(conn, vec![event])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Event"))
}

pub async fn list(conn: &mut SqliteConnection, filter: &EventFilter, page: Page) -> AppResult<EventList> {
    let total = EntEvent::count(conn, filter).await?;
    let events = EntEvent::gen_page(conn, filter, page.limit(), page.offset()).await?;
    Ok(EventList {
        events: cards(conn, events).await?,
        pagination: page.info(total),
    })
}

pub async fn fetch(conn: &mut SqliteConnection, id: i64) -> AppResult<EventDetail> {
    let event = card(conn, id).await?;
    let attendees = EntEvent::attendees(conn, id).await?;
    let event_images = EntEvent::images(conn, id).await?;
    Ok(EventDetail {
        event,
        attendees,
        event_images,
    })
}

/// A venue chosen for an event has to belong to the event's group.
async fn check_venue(conn: &mut SqliteConnection, group_id: i64, venue_id: Option<i64>) -> AppResult<()> {
    if let Some(venue_id) = venue_id {
        let venue = EntVenue::gen_enforce(conn, venue_id).await?;
        if venue.group_id != group_id {
            return Err(AppError::Validation(
                "Venue does not belong to this group".to_string(),
            ));
        }
    }
    Ok(())
}

async fn insert(conn: &mut SqliteConnection, group_id: i64, input: &EventInput, image: &str) -> AppResult<EventCard> {
    let id = EntEvent::create(conn, group_id, &input.fields(image.to_string())).await?;
    card(conn, id).await
}

async fn rewrite(conn: &mut SqliteConnection, id: i64, input: &EventInput, image: &str) -> AppResult<EventCard> {
    EntEvent::update(conn, id, &input.fields(image.to_string())).await?;
    card(conn, id).await
}

#[instrument(skip(conn, images, input, image))]
pub async fn create(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    group_id: i64,
    input: EventInput,
    image: ImageUpload,
) -> AppResult<EventCard> {
    let group = EntGroup::gen_enforce(conn, group_id).await?;
    authorize(actor, Action::Manage, Target::Group { organizer: group.organizer_id })?;
    input.check()?;
    check_venue(conn, group_id, input.venue_id).await?;

    let url = images.upload(&image).await?;
    let created = insert(conn, group_id, &input, &url).await;
    let event = keep_or_release(images, Some(&url), created).await?;

    info!(event_id = event.id, group_id, "Event created");
    Ok(event)
}

#[instrument(skip(conn, images, input, image))]
pub async fn update(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    id: i64,
    input: EventInput,
    image: Option<ImageUpload>,
) -> AppResult<Outcome<EventCard>> {
    let existing = EntEvent::gen_enforce(conn, id).await?;
    authorize(actor, Action::Edit, Target::Event { organizer: existing.organizer_id })?;
    input.check()?;
    check_venue(conn, existing.group_id, input.venue_id).await?;

    let uploaded = match &image {
        Some(image) => Some(images.upload(image).await?),
        None => None,
    };
    let url = uploaded.clone().unwrap_or_else(|| existing.image.clone());
    let updated = rewrite(conn, id, &input, &url).await;
    let event = keep_or_release(images, uploaded.as_deref(), updated).await?;

    let release = if uploaded.is_some() { vec![existing.image] } else { Vec::new() };
    Ok(Outcome::releasing(event, release))
}

#[instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, actor: i64, id: i64) -> AppResult<Outcome<()>> {
    let event = EntEvent::gen_enforce(conn, id).await?;
    authorize(actor, Action::Delete, Target::Event { organizer: event.organizer_id })?;

    let release = EntEvent::owned_image_urls(conn, id).await?;
    EntEvent::delete(conn, id).await?;
    info!(event_id = id, "Event deleted");
    Ok(Outcome::releasing((), release))
}

async fn attendance_state(conn: &mut SqliteConnection, event_id: i64, user_id: i64) -> AppResult<AttendanceState> {
    let num_attendees = EntEvent::attendee_counts(conn, &[event_id])
        .await?
        .get(&event_id)
        .copied()
        .unwrap_or(0);
    Ok(AttendanceState {
        event_id,
        user_id,
        num_attendees,
    })
}

/// Capacity is stored but not checked here.
pub async fn attend(conn: &mut SqliteConnection, actor: i64, event_id: i64) -> AppResult<AttendanceState> {
    let event = EntEvent::gen_enforce(conn, event_id).await?;
    authorize(actor, Action::Attend, Target::Event { organizer: event.organizer_id })?;

    if !EntEvent::add_attendee(conn, event_id, actor).await? {
        return Err(AppError::Conflict("Already attending this event".to_string()));
    }
    info!(event_id, user_id = actor, "Attending event");
    attendance_state(conn, event_id, actor).await
}

pub async fn leave(
    conn: &mut SqliteConnection,
    actor: i64,
    event_id: i64,
    attendee_id: i64,
) -> AppResult<AttendanceState> {
    let event = EntEvent::gen_enforce(conn, event_id).await?;
    authorize(
        actor,
        Action::Leave { member_id: attendee_id },
        Target::Event { organizer: event.organizer_id },
    )?;

    if !EntEvent::remove_attendee(conn, event_id, attendee_id).await? {
        return Err(AppError::not_found("Attendance"));
    }
    info!(event_id, attendee_id, removed_by = actor, "Left event");
    attendance_state(conn, event_id, attendee_id).await
}

async fn image_target(conn: &mut SqliteConnection, event_id: i64) -> AppResult<Target> {
    let event = EntEvent::gen_enforce(conn, event_id).await?;
    Ok(Target::Event { organizer: event.organizer_id })
}

pub async fn add_image(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    event_id: i64,
    image: ImageUpload,
) -> AppResult<EventImage> {
    let target = image_target(conn, event_id).await?;
    authorize(actor, Action::Manage, target)?;

    let url = images.upload(&image).await?;
    let created = EventImage::create(conn, event_id, &url).await;
    keep_or_release(images, Some(&url), created).await
}

pub async fn fetch_image(conn: &mut SqliteConnection, id: i64) -> AppResult<EventImage> {
    EventImage::gen_enforce(conn, id).await
}

async fn swap_image(conn: &mut SqliteConnection, id: i64, url: &str) -> AppResult<EventImage> {
    EventImage::replace(conn, id, url).await?;
    EventImage::gen_enforce(conn, id).await
}

/// Replaces the stored object behind an event image; the old one goes after commit.
pub async fn replace_image(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    id: i64,
    image: ImageUpload,
) -> AppResult<Outcome<EventImage>> {
    let existing = EventImage::gen_enforce(conn, id).await?;
    let target = image_target(conn, existing.event_id).await?;
    authorize(actor, Action::Edit, target)?;

    let url = images.upload(&image).await?;
    let replaced = swap_image(conn, id, &url).await;
    let updated = keep_or_release(images, Some(&url), replaced).await?;
    Ok(Outcome::releasing(updated, vec![existing.event_image]))
}

pub async fn delete_image(conn: &mut SqliteConnection, actor: i64, id: i64) -> AppResult<Outcome<()>> {
    let existing = EventImage::gen_enforce(conn, id).await?;
    let target = image_target(conn, existing.event_id).await?;
    authorize(actor, Action::Delete, target)?;

    EventImage::delete(conn, id).await?;
    Ok(Outcome::releasing((), vec![existing.event_image]))
}
