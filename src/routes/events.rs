// /api/events and /api/event-images - events, attendance and event imagery

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::entities::ent_event::EventFilter;
use crate::entities::EventImage;
use crate::error::{AppError, AppResult};
use crate::framework::validation::{parse_datetime, parse_value, MeetingType};
use crate::framework::{FormData, Page, PageParams};
use crate::infrastructure::Vc;
use crate::routes::{created, finish, Message};
use crate::services::event_service::{
    self, AttendanceState, EventCard, EventDetail, EventInput, EventList, IMAGE_FIELDS,
};
use crate::services::Outcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/{id}", get(fetch_event))
        .route("/{id}/edit", post(update_event).put(update_event))
        .route("/{id}/delete", delete(delete_event))
        .route("/{id}/attend-event", post(attend_event))
        .route("/{id}/leave-event/{attendee_id}", delete(leave_event))
        .route("/{id}/images", post(add_event_image))
}

pub fn image_router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(fetch_image))
        .route("/{id}/edit", post(replace_image).put(replace_image))
        .route("/{id}/delete", delete(delete_image))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl EventQuery {
    fn filter(&self) -> AppResult<EventFilter> {
        let event_type = match self.event_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(value) => Some(value.parse::<MeetingType>()?.as_str().to_string()),
            None => None,
        };
        Ok(EventFilter {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            event_type,
        })
    }

    fn page(&self) -> Page {
        Page::from_params(PageParams {
            page: self.page,
            per_page: self.per_page,
        })
    }
}

fn event_input(form: &FormData) -> AppResult<EventInput> {
    let venue_id = match form.text_any(&["venue_id", "venueId"]) {
        Some(value) => Some(parse_value("venue_id", &value)?),
        None => None,
    };
    let start = form
        .text_any(&["start_date", "startDate"])
        .ok_or_else(|| AppError::Validation("start_date is required".to_string()))?;
    let end = form
        .text_any(&["end_date", "endDate"])
        .ok_or_else(|| AppError::Validation("end_date is required".to_string()))?;

    Ok(EventInput {
        venue_id,
        name: form.required("name")?,
        description: form.required("description")?,
        event_type: form.required("type")?.parse()?,
        capacity: parse_value("capacity", &form.required("capacity")?)?,
        start_date: parse_datetime("start_date", &start)?,
        end_date: parse_datetime("end_date", &end)?,
    })
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<EventList>> {
    let filter = query.filter()?;
    let mut tx = state.db.begin().await?;
    let events = event_service::list(&mut tx, &filter, query.page()).await?;
    tx.commit().await?;
    Ok(Json(events))
}

async fn fetch_event(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<EventDetail>> {
    let mut tx = state.db.begin().await?;
    let event = event_service::fetch(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Json(event))
}

/// Mounted at /api/groups/{id}/events/new.
pub(crate) async fn create_event(
    State(state): State<AppState>,
    vc: Vc,
    Path(group_id): Path<i64>,
    mut form: FormData,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let input = event_input(&form)?;
    let image = form.require_file(IMAGE_FIELDS)?;

    let mut tx = state.db.begin().await?;
    let event = event_service::create(&mut tx, state.images.as_ref(), actor, group_id, input, image).await?;
    let event: EventCard = finish(&state, tx, Outcome::new(event)).await?;
    Ok(created(event))
}

async fn update_event(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    mut form: FormData,
) -> AppResult<Json<EventCard>> {
    let actor = vc.require_user()?;
    let input = event_input(&form)?;
    let image = form.take_file(IMAGE_FIELDS);

    let mut tx = state.db.begin().await?;
    let outcome = event_service::update(&mut tx, state.images.as_ref(), actor, id, input, image).await?;
    Ok(Json(finish(&state, tx, outcome).await?))
}

async fn delete_event(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let outcome = event_service::delete(&mut tx, actor, id).await?;
    finish(&state, tx, outcome).await?;
    Ok(Message::new("Successfully deleted"))
}

async fn attend_event(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
) -> AppResult<Json<AttendanceState>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let attendance = event_service::attend(&mut tx, actor, id).await?;
    tx.commit().await?;
    Ok(Json(attendance))
}

async fn leave_event(
    State(state): State<AppState>,
    vc: Vc,
    Path((id, attendee_id)): Path<(i64, i64)>,
) -> AppResult<Json<AttendanceState>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let attendance = event_service::leave(&mut tx, actor, id, attendee_id).await?;
    tx.commit().await?;
    Ok(Json(attendance))
}

async fn add_event_image(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    mut form: FormData,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let image = form.require_file(IMAGE_FIELDS)?;

    let mut tx = state.db.begin().await?;
    let added = event_service::add_image(&mut tx, state.images.as_ref(), actor, id, image).await?;
    let added: EventImage = finish(&state, tx, Outcome::new(added)).await?;
    Ok(created(added))
}

async fn fetch_image(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<EventImage>> {
    let mut tx = state.db.begin().await?;
    let image = event_service::fetch_image(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Json(image))
}

async fn replace_image(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    mut form: FormData,
) -> AppResult<Json<EventImage>> {
    let actor = vc.require_user()?;
    let image = form.require_file(IMAGE_FIELDS)?;

    let mut tx = state.db.begin().await?;
    let outcome = event_service::replace_image(&mut tx, state.images.as_ref(), actor, id, image).await?;
    Ok(Json(finish(&state, tx, outcome).await?))
}

async fn delete_image(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let outcome = event_service::delete_image(&mut tx, actor, id).await?;
    finish(&state, tx, outcome).await?;
    Ok(Message::new("Successfully deleted"))
}
