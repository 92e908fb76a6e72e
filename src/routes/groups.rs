// /api/groups and /api/venues - groups, memberships, group images and venues

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::entities::ent_group::GroupFilter;
use crate::entities::{EntVenue, GroupImage};
use crate::error::AppResult;
use crate::framework::validation::MeetingType;
use crate::framework::{FormData, Page, PageParams};
use crate::infrastructure::Vc;
use crate::routes::{created, events, finish, Message};
use crate::services::group_service::{
    self, GroupCard, GroupDetail, GroupInput, GroupList, MembershipState, VenueInput, VenueList, IMAGE_FIELDS,
};
use crate::services::Outcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups))
        .route("/new", post(create_group))
        .route("/{id}", get(fetch_group))
        .route("/{id}/edit", post(update_group).put(update_group))
        .route("/{id}/delete", delete(delete_group))
        .route("/{id}/join-group", post(join_group))
        .route("/{id}/leave-group/{member_id}", delete(leave_group))
        .route("/{id}/images", post(add_group_image))
        .route("/{id}/events/new", post(events::create_event))
        .route("/{id}/venues", get(group_venues).post(create_venue))
}

pub fn venue_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_venues))
        .route("/{id}", get(fetch_venue))
        .route("/{id}/edit", post(update_venue).put(update_venue))
        .route("/{id}/delete", delete(delete_venue))
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub group_type: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl GroupQuery {
    fn filter(&self) -> AppResult<GroupFilter> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let group_type = match non_empty(&self.group_type) {
            Some(value) => Some(value.parse::<MeetingType>()?.as_str().to_string()),
            None => None,
        };
        Ok(GroupFilter {
            search: non_empty(&self.search),
            group_type,
            city: non_empty(&self.city),
            state: non_empty(&self.state).map(|s| s.to_uppercase()),
        })
    }

    fn page(&self) -> Page {
        Page::from_params(PageParams {
            page: self.page,
            per_page: self.per_page,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VenueRequest {
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(alias = "zip_code", alias = "zipCode")]
    pub zip: String,
    #[serde(alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude")]
    pub lng: Option<f64>,
}

impl From<VenueRequest> for VenueInput {
    fn from(req: VenueRequest) -> Self {
        VenueInput {
            address: req.address.trim().to_string(),
            city: req.city.trim().to_string(),
            state: req.state.trim().to_uppercase(),
            zip_code: req.zip.trim().to_string(),
            latitude: req.lat,
            longitude: req.lng,
        }
    }
}

fn group_input(form: &FormData) -> AppResult<GroupInput> {
    Ok(GroupInput {
        name: form.required("name")?,
        about: form.required("about")?,
        group_type: form.required("type")?.parse()?,
        city: form.required("city")?,
        state: form.required("state")?.to_uppercase(),
    })
}

async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<GroupQuery>,
) -> AppResult<Json<GroupList>> {
    let filter = query.filter()?;
    let mut tx = state.db.begin().await?;
    let groups = group_service::list(&mut tx, &filter, query.page()).await?;
    tx.commit().await?;
    Ok(Json(groups))
}

async fn fetch_group(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<GroupDetail>> {
    let mut tx = state.db.begin().await?;
    let group = group_service::fetch(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Json(group))
}

async fn create_group(
    State(state): State<AppState>,
    vc: Vc,
    mut form: FormData,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let input = group_input(&form)?;
    let image = form.require_file(IMAGE_FIELDS)?;

    let mut tx = state.db.begin().await?;
    let group = group_service::create(&mut tx, state.images.as_ref(), actor, input, image).await?;
    let group: GroupCard = finish(&state, tx, Outcome::new(group)).await?;
    Ok(created(group))
}

async fn update_group(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    mut form: FormData,
) -> AppResult<Json<GroupCard>> {
    let actor = vc.require_user()?;
    let input = group_input(&form)?;
    let image = form.take_file(IMAGE_FIELDS);

    let mut tx = state.db.begin().await?;
    let outcome = group_service::update(&mut tx, state.images.as_ref(), actor, id, input, image).await?;
    Ok(Json(finish(&state, tx, outcome).await?))
}

async fn delete_group(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let outcome = group_service::delete(&mut tx, actor, id).await?;
    finish(&state, tx, outcome).await?;
    Ok(Message::new("Successfully deleted"))
}

async fn join_group(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<MembershipState>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let membership = group_service::join(&mut tx, actor, id).await?;
    tx.commit().await?;
    Ok(Json(membership))
}

async fn leave_group(
    State(state): State<AppState>,
    vc: Vc,
    Path((id, member_id)): Path<(i64, i64)>,
) -> AppResult<Json<MembershipState>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let membership = group_service::leave(&mut tx, actor, id, member_id).await?;
    tx.commit().await?;
    Ok(Json(membership))
}

async fn add_group_image(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    mut form: FormData,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let image = form.require_file(IMAGE_FIELDS)?;

    let mut tx = state.db.begin().await?;
    let added = group_service::add_image(&mut tx, state.images.as_ref(), actor, id, image).await?;
    let added: GroupImage = finish(&state, tx, Outcome::new(added)).await?;
    Ok(created(added))
}

async fn group_venues(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Vec<EntVenue>>> {
    let mut tx = state.db.begin().await?;
    let venues = group_service::venues_for_group(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Json(venues))
}

async fn create_venue(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    Json(req): Json<VenueRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let venue = group_service::create_venue(&mut tx, actor, id, req.into()).await?;
    tx.commit().await?;
    Ok(created(venue))
}

async fn list_venues(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<VenueList>> {
    let mut tx = state.db.begin().await?;
    let venues = group_service::list_venues(&mut tx, Page::from_params(params)).await?;
    tx.commit().await?;
    Ok(Json(venues))
}

async fn fetch_venue(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<EntVenue>> {
    let mut tx = state.db.begin().await?;
    let venue = group_service::fetch_venue(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Json(venue))
}

async fn update_venue(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    Json(req): Json<VenueRequest>,
) -> AppResult<Json<EntVenue>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let venue = group_service::update_venue(&mut tx, actor, id, req.into()).await?;
    tx.commit().await?;
    Ok(Json(venue))
}

async fn delete_venue(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    group_service::delete_venue(&mut tx, actor, id).await?;
    tx.commit().await?;
    Ok(Message::new("Successfully deleted"))
}
