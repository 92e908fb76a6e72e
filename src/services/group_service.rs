// GroupService - groups, memberships, group images and venues

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use crate::entities::ent_group::{GroupFields, GroupFilter, MemberRow};
use crate::entities::ent_venue::VenueFields;
use crate::entities::{EntEvent, EntGroup, EntUser, EntVenue, GroupImage, UserProjection};
use crate::error::{AppError, AppResult};
use crate::framework::pagination::{Page, PageInfo};
use crate::framework::privacy::{authorize, Action, Target};
use crate::framework::validation::{check_coordinates, check_state, check_zip, MeetingType};
use crate::infrastructure::storage::{ImageStore, ImageUpload};
use crate::services::event_service::{self, EventCard};
use crate::services::{keep_or_release, Outcome};

pub const IMAGE_FIELDS: &[&str] = &["image", "group_image"];

#[derive(Debug, Clone, Validate)]
pub struct GroupInput {
    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: String,
    #[validate(length(min = 20, max = 150, message = "About must be between 20 and 150 characters"))]
    pub about: String,
    pub group_type: MeetingType,
    #[validate(length(min = 3, max = 30, message = "City must be between 3 and 30 characters"))]
    pub city: String,
    pub state: String,
}

impl GroupInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        check_state(&self.state)
    }

    fn fields(&self, image: String) -> GroupFields {
        GroupFields {
            name: self.name.clone(),
            about: self.about.clone(),
            group_type: self.group_type.as_str().to_string(),
            city: self.city.clone(),
            state: self.state.clone(),
            image,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct VenueInput {
    #[validate(length(min = 1, max = 255, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 3, max = 30, message = "City must be between 3 and 30 characters"))]
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl VenueInput {
    fn fields(&self) -> AppResult<VenueFields> {
        self.validate()?;
        check_state(&self.state)?;
        check_zip(&self.zip_code)?;
        check_coordinates(self.latitude, self.longitude)?;
        Ok(VenueFields {
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip_code: self.zip_code.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCard {
    pub id: i64,
    pub organizer_id: i64,
    pub name: String,
    pub about: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub city: String,
    pub state: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub num_members: i64,
    pub num_events: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: GroupCard,
    pub organizer: Option<UserProjection>,
    pub members: Vec<MemberRow>,
    pub events: Vec<EventCard>,
    pub venues: Vec<EntVenue>,
    pub group_images: Vec<GroupImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupList {
    pub groups: Vec<GroupCard>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipState {
    pub group_id: i64,
    pub user_id: i64,
    pub num_members: i64,
}

/// Member and event counts for a page of groups in two grouped queries.
pub async fn cards(conn: &mut SqliteConnection, groups: Vec<EntGroup>) -> AppResult<Vec<GroupCard>> {
    let ids: Vec<i64> = groups.iter().map(|g| g.id).collect();
    let members = EntGroup::member_counts(conn, &ids).await?;
    let events = EntGroup::event_counts(conn, &ids).await?;

    Ok(groups
        .into_iter()
        .map(|group| GroupCard {
            num_members: members.get(&group.id).copied().unwrap_or(0),
            num_events: events.get(&group.id).copied().unwrap_or(0),
            id: group.id,
            organizer_id: group.organizer_id,
            name: group.name,
            about: group.about,
            group_type: group.group_type,
            city: group.city,
            state: group.state,
            image: group.image,
            created_at: group.created_at,
            updated_at: group.updated_at,
        })
        .collect())
}

async fn card(conn: &mut SqliteConnection, group: EntGroup) -> AppResult<GroupCard> {
    cards(conn, vec![group])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Group"))
}

pub async fn list(conn: &mut SqliteConnection, filter: &GroupFilter, page: Page) -> AppResult<GroupList> {
    let total = EntGroup::count(conn, filter).await?;
    let groups = EntGroup::gen_page(conn, filter, page.limit(), page.offset()).await?;
    Ok(GroupList {
        groups: cards(conn, groups).await?,
        pagination: page.info(total),
    })
}

/// A group with organizer, members, events, venues and images expanded.
pub async fn fetch(conn: &mut SqliteConnection, id: i64) -> AppResult<GroupDetail> {
    let group = EntGroup::gen_enforce(conn, id).await?;
    let organizer = UserProjection::gen_multi(conn, &[group.organizer_id])
        .await?
        .remove(&group.organizer_id);
    let members = EntGroup::members(conn, id).await?;
    let events = EntEvent::gen_for_group(conn, id).await?;
    let events = event_service::cards(conn, events).await?;
    let venues = EntVenue::gen_for_group(conn, id).await?;
    let group_images = EntGroup::images(conn, id).await?;

    Ok(GroupDetail {
        group: card(conn, group).await?,
        organizer,
        members,
        events,
        venues,
        group_images,
    })
}

#[instrument(skip(conn, images, input, image))]
pub async fn create(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    input: GroupInput,
    image: ImageUpload,
) -> AppResult<GroupCard> {
    input.check()?;
    EntUser::gen_enforce(conn, actor).await?;

    let url = images.upload(&image).await?;
    let created = insert(conn, actor, &input, &url).await;
    let group = keep_or_release(images, Some(&url), created).await?;

    info!(group_id = group.id, organizer = actor, "Group created");
    Ok(group)
}

async fn insert(conn: &mut SqliteConnection, organizer: i64, input: &GroupInput, image: &str) -> AppResult<GroupCard> {
    let id = EntGroup::create(conn, organizer, &input.fields(image.to_string())).await?;
    let group = EntGroup::gen_enforce(conn, id).await?;
    card(conn, group).await
}

async fn rewrite(conn: &mut SqliteConnection, id: i64, input: &GroupInput, image: &str) -> AppResult<GroupCard> {
    EntGroup::update(conn, id, &input.fields(image.to_string())).await?;
    let group = EntGroup::gen_enforce(conn, id).await?;
    card(conn, group).await
}

/// Organizer-only edit; a replaced image is released after commit.
#[instrument(skip(conn, images, input, image))]
pub async fn update(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    id: i64,
    input: GroupInput,
    image: Option<ImageUpload>,
) -> AppResult<Outcome<GroupCard>> {
    let existing = EntGroup::gen_enforce(conn, id).await?;
    authorize(actor, Action::Edit, Target::Group { organizer: existing.organizer_id })?;
    input.check()?;

    let uploaded = match &image {
        Some(image) => Some(images.upload(image).await?),
        None => None,
    };
    let url = uploaded.clone().unwrap_or_else(|| existing.image.clone());
    let updated = rewrite(conn, id, &input, &url).await;
    let group = keep_or_release(images, uploaded.as_deref(), updated).await?;

    let release = if uploaded.is_some() { vec![existing.image] } else { Vec::new() };
    Ok(Outcome::releasing(group, release))
}

/// Organizer-only delete; everything hanging off the group goes with it.
#[instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, actor: i64, id: i64) -> AppResult<Outcome<()>> {
    let group = EntGroup::gen_enforce(conn, id).await?;
    authorize(actor, Action::Delete, Target::Group { organizer: group.organizer_id })?;

    let release = EntGroup::owned_image_urls(conn, id).await?;
    EntGroup::delete(conn, id).await?;
    info!(group_id = id, released = release.len(), "Group deleted");
    Ok(Outcome::releasing((), release))
}

async fn membership_state(conn: &mut SqliteConnection, group_id: i64, user_id: i64) -> AppResult<MembershipState> {
    let num_members = EntGroup::member_counts(conn, &[group_id])
        .await?
        .get(&group_id)
        .copied()
        .unwrap_or(0);
    Ok(MembershipState {
        group_id,
        user_id,
        num_members,
    })
}

pub async fn join(conn: &mut SqliteConnection, actor: i64, group_id: i64) -> AppResult<MembershipState> {
    let group = EntGroup::gen_enforce(conn, group_id).await?;
    authorize(actor, Action::Join, Target::Group { organizer: group.organizer_id })?;

    if !EntGroup::add_member(conn, group_id, actor).await? {
        return Err(AppError::Conflict("Already a member of this group".to_string()));
    }
    info!(group_id, user_id = actor, "Joined group");
    membership_state(conn, group_id, actor).await
}

/// Self-leave when `member_id` is the actor, otherwise an organizer removal.
pub async fn leave(
    conn: &mut SqliteConnection,
    actor: i64,
    group_id: i64,
    member_id: i64,
) -> AppResult<MembershipState> {
    let group = EntGroup::gen_enforce(conn, group_id).await?;
    authorize(
        actor,
        Action::Leave { member_id },
        Target::Group { organizer: group.organizer_id },
    )?;

    if !EntGroup::remove_member(conn, group_id, member_id).await? {
        return Err(AppError::not_found("Membership"));
    }
    info!(group_id, member_id, removed_by = actor, "Left group");
    membership_state(conn, group_id, member_id).await
}

pub async fn add_image(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    group_id: i64,
    image: ImageUpload,
) -> AppResult<GroupImage> {
    let group = EntGroup::gen_enforce(conn, group_id).await?;
    authorize(actor, Action::Manage, Target::Group { organizer: group.organizer_id })?;

    let url = images.upload(&image).await?;
    let created = EntGroup::add_image(conn, group_id, &url).await;
    keep_or_release(images, Some(&url), created).await
}

pub async fn create_venue(
    conn: &mut SqliteConnection,
    actor: i64,
    group_id: i64,
    input: VenueInput,
) -> AppResult<EntVenue> {
    let group = EntGroup::gen_enforce(conn, group_id).await?;
    authorize(actor, Action::Manage, Target::Group { organizer: group.organizer_id })?;

    let id = EntVenue::create(conn, group_id, &input.fields()?).await?;
    EntVenue::gen_enforce(conn, id).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueList {
    pub venues: Vec<EntVenue>,
    pub pagination: PageInfo,
}

pub async fn list_venues(conn: &mut SqliteConnection, page: Page) -> AppResult<VenueList> {
    let total = EntVenue::count(conn).await?;
    let venues = EntVenue::gen_page(conn, page.limit(), page.offset()).await?;
    Ok(VenueList {
        venues,
        pagination: page.info(total),
    })
}

pub async fn venues_for_group(conn: &mut SqliteConnection, group_id: i64) -> AppResult<Vec<EntVenue>> {
    EntGroup::gen_enforce(conn, group_id).await?;
    EntVenue::gen_for_group(conn, group_id).await
}

pub async fn fetch_venue(conn: &mut SqliteConnection, id: i64) -> AppResult<EntVenue> {
    EntVenue::gen_enforce(conn, id).await
}

async fn venue_organizer(conn: &mut SqliteConnection, venue: &EntVenue) -> AppResult<Target> {
    let group = EntGroup::gen_enforce(conn, venue.group_id).await?;
    Ok(Target::Group { organizer: group.organizer_id })
}

pub async fn update_venue(
    conn: &mut SqliteConnection,
    actor: i64,
    id: i64,
    input: VenueInput,
) -> AppResult<EntVenue> {
    let venue = EntVenue::gen_enforce(conn, id).await?;
    let target = venue_organizer(conn, &venue).await?;
    authorize(actor, Action::Edit, target)?;

    EntVenue::update(conn, id, &input.fields()?).await?;
    EntVenue::gen_enforce(conn, id).await
}

pub async fn delete_venue(conn: &mut SqliteConnection, actor: i64, id: i64) -> AppResult<()> {
    let venue = EntVenue::gen_enforce(conn, id).await?;
    let target = venue_organizer(conn, &venue).await?;
    authorize(actor, Action::Delete, target)?;

    EntVenue::delete(conn, id).await
}
