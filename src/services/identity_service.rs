// IdentityService - accounts, sessions, profiles and the tag registry

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::entities::ent_tag::TagUsage;
use crate::entities::ent_user::{NewUser, UserChanges};
use crate::entities::{EntEvent, EntGroup, EntPost, EntTag, EntUser, UserSummary};
use crate::error::{AppError, AppResult};
use crate::framework::pagination::{Page, PageInfo};
use crate::framework::privacy::{authorize, Action, Target};
use crate::infrastructure::security::{self, Session};
use crate::infrastructure::storage::{ImageStore, ImageUpload};
use crate::services::comment_service::{self, CommentNode};
use crate::services::event_service::{self, EventCard};
use crate::services::group_service::{self, GroupCard};
use crate::services::post_service::{self, PostCard};
use crate::services::{keep_or_release, Outcome};

pub const IMAGE_FIELDS: &[&str] = &["profile_image", "image"];
pub const PROFILE_POST_LIMIT: i64 = 20;
pub const PROFILE_COMMENT_LIMIT: i64 = 10;
pub const DEFAULT_POPULAR_LIMIT: i64 = 10;

#[derive(Debug, Clone, Validate)]
pub struct SignupInput {
    #[validate(length(min = 3, max = 20, message = "First name must be between 3 and 20 characters"))]
    pub first_name: String,
    #[validate(length(min = 3, max = 20, message = "Last name must be between 3 and 20 characters"))]
    pub last_name: String,
    #[validate(length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"))]
    pub username: String,
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 3, max = 20, message = "First name must be between 3 and 20 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 3, max = 20, message = "Last name must be between 3 and 20 characters"))]
    pub last_name: Option<String>,
    #[validate(length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
}

/// A user with their interest tags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(flatten)]
    pub user: UserSummary,
    pub users_tags: Vec<EntTag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub authenticated: bool,
}

impl AuthState {
    pub fn signed_in(user: AuthUser) -> Self {
        Self {
            user: Some(user),
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            authenticated: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: AuthUser,
    pub group: Vec<GroupCard>,
    pub events: Vec<EventCard>,
    pub posts: Vec<PostCard>,
    pub user_comments: Vec<CommentNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserList {
    pub users: Vec<UserSummary>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostFeed {
    pub posts: Vec<PostCard>,
    pub pagination: PageInfo,
}

async fn auth_user(conn: &mut SqliteConnection, user: &EntUser) -> AppResult<AuthUser> {
    Ok(AuthUser {
        user: UserSummary::from(user),
        users_tags: EntTag::for_user(conn, user.id).await?,
    })
}

pub async fn load_user(conn: &mut SqliteConnection, id: i64) -> AppResult<AuthUser> {
    let user = EntUser::gen_enforce(conn, id).await?;
    auth_user(conn, &user).await
}

/// A user as seen by `viewer`; the email is only shown to its owner.
pub async fn fetch_user(conn: &mut SqliteConnection, viewer: Option<i64>, id: i64) -> AppResult<AuthUser> {
    let mut user = load_user(conn, id).await?;
    if viewer != Some(id) {
        user.user = user.user.redacted();
    }
    Ok(user)
}

async fn check_unique(
    conn: &mut SqliteConnection,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i64>,
) -> AppResult<()> {
    if let Some(username) = username {
        if EntUser::username_taken(conn, username, except).await? {
            return Err(AppError::Conflict("Username is already in use".to_string()));
        }
    }
    if let Some(email) = email {
        if EntUser::email_taken(conn, email, except).await? {
            return Err(AppError::Conflict("Email address is already in use".to_string()));
        }
    }
    Ok(())
}

/// Creates the account, uploads the profile image and opens a session.
#[instrument(skip_all, fields(username = %input.username))]
pub async fn signup(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    input: SignupInput,
    image: ImageUpload,
    ttl_days: i64,
) -> AppResult<(Session, AuthUser)> {
    input.validate()?;
    check_unique(conn, Some(&input.username), Some(&input.email), None).await?;
    let hashed_password = security::hash_password(&input.password)?;

    let url = images.upload(&image).await?;
    let created = register(conn, &input, hashed_password, &url, ttl_days).await;
    let (session, user) = keep_or_release(images, Some(&url), created).await?;

    info!(user_id = user.user.id, "User signed up");
    Ok((session, user))
}

async fn register(
    conn: &mut SqliteConnection,
    input: &SignupInput,
    hashed_password: String,
    image: &str,
    ttl_days: i64,
) -> AppResult<(Session, AuthUser)> {
    let id = EntUser::create(
        conn,
        &NewUser {
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            username: input.username.clone(),
            email: input.email.clone(),
            hashed_password,
            bio: input.bio.clone(),
            profile_image_url: image.to_string(),
        },
    )
    .await?;
    EntTag::attach_known(conn, id, &input.tags).await?;
    let session = security::create_session(conn, id, ttl_days).await?;
    Ok((session, load_user(conn, id).await?))
}

#[instrument(skip(conn, password))]
pub async fn login(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
    ttl_days: i64,
) -> AppResult<(Session, AuthUser)> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());
    let user = EntUser::gen_by_email(conn, email.trim()).await?.ok_or_else(invalid)?;
    if !security::verify_password(&user.hashed_password, password) {
        warn!(user_id = user.id, "Failed login");
        return Err(invalid());
    }

    let session = security::create_session(conn, user.id, ttl_days).await?;
    info!(user_id = user.id, "User logged in");
    Ok((session, auth_user(conn, &user).await?))
}

pub async fn logout(conn: &mut SqliteConnection, token: Option<&str>) -> AppResult<()> {
    if let Some(token) = token {
        security::delete_session(conn, token).await?;
    }
    Ok(())
}

/// Never fails for a missing or stale session.
pub async fn whoami(conn: &mut SqliteConnection, viewer: Option<i64>) -> AppResult<AuthState> {
    let Some(id) = viewer else {
        return Ok(AuthState::anonymous());
    };
    match EntUser::gen_nullable(conn, id).await? {
        Some(user) => Ok(AuthState::signed_in(auth_user(conn, &user).await?)),
        None => Ok(AuthState::anonymous()),
    }
}

pub async fn profile(conn: &mut SqliteConnection, user_id: i64) -> AppResult<Profile> {
    let user = load_user(conn, user_id).await?;

    let groups = EntGroup::gen_for_user(conn, user_id).await?;
    let group = group_service::cards(conn, groups).await?;
    let events = EntEvent::gen_attended_by(conn, user_id).await?;
    let events = event_service::cards(conn, events).await?;
    let posts = EntPost::gen_by_creators(conn, &[user_id], PROFILE_POST_LIMIT, 0).await?;
    let posts = post_service::cards(conn, posts).await?;
    let user_comments = comment_service::by_user(conn, Some(user_id), user_id, PROFILE_COMMENT_LIMIT).await?;

    Ok(Profile {
        user,
        group,
        events,
        posts,
        user_comments,
    })
}

async fn apply_changes(conn: &mut SqliteConnection, id: i64, changes: &UserChanges) -> AppResult<AuthUser> {
    EntUser::update(conn, id, changes).await?;
    load_user(conn, id).await
}

/// Owner-only profile edit; a replaced profile image is released after commit.
#[instrument(skip(conn, images, input, image))]
pub async fn update_profile(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    user_id: i64,
    input: ProfileInput,
    image: Option<ImageUpload>,
) -> AppResult<Outcome<AuthUser>> {
    authorize(actor, Action::Edit, Target::User { id: user_id })?;
    let existing = EntUser::gen_enforce(conn, user_id).await?;
    input.validate()?;
    check_unique(conn, input.username.as_deref(), input.email.as_deref(), Some(user_id)).await?;

    let uploaded = match &image {
        Some(image) => Some(images.upload(image).await?),
        None => None,
    };
    let changes = UserChanges {
        first_name: input.first_name,
        last_name: input.last_name,
        username: input.username,
        email: input.email,
        bio: input.bio,
        profile_image_url: uploaded.clone(),
    };
    let updated = apply_changes(conn, user_id, &changes).await;
    let user = keep_or_release(images, uploaded.as_deref(), updated).await?;

    let release = if uploaded.is_some() {
        vec![existing.profile_image_url]
    } else {
        Vec::new()
    };
    Ok(Outcome::releasing(user, release))
}

/// Owner-only account removal. Sessions and the whole owned graph go with it.
#[instrument(skip(conn))]
pub async fn delete_profile(conn: &mut SqliteConnection, actor: i64, user_id: i64) -> AppResult<Outcome<()>> {
    authorize(actor, Action::Delete, Target::User { id: user_id })?;
    EntUser::gen_enforce(conn, user_id).await?;

    let release = EntUser::owned_image_urls(conn, user_id).await?;
    security::delete_user_sessions(conn, user_id).await?;
    EntUser::delete(conn, user_id).await?;
    info!(user_id, released = release.len(), "Account deleted");
    Ok(Outcome::releasing((), release))
}

/// Additive; names outside the vocabulary become new tags.
pub async fn add_tags(
    conn: &mut SqliteConnection,
    actor: i64,
    user_id: i64,
    names: &[String],
) -> AppResult<AuthUser> {
    authorize(actor, Action::Manage, Target::User { id: user_id })?;
    EntUser::gen_enforce(conn, user_id).await?;
    if names.is_empty() {
        return Err(AppError::Validation("At least one tag is required".to_string()));
    }
    EntTag::attach_or_create(conn, user_id, names).await?;
    load_user(conn, user_id).await
}

pub async fn list_users(conn: &mut SqliteConnection, viewer: Option<i64>, page: Page) -> AppResult<UserList> {
    let total = EntUser::count(conn).await?;
    let users = EntUser::list(conn, page.limit(), page.offset()).await?;
    Ok(UserList {
        users: users
            .iter()
            .map(|user| {
                let summary = UserSummary::from(user);
                if viewer == Some(user.id) {
                    summary
                } else {
                    summary.redacted()
                }
            })
            .collect(),
        pagination: page.info(total),
    })
}

pub async fn user_posts(conn: &mut SqliteConnection, user_id: i64, page: Page) -> AppResult<PostFeed> {
    EntUser::gen_enforce(conn, user_id).await?;
    let (posts, pagination) = post_service::by_creator(conn, user_id, page).await?;
    Ok(PostFeed { posts, pagination })
}

pub async fn list_tags(conn: &mut SqliteConnection) -> AppResult<Vec<EntTag>> {
    EntTag::gen_all(conn).await
}

pub async fn fetch_tag(conn: &mut SqliteConnection, id: i64) -> AppResult<TagUsage> {
    let tag = EntTag::gen_enforce(conn, id).await?;
    let user_count = EntTag::user_count(conn, id).await?;
    Ok(TagUsage {
        id: tag.id,
        name: tag.name,
        user_count,
    })
}

pub async fn popular_tags(conn: &mut SqliteConnection, limit: Option<i64>) -> AppResult<Vec<TagUsage>> {
    let limit = limit.filter(|n| *n >= 1).unwrap_or(DEFAULT_POPULAR_LIMIT);
    EntTag::popular(conn, limit).await
}

pub async fn search_tags(conn: &mut SqliteConnection, query: &str) -> AppResult<Vec<EntTag>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Search query is required".to_string()));
    }
    EntTag::search(conn, query).await
}

pub async fn user_tags(conn: &mut SqliteConnection, user_id: i64) -> AppResult<Vec<EntTag>> {
    EntUser::gen_enforce(conn, user_id).await?;
    EntTag::for_user(conn, user_id).await
}
