// /api/auth - session lifecycle and the signed-in user's profile

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::framework::{FormData, ValidatedJson};
use crate::infrastructure::security::{clear_session_cookie, session_cookie};
use crate::infrastructure::Vc;
use crate::routes::Message;
use crate::services::identity_service::{self, AuthState, Profile, SignupInput, IMAGE_FIELDS};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(whoami))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/signup", post(signup))
        .route("/profile", get(profile))
        .route("/unauthorized", get(unauthorized))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

async fn whoami(State(state): State<AppState>, vc: Vc) -> AppResult<Json<AuthState>> {
    let mut tx = state.db.begin().await?;
    let auth = identity_service::whoami(&mut tx, vc.user_id).await?;
    tx.commit().await?;
    Ok(Json(auth))
}

async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    let ttl = state.config.session.ttl_days;
    let (session, user) = identity_service::login(&mut tx, &req.email, &req.password, ttl).await?;
    tx.commit().await?;

    let cookie = session_cookie(&session.token, ttl, state.secure_cookies());
    Ok(([(header::SET_COOKIE, cookie)], Json(AuthState::signed_in(user))))
}

async fn logout(State(state): State<AppState>, vc: Vc) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    identity_service::logout(&mut tx, vc.session_token.as_deref()).await?;
    tx.commit().await?;

    let cookie = clear_session_cookie(state.secure_cookies());
    Ok(([(header::SET_COOKIE, cookie)], Message::new("User logged out")))
}

async fn signup(State(state): State<AppState>, mut form: FormData) -> AppResult<impl IntoResponse> {
    let input = SignupInput {
        first_name: form.required("first_name")?,
        last_name: form.required("last_name")?,
        username: form.required("username")?,
        email: form.required("email")?,
        password: form.required_raw("password")?,
        bio: form.text("bio").unwrap_or_default(),
        tags: form.list("tags"),
    };
    let image = form.require_file(IMAGE_FIELDS)?;

    let mut tx = state.db.begin().await?;
    let ttl = state.config.session.ttl_days;
    let (session, user) =
        identity_service::signup(&mut tx, state.images.as_ref(), input, image, ttl).await?;
    tx.commit().await?;

    let cookie = session_cookie(&session.token, ttl, state.secure_cookies());
    Ok(([(header::SET_COOKIE, cookie)], Json(AuthState::signed_in(user))))
}

async fn profile(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Profile>> {
    let user_id = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let profile = identity_service::profile(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(Json(profile))
}

async fn unauthorized() -> AppError {
    AppError::unauthenticated()
}
