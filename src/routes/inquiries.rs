// /api/partnerships and /api/contact - inbound inquiries
// Both families share handlers; the router layer pins the inquiry kind.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::entities::ent_inquiry::InquiryStats;
use crate::entities::{EntInquiry, InquiryKind};
use crate::error::AppResult;
use crate::framework::{Page, PageParams, ValidatedJson};
use crate::infrastructure::mailer::send_detached;
use crate::infrastructure::Vc;
use crate::routes::{created, Message};
use crate::services::inquiry_service::{self, BulkDeleteInput, BulkDeleted, InquiryInput, InquiryList, ResponseInput};

pub fn partnership_router() -> Router<AppState> {
    router_for(InquiryKind::Partnership)
}

pub fn contact_router() -> Router<AppState> {
    router_for(InquiryKind::Contact)
}

fn router_for(kind: InquiryKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(stats))
        .route("/bulk-delete", post(bulk_delete))
        .route("/{id}", get(fetch).delete(delete))
        .route("/{id}/respond", post(respond))
        .layer(Extension(kind))
}

#[derive(Debug, Default, Deserialize)]
pub struct InquiryQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<InquiryKind>,
    Json(input): Json<InquiryInput>,
) -> AppResult<impl IntoResponse> {
    let notify = state.mailer.notification_address().map(str::to_owned);
    let mut tx = state.db.begin().await?;
    let (inquiry, mail) = inquiry_service::create(&mut tx, kind, input, notify.as_deref()).await?;
    tx.commit().await?;

    if let Some(mail) = mail {
        send_detached(state.mailer.clone(), mail);
    }
    Ok(created(inquiry))
}

async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<InquiryKind>,
    vc: Vc,
    Query(query): Query<InquiryQuery>,
) -> AppResult<Json<InquiryList>> {
    vc.require_user()?;
    let page = Page::from_params(PageParams {
        page: query.page,
        per_page: query.per_page,
    });
    let mut tx = state.db.begin().await?;
    let inquiries = inquiry_service::list(&mut tx, kind, query.status.as_deref(), page).await?;
    tx.commit().await?;
    Ok(Json(inquiries))
}

async fn fetch(
    State(state): State<AppState>,
    Extension(kind): Extension<InquiryKind>,
    vc: Vc,
    Path(id): Path<i64>,
) -> AppResult<Json<EntInquiry>> {
    vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let inquiry = inquiry_service::fetch(&mut tx, kind, id).await?;
    tx.commit().await?;
    Ok(Json(inquiry))
}

async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<InquiryKind>,
    vc: Vc,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    vc.require_user()?;
    let mut tx = state.db.begin().await?;
    inquiry_service::delete(&mut tx, kind, id).await?;
    tx.commit().await?;
    Ok(Message::new("Successfully deleted"))
}

async fn respond(
    State(state): State<AppState>,
    Extension(kind): Extension<InquiryKind>,
    vc: Vc,
    Path(id): Path<i64>,
    ValidatedJson(input): ValidatedJson<ResponseInput>,
) -> AppResult<Json<EntInquiry>> {
    vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let (inquiry, mail) = inquiry_service::respond(&mut tx, kind, id, input).await?;
    tx.commit().await?;

    send_detached(state.mailer.clone(), mail);
    Ok(Json(inquiry))
}

async fn stats(
    State(state): State<AppState>,
    Extension(kind): Extension<InquiryKind>,
    vc: Vc,
) -> AppResult<Json<InquiryStats>> {
    vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let stats = inquiry_service::stats(&mut tx, kind).await?;
    tx.commit().await?;
    Ok(Json(stats))
}

async fn bulk_delete(
    State(state): State<AppState>,
    Extension(kind): Extension<InquiryKind>,
    vc: Vc,
    Json(input): Json<BulkDeleteInput>,
) -> AppResult<Json<BulkDeleted>> {
    vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let deleted = inquiry_service::bulk_delete(&mut tx, kind, &input.ids).await?;
    tx.commit().await?;
    Ok(Json(deleted))
}
