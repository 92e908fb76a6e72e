// InquiryService - partnership requests and contact messages
// Mail leaves the transaction as a message for the caller to dispatch after commit.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use validator::Validate;

use crate::entities::ent_inquiry::{InquiryStats, NewInquiry, STATUS_PENDING, STATUS_RESPONDED};
use crate::entities::{EntInquiry, InquiryKind};
use crate::error::{AppError, AppResult};
use crate::framework::pagination::{Page, PageInfo};
use crate::infrastructure::mailer::MailMessage;

pub const MAX_BULK_IDS: usize = 100;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InquiryInput {
    #[serde(alias = "firstName")]
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,
    #[serde(alias = "lastName")]
    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Organization must be between 1 and 100 characters"))]
    pub organization: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Subject must be between 1 and 100 characters"))]
    pub subject: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResponseInput {
    #[validate(length(min = 1, max = 2000, message = "Response must be between 1 and 2000 characters"))]
    pub response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeleteInput {
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InquiryList {
    pub inquiries: Vec<EntInquiry>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BulkDeleted {
    pub deleted: u64,
    pub requested: usize,
}

fn parse_status(status: Option<&str>) -> AppResult<Option<&str>> {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) if s == STATUS_PENDING || s == STATUS_RESPONDED => Ok(Some(s)),
        Some(other) => Err(AppError::Validation(format!("Unknown status '{}'", other))),
    }
}

/// Public submission. Partnership requests need an organization and are unique per email.
pub async fn create(
    conn: &mut SqliteConnection,
    kind: InquiryKind,
    input: InquiryInput,
    notify: Option<&str>,
) -> AppResult<(EntInquiry, Option<MailMessage>)> {
    input.validate()?;
    if kind == InquiryKind::Partnership {
        if input.organization.is_none() {
            return Err(AppError::Validation("Organization is required".to_string()));
        }
        if EntInquiry::email_exists(conn, kind, &input.email).await? {
            return Err(AppError::Conflict(
                "A partnership inquiry with this email already exists".to_string(),
            ));
        }
    }

    let inquiry = EntInquiry::create(
        conn,
        kind,
        &NewInquiry {
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            organization: input.organization,
            subject: input.subject,
            message: input.message,
        },
    )
    .await?;
    info!(inquiry_id = inquiry.id, kind = %kind, "Inquiry received");

    let mail = notify.map(|to| MailMessage {
        to: to.to_string(),
        reply_to: Some(inquiry.email.clone()),
        subject: format!("New {}: {}", kind.label().to_lowercase(), inquiry.subject),
        body: format!(
            "From: {} {} <{}>\nOrganization: {}\nPhone: {}\n\n{}",
            inquiry.first_name,
            inquiry.last_name,
            inquiry.email,
            inquiry.organization.as_deref().unwrap_or("-"),
            inquiry.phone.as_deref().unwrap_or("-"),
            inquiry.message
        ),
    });
    Ok((inquiry, mail))
}

pub async fn list(
    conn: &mut SqliteConnection,
    kind: InquiryKind,
    status: Option<&str>,
    page: Page,
) -> AppResult<InquiryList> {
    let status = parse_status(status)?;
    let total = EntInquiry::count(conn, kind, status).await?;
    let inquiries = EntInquiry::gen_page(conn, kind, status, page.limit(), page.offset()).await?;
    Ok(InquiryList {
        inquiries,
        pagination: page.info(total),
    })
}

pub async fn fetch(conn: &mut SqliteConnection, kind: InquiryKind, id: i64) -> AppResult<EntInquiry> {
    EntInquiry::gen_enforce(conn, kind, id).await
}

pub async fn delete(conn: &mut SqliteConnection, kind: InquiryKind, id: i64) -> AppResult<()> {
    if !EntInquiry::delete(conn, kind, id).await? {
        return Err(AppError::not_found(kind.label()));
    }
    Ok(())
}

/// Marks the inquiry responded and prepares the reply to its sender.
pub async fn respond(
    conn: &mut SqliteConnection,
    kind: InquiryKind,
    id: i64,
    input: ResponseInput,
) -> AppResult<(EntInquiry, MailMessage)> {
    input.validate()?;
    EntInquiry::gen_enforce(conn, kind, id).await?;
    EntInquiry::respond(conn, id, &input.response).await?;
    let inquiry = EntInquiry::gen_enforce(conn, kind, id).await?;

    let mail = MailMessage {
        to: inquiry.email.clone(),
        reply_to: None,
        subject: format!("Re: {}", inquiry.subject),
        body: input.response,
    };
    Ok((inquiry, mail))
}

pub async fn stats(conn: &mut SqliteConnection, kind: InquiryKind) -> AppResult<InquiryStats> {
    EntInquiry::stats(conn, kind).await
}

pub async fn bulk_delete(conn: &mut SqliteConnection, kind: InquiryKind, ids: &[i64]) -> AppResult<BulkDeleted> {
    if ids.is_empty() {
        return Err(AppError::Validation("No ids given".to_string()));
    }
    if ids.len() > MAX_BULK_IDS {
        return Err(AppError::Validation(format!("At most {} ids per request", MAX_BULK_IDS)));
    }
    let deleted = EntInquiry::delete_many(conn, kind, ids).await?;
    info!(kind = %kind, deleted, "Inquiries bulk-deleted");
    Ok(BulkDeleted {
        deleted,
        requested: ids.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_accepts_known_values() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some(" ")).unwrap(), None);
        assert_eq!(parse_status(Some("pending")).unwrap(), Some("pending"));
        assert_eq!(parse_status(Some("responded")).unwrap(), Some("responded"));
        assert!(matches!(parse_status(Some("archived")), Err(AppError::Validation(_))));
    }
}
