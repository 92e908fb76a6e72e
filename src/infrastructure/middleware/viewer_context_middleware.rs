// ViewerContext middleware
// Resolves the session cookie and injects a request-scoped ViewerContext into extensions.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    infrastructure::{
        security::{cookie_value, resolve_session, SESSION_COOKIE},
        viewer::ViewerContext,
    },
};

pub async fn viewer_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = format!("req-{}", Uuid::new_v4());
    let viewer_context = match session_token(request.headers()) {
        Some(token) => authenticate(&state, token, request_id).await,
        None => ViewerContext::anonymous(request_id),
    };

    request.extensions_mut().insert(Arc::new(viewer_context));
    next.run(request).await
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| cookie_value(raw, SESSION_COOKIE).map(str::to_owned))
}

/// Unknown, expired or unreadable sessions degrade to an anonymous viewer.
async fn authenticate(state: &AppState, token: String, request_id: String) -> ViewerContext {
    let resolved = match state.db.pool().acquire().await {
        Ok(mut conn) => resolve_session(&mut conn, &token).await,
        Err(e) => Err(e.into()),
    };

    match resolved {
        Ok(Some(user_id)) => ViewerContext::authenticated_user(user_id, token, request_id),
        Ok(None) => ViewerContext::anonymous(request_id),
        Err(e) => {
            warn!(request_id = %request_id, "Session lookup failed: {}", e);
            ViewerContext::anonymous(request_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_token_reads_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("csrf=1; session=tok123"),
        );
        assert_eq!(session_token(&headers), Some("tok123".to_string()));
    }

    #[test]
    fn missing_cookie_means_no_token() {
        let headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
    }
}
