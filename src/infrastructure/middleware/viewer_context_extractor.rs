// ViewerContext extractor - hands the middleware's ViewerContext to handlers

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::infrastructure::viewer::ViewerContext;

/// Cheap-to-clone handle on the request's [`ViewerContext`].
///
/// ```ignore
/// async fn handler(vc: Vc) -> AppResult<Json<Value>> {
///     let user_id = vc.require_user()?;
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn new(vc: Arc<ViewerContext>) -> Self {
        Self(vc)
    }
}

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or_else(|| AppError::Internal("ViewerContext middleware not installed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn extracts_context_from_extensions() {
        let mut request = Request::builder().uri("/").body(()).unwrap();
        request
            .extensions_mut()
            .insert(Arc::new(ViewerContext::authenticated_user(
                3,
                "tok".into(),
                "req-test".into(),
            )));
        let (mut parts, _) = request.into_parts();

        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(vc.user_id, Some(3));
        assert_eq!(vc.request_id, "req-test");
    }

    #[tokio::test]
    async fn missing_context_is_an_internal_error() {
        let request = Request::builder().uri("/").body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let result = Vc::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
