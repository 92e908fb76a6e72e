use crate::error::{AppError, AppResult};

/// Who is making the current request.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub user_id: Option<i64>,
    pub session_token: Option<String>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            user_id: None,
            session_token: None,
            request_id,
        }
    }

    pub fn authenticated_user(user_id: i64, session_token: String, request_id: String) -> Self {
        ViewerContext {
            user_id: Some(user_id),
            session_token: Some(session_token),
            request_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The signed-in user's id, or the canonical 401.
    pub fn require_user(&self) -> AppResult<i64> {
        self.user_id.ok_or_else(AppError::unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_viewer_requires_login() {
        let vc = ViewerContext::anonymous("req-1".into());
        assert!(!vc.is_authenticated());
        assert!(matches!(vc.require_user(), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn authenticated_viewer_yields_id() {
        let vc = ViewerContext::authenticated_user(7, "tok".into(), "req-2".into());
        assert_eq!(vc.require_user().unwrap(), 7);
    }
}
