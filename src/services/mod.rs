// Services - business operations over one request transaction
// Every operation takes the request's connection; handlers own commit.

pub mod comment_service;
pub mod event_service;
pub mod feed_service;
pub mod group_service;
pub mod identity_service;
pub mod inquiry_service;
pub mod post_service;

use crate::error::AppResult;
use crate::infrastructure::storage::{release_all, ImageStore};

/// A mutation's result plus stored objects to release once it has committed.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub release: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            release: Vec::new(),
        }
    }

    pub fn releasing(value: T, release: Vec<String>) -> Self {
        Self { value, release }
    }
}

/// Pass `result` through, releasing a freshly uploaded object when it failed.
pub async fn keep_or_release<T>(
    images: &dyn ImageStore,
    uploaded: Option<&str>,
    result: AppResult<T>,
) -> AppResult<T> {
    if result.is_err() {
        if let Some(url) = uploaded {
            release_all(images, vec![url.to_string()]).await;
        }
    }
    result
}
