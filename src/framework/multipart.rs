// Multipart form extraction: text fields plus uploaded image files

use axum::extract::{FromRequest, Multipart, Request};
use std::collections::HashMap;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::infrastructure::storage::ImageUpload;

/// A fully buffered `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, ImageUpload>,
}

impl FormData {
    pub async fn from_multipart(mut multipart: Multipart, max_bytes: usize) -> AppResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    if bytes.len() > max_bytes {
                        return Err(AppError::PayloadTooLarge(format!(
                            "{} exceeds the {} MB upload limit",
                            file_name,
                            max_bytes / (1024 * 1024)
                        )));
                    }
                    // browsers send an empty part for an untouched file input
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        ImageUpload {
                            file_name,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await?;
                    form.fields.entry(name).or_default().push(text);
                }
            }
        }
        Ok(form)
    }

    /// First value of a text field, trimmed; empty values count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// First value of a text field exactly as sent. Only an empty value counts as absent.
    pub fn raw(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .filter(|value| !value.is_empty())
            .cloned()
    }

    /// Untrimmed required field, for secrets where whitespace is significant.
    pub fn required_raw(&self, name: &str) -> AppResult<String> {
        self.raw(name)
            .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
    }

    /// First present value among several accepted spellings of a field.
    pub fn text_any(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.text(name))
    }

    pub fn required(&self, name: &str) -> AppResult<String> {
        self.text(name)
            .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
    }

    /// Every value of a repeated field. A single JSON array or comma list is expanded.
    pub fn list(&self, name: &str) -> Vec<String> {
        let Some(values) = self.fields.get(name) else {
            return Vec::new();
        };
        values
            .iter()
            .flat_map(|value| {
                let value = value.trim();
                if value.starts_with('[') {
                    serde_json::from_str::<Vec<String>>(value).unwrap_or_default()
                } else {
                    value.split(',').map(str::to_string).collect()
                }
            })
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Take the uploaded file under the first matching field name.
    pub fn take_file(&mut self, names: &[&str]) -> Option<ImageUpload> {
        names.iter().find_map(|name| self.files.remove(*name))
    }

    pub fn require_file(&mut self, names: &[&str]) -> AppResult<ImageUpload> {
        let label = names.first().copied().unwrap_or("image");
        self.take_file(names)
            .ok_or_else(|| AppError::Validation(format!("{} is required", label)))
    }
}

impl FromRequest<AppState> for FormData {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        FormData::from_multipart(multipart, state.config.storage.max_upload_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> FormData {
        let mut data = FormData::default();
        for (name, value) in fields {
            data.fields
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        data
    }

    #[test]
    fn blank_text_counts_as_missing() {
        let data = form(&[("title", "  "), ("caption", " hello ")]);
        assert_eq!(data.text("title"), None);
        assert_eq!(data.text("caption").as_deref(), Some("hello"));
        assert!(data.required("title").is_err());
    }

    #[test]
    fn raw_text_keeps_surrounding_whitespace() {
        let data = form(&[("password", "  secret  "), ("blank", "")]);
        assert_eq!(data.raw("password").as_deref(), Some("  secret  "));
        assert_eq!(data.required_raw("password").unwrap(), "  secret  ");
        assert!(data.required_raw("blank").is_err());
        assert!(data.required_raw("missing").is_err());
    }

    #[test]
    fn list_accepts_repeated_json_and_comma_values() {
        let repeated = form(&[("tags", "ANXIETY"), ("tags", "STRESS")]);
        assert_eq!(repeated.list("tags"), vec!["ANXIETY", "STRESS"]);

        let json = form(&[("tags", r#"["ANXIETY","GRIEF"]"#)]);
        assert_eq!(json.list("tags"), vec!["ANXIETY", "GRIEF"]);

        let comma = form(&[("tags", "ANXIETY, GRIEF,")]);
        assert_eq!(comma.list("tags"), vec!["ANXIETY", "GRIEF"]);

        assert!(form(&[]).list("tags").is_empty());
    }

    #[test]
    fn files_are_taken_once() {
        let mut data = FormData::default();
        data.files.insert(
            "image".to_string(),
            ImageUpload {
                file_name: "a.png".to_string(),
                bytes: vec![1],
            },
        );
        assert!(data.take_file(&["profile_image", "image"]).is_some());
        assert!(data.require_file(&["image"]).is_err());
    }
}
