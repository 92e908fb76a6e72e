// Input validation helpers shared by the JSON and multipart entry points

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{AppError, AppResult};

static STATE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid pattern"));
static ZIP_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").expect("valid pattern"));

/// JSON body that has passed its `Validate` rules.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Character-count bounds, reported with the field name.
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

pub fn check_state(value: &str) -> AppResult<()> {
    if STATE_CODE.is_match(value) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "state must be a two-letter uppercase code".to_string(),
        ))
    }
}

pub fn check_zip(value: &str) -> AppResult<()> {
    if ZIP_CODE.is_match(value) {
        Ok(())
    } else {
        Err(AppError::Validation("zip must be exactly 5 digits".to_string()))
    }
}

pub fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> AppResult<()> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(
                "latitude must be between -90 and 90".to_string(),
            ));
        }
    }
    if let Some(lng) = longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::Validation(
                "longitude must be between -180 and 180".to_string(),
            ));
        }
    }
    Ok(())
}

/// Parse a required form value into a number or similar scalar.
pub fn parse_value<T: FromStr>(field: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{} is not a valid value", field)))
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, the HTML `datetime-local` form and bare dates.
pub fn parse_datetime(field: &str, value: &str) -> AppResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(AppError::Validation(format!("{} is not a valid date", field)))
}

/// Whether a group or event meets online or in person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeetingType {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "in-person")]
    InPerson,
}

impl MeetingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingType::Online => "online",
            MeetingType::InPerson => "in-person",
        }
    }
}

impl fmt::Display for MeetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeetingType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "online" => Ok(MeetingType::Online),
            "in-person" => Ok(MeetingType::InPerson),
            _ => Err(AppError::Validation(
                "type must be one of: online, in-person".to_string(),
            )),
        }
    }
}
