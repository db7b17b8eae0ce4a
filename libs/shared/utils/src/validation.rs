use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use reqwest::Url;

use shared_models::error::ValidationFailure;

fn time_of_day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("static time regex"))
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date regex"))
}

/// Parses a `HH:MM` time-of-day string.
pub fn parse_time_of_day(field: &str, value: &str) -> Result<NaiveTime, ValidationFailure> {
    let value = value.trim();
    if !time_of_day_pattern().is_match(value) {
        return Err(ValidationFailure(format!(
            "{} must be a HH:MM time, got '{}'",
            field, value
        )));
    }

    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ValidationFailure(format!("{} is not a valid time", field)))
}

/// Parses a `YYYY-MM-DD` calendar date string.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ValidationFailure> {
    let value = value.trim();
    if !date_pattern().is_match(value) {
        return Err(ValidationFailure(format!(
            "{} must be a YYYY-MM-DD date, got '{}'",
            field, value
        )));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationFailure(format!("{} is not a valid calendar date", field)))
}

/// Validates a `start < end` pair of `HH:MM` strings.
pub fn parse_time_range(start: &str, end: &str) -> Result<(NaiveTime, NaiveTime), ValidationFailure> {
    let start_time = parse_time_of_day("startTime", start)?;
    let end_time = parse_time_of_day("endTime", end)?;
    if start_time >= end_time {
        return Err(ValidationFailure(
            "startTime must be before endTime".to_string(),
        ));
    }
    Ok((start_time, end_time))
}

/// Returns the trimmed text or a validation error when nothing is left.
pub fn non_empty_trimmed(field: &str, value: &str) -> Result<String, ValidationFailure> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationFailure(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Accepts absolute http(s) URLs, as produced by the upload service.
pub fn validate_url(field: &str, value: &str) -> Result<String, ValidationFailure> {
    let trimmed = value.trim();
    let url = Url::parse(trimmed)
        .map_err(|_| ValidationFailure(format!("{} must be an absolute URL", field)))?;

    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(ValidationFailure(format!(
            "{} must use http or https, got {}",
            field, other
        ))),
    }
}

pub fn validate_email(value: &str) -> Result<String, ValidationFailure> {
    let email = value.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);

    if valid {
        Ok(email)
    } else {
        Err(ValidationFailure(format!("Invalid email address: {}", value)))
    }
}
