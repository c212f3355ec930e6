//! Request parsing shared by the handlers.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use service_core::error::AppError;
use std::collections::HashMap;

use crate::services::moderation::Upload;

/// A fully buffered multipart form.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Form::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                    form.files.insert(name, Upload { file_name, data });
                }
                None => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File too big".to_string())
    } else {
        AppError::BadRequest(anyhow::anyhow!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Parse a path id. Anything but a positive integer is invalid input.
pub fn parse_id(raw: &str, what: &str) -> Result<i32, AppError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid {} ID", what)))
}

/// Parse an optional boolean query flag; absent means `false`.
pub fn parse_flag(raw: Option<&str>, name: &str) -> Result<bool, AppError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(_) => Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must be true or false",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("7", "exhibit").unwrap(), 7);
        for raw in ["0", "-3", "abc", "1.5", ""] {
            let err = parse_id(raw, "exhibit").unwrap_err();
            assert_eq!(err.code(), "invalid_input", "{}", raw);
        }
    }

    #[test]
    fn flags_accept_booleans_only() {
        assert!(!parse_flag(None, "with_exhibits").unwrap());
        assert!(parse_flag(Some("true"), "with_exhibits").unwrap());
        assert!(parse_flag(Some("TRUE"), "with_exhibits").unwrap());
        assert!(!parse_flag(Some("false"), "with_exhibits").unwrap());
        assert!(parse_flag(Some("yes please"), "with_exhibits").is_err());
    }
}
