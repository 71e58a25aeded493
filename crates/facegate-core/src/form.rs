//! Client-side form validation.
//!
//! A failed check means the request is never sent; the message is shown
//! next to the form instead.

use crate::preview::SelectedFile;
use crate::types::{NewUser, TrainingParams, UserId};
use thiserror::Error;
use uuid::Uuid;

/// Extensions accepted for stored photos.
pub const PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Extensions accepted for prediction and verification probes.
pub const PROBE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Largest photo the backend stores.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trimmed, non-empty name and email; an empty password counts as absent.
pub fn user_fields(
    name: &str,
    email: &str,
    password: Option<&str>,
) -> Result<NewUser, ValidationError> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() || email.is_empty() {
        let field = if name.is_empty() { "name" } else { "email" };
        return Err(ValidationError::new(field, "Please fill in all fields"));
    }
    Ok(NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password: password
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    })
}

pub fn selected_user(selected: Option<UserId>) -> Result<UserId, ValidationError> {
    selected.ok_or_else(|| ValidationError::new("user", "❌ Please select a user first"))
}

/// Parse a claimed user id typed by the operator.
pub fn claimed_user(raw: &str) -> Result<UserId, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new("user_id", "Please enter a user ID"));
    }
    raw.parse()
        .map_err(|_| ValidationError::new("user_id", format!("Invalid user ID: {raw}")))
}

pub fn one_file(files: &[SelectedFile]) -> Result<&SelectedFile, ValidationError> {
    files
        .first()
        .ok_or_else(|| ValidationError::new("file", "Please select a photo"))
}

pub fn some_files(files: &[SelectedFile]) -> Result<(), ValidationError> {
    if files.is_empty() {
        return Err(ValidationError::new(
            "files",
            "Please select at least one photo",
        ));
    }
    Ok(())
}

fn extension_in(file: &SelectedFile, allowed: &[&str], message: &str) -> Result<(), ValidationError> {
    match file.extension() {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(ValidationError::new(
            "file",
            format!("{}: {message}", file.name),
        )),
    }
}

/// A photo the backend will accept for storage.
pub fn photo_file(file: &SelectedFile) -> Result<(), ValidationError> {
    extension_in(file, &PHOTO_EXTENSIONS, "only JPG/PNG photos are allowed")?;
    if file.len() > MAX_PHOTO_BYTES {
        return Err(ValidationError::new(
            "file",
            format!(
                "{}: photo must not exceed {}MB",
                file.name,
                MAX_PHOTO_BYTES / (1024 * 1024)
            ),
        ));
    }
    Ok(())
}

/// A probe image for prediction, verification or login.
pub fn probe_file(file: &SelectedFile) -> Result<(), ValidationError> {
    extension_in(file, &PROBE_EXTENSIONS, "only JPG/PNG images are allowed")
}

pub fn training_params(params: &TrainingParams) -> Result<(), ValidationError> {
    if params.epochs == 0 {
        return Err(ValidationError::new("epochs", "Epochs must be at least 1"));
    }
    if params.batch_size == 0 {
        return Err(ValidationError::new(
            "batch_size",
            "Batch size must be at least 1",
        ));
    }
    if !(params.validation_split > 0.0 && params.validation_split < 1.0) {
        return Err(ValidationError::new(
            "validation_split",
            "Validation split must be between 0 and 1",
        ));
    }
    Ok(())
}

pub fn token(raw: &str) -> Result<Uuid, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new("token", "Token is required"));
    }
    Uuid::parse_str(raw).map_err(|_| ValidationError::new("token", "Invalid token format"))
}
