use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

// constraint names from the init migration
pub const SEAT_CONSTRAINT: &str = "unique_seat_per_session";
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

pub const SEAT_TAKEN: &str = "This seat is already taken for this session.";
pub const CONCURRENT_BOOKING: &str =
    "These seats were being booked by another request at the same time. Please retry.";
pub const EMAIL_TAKEN: &str = "user with this email already exists.";

/// Field-scoped validation messages, keyed by attribute name.
///
/// Nested entries use a path such as `tickets[1].seat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Merges `other` under `prefix`, e.g. `tickets[0]` + `row` -> `tickets[0].row`.
    pub fn merge_prefixed(&mut self, prefix: &str, other: FieldErrors) {
        for (field, messages) in other.0 {
            let key = format!("{prefix}.{field}");
            self.0.entry(key).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded, the collected errors otherwise.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            for err in list {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value ({})", err.code));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        AppError::NotFound { entity, id }
    }

    /// Field errors carried by this error, if it is (or classifies as) a validation error.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        match self {
            AppError::Validation(errors) => Some(errors.clone()),
            AppError::Database(err) => match classify_unique_violation(err) {
                Some(UniqueViolation::Seat) => Some(FieldErrors::single("seat", SEAT_TAKEN)),
                Some(UniqueViolation::Email) => Some(FieldErrors::single("email", EMAIL_TAKEN)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum UniqueViolation {
    Seat,
    Email,
    Other(String),
}

// 40P01 deadlock detected, 40001 serialization failure
fn is_lock_conflict_code(code: &str) -> bool {
    matches!(code, "40P01" | "40001")
}

/// The transaction lost a lock race and was aborted by the database.
pub fn is_lock_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref().is_some_and(is_lock_conflict_code),
        _ => false,
    }
}

/// Postgres reports unique violations with SQLSTATE 23505.
fn classify_unique_violation(err: &sqlx::Error) -> Option<UniqueViolation> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    Some(match db_err.constraint() {
        Some(SEAT_CONSTRAINT) => UniqueViolation::Seat,
        Some(EMAIL_CONSTRAINT) => UniqueViolation::Email,
        other => UniqueViolation::Other(other.unwrap_or("unknown").to_string()),
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(errors) = self.field_errors() {
            let body = json!({
                "error": "Validation failed",
                "code": "VALIDATION_ERROR",
                "errors": errors,
            });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }

        let (status, code, message) = match &self {
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": message, "code": code }));
        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        _ if is_lock_conflict(err) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            CONCURRENT_BOOKING.to_string(),
        ),
        _ => {
            if let Some(UniqueViolation::Other(constraint)) = classify_unique_violation(err) {
                return (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                );
            }
            tracing::error!(error = %err, "database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
