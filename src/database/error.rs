use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde_json::{json, Value};
use warp::{http::StatusCode, reject::Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    PayloadTooLarge,
    InternalServerError,
}

impl ErrorKind {
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::InvalidRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Conflict => 409,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::InternalServerError => 500,
        }
    }

    fn default_info(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "Invalid request",
            ErrorKind::Unauthorized => "Authentication credentials were not provided",
            ErrorKind::Forbidden => "You don't have permission to perform this action",
            ErrorKind::NotFound => "Not found",
            ErrorKind::MethodNotAllowed => "Method not allowed",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::PayloadTooLarge => "Payload too large",
            ErrorKind::InternalServerError => "Internal server error",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            fields: BTreeMap::new(),
        }
    }

    pub fn default(self) -> Error {
        self.new(self.default_info())
    }
}

/// Error reported to the caller. `fields` carries per-field validation
/// messages; when it is empty the body is `{"detail": info}`.
#[derive(Debug, Clone)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self.code {
            400 => ErrorKind::InvalidRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            405 => ErrorKind::MethodNotAllowed,
            409 => ErrorKind::Conflict,
            413 => ErrorKind::PayloadTooLarge,
            _ => ErrorKind::InternalServerError,
        }
    }

    pub fn body(&self) -> Value {
        if !self.fields.is_empty() {
            return json!(self.fields);
        }

        json!({ "detail": self.info.as_deref().unwrap_or("") })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) => write!(f, "{} ({})", self.code, info)?,
            None => write!(f, "{}", self.code)?,
        }
        for (field, messages) in self.fields.iter() {
            write!(f, " {field}: {}", messages.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl warp::reject::Reject for Error {}

/// Collects per-field validation messages before failing a write.
#[derive(Debug, Default)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn into_result(self) -> Result<(), Error> {
        if self.inner.is_empty() {
            return Ok(());
        }

        Err(Error {
            code: ErrorKind::InvalidRequest.code(),
            info: Some(String::from("Validation failed")),
            fields: self.inner,
        })
    }
}

pub struct QueryError {
    kind: ErrorKind,
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            kind: ErrorKind::InternalServerError,
            info,
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) if e.is_unique_violation() => Self {
                kind: ErrorKind::Conflict,
                info: String::from("Object already exists"),
            },
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => Self {
                kind: ErrorKind::InvalidRequest,
                info: String::from("Referenced object doesn't exist"),
            },
            sqlx::Error::Database(e) if e.is_check_violation() => Self {
                kind: ErrorKind::InvalidRequest,
                info: format!("{e}"),
            },
            sqlx::Error::RowNotFound => Self {
                kind: ErrorKind::NotFound,
                info: String::from("Not found"),
            },
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        if value.kind == ErrorKind::InternalServerError {
            log::error!("Query failed: {}", value.info);
        }
        value.kind.new(&value.info)
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl CacheError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        log::error!("Cache failed: {}", value.info);
        ErrorKind::InternalServerError.new(&value.info)
    }
}

/// Failed conversion of a single request field.
#[derive(Debug)]
pub struct TypeError {
    field: String,
    info: String,
}

impl TypeError {
    pub fn new(field: &str, info: &str) -> Self {
        Self {
            field: field.to_string(),
            info: info.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn info(&self) -> &str {
        &self.info
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.info)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        let mut errors = FieldErrors::new();
        errors.push(&value.field, value.info);
        match errors.into_result() {
            Err(e) => e,
            Ok(()) => ErrorKind::InvalidRequest.default(),
        }
    }
}

impl From<TypeError> for Rejection {
    fn from(value: TypeError) -> Self {
        Error::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_body_without_fields() {
        let error = ErrorKind::NotFound.new("No recipe exists with specified id");

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            error.body(),
            json!({ "detail": "No recipe exists with specified id" })
        );
    }

    #[test]
    fn field_errors_are_grouped_per_field() {
        let mut errors = FieldErrors::new();
        errors.push("tags", "Tags must not be empty");
        errors.push("ingredients", "Ingredient 3 is listed twice");
        errors.push("ingredients", "Amount must be at least 1");

        let error = errors.into_result().unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidRequest);
        assert_eq!(
            error.body(),
            json!({
                "ingredients": ["Ingredient 3 is listed twice", "Amount must be at least 1"],
                "tags": ["Tags must not be empty"],
            })
        );
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn type_error_becomes_field_error() {
        let error: Error = TypeError::new("cooking_time", "Expected a number").into();

        assert_eq!(error.code, 400);
        assert_eq!(error.body(), json!({ "cooking_time": ["Expected a number"] }));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let error: Error = QueryError::from(sqlx::Error::RowNotFound).into();

        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pool_errors_are_internal() {
        let error: Error = QueryError::from(sqlx::Error::PoolTimedOut).into();

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.info.as_deref(), Some("Pool timed out"));
    }
}
