use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("record not found")]
    NotFound,

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("site source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("postcode not found: {query}")]
    GeocodeNotFound { query: String },

    #[error("geocoding failed: {message}")]
    GeocodeFailed { message: String },

    #[error("CSV is missing required headers; found: {}", found.join(", "))]
    CsvSchemaInvalid { found: Vec<String> },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation { message }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::database", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::catalog", %message, "site source unavailable");
        AppError::SourceUnavailable { message }
    }

    pub fn geocode_not_found(query: impl Into<String>) -> Self {
        let query = query.into();
        warn!(target: "app::geocode", %query, "postcode not found");
        AppError::GeocodeNotFound { query }
    }

    pub fn geocode_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::geocode", %message, "geocoding failed");
        AppError::GeocodeFailed { message }
    }

    pub fn csv_schema_invalid(found: Vec<String>) -> Self {
        warn!(
            target: "app::catalog",
            found = %found.join(", "),
            "uploaded CSV is missing required headers"
        );
        AppError::CsvSchemaInvalid { found }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("uniqueness or constraint violation")
            }
            _ => {
                error!(target: "app::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
