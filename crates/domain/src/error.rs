use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Shared error type used across all Vexa crates.
///
/// Variants map one-to-one onto the error taxonomy: each carries its own
/// HTTP status and retry policy, applied uniformly by [`IntoResponse`] below
/// and by the consumer/promoter loops' ack decisions.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("auth: {0}")]
    Auth(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("limit: {0}")]
    Limit(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("container driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("message bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("malformed stream payload: {0}")]
    PersistentData(String),

    #[error("transient data error: {0}")]
    TransientData(String),

    #[error("unrecoverable: {0}")]
    Unrecoverable(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a consumer loop should ack the stream message that produced
    /// this error. `false` means the entry stays pending and is reclaimed
    /// later (transient); `true` means it is logged and dropped.
    pub fn is_ack_on_fail(&self) -> bool {
        matches!(
            self,
            Error::PersistentData(_) | Error::Validation(_) | Error::NotFound(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Limit(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DriverUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BusUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Unrecoverable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PersistentData(_) | Error::TransientData(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(_) | Error::Redis(_) | Error::Docker(_) | Error::Http(_)
            | Error::Json(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}
