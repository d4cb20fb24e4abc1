use axum::{http::StatusCode, response::{IntoResponse, Response}};

use crate::res;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(what) => {
                tracing::debug!("{what} not found");
                (StatusCode::NOT_FOUND, res::sorry(&what)).into_response()
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
            AppError::Internal(err) => {
                tracing::error!("{err}\n\n{}", err.backtrace());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.",
                )
                    .into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row".to_owned()),
            err => Self::Internal(anyhow::Error::from(err)),
        }
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::Internal(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Internal(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::migrate::MigrateError);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(url::ParseError);
apperr_impl!(std::io::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_the_only_not_found_sqlx_error() {
        assert!(AppError::from(sqlx::Error::RowNotFound).is_not_found());
        assert!(!AppError::from(sqlx::Error::PoolTimedOut).is_not_found());
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::not_found("room").into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("no".into()).into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::from("boom").into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
