use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Why a request was refused. The code string is all the caller sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    TooFast,
    ContentShort,
    TooOld,
    NotFound,
    Denied,
    Muted,
}

impl Reason {
    pub fn code(self) -> &'static str {
        match self {
            Reason::TooFast => "too_fast",
            Reason::ContentShort => "content_short",
            Reason::TooOld => "too_old",
            Reason::NotFound => "not_found",
            Reason::Denied => "denied",
            Reason::Muted => "muted",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ForumError {
    #[error("unauthenticated")] Unauthenticated,
    #[error("{0}")] Forbidden(Reason),
    #[error("gone")] Gone,
    #[error("{0}")] Validation(&'static str),
    #[error("data_conflict")] Conflict,
    #[error("db_execute_failed")] Persistence(String),
}

pub type ForumResult<T> = Result<T, ForumError>;

impl ForumError {
    pub fn code(&self) -> String {
        match self {
            // never leak store detail
            ForumError::Persistence(_) => "db_execute_failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RepoError> for ForumError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ForumError::Gone,
            RepoError::Conflict => ForumError::Conflict,
            RepoError::Internal(detail) => ForumError::Persistence(detail),
        }
    }
}

impl ResponseError for ForumError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ForumError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ForumError::Forbidden(Reason::ContentShort) => StatusCode::UNPROCESSABLE_ENTITY,
            ForumError::Forbidden(Reason::TooOld) => StatusCode::TOO_MANY_REQUESTS,
            ForumError::Forbidden(_) => StatusCode::FORBIDDEN,
            ForumError::Gone => StatusCode::GONE,
            ForumError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ForumError::Conflict => StatusCode::CONFLICT,
            ForumError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.code() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_detail_stays_internal() {
        let e: ForumError = RepoError::Internal("relation \"post\" does not exist".into()).into();
        assert_eq!(e.code(), "db_execute_failed");
        assert_eq!(e.status_code(), actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn forbidden_reasons_map_to_statuses() {
        use actix_web::http::StatusCode;
        assert_eq!(ForumError::Forbidden(Reason::TooFast).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ForumError::Forbidden(Reason::ContentShort).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ForumError::Forbidden(Reason::TooOld).code(), "too_old");
    }
}
