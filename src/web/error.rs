use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::api::ApiError;
use crate::auth::storage::StorageError;
use crate::auth::TokenError;
use crate::web::pages;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid state. Please try the authorization process again.")]
    InvalidState,

    #[error("Error retrieving access token: {0}")]
    Token(#[from] TokenError),

    #[error("{context}")]
    Api {
        context: String,
        status: StatusCode,
        #[source]
        source: ApiError,
    },

    #[error("Failed to save: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

impl WebError {
    pub fn api(context: impl Into<String>) -> impl FnOnce(ApiError) -> WebError {
        Self::api_with_status(context, StatusCode::BAD_GATEWAY)
    }

    /// Like [`WebError::api`], answering with `status` instead of 502.
    pub fn api_with_status(
        context: impl Into<String>,
        status: StatusCode,
    ) -> impl FnOnce(ApiError) -> WebError {
        let context = context.into();
        move |source| match source {
            ApiError::Token(err) => WebError::Token(err),
            source => WebError::Api {
                context,
                status,
                source,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) | WebError::InvalidState => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Token(TokenError::AuthExchange(_)) => StatusCode::BAD_GATEWAY,
            WebError::Token(_) | WebError::Storage(_) | WebError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebError::Api { status, .. } => *status,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }

        let detail = match &self {
            WebError::Api { source, .. } => Some(
                source
                    .body()
                    .filter(|body| !body.is_empty())
                    .map(str::to_owned)
                    .unwrap_or_else(|| source.to_string()),
            ),
            _ => None,
        };

        let page = pages::error(&self.to_string(), detail.as_deref());

        (status, Html(page)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_failure() {
        assert_eq!(
            WebError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(WebError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            WebError::Token(TokenError::NoRefreshToken).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let api = WebError::api("Could not play")(ApiError::Status {
            status: 500,
            body: "{}".into(),
        });
        assert_eq!(api.status(), StatusCode::BAD_GATEWAY);

        let to_error =
            WebError::api_with_status("Could not isolate", StatusCode::INTERNAL_SERVER_ERROR);
        let isolate = to_error(ApiError::Status {
            status: 409,
            body: "{}".into(),
        });
        assert_eq!(isolate.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn token_failures_inside_api_calls_are_token_errors() {
        let err = WebError::api("Could not play")(ApiError::Token(TokenError::NoRefreshToken));

        assert!(matches!(err, WebError::Token(TokenError::NoRefreshToken)));
    }
}
