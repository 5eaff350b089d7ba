use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::config::AppConfig;

/// Failure of an account operation, mapped onto HTTP status codes at the edge.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Not authorized, please login")]
    NotAuthenticated,
    #[error("{0}")]
    NotFound(String),
    #[error("Email not sent, please try again")]
    EmailNotSent(#[source] anyhow::Error),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) | Self::InvalidCredentials(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::EmailNotSent(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stack(&self) -> String {
        match self {
            Self::EmailNotSent(e) | Self::Internal(e) => format!("{e:?}"),
            other => format!("{other:?}"),
        }
    }
}

impl From<JsonRejection> for AccountError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub stack: Option<String>,
}

/// Debug detail of an error response, picked up by [`attach_error_stack`].
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub stack: String,
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        let message = self.to_string();
        let mut response = (
            status,
            Json(ErrorBody {
                message: message.clone(),
                stack: None,
            }),
        )
            .into_response();
        response.extensions_mut().insert(ErrorReport {
            message,
            stack: self.stack(),
        });
        response
    }
}

/// Response middleware: puts the error trace into the body in development.
pub async fn attach_error_stack(
    State(config): State<Arc<AppConfig>>,
    mut response: Response,
) -> Response {
    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };
    if !config.expose_error_stack() {
        return response;
    }
    let status = response.status();
    (
        status,
        Json(ErrorBody {
            message: report.message,
            stack: Some(report.stack),
        }),
    )
        .into_response()
}
