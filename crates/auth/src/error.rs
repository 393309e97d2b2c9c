//! Authentication errors
//!
//! Three disjoint "unauthorized" kinds end a request with 401. Everything
//! else (misconfiguration, bridge misuse, arbitrary callback failures) is an
//! internal error and surfaces as 500.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use warden_common::MAX_JWT_LEEWAY;

use crate::bridge::BridgeError;

/// Description and challenges carried by every unauthorized error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unauthorized {
    pub description: String,
    pub challenges: Vec<String>,
}

impl Unauthorized {
    pub fn new(description: impl Into<String>, challenges: &[String]) -> Self {
        Self {
            description: description.into(),
            challenges: challenges.to_vec(),
        }
    }

    /// Value of the `WWW-Authenticate` header, `None` when no challenge is set.
    pub fn www_authenticate(&self) -> Option<String> {
        if self.challenges.is_empty() {
            None
        } else {
            Some(self.challenges.join(", "))
        }
    }
}

/// Authentication error
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request was understood but the credentials are invalid.
    #[error("authentication failure: {}", .0.description)]
    AuthenticationFailure(Unauthorized),

    /// The request is not in a form this backend understands.
    #[error("backend not applicable: {}", .0.description)]
    BackendNotApplicable(Unauthorized),

    /// Credentials were well formed but no user matches them.
    #[error("user not found: {}", .0.description)]
    UserNotFound(Unauthorized),

    /// A callback or backend was used in a mode it does not support.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Any other failure raised by application callbacks.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn authentication_failure(description: impl Into<String>, challenges: &[String]) -> Self {
        Self::AuthenticationFailure(Unauthorized::new(description, challenges))
    }

    pub fn not_applicable(description: impl Into<String>, challenges: &[String]) -> Self {
        Self::BackendNotApplicable(Unauthorized::new(description, challenges))
    }

    pub fn user_not_found(description: impl Into<String>, challenges: &[String]) -> Self {
        Self::UserNotFound(Unauthorized::new(description, challenges))
    }

    /// The unauthorized payload, if this is one of the three 401 kinds.
    pub fn unauthorized(&self) -> Option<&Unauthorized> {
        match self {
            AuthError::AuthenticationFailure(u)
            | AuthError::BackendNotApplicable(u)
            | AuthError::UserNotFound(u) => Some(u),
            AuthError::Configuration(_) | AuthError::Bridge(_) | AuthError::Internal(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.unauthorized().is_some()
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, AuthError::BackendNotApplicable(_))
    }

    pub fn www_authenticate(&self) -> Option<String> {
        self.unauthorized().and_then(Unauthorized::www_authenticate)
    }

    fn code(&self) -> &'static str {
        match self {
            AuthError::AuthenticationFailure(_) => "AUTHENTICATION_FAILURE",
            AuthError::BackendNotApplicable(_) => "BACKEND_NOT_APPLICABLE",
            AuthError::UserNotFound(_) => "USER_NOT_FOUND",
            AuthError::Configuration(_) | AuthError::Bridge(_) | AuthError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self.unauthorized() {
            Some(unauthorized) => (StatusCode::UNAUTHORIZED, unauthorized.description.clone()),
            None => {
                tracing::error!(error = %self, "Authentication pipeline error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(challenge) = self.www_authenticate() {
            match HeaderValue::from_str(&challenge) {
                Ok(value) => {
                    response.headers_mut().insert(WWW_AUTHENTICATE, value);
                }
                Err(e) => {
                    tracing::warn!(error = %e, challenge = %challenge, "Dropping invalid challenge");
                }
            }
        }
        response
    }
}

/// Misconfiguration detected while building getters, backends or middleware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("the payload_key cannot have value {0:?}")]
    ReservedPayloadKey(String),

    #[error("must pass more than one getter, got {0}")]
    NotEnoughGetters(usize),

    #[error("must pass more than one backend, got {0}")]
    NotEnoughBackends(usize),

    #[error("at least one signing algorithm is required")]
    NoAlgorithms,

    #[error("leeway of {0}s exceeds the maximum of {max}s", max = MAX_JWT_LEEWAY)]
    LeewayTooLarge(u64),
}
