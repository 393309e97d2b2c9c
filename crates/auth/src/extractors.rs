//! Axum extractors for authentication results
//!
//! Both read the [`RequestContext`] installed by
//! [`AuthMiddleware::apply`](crate::AuthMiddleware::apply).

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::backend::{AuthResult, Identity};
use crate::context::RequestContext;
use crate::error::AuthError;

impl<S, U> FromRequestParts<S> for RequestContext<U>
where
    U: Identity,
    S: Send + Sync,
{
    type Rejection = Infallible;

    /// Empty when authentication was skipped for the request.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext<U>>()
            .cloned()
            .unwrap_or_default())
    }
}

/// The authentication result of the request.
///
/// Only use on routes that are always authenticated: a request whose
/// authentication was skipped is answered with 500.
#[derive(Debug)]
pub struct Authenticated<U>(pub AuthResult<U>);

impl<S, U> FromRequestParts<S> for Authenticated<U>
where
    U: Identity,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext<U>>()
            .and_then(RequestContext::current)
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| {
                AuthError::Configuration("No authentication result for this request".to_string())
            })
    }
}
