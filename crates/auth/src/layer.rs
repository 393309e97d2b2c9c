//! axum integration of [`AuthMiddleware`]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::RawPathParamsRejection, RawPathParams, Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};

use crate::backend::Identity;
use crate::context::RequestContext;
use crate::error::AuthError;
use crate::middleware::AuthMiddleware;
use crate::request::{AuthRequest, HttpRequest};

impl<U: Identity> AuthMiddleware<U> {
    /// Install the async hook on every route of `router`.
    ///
    /// Installed as a route layer so that the matched route template is
    /// known; requests that match no route are not authenticated. Routes
    /// added to the router afterwards are not covered.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(
            Arc::new(self),
            authenticate::<U>,
        ))
    }
}

async fn authenticate<U: Identity>(
    State(auth): State<Arc<AuthMiddleware<U>>>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (mut parts, body) = request.into_parts();

    let auth_request = HttpRequest::from_parts(&parts);
    let resource = auth_request
        .uri_template()
        .and_then(|template| auth.resource(template))
        .cloned();
    let params: HashMap<String, String> = params
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut context = parts
        .extensions
        .remove::<RequestContext<U>>()
        .unwrap_or_default();
    auth.process_resource_async(Arc::new(auth_request), resource.as_ref(), params, &mut context)
        .await?;
    parts.extensions.insert(context);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
