//! Request abstraction consumed by getters and backends

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::MatchedPath,
    http::{header::COOKIE, request::Parts, HeaderMap, Method, Uri},
};
use cookie::Cookie;
use url::form_urlencoded;

use crate::middleware::ResourceAuth;

/// Read access to the parts of an inbound request that carry credentials.
///
/// Cookie and parameter lookups return every value so callers can reject
/// ambiguous requests that repeat a name.
pub trait AuthRequest: Send + Sync {
    /// HTTP method, upper case.
    fn method(&self) -> &str;

    /// Route template matched by the router, e.g. `/users/{id}`.
    fn uri_template(&self) -> Option<&str>;

    /// First value of the named header, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;

    /// All values of the named cookie, across every `Cookie` header.
    fn cookie_values(&self, name: &str) -> Vec<String>;

    /// All values of the named query parameter.
    fn param_values(&self, name: &str) -> Vec<String>;
}

/// Owned snapshot of an `http` request head.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    uri_template: Option<String>,
}

impl HttpRequest {
    /// Snapshot the request head; the template comes from axum's `MatchedPath`.
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            uri_template: parts
                .extensions
                .get::<MatchedPath>()
                .map(|path| path.as_str().to_string()),
        }
    }

    pub fn with_uri_template(mut self, template: impl Into<String>) -> Self {
        self.uri_template = Some(template.into());
        self
    }
}

impl AuthRequest for HttpRequest {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn uri_template(&self) -> Option<&str> {
        self.uri_template.as_deref()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn cookie_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(Cookie::split_parse_encoded)
            .filter_map(Result::ok)
            .filter(|c| c.name() == name)
            .map(|c| c.value().to_string())
            .collect()
    }

    fn param_values(&self, name: &str) -> Vec<String> {
        self.uri
            .query()
            .map(|query| {
                form_urlencoded::parse(query.as_bytes())
                    .filter(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Everything a backend gets to see about the request being authenticated.
///
/// Created fresh per request by the middleware and never mutated afterwards.
pub struct RequestAttributes<U> {
    pub request: Arc<dyn AuthRequest>,
    /// Override settings of the matched resource, if it declares any.
    pub resource: Option<ResourceAuth<U>>,
    /// Parameters matched in the URL path.
    pub params: Arc<HashMap<String, String>>,
    /// True when running under the async hook.
    pub is_async: bool,
}

impl<U> RequestAttributes<U> {
    pub fn new(
        request: Arc<dyn AuthRequest>,
        resource: Option<ResourceAuth<U>>,
        params: HashMap<String, String>,
        is_async: bool,
    ) -> Self {
        Self {
            request,
            resource,
            params: Arc::new(params),
            is_async,
        }
    }
}

impl<U> Clone for RequestAttributes<U> {
    fn clone(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            resource: self.resource.clone(),
            params: Arc::clone(&self.params),
            is_async: self.is_async,
        }
    }
}

impl<U> fmt::Debug for RequestAttributes<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAttributes")
            .field("method", &self.request.method())
            .field("uri_template", &self.request.uri_template())
            .field("params", &self.params)
            .field("is_async", &self.is_async)
            .finish_non_exhaustive()
    }
}
