//! Credential getters
//!
//! A getter pulls one piece of raw credential data out of a request. It
//! either returns a non-empty string or fails with
//! [`AuthError::BackendNotApplicable`], so that a missing or malformed
//! credential lets a composite backend move on to the next scheme.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AuthError, ConfigError};
use crate::request::AuthRequest;

/// Extracts authentication information from a request.
#[async_trait]
pub trait Getter: fmt::Debug + Send + Sync {
    /// Load the value, failing with `BackendNotApplicable` carrying
    /// `challenges` when the request does not provide it.
    fn load(&self, request: &dyn AuthRequest, challenges: &[String]) -> Result<String, AuthError>;

    /// Async version of [`Getter::load`]. Forwards to `load` by default.
    async fn load_async(
        &self,
        request: &dyn AuthRequest,
        challenges: &[String],
    ) -> Result<String, AuthError> {
        self.load(request, challenges)
    }

    /// False when `load_async` does real async work instead of forwarding
    /// to `load`. Backends running under the async hook only await
    /// `load_async` in that case.
    fn async_calls_sync_load(&self) -> bool {
        true
    }
}

/// Run `getter` the way the current execution mode requires.
pub(crate) async fn load_credentials(
    getter: &dyn Getter,
    request: &dyn AuthRequest,
    challenges: &[String],
    is_async: bool,
) -> Result<String, AuthError> {
    if is_async && !getter.async_calls_sync_load() {
        getter.load_async(request, challenges).await
    } else {
        getter.load(request, challenges)
    }
}

fn single_value(
    values: Vec<String>,
    name: &str,
    kind: &str,
    challenges: &[String],
) -> Result<String, AuthError> {
    let mut values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
    match values.len() {
        0 => Err(AuthError::not_applicable(
            format!("Missing {name} {kind}"),
            challenges,
        )),
        1 => Ok(values.remove(0)),
        _ => Err(AuthError::not_applicable(
            format!("Invalid {name} {kind}: Multiple value passed"),
            challenges,
        )),
    }
}

/// Returns the named header.
#[derive(Debug, Clone)]
pub struct HeaderGetter {
    pub header_key: String,
}

impl HeaderGetter {
    pub fn new(header_key: impl Into<String>) -> Self {
        Self {
            header_key: header_key.into(),
        }
    }
}

impl Getter for HeaderGetter {
    fn load(&self, request: &dyn AuthRequest, challenges: &[String]) -> Result<String, AuthError> {
        match request.header(&self.header_key) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(AuthError::not_applicable(
                format!("Missing {} header", self.header_key),
                challenges,
            )),
        }
    }
}

/// Returns the value of an auth header in the form `<auth_header_type> <value>`.
#[derive(Debug, Clone)]
pub struct AuthHeaderGetter {
    auth_header_type: String,
    header: HeaderGetter,
}

impl AuthHeaderGetter {
    pub fn new(auth_header_type: impl Into<String>) -> Self {
        Self {
            auth_header_type: auth_header_type.into(),
            header: HeaderGetter::new("Authorization"),
        }
    }

    pub fn with_header_key(mut self, header_key: impl Into<String>) -> Self {
        self.header = HeaderGetter::new(header_key);
        self
    }

    pub fn auth_header_type(&self) -> &str {
        &self.auth_header_type
    }

    pub fn header_key(&self) -> &str {
        &self.header.header_key
    }
}

impl Getter for AuthHeaderGetter {
    fn load(&self, request: &dyn AuthRequest, challenges: &[String]) -> Result<String, AuthError> {
        let raw = self.header.load(request, challenges)?;
        let key = self.header_key();
        let (prefix, value) = raw.split_once(' ').unwrap_or((raw.as_str(), ""));

        if !prefix.eq_ignore_ascii_case(&self.auth_header_type) {
            return Err(AuthError::not_applicable(
                format!(
                    "Invalid {key} header: Must start with {}",
                    title_case(&self.auth_header_type)
                ),
                challenges,
            ));
        }
        if value.is_empty() {
            return Err(AuthError::not_applicable(
                format!("Invalid {key} header: Value Missing"),
                challenges,
            ));
        }
        if value.contains(' ') {
            return Err(AuthError::not_applicable(
                format!("Invalid {key} header: Contains extra content"),
                challenges,
            ));
        }
        Ok(value.to_string())
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Returns the named query parameter; repeating it is an error.
#[derive(Debug, Clone)]
pub struct ParamGetter {
    pub param_name: String,
}

impl ParamGetter {
    pub fn new(param_name: impl Into<String>) -> Self {
        Self {
            param_name: param_name.into(),
        }
    }
}

impl Getter for ParamGetter {
    fn load(&self, request: &dyn AuthRequest, challenges: &[String]) -> Result<String, AuthError> {
        single_value(
            request.param_values(&self.param_name),
            &self.param_name,
            "parameter",
            challenges,
        )
    }
}

/// Returns the named cookie; repeating it is an error.
#[derive(Debug, Clone)]
pub struct CookieGetter {
    pub cookie_name: String,
}

impl CookieGetter {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

impl Getter for CookieGetter {
    fn load(&self, request: &dyn AuthRequest, challenges: &[String]) -> Result<String, AuthError> {
        single_value(
            request.cookie_values(&self.cookie_name),
            &self.cookie_name,
            "cookie",
            challenges,
        )
    }
}

/// Tries several getters in order and returns the first value found.
///
/// Only `BackendNotApplicable` from a sub-getter is skipped; any other error
/// is returned as is.
#[derive(Debug, Clone)]
pub struct MultiGetter {
    getters: Vec<Arc<dyn Getter>>,
}

impl MultiGetter {
    pub fn new(getters: Vec<Arc<dyn Getter>>) -> Result<Self, ConfigError> {
        if getters.len() < 2 {
            return Err(ConfigError::NotEnoughGetters(getters.len()));
        }
        Ok(Self { getters })
    }

    pub fn getters(&self) -> &[Arc<dyn Getter>] {
        &self.getters
    }

    fn exhausted(challenges: &[String]) -> AuthError {
        AuthError::not_applicable("No authentication information found", challenges)
    }
}

#[async_trait]
impl Getter for MultiGetter {
    fn load(&self, request: &dyn AuthRequest, challenges: &[String]) -> Result<String, AuthError> {
        for getter in &self.getters {
            match getter.load(request, &[]) {
                Err(e) if e.is_not_applicable() => continue,
                result => return result,
            }
        }
        Err(Self::exhausted(challenges))
    }

    async fn load_async(
        &self,
        request: &dyn AuthRequest,
        challenges: &[String],
    ) -> Result<String, AuthError> {
        for getter in &self.getters {
            match load_credentials(getter.as_ref(), request, &[], true).await {
                Err(e) if e.is_not_applicable() => continue,
                result => return result,
            }
        }
        Err(Self::exhausted(challenges))
    }

    fn async_calls_sync_load(&self) -> bool {
        self.getters.iter().all(|g| g.async_calls_sync_load())
    }
}
