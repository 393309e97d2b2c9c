//! Authentication backends
//!
//! An [`AuthBackend`] turns a request into an [`AuthResult`] or fails with one
//! of the unauthorized [`AuthError`] kinds. Backends are built once at startup
//! and shared across requests as `Arc<dyn AuthBackend<U>>`.
//!
//! Concrete backends resolve the user through an application supplied
//! loader held by [`BaseAuthBackend`]. A loader may answer synchronously or
//! hand back a future, see [`MaybeAsync`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::callback::{call_maybe_async, CallbackKind, MaybeAsync};
use crate::error::{AuthError, ConfigError};
use crate::getter::{load_credentials, Getter};
use crate::request::RequestAttributes;

/// Application user type stored in an [`AuthResult`].
pub trait Identity: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Identity for T {}

/// Authenticates a request.
#[async_trait]
pub trait AuthBackend<U>: Send + Sync {
    /// Returns the authenticated user, or fails with:
    /// - `AuthenticationFailure` when the request is for this backend but the
    ///   credentials are wrong;
    /// - `BackendNotApplicable` when the request cannot be handled by this
    ///   backend;
    /// - `UserNotFound` when no user matches the credentials.
    async fn authenticate(
        &self,
        attributes: &RequestAttributes<U>,
    ) -> Result<AuthResult<U>, AuthError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Successful authentication.
///
/// `user` and `backend` are the reserved entries; anything else a backend
/// wants to expose goes into `extras`.
pub struct AuthResult<U> {
    pub user: U,
    /// Backend that produced this result. Filled in by the middleware and the
    /// composite backends when a backend leaves it empty.
    pub backend: Option<Arc<dyn AuthBackend<U>>>,
    pub extras: BTreeMap<String, Value>,
}

pub(crate) const RESERVED_KEYS: [&str; 2] = ["user", "backend"];

impl<U> AuthResult<U> {
    pub fn new(user: U) -> Self {
        Self {
            user,
            backend: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn AuthBackend<U>>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    /// Sets `backend` unless a backend already claimed the result.
    pub fn set_default_backend(&mut self, backend: &Arc<dyn AuthBackend<U>>) {
        if self.backend.is_none() {
            self.backend = Some(Arc::clone(backend));
        }
    }

    /// True when `backend` is the instance recorded in this result.
    pub fn is_from(&self, backend: &Arc<dyn AuthBackend<U>>) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|b| std::ptr::addr_eq(Arc::as_ptr(b), Arc::as_ptr(backend)))
    }

    /// Names of the entries present in the result.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = vec!["user"];
        if self.backend.is_some() {
            keys.push("backend");
        }
        keys.extend(self.extras.keys().map(String::as_str));
        keys
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.name())
    }
}

impl<U: Clone> Clone for AuthResult<U> {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            backend: self.backend.clone(),
            extras: self.extras.clone(),
        }
    }
}

impl<U: fmt::Debug> fmt::Debug for AuthResult<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResult")
            .field("user", &self.user)
            .field("backend", &self.backend_name())
            .field("extras", &self.extras)
            .finish()
    }
}

/// Result of a user loader.
pub type LoadedUser<U> = MaybeAsync<Result<Option<U>, AuthError>>;

/// Resolves a user from the request and the credentials a backend extracted.
///
/// Returning `Ok(None)` means no user matches; errors are surfaced unchanged.
pub type UserLoader<C, U> = Arc<dyn Fn(RequestAttributes<U>, C) -> LoadedUser<U> + Send + Sync>;

/// Shared part of the concrete backends: the user loader and the challenges
/// reported when it finds nobody.
pub struct BaseAuthBackend<C, U> {
    loader: UserLoader<C, U>,
    loader_kind: CallbackKind,
    pub challenges: Vec<String>,
}

impl<C, U> BaseAuthBackend<C, U>
where
    C: Send + 'static,
    U: Identity,
{
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn(RequestAttributes<U>, C) -> LoadedUser<U> + Send + Sync + 'static,
    {
        Self {
            loader: Arc::new(loader),
            loader_kind: CallbackKind::default(),
            challenges: Vec::new(),
        }
    }

    pub fn with_challenges<I, S>(mut self, challenges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.challenges = challenges.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the loader was seen returning a future; `None` before the
    /// first call.
    pub fn loader_is_async(&self) -> Option<bool> {
        self.loader_kind.is_async()
    }

    /// Invoke the loader, awaiting it when it is asynchronous.
    pub async fn load_user(
        &self,
        attributes: &RequestAttributes<U>,
        credentials: C,
    ) -> Result<U, AuthError> {
        let loader = &self.loader;
        let user = call_maybe_async(attributes.is_async, &self.loader_kind, "user loader", || {
            loader(attributes.clone(), credentials)
        })
        .await??;

        user.ok_or_else(|| {
            tracing::debug!("User loader found no user");
            AuthError::user_not_found("User not found for provided payload", &self.challenges)
        })
    }
}

impl<C, U> fmt::Debug for BaseAuthBackend<C, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseAuthBackend")
            .field("loader_is_async", &self.loader_kind.is_async())
            .field("challenges", &self.challenges)
            .finish_non_exhaustive()
    }
}

/// Backend that performs no credential check.
///
/// The loader gets only the request attributes. Useful as the last entry of
/// a [`MultiAuthBackend`](crate::MultiAuthBackend) to provide an anonymous
/// user, or to run a fully custom check.
#[derive(Debug)]
pub struct NoAuthBackend<U> {
    pub base: BaseAuthBackend<(), U>,
}

impl<U: Identity> NoAuthBackend<U> {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn(RequestAttributes<U>, ()) -> LoadedUser<U> + Send + Sync + 'static,
    {
        Self {
            base: BaseAuthBackend::new(loader),
        }
    }

    pub fn with_challenges<I, S>(mut self, challenges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = self.base.with_challenges(challenges);
        self
    }
}

#[async_trait]
impl<U: Identity> AuthBackend<U> for NoAuthBackend<U> {
    async fn authenticate(
        &self,
        attributes: &RequestAttributes<U>,
    ) -> Result<AuthResult<U>, AuthError> {
        let user = self.base.load_user(attributes, ()).await?;
        Ok(AuthResult::new(user))
    }

    fn name(&self) -> &str {
        "NoAuthBackend"
    }
}

/// Backend that hands whatever its getter extracts to the loader.
///
/// The building block for custom schemes: API keys in a header or query
/// parameter, session tokens in a cookie and so on.
#[derive(Debug)]
pub struct GenericAuthBackend<U> {
    pub base: BaseAuthBackend<String, U>,
    pub getter: Arc<dyn Getter>,
    payload_key: Option<String>,
}

impl<U: Identity> GenericAuthBackend<U> {
    pub fn new<F>(loader: F, getter: impl Getter + 'static) -> Self
    where
        F: Fn(RequestAttributes<U>, String) -> LoadedUser<U> + Send + Sync + 'static,
    {
        Self {
            base: BaseAuthBackend::new(loader),
            getter: Arc::new(getter),
            payload_key: None,
        }
    }

    /// Also return the raw credential under `key` in [`AuthResult::extras`].
    pub fn with_payload_key(mut self, key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::ReservedPayloadKey(key));
        }
        self.payload_key = Some(key);
        Ok(self)
    }

    pub fn with_challenges<I, S>(mut self, challenges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = self.base.with_challenges(challenges);
        self
    }

    pub fn payload_key(&self) -> Option<&str> {
        self.payload_key.as_deref()
    }
}

#[async_trait]
impl<U: Identity> AuthBackend<U> for GenericAuthBackend<U> {
    async fn authenticate(
        &self,
        attributes: &RequestAttributes<U>,
    ) -> Result<AuthResult<U>, AuthError> {
        let auth_data = load_credentials(
            self.getter.as_ref(),
            attributes.request.as_ref(),
            &self.base.challenges,
            attributes.is_async,
        )
        .await?;

        let payload = self.payload_key.as_ref().map(|_| auth_data.clone());
        let user = self.base.load_user(attributes, auth_data).await?;

        let mut result = AuthResult::new(user);
        if let (Some(key), Some(payload)) = (&self.payload_key, payload) {
            result.extras.insert(key.clone(), Value::String(payload));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "GenericAuthBackend"
    }
}
