//! Backends built from other backends

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{AuthBackend, AuthResult, Identity};
use crate::callback::{call_maybe_async, CallbackKind, MaybeAsync};
use crate::error::{AuthError, ConfigError};
use crate::request::RequestAttributes;

/// Observer result; an error replaces the outcome of the request.
pub type Notified = MaybeAsync<Result<(), AuthError>>;

pub type SuccessCallback<U> =
    Arc<dyn Fn(RequestAttributes<U>, Arc<dyn AuthBackend<U>>, &AuthResult<U>) -> Notified + Send + Sync>;

pub type FailureCallback<U> =
    Arc<dyn Fn(RequestAttributes<U>, Arc<dyn AuthBackend<U>>, &AuthError) -> Notified + Send + Sync>;

/// Decides whether [`MultiAuthBackend`] moves on after an unauthorized error.
pub type ContinuePredicate<U> = Arc<dyn Fn(&dyn AuthBackend<U>, &AuthError) -> bool + Send + Sync>;

/// Wraps a backend to observe its successes and failures.
///
/// The failure observer cannot swallow the error: the backend error is
/// returned after it runs, unless the observer itself fails, in which case
/// its error is returned instead.
pub struct CallBackBackend<U> {
    backend: Arc<dyn AuthBackend<U>>,
    on_success: Option<SuccessCallback<U>>,
    success_kind: CallbackKind,
    on_failure: Option<FailureCallback<U>>,
    failure_kind: CallbackKind,
}

impl<U: Identity> CallBackBackend<U> {
    pub fn new(backend: Arc<dyn AuthBackend<U>>) -> Self {
        Self {
            backend,
            on_success: None,
            success_kind: CallbackKind::default(),
            on_failure: None,
            failure_kind: CallbackKind::default(),
        }
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(RequestAttributes<U>, Arc<dyn AuthBackend<U>>, &AuthResult<U>) -> Notified
            + Send
            + Sync
            + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(RequestAttributes<U>, Arc<dyn AuthBackend<U>>, &AuthError) -> Notified
            + Send
            + Sync
            + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    pub fn backend(&self) -> &Arc<dyn AuthBackend<U>> {
        &self.backend
    }

    async fn notify_success(
        &self,
        attributes: &RequestAttributes<U>,
        result: &AuthResult<U>,
    ) -> Result<(), AuthError> {
        let Some(callback) = &self.on_success else {
            return Ok(());
        };
        call_maybe_async(attributes.is_async, &self.success_kind, "on_success callback", || {
            callback(attributes.clone(), Arc::clone(&self.backend), result)
        })
        .await?
    }

    async fn notify_failure(
        &self,
        attributes: &RequestAttributes<U>,
        error: &AuthError,
    ) -> Result<(), AuthError> {
        let Some(callback) = &self.on_failure else {
            return Ok(());
        };
        call_maybe_async(attributes.is_async, &self.failure_kind, "on_failure callback", || {
            callback(attributes.clone(), Arc::clone(&self.backend), error)
        })
        .await?
    }
}

#[async_trait]
impl<U: Identity> AuthBackend<U> for CallBackBackend<U> {
    async fn authenticate(
        &self,
        attributes: &RequestAttributes<U>,
    ) -> Result<AuthResult<U>, AuthError> {
        let outcome = match self.backend.authenticate(attributes).await {
            Ok(mut result) => {
                result.set_default_backend(&self.backend);
                self.notify_success(attributes, &result).await.map(|()| result)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(error) => {
                self.notify_failure(attributes, &error).await?;
                Err(error)
            }
        }
    }

    fn name(&self) -> &str {
        "CallBackBackend"
    }
}

impl<U> fmt::Debug for CallBackBackend<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallBackBackend")
            .field("backend", &self.backend.name())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Tries several backends in order and returns the first success.
///
/// After an unauthorized error the `continue_on` predicate decides whether
/// the next backend is tried; by default only `BackendNotApplicable` moves
/// on. Any other kind of error is returned immediately.
pub struct MultiAuthBackend<U> {
    backends: Vec<Arc<dyn AuthBackend<U>>>,
    continue_on: ContinuePredicate<U>,
}

impl<U: Identity> MultiAuthBackend<U> {
    pub fn new(backends: Vec<Arc<dyn AuthBackend<U>>>) -> Result<Self, ConfigError> {
        if backends.len() < 2 {
            return Err(ConfigError::NotEnoughBackends(backends.len()));
        }
        Ok(Self {
            backends,
            continue_on: Arc::new(|_, error| error.is_not_applicable()),
        })
    }

    pub fn with_continue_on<F>(mut self, continue_on: F) -> Self
    where
        F: Fn(&dyn AuthBackend<U>, &AuthError) -> bool + Send + Sync + 'static,
    {
        self.continue_on = Arc::new(continue_on);
        self
    }

    pub fn backends(&self) -> &[Arc<dyn AuthBackend<U>>] {
        &self.backends
    }
}

#[async_trait]
impl<U: Identity> AuthBackend<U> for MultiAuthBackend<U> {
    async fn authenticate(
        &self,
        attributes: &RequestAttributes<U>,
    ) -> Result<AuthResult<U>, AuthError> {
        let mut challenges = Vec::new();

        for backend in &self.backends {
            match backend.authenticate(attributes).await {
                Ok(mut result) => {
                    result.set_default_backend(backend);
                    return Ok(result);
                }
                Err(error) if error.is_unauthorized() && (self.continue_on)(backend.as_ref(), &error) => {
                    tracing::debug!(backend = backend.name(), error = %error, "Trying next backend");
                    challenges.extend(error.www_authenticate());
                }
                Err(error) => return Err(error),
            }
        }

        Err(AuthError::not_applicable(
            "Cannot authenticate the request",
            &challenges,
        ))
    }

    fn name(&self) -> &str {
        "MultiAuthBackend"
    }
}

impl<U> fmt::Debug for MultiAuthBackend<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("MultiAuthBackend")
            .field("backends", &names)
            .finish_non_exhaustive()
    }
}
