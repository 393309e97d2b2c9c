//! Application callbacks that may be synchronous or asynchronous
//!
//! A callback returns [`MaybeAsync`]: either a ready value or a pending
//! future. Whether a given callback is asynchronous is learned from the
//! first value it returns and cached, so that synchronous mode can reject a
//! known-async callback without calling it again.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::future::BoxFuture;

use crate::error::AuthError;

/// Value returned by a user loader or observer callback.
pub enum MaybeAsync<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T> MaybeAsync<T> {
    pub fn ready(value: T) -> Self {
        MaybeAsync::Ready(value)
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        MaybeAsync::Pending(Box::pin(future))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MaybeAsync::Pending(_))
    }
}

const UNKNOWN: u8 = 0;
const SYNC: u8 = 1;
const ASYNC: u8 = 2;

/// Cached sync/async nature of one callback.
#[derive(Debug, Default)]
pub(crate) struct CallbackKind(AtomicU8);

impl CallbackKind {
    pub(crate) fn is_async(&self) -> Option<bool> {
        match self.0.load(Ordering::Relaxed) {
            SYNC => Some(false),
            ASYNC => Some(true),
            _ => None,
        }
    }

    fn record(&self, is_async: bool) {
        let kind = if is_async { ASYNC } else { SYNC };
        // First detection wins; later calls keep the cached kind.
        let _ = self
            .0
            .compare_exchange(UNKNOWN, kind, Ordering::Relaxed, Ordering::Relaxed);
    }
}

/// Calls `call` and resolves its result, awaiting it when it is asynchronous.
///
/// In synchronous mode an asynchronous callback is a configuration error.
pub(crate) async fn call_maybe_async<T>(
    support_async: bool,
    kind: &CallbackKind,
    name: &str,
    call: impl FnOnce() -> MaybeAsync<T>,
) -> Result<T, AuthError> {
    if !support_async && kind.is_async() == Some(true) {
        return Err(async_in_sync_mode(name));
    }

    let outcome = call();
    if kind.is_async().is_none() {
        tracing::debug!(callback = name, is_async = outcome.is_pending(), "Detected callback kind");
        kind.record(outcome.is_pending());
    }

    match outcome {
        MaybeAsync::Ready(value) => Ok(value),
        MaybeAsync::Pending(future) if support_async => Ok(future.await),
        MaybeAsync::Pending(_) => Err(async_in_sync_mode(name)),
    }
}

fn async_in_sync_mode(name: &str) -> AuthError {
    AuthError::Configuration(format!(
        "Cannot use async {name} when not running in async mode"
    ))
}
