//! Cooperative bridge between synchronous code and the async runtime
//!
//! [`spawn_sync`] runs a synchronous closure on tokio's blocking pool. Inside
//! that closure [`await_`] can wait on a future and hand back its output, so
//! synchronous loaders can call async code without being rewritten. The
//! caller's tracing span and dispatcher follow the closure onto the
//! blocking thread.
//!
//! [`run_sync`] is the synchronous-mode counterpart: it polls a future once
//! and fails if the future would have to wait.

use std::cell::{Cell, RefCell};
use std::future::Future;

use futures::FutureExt;
use tokio::runtime::Handle;

/// Misuse of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Cannot use await_ outside of spawn_sync target or nested inside another await_ call")]
    OutsideBridge,

    #[error("No async runtime available to run a bridged call")]
    NoRuntime,

    #[error("Bridged call was cancelled before completion")]
    Cancelled,

    #[error("Future suspended while running in synchronous mode")]
    Suspended,
}

thread_local! {
    static BRIDGE: RefCell<Option<Handle>> = const { RefCell::new(None) };
    static AWAITING: Cell<bool> = const { Cell::new(false) };
}

struct BridgeGuard;

impl BridgeGuard {
    fn enter(handle: Handle) -> Self {
        BRIDGE.with(|b| *b.borrow_mut() = Some(handle));
        BridgeGuard
    }
}

impl Drop for BridgeGuard {
    fn drop(&mut self) {
        // Blocking pool threads are reused across tasks.
        BRIDGE.with(|b| *b.borrow_mut() = None);
        AWAITING.with(|a| a.set(false));
    }
}

struct AwaitGuard;

impl AwaitGuard {
    fn enter() -> Self {
        AWAITING.with(|a| a.set(true));
        AwaitGuard
    }
}

impl Drop for AwaitGuard {
    fn drop(&mut self) {
        AWAITING.with(|a| a.set(false));
    }
}

fn current_bridge() -> Option<Handle> {
    BRIDGE.with(|b| b.borrow().clone())
}

/// True when called from inside a [`spawn_sync`] closure.
pub fn in_bridge() -> bool {
    current_bridge().is_some()
}

/// Run the synchronous closure `f` as a bridged context.
///
/// Panics inside `f` are resumed in the caller.
pub async fn spawn_sync<F, T>(f: F) -> Result<T, BridgeError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
    let span = tracing::Span::current();
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());

    let task = tokio::task::spawn_blocking(move || {
        let _bridge = BridgeGuard::enter(handle);
        tracing::dispatcher::with_default(&dispatch, || span.in_scope(f))
    });

    match task.await {
        Ok(value) => Ok(value),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(BridgeError::Cancelled),
    }
}

/// Wait for `future` from synchronous code running under [`spawn_sync`].
///
/// Errors produced by the future are returned as its output. Calling this
/// outside a bridged closure, or from a future that is itself being awaited
/// through `await_`, fails with [`BridgeError::OutsideBridge`].
pub fn await_<F: Future>(future: F) -> Result<F::Output, BridgeError> {
    let handle = current_bridge().ok_or(BridgeError::OutsideBridge)?;
    if AWAITING.with(Cell::get) {
        return Err(BridgeError::OutsideBridge);
    }

    let _awaiting = AwaitGuard::enter();
    let _runtime = handle.enter();
    Ok(futures::executor::block_on(future))
}

/// Drive a whole future to completion on the bridged thread.
pub(crate) fn drive<F: Future>(future: F) -> Result<F::Output, BridgeError> {
    let handle = current_bridge().ok_or(BridgeError::OutsideBridge)?;
    Ok(handle.block_on(future))
}

/// Resolve a future that must not suspend.
pub fn run_sync<F: Future>(future: F) -> Result<F::Output, BridgeError> {
    future.now_or_never().ok_or(BridgeError::Suspended)
}
