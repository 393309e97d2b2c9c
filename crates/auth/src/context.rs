//! Per-request authentication context

use std::collections::HashMap;
use std::fmt;

use crate::backend::AuthResult;

/// Authentication results installed on a request, keyed by attribute name.
///
/// Stored in the request extensions by the axum layer. An attribute is only
/// present when authentication ran and succeeded for it.
pub struct RequestContext<U> {
    results: HashMap<String, AuthResult<U>>,
    last: Option<String>,
}

impl<U> RequestContext<U> {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            last: None,
        }
    }

    pub fn insert(&mut self, attr: impl Into<String>, result: AuthResult<U>) {
        let attr = attr.into();
        self.results.insert(attr.clone(), result);
        self.last = Some(attr);
    }

    pub fn get(&self, attr: &str) -> Option<&AuthResult<U>> {
        self.results.get(attr)
    }

    pub fn contains(&self, attr: &str) -> bool {
        self.results.contains_key(attr)
    }

    pub fn user(&self, attr: &str) -> Option<&U> {
        self.get(attr).map(|result| &result.user)
    }

    /// Most recently installed result.
    pub fn current(&self) -> Option<&AuthResult<U>> {
        self.last.as_deref().and_then(|attr| self.results.get(attr))
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<U> Default for RequestContext<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Clone> Clone for RequestContext<U> {
    fn clone(&self) -> Self {
        Self {
            results: self.results.clone(),
            last: self.last.clone(),
        }
    }
}

impl<U: fmt::Debug> fmt::Debug for RequestContext<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("results", &self.results)
            .field("last", &self.last)
            .finish()
    }
}
