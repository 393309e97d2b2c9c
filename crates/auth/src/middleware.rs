//! Authentication middleware
//!
//! [`AuthMiddleware`] decides per request whether authentication applies,
//! runs the selected backend and installs the result into the request's
//! [`RequestContext`]. The decision is the same in both hooks:
//!
//! 1. a request whose route template is globally exempt is skipped;
//! 2. the route's [`ResourceAuth`] overrides, when present, replace the
//!    global `auth_disabled`, `exempt_methods` and `backend` field by field;
//! 3. a disabled route or an exempt method is skipped;
//! 4. otherwise the backend authenticates the request.
//!
//! Skipped requests get no context attribute.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use warden_common::AuthSettings;

use crate::backend::{AuthBackend, AuthResult, Identity};
use crate::bridge;
use crate::context::RequestContext;
use crate::error::AuthError;
use crate::request::{AuthRequest, RequestAttributes};

/// Per-route overrides of the middleware configuration.
///
/// `None` fields fall back to the middleware defaults.
pub struct ResourceAuth<U> {
    pub auth_disabled: Option<bool>,
    pub exempt_methods: Option<HashSet<String>>,
    pub backend: Option<Arc<dyn AuthBackend<U>>>,
}

impl<U> ResourceAuth<U> {
    pub fn new() -> Self {
        Self {
            auth_disabled: None,
            exempt_methods: None,
            backend: None,
        }
    }

    /// Route that never requires authentication.
    pub fn disabled() -> Self {
        Self {
            auth_disabled: Some(true),
            ..Self::new()
        }
    }

    pub fn with_exempt_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exempt_methods = Some(normalize_methods(methods));
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn AuthBackend<U>>) -> Self {
        self.backend = Some(backend);
        self
    }
}

impl<U> Default for ResourceAuth<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> Clone for ResourceAuth<U> {
    fn clone(&self) -> Self {
        Self {
            auth_disabled: self.auth_disabled,
            exempt_methods: self.exempt_methods.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl<U> fmt::Debug for ResourceAuth<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceAuth")
            .field("auth_disabled", &self.auth_disabled)
            .field("exempt_methods", &self.exempt_methods)
            .field("backend", &self.backend.as_deref().map(|b| b.name()))
            .finish()
    }
}

fn normalize_methods<I, S>(methods: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    methods
        .into_iter()
        .map(|m| m.as_ref().to_ascii_uppercase())
        .collect()
}

/// Authenticates requests before they reach their handler.
pub struct AuthMiddleware<U> {
    backend: Arc<dyn AuthBackend<U>>,
    exempt_templates: HashSet<String>,
    exempt_methods: HashSet<String>,
    context_attr: String,
    resources: HashMap<String, ResourceAuth<U>>,
    offload: bool,
}

impl<U: Identity> AuthMiddleware<U> {
    /// Middleware with the default settings: no exempt template, `OPTIONS`
    /// exempt, results stored under `"auth"`.
    pub fn new(backend: Arc<dyn AuthBackend<U>>) -> Self {
        Self {
            backend,
            exempt_templates: HashSet::new(),
            exempt_methods: normalize_methods(["OPTIONS"]),
            context_attr: "auth".to_string(),
            resources: HashMap::new(),
            offload: true,
        }
    }

    pub fn from_settings(backend: Arc<dyn AuthBackend<U>>, settings: &AuthSettings) -> Self {
        Self::new(backend)
            .with_exempt_templates(&settings.exempt_templates)
            .with_exempt_methods(&settings.exempt_methods)
            .with_context_attr(settings.context_attr.clone())
            .with_offload(settings.offload)
    }

    /// Route templates, as registered with the router, that are never
    /// authenticated. Cannot be overridden per route.
    pub fn with_exempt_templates<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exempt_templates = templates
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect();
        self
    }

    pub fn with_exempt_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exempt_methods = normalize_methods(methods);
        self
    }

    /// Attribute of the [`RequestContext`] that receives the result.
    pub fn with_context_attr(mut self, context_attr: impl Into<String>) -> Self {
        self.context_attr = context_attr.into();
        self
    }

    /// Overrides for the route registered as `template`.
    pub fn with_resource(mut self, template: impl Into<String>, resource: ResourceAuth<U>) -> Self {
        self.resources.insert(template.into(), resource);
        self
    }

    /// Run backends on the blocking pool in the async hook. Turn off only
    /// when no getter or loader blocks.
    pub fn with_offload(mut self, offload: bool) -> Self {
        self.offload = offload;
        self
    }

    pub fn backend(&self) -> &Arc<dyn AuthBackend<U>> {
        &self.backend
    }

    pub fn context_attr(&self) -> &str {
        &self.context_attr
    }

    pub fn resource(&self, template: &str) -> Option<&ResourceAuth<U>> {
        self.resources.get(template)
    }

    fn auth_settings<'a>(
        &'a self,
        resource: Option<&'a ResourceAuth<U>>,
    ) -> (bool, &'a HashSet<String>, &'a Arc<dyn AuthBackend<U>>) {
        match resource {
            Some(resource) => (
                resource.auth_disabled.unwrap_or(false),
                resource.exempt_methods.as_ref().unwrap_or(&self.exempt_methods),
                resource.backend.as_ref().unwrap_or(&self.backend),
            ),
            None => (false, &self.exempt_methods, &self.backend),
        }
    }

    /// Backend that must authenticate the request, `None` when it is skipped.
    fn select_backend(
        &self,
        request: &dyn AuthRequest,
        resource: Option<&ResourceAuth<U>>,
    ) -> Option<Arc<dyn AuthBackend<U>>> {
        if let Some(template) = request.uri_template() {
            if self.exempt_templates.contains(template) {
                tracing::debug!(template, "Route template exempt from authentication");
                return None;
            }
        }

        let (disabled, exempt_methods, backend) = self.auth_settings(resource);
        if disabled {
            tracing::debug!(template = request.uri_template(), "Authentication disabled on route");
            return None;
        }
        let method = request.method().to_ascii_uppercase();
        if exempt_methods.contains(&method) {
            tracing::debug!(%method, "Method exempt from authentication");
            return None;
        }
        Some(Arc::clone(backend))
    }

    fn install(
        &self,
        backend: &Arc<dyn AuthBackend<U>>,
        mut result: AuthResult<U>,
        context: &mut RequestContext<U>,
    ) {
        result.set_default_backend(backend);
        tracing::debug!(
            backend = result.backend_name(),
            attr = %self.context_attr,
            "Request authenticated"
        );
        context.insert(self.context_attr.clone(), result);
    }

    /// Synchronous hook.
    ///
    /// The backend runs without an async runtime; a backend or loader that
    /// has to wait is a configuration error.
    pub fn process_resource(
        &self,
        request: Arc<dyn AuthRequest>,
        resource: Option<&ResourceAuth<U>>,
        params: HashMap<String, String>,
        context: &mut RequestContext<U>,
    ) -> Result<(), AuthError> {
        let Some(backend) = self.select_backend(request.as_ref(), resource) else {
            return Ok(());
        };

        let attributes = RequestAttributes::new(request, resource.cloned(), params, false);
        let result = bridge::run_sync(backend.authenticate(&attributes)).map_err(|_| {
            AuthError::Configuration(format!(
                "{} cannot complete without an async runtime",
                backend.name()
            ))
        })?;

        match result {
            Ok(result) => {
                self.install(&backend, result, context);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(backend = backend.name(), error = %e, "Authentication rejected");
                Err(e)
            }
        }
    }

    /// Asynchronous hook.
    ///
    /// With offload enabled the backend runs inside [`bridge::spawn_sync`],
    /// so blocking getters and loaders never stall the runtime and
    /// synchronous loaders may use [`bridge::await_`].
    pub async fn process_resource_async(
        &self,
        request: Arc<dyn AuthRequest>,
        resource: Option<&ResourceAuth<U>>,
        params: HashMap<String, String>,
        context: &mut RequestContext<U>,
    ) -> Result<(), AuthError> {
        let Some(backend) = self.select_backend(request.as_ref(), resource) else {
            return Ok(());
        };

        let attributes = RequestAttributes::new(request, resource.cloned(), params, true);
        let result = if self.offload {
            let offloaded = Arc::clone(&backend);
            bridge::spawn_sync(move || bridge::drive(offloaded.authenticate(&attributes)))
                .await?
                .map_err(AuthError::from)
                .and_then(|result| result)
        } else {
            backend.authenticate(&attributes).await
        };

        match result {
            Ok(result) => {
                self.install(&backend, result, context);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(backend = backend.name(), error = %e, "Authentication rejected");
                Err(e)
            }
        }
    }
}

impl<U> Clone for AuthMiddleware<U> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            exempt_templates: self.exempt_templates.clone(),
            exempt_methods: self.exempt_methods.clone(),
            context_attr: self.context_attr.clone(),
            resources: self.resources.clone(),
            offload: self.offload,
        }
    }
}

impl<U> fmt::Debug for AuthMiddleware<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMiddleware")
            .field("backend", &self.backend.name())
            .field("exempt_templates", &self.exempt_templates)
            .field("exempt_methods", &self.exempt_methods)
            .field("context_attr", &self.context_attr)
            .field("resources", &self.resources)
            .field("offload", &self.offload)
            .finish()
    }
}
