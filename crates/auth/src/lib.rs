//! Request authentication for axum services
//!
//! Credentials are pulled out of a request by a [`Getter`], turned into an
//! application user by an [`AuthBackend`] and installed into the request's
//! [`RequestContext`] by the [`AuthMiddleware`]. Backends can be chained
//! with [`MultiAuthBackend`] and observed with [`CallBackBackend`].
//!
//! ```ignore
//! let backend = BasicAuthBackend::new(|_, credentials: BasicCredentials| {
//!     MaybeAsync::ready(Ok(users.find(&credentials.username, &credentials.password)))
//! });
//! let app = AuthMiddleware::new(Arc::new(backend))
//!     .with_resource("/health", ResourceAuth::disabled())
//!     .apply(router);
//! ```

pub mod bridge;

mod backend;
mod basic;
mod callback;
mod claims;
mod composite;
mod context;
mod error;
mod extractors;
mod getter;
mod jwt;
mod layer;
mod middleware;
mod request;

pub use backend::{
    AuthBackend, AuthResult, BaseAuthBackend, GenericAuthBackend, Identity, LoadedUser,
    NoAuthBackend, UserLoader,
};
pub use basic::{BasicAuthBackend, BasicCredentials};
pub use bridge::BridgeError;
pub use callback::MaybeAsync;
pub use claims::{Claims, ClaimsOptions, DEFAULT_REQUIRED_CLAIMS};
pub use composite::{
    CallBackBackend, ContinuePredicate, FailureCallback, MultiAuthBackend, Notified,
    SuccessCallback,
};
pub use context::RequestContext;
pub use error::{AuthError, ConfigError, Unauthorized};
pub use extractors::Authenticated;
pub use getter::{AuthHeaderGetter, CookieGetter, Getter, HeaderGetter, MultiGetter, ParamGetter};
pub use jwt::{JwtAuthBackend, JwtKey, KeyResolver};
pub use middleware::{AuthMiddleware, ResourceAuth};
pub use request::{AuthRequest, HttpRequest, RequestAttributes};

pub use jsonwebtoken::{Algorithm, DecodingKey};
