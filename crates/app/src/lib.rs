//! Warden demo server composition root
//!
//! Wires the authentication backends to a small set of routes:
//!
//! - `/hello` uses the global backend: Basic, plus Bearer JWT when a
//!   secret is configured
//! - `/generic` reads the user from the `User` header, `GET` is open
//! - `/keys` accepts an API key from the `X-Api-Key` header, an
//!   `ApiKey` authorization header or the `api_key` query parameter
//! - `/no-auth` and `/health` are never authenticated

use std::sync::Arc;

use axum::{
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use warden_auth::{
    AuthBackend, AuthError, AuthHeaderGetter, AuthMiddleware, Authenticated, BasicAuthBackend,
    BasicCredentials, CallBackBackend, Claims, ClaimsOptions, GenericAuthBackend, Getter,
    HeaderGetter, JwtAuthBackend, JwtKey, MaybeAsync, MultiAuthBackend, MultiGetter, ParamGetter,
    RequestAttributes, RequestContext, ResourceAuth,
};
use warden_common::{verify_key_hash, Config};

/// User installed by every backend of the demo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoUser {
    pub username: String,
}

impl DemoUser {
    fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Create the main application router with all routes and middleware
pub fn create_app(config: &Config) -> Result<Router, anyhow::Error> {
    let middleware = AuthMiddleware::from_settings(global_backend(config)?, &config.auth)
        .with_resource("/health", ResourceAuth::disabled())
        .with_resource("/no-auth", ResourceAuth::disabled())
        .with_resource(
            "/generic",
            ResourceAuth::new()
                .with_backend(user_header_backend())
                .with_exempt_methods(["GET"]),
        )
        .with_resource(
            "/keys",
            ResourceAuth::new().with_backend(api_key_backend(config)?),
        );

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/hello", get(hello))
        .route("/generic", get(generic_get).post(generic_post))
        .route("/keys", get(keys))
        .route("/no-auth", any(|| async { "No auth in this resource" }));

    Ok(middleware.apply(router))
}

/// Basic against the demo credentials, falling back to Bearer JWT when
/// `JWT_SECRET` is set. Failures are logged.
fn global_backend(config: &Config) -> Result<Arc<dyn AuthBackend<DemoUser>>, anyhow::Error> {
    let username = config.demo_username.clone();
    let password = config.demo_password.clone();
    let basic = BasicAuthBackend::new(move |_, credentials: BasicCredentials| {
        let valid = credentials.username == username && credentials.password == password;
        MaybeAsync::ready(Ok(valid.then(|| DemoUser::new(credentials.username))))
    });

    let backend: Arc<dyn AuthBackend<DemoUser>> = match &config.jwt_secret {
        Some(secret) => {
            let backends: Vec<Arc<dyn AuthBackend<DemoUser>>> =
                vec![Arc::new(basic), Arc::new(jwt_backend(config, secret)?)];
            Arc::new(MultiAuthBackend::new(backends)?)
        }
        None => Arc::new(basic),
    };

    let logged = CallBackBackend::new(backend).on_failure(
        |attributes: RequestAttributes<DemoUser>, backend, error: &AuthError| {
            warn!(
                backend = backend.name(),
                method = %attributes.request.method(),
                error = %error,
                "Authentication failed"
            );
            MaybeAsync::ready(Ok(()))
        },
    );
    Ok(Arc::new(logged))
}

fn jwt_backend(config: &Config, secret: &str) -> Result<JwtAuthBackend<DemoUser>, anyhow::Error> {
    let mut claims = ClaimsOptions::none().require("sub").require("exp");
    if let Some(issuer) = &config.jwt_issuer {
        claims = claims.require("iss").with_issuer(issuer.clone());
    }
    if let Some(audience) = &config.jwt_audience {
        claims = claims.require("aud").with_audience(audience.clone());
    }

    let backend = JwtAuthBackend::new(
        |_, claims: Claims| {
            let user = claims
                .get("sub")
                .and_then(Value::as_str)
                .map(DemoUser::new);
            MaybeAsync::ready(Ok(user))
        },
        JwtKey::secret(secret),
    )
    .with_claims(claims)
    .with_leeway(config.jwt_leeway)?;
    Ok(backend)
}

fn user_header_backend() -> Arc<dyn AuthBackend<DemoUser>> {
    Arc::new(GenericAuthBackend::new(
        |_, user: String| MaybeAsync::ready(Ok(Some(DemoUser::new(user)))),
        HeaderGetter::new("User"),
    ))
}

/// Keys are checked against the salted hashes of `API_KEYS`; the user is
/// the name the matching key is registered under.
fn api_key_backend(config: &Config) -> Result<Arc<dyn AuthBackend<DemoUser>>, anyhow::Error> {
    let keys = Arc::new(config.api_keys.clone());
    let getters: Vec<Arc<dyn Getter>> = vec![
        Arc::new(HeaderGetter::new("X-Api-Key")),
        Arc::new(AuthHeaderGetter::new("ApiKey")),
        Arc::new(ParamGetter::new("api_key")),
    ];
    let getter = MultiGetter::new(getters)?;

    let backend = GenericAuthBackend::new(
        move |_, key: String| {
            let keys = Arc::clone(&keys);
            MaybeAsync::pending(async move {
                let name = keys
                    .iter()
                    .find(|(_, hash)| verify_key_hash(&key, hash))
                    .map(|(name, _)| name.clone());
                debug!(found = name.is_some(), "API key lookup");
                Ok(name.map(DemoUser::new))
            })
        },
        getter,
    )
    .with_payload_key("api_key")?
    .with_challenges(["ApiKey"]);
    Ok(Arc::new(backend))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Greets the authenticated user, or anonymously when authentication was
/// skipped for the request (exempt method or template).
async fn hello(context: RequestContext<DemoUser>) -> Json<Value> {
    match context.current() {
        Some(result) => Json(json!({
            "message": format!("Hello {}", result.user.username),
            "backend": result.backend_name(),
        })),
        None => Json(json!({ "message": "Hello anonymous", "backend": null })),
    }
}

async fn generic_get(context: RequestContext<DemoUser>) -> Json<Value> {
    Json(json!({
        "type": "No authentication for GET",
        "authenticated": !context.is_empty(),
    }))
}

async fn generic_post(Authenticated(result): Authenticated<DemoUser>) -> Json<Value> {
    Json(json!({ "info": format!("User header {}", result.user.username) }))
}

async fn keys(Authenticated(result): Authenticated<DemoUser>) -> Json<Value> {
    Json(json!({
        "key": result.user.username,
        "api_key_received": result.extra("api_key").is_some(),
    }))
}
