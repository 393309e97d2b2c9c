//! JSON Web Token backend
//!
//! Tokens are read with an [`AuthHeaderGetter`] for the `Bearer` scheme by
//! default and verified with `jsonwebtoken`. Any verification failure is a
//! `BackendNotApplicable`, so a JWT backend can be chained with others.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use warden_common::MAX_JWT_LEEWAY;

use crate::backend::{AuthBackend, AuthResult, BaseAuthBackend, Identity, LoadedUser};
use crate::claims::{Claims, ClaimsOptions};
use crate::error::{AuthError, ConfigError};
use crate::getter::{load_credentials, AuthHeaderGetter, Getter};
use crate::request::RequestAttributes;

/// Picks the verification key from the token header and unverified payload.
pub type KeyResolver =
    Arc<dyn Fn(&Header, &Claims) -> Result<DecodingKey, AuthError> + Send + Sync>;

/// Key used to verify token signatures.
#[derive(Clone)]
pub enum JwtKey {
    Static(DecodingKey),
    /// Errors returned by the resolver are surfaced unchanged.
    Dynamic(KeyResolver),
}

impl JwtKey {
    /// HMAC secret.
    pub fn secret(secret: impl AsRef<[u8]>) -> Self {
        JwtKey::Static(DecodingKey::from_secret(secret.as_ref()))
    }

    pub fn dynamic<F>(resolve: F) -> Self
    where
        F: Fn(&Header, &Claims) -> Result<DecodingKey, AuthError> + Send + Sync + 'static,
    {
        JwtKey::Dynamic(Arc::new(resolve))
    }
}

impl fmt::Debug for JwtKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JwtKey::Static(_) => f.write_str("JwtKey::Static(..)"),
            JwtKey::Dynamic(_) => f.write_str("JwtKey::Dynamic(..)"),
        }
    }
}

/// Backend for bearer JSON Web Tokens.
///
/// The loader receives the verified claims.
#[derive(Debug)]
pub struct JwtAuthBackend<U> {
    pub base: BaseAuthBackend<Claims, U>,
    pub getter: Arc<dyn Getter>,
    key: JwtKey,
    auth_header_type: String,
    algorithms: Vec<Algorithm>,
    claims: ClaimsOptions,
    leeway: u64,
}

impl<U: Identity> JwtAuthBackend<U> {
    pub fn new<F>(loader: F, key: JwtKey) -> Self
    where
        F: Fn(RequestAttributes<U>, Claims) -> LoadedUser<U> + Send + Sync + 'static,
    {
        Self {
            base: BaseAuthBackend::new(loader).with_challenges(["Bearer"]),
            getter: Arc::new(AuthHeaderGetter::new("Bearer")),
            key,
            auth_header_type: "Bearer".to_string(),
            algorithms: vec![Algorithm::HS256],
            claims: ClaimsOptions::default(),
            leeway: 0,
        }
    }

    /// Change the expected scheme. Resets the challenges to the new type and
    /// the getter to an [`AuthHeaderGetter`] for it.
    pub fn with_auth_header_type(mut self, auth_header_type: impl Into<String>) -> Self {
        let auth_header_type = auth_header_type.into();
        self.base.challenges = vec![auth_header_type.clone()];
        self.getter = Arc::new(AuthHeaderGetter::new(auth_header_type.clone()));
        self.auth_header_type = auth_header_type;
        self
    }

    /// Read the token with a custom getter; it must return the encoded token.
    pub fn with_getter(mut self, getter: impl Getter + 'static) -> Self {
        self.getter = Arc::new(getter);
        self
    }

    /// Accepted signing algorithms. They must all belong to the key's family.
    pub fn with_algorithms(
        mut self,
        algorithms: impl IntoIterator<Item = Algorithm>,
    ) -> Result<Self, ConfigError> {
        let algorithms: Vec<Algorithm> = algorithms.into_iter().collect();
        if algorithms.is_empty() {
            return Err(ConfigError::NoAlgorithms);
        }
        self.algorithms = algorithms;
        Ok(self)
    }

    pub fn with_claims(mut self, claims: ClaimsOptions) -> Self {
        self.claims = claims;
        self
    }

    /// Clock skew in seconds allowed on `exp` and `nbf`, at most
    /// [`MAX_JWT_LEEWAY`].
    pub fn with_leeway(mut self, leeway: u64) -> Result<Self, ConfigError> {
        if leeway > MAX_JWT_LEEWAY {
            return Err(ConfigError::LeewayTooLarge(leeway));
        }
        self.leeway = leeway;
        Ok(self)
    }

    pub fn auth_header_type(&self) -> &str {
        &self.auth_header_type
    }

    pub fn claims(&self) -> &ClaimsOptions {
        &self.claims
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.algorithms = self.algorithms.clone();
        validation.leeway = self.leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        self.claims.apply(&mut validation);
        validation
    }

    fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let resolved;
        let key = match &self.key {
            JwtKey::Static(key) => key,
            JwtKey::Dynamic(resolve) => {
                let header = decode_header(token).map_err(|e| self.invalid_token(e))?;
                let payload = unverified_payload(token).map_err(|e| self.invalid_token(e))?;
                resolved = resolve(&header, &payload)?;
                &resolved
            }
        };

        let data = decode::<Claims>(token, key, &self.validation())
            .map_err(|e| self.invalid_token(e))?;
        self.claims
            .check(&data.claims)
            .map_err(|e| self.invalid_token(e))?;
        Ok(data.claims)
    }

    fn invalid_token(&self, reason: impl fmt::Display) -> AuthError {
        tracing::debug!(error = %reason, "JWT validation failed");
        AuthError::not_applicable(
            format!("Invalid Authorization. Unable to decode or verify token. {reason}"),
            &self.base.challenges,
        )
    }
}

fn unverified_payload(token: &str) -> Result<Claims, String> {
    let segment = token
        .split('.')
        .nth(1)
        .ok_or_else(|| "Malformed token".to_string())?;
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

#[async_trait]
impl<U: Identity> AuthBackend<U> for JwtAuthBackend<U> {
    async fn authenticate(
        &self,
        attributes: &RequestAttributes<U>,
    ) -> Result<AuthResult<U>, AuthError> {
        let token = load_credentials(
            self.getter.as_ref(),
            attributes.request.as_ref(),
            &self.base.challenges,
            attributes.is_async,
        )
        .await?;

        let claims = self.validate_token(&token)?;
        let user = self.base.load_user(attributes, claims).await?;
        Ok(AuthResult::new(user))
    }

    fn name(&self) -> &str {
        "JwtAuthBackend"
    }
}
