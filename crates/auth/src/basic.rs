//! HTTP Basic authentication (RFC 7617)

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::backend::{AuthBackend, AuthResult, BaseAuthBackend, Identity, LoadedUser};
use crate::error::AuthError;
use crate::getter::{load_credentials, AuthHeaderGetter, Getter};
use crate::request::RequestAttributes;

/// Username and password decoded from a Basic header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Backend for `Authorization: Basic <base64(username:password)>`.
///
/// Undecodable credentials are reported as `BackendNotApplicable` so that
/// the backend can sit in a [`MultiAuthBackend`](crate::MultiAuthBackend)
/// next to other schemes.
#[derive(Debug)]
pub struct BasicAuthBackend<U> {
    pub base: BaseAuthBackend<BasicCredentials, U>,
    pub getter: Arc<dyn Getter>,
    auth_header_type: String,
}

impl<U: Identity> BasicAuthBackend<U> {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn(RequestAttributes<U>, BasicCredentials) -> LoadedUser<U> + Send + Sync + 'static,
    {
        Self {
            base: BaseAuthBackend::new(loader).with_challenges(["Basic"]),
            getter: Arc::new(AuthHeaderGetter::new("Basic")),
            auth_header_type: "Basic".to_string(),
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

    /// Read the encoded credentials with a custom getter. The type passed to
    /// [`with_auth_header_type`](Self::with_auth_header_type) is then only
    /// used as challenge.
    pub fn with_getter(mut self, getter: impl Getter + 'static) -> Self {
        self.getter = Arc::new(getter);
        self
    }

    pub fn auth_header_type(&self) -> &str {
        &self.auth_header_type
    }

    fn decode_credentials(&self, encoded: &str) -> Result<BasicCredentials, AuthError> {
        let decoded = STANDARD
            .decode(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());

        decoded
            .as_deref()
            .and_then(|text| text.split_once(':'))
            .map(|(username, password)| BasicCredentials {
                username: username.to_string(),
                password: password.to_string(),
            })
            .ok_or_else(|| {
                tracing::debug!("Undecodable basic credentials");
                AuthError::not_applicable(
                    "Invalid Authorization. Unable to decode credentials",
                    &self.base.challenges,
                )
            })
    }
}

#[async_trait]
impl<U: Identity> AuthBackend<U> for BasicAuthBackend<U> {
    async fn authenticate(
        &self,
        attributes: &RequestAttributes<U>,
    ) -> Result<AuthResult<U>, AuthError> {
        let encoded = load_credentials(
            self.getter.as_ref(),
            attributes.request.as_ref(),
            &self.base.challenges,
            attributes.is_async,
        )
        .await?;

        let credentials = self.decode_credentials(&encoded)?;
        let user = self.base.load_user(attributes, credentials).await?;
        Ok(AuthResult::new(user))
    }

    fn name(&self) -> &str {
        "BasicAuthBackend"
    }
}
