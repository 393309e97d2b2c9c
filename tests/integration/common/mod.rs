//! Common test utilities and fixtures for integration tests
//!
//! This module provides shared infrastructure for all integration tests including:
//! - Application setup from an in-memory environment
//! - Credential helpers for Basic, Bearer and API key authentication
//! - Response decoding

use std::collections::HashMap;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header::WWW_AUTHENTICATE, HeaderMap, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use warden_common::{hash_key, Config};

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "correct-horse"; // pragma: allowlist secret
pub const JWT_SECRET: &str = "test_secret_key_for_testing_only"; // pragma: allowlist secret
pub const JWT_ISSUER: &str = "warden-test";
pub const JWT_AUDIENCE: &str = "authenticated";
pub const API_KEY: &str = "wk_test_0123456789abcdef"; // pragma: allowlist secret
pub const API_KEY_NAME: &str = "ci";

/// Test application built from a fixed environment
pub struct TestApp {
    pub router: Router,
    pub config: Config,
}

impl TestApp {
    /// Application with every backend enabled
    pub fn new() -> Result<Self> {
        Self::with_env(&[])
    }

    /// Application with `overrides` applied on top of the default test environment
    pub fn with_env(overrides: &[(&str, &str)]) -> Result<Self> {
        let mut vars: HashMap<String, String> = [
            ("DEMO_USERNAME", DEMO_USERNAME.to_string()),
            ("DEMO_PASSWORD", DEMO_PASSWORD.to_string()),
            ("JWT_SECRET", JWT_SECRET.to_string()),
            ("JWT_ISSUER", JWT_ISSUER.to_string()),
            ("JWT_AUDIENCE", JWT_AUDIENCE.to_string()),
            (
                "API_KEYS",
                format!("{}={}", API_KEY_NAME, hash_key(API_KEY, b"integration_salt")),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (key, value) in overrides {
            vars.insert(key.to_string(), value.to_string());
        }

        let config = Config::from_lookup(|key| vars.get(key).cloned())?;
        let router = warden_app::create_app(&config)?;
        Ok(Self { router, config })
    }

    /// Send a request through a fresh clone of the router
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body can be read")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).expect("body is UTF-8"),
        }
    }

    /// Send a body-less request with the given headers
    pub async fn call(&self, method: Method, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).expect("valid request"))
            .await
    }
}

/// Buffered response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("body is JSON")
    }

    pub fn challenge(&self) -> Option<&str> {
        self.headers
            .get(WWW_AUTHENTICATE)
            .map(|v| v.to_str().expect("challenge is ASCII"))
    }

    /// `(code, message)` of an error body
    pub fn error(&self) -> (String, String) {
        let json = self.json();
        (
            json["error"]["code"].as_str().unwrap_or_default().to_string(),
            json["error"]["message"].as_str().unwrap_or_default().to_string(),
        )
    }
}

/// `Authorization` value for HTTP Basic credentials
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Claims accepted by the demo JWT backend
pub fn valid_claims(subject: &str) -> Value {
    let now = Utc::now();
    json!({
        "sub": subject,
        "iss": JWT_ISSUER,
        "aud": JWT_AUDIENCE,
        "iat": now.timestamp(),
        "exp": (now + Duration::hours(1)).timestamp(),
    })
}

/// HS256 token for `claims` signed with `secret`
pub fn sign(claims: &Value, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("claims can be encoded")
}

/// `Authorization` value for a bearer token
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
