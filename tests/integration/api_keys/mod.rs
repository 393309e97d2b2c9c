//! API key integration tests
//!
//! `/keys` accepts a key from the `X-Api-Key` header, an `ApiKey`
//! authorization header or the `api_key` query parameter, in that order.

use axum::http::{header::AUTHORIZATION, Method, StatusCode};

use crate::common::*;

#[test_log::test(tokio::test)]
async fn test_key_in_header() {
    let app = TestApp::new().unwrap();

    let response = app
        .call(Method::GET, "/keys", &[("X-Api-Key", API_KEY)])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["key"], API_KEY_NAME);
    assert_eq!(body["api_key_received"], true);
}

#[tokio::test]
async fn test_key_in_authorization_header() {
    let app = TestApp::new().unwrap();
    let auth = format!("ApiKey {API_KEY}");

    let response = app
        .call(Method::GET, "/keys", &[(AUTHORIZATION.as_str(), &auth)])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["key"], API_KEY_NAME);
}

#[tokio::test]
async fn test_key_in_query() {
    let app = TestApp::new().unwrap();

    let response = app
        .call(Method::GET, &format!("/keys?api_key={API_KEY}"), &[])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["key"], API_KEY_NAME);
}

#[tokio::test]
async fn test_repeated_query_parameter() {
    let app = TestApp::new().unwrap();

    let response = app
        .call(Method::GET, &format!("/keys?api_key={API_KEY}&api_key=other"), &[])
        .await;

    // Ambiguous values are skipped like absent ones.
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error().1, "No authentication information found");
}

#[tokio::test]
async fn test_unknown_key() {
    let app = TestApp::new().unwrap();

    let response = app
        .call(Method::GET, "/keys", &[("X-Api-Key", "wk_unknown")])
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.challenge(), Some("ApiKey"));
    assert_eq!(response.error().0, "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_no_key() {
    let app = TestApp::new().unwrap();

    let response = app.call(Method::GET, "/keys", &[]).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.challenge(), Some("ApiKey"));
    assert_eq!(
        response.error(),
        (
            "BACKEND_NOT_APPLICABLE".to_string(),
            "No authentication information found".to_string()
        )
    );
}

#[tokio::test]
async fn test_basic_credentials_not_accepted() {
    let app = TestApp::new().unwrap();
    let auth = basic_auth(DEMO_USERNAME, DEMO_PASSWORD);

    let response = app
        .call(Method::GET, "/keys", &[(AUTHORIZATION.as_str(), &auth)])
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error().0, "BACKEND_NOT_APPLICABLE");
}
