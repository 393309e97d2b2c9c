//! Global backend integration tests
//!
//! `/hello` is protected by Basic authentication, chained with Bearer JWT
//! when a secret is configured.

use axum::http::{header::AUTHORIZATION, Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use crate::common::*;

mod test_basic {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_valid_credentials() {
        let app = TestApp::new().unwrap();
        let auth = basic_auth(DEMO_USERNAME, DEMO_PASSWORD);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &auth)])
            .await;

        assert_eq!(response.status, StatusCode::OK);
        let body = response.json();
        assert_eq!(body["message"], "Hello demo");
        assert_eq!(body["backend"], "BasicAuthBackend");
    }

    #[tokio::test]
    async fn test_wrong_password_is_user_not_found() {
        let app = TestApp::new().unwrap();
        let auth = basic_auth(DEMO_USERNAME, "wrong");

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &auth)])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), Some("Basic"));
        assert_eq!(
            response.error(),
            (
                "USER_NOT_FOUND".to_string(),
                "User not found for provided payload".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_undecodable_credentials() {
        let app = TestApp::with_env(&[("JWT_SECRET", "")]).unwrap();

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), "Basic %%%")])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), Some("Basic"));
        assert_eq!(
            response.error(),
            (
                "BACKEND_NOT_APPLICABLE".to_string(),
                "Invalid Authorization. Unable to decode credentials".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_undecodable_credentials_fall_through_to_jwt() {
        let app = TestApp::new().unwrap();

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), "Basic %%%")])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), Some("Basic, Bearer"));
        assert_eq!(response.error().1, "Cannot authenticate the request");
    }

    #[tokio::test]
    async fn test_scheme_is_case_insensitive() {
        let app = TestApp::new().unwrap();
        let auth = basic_auth(DEMO_USERNAME, DEMO_PASSWORD).replacen("Basic", "basic", 1);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &auth)])
            .await;

        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_without_offload() {
        let app = TestApp::with_env(&[("AUTH_OFFLOAD", "false")]).unwrap();
        let auth = basic_auth(DEMO_USERNAME, DEMO_PASSWORD);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &auth)])
            .await;

        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_context_attribute() {
        let app = TestApp::with_env(&[("AUTH_CONTEXT_ATTR", "identity")]).unwrap();
        let auth = basic_auth(DEMO_USERNAME, DEMO_PASSWORD);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &auth)])
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["message"], "Hello demo");
    }
}

mod test_jwt {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_valid_token() {
        let app = TestApp::new().unwrap();
        let token = sign(&valid_claims("alice"), JWT_SECRET);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &bearer(&token))])
            .await;

        assert_eq!(response.status, StatusCode::OK);
        let body = response.json();
        assert_eq!(body["message"], "Hello alice");
        assert_eq!(body["backend"], "JwtAuthBackend");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let app = TestApp::new().unwrap();
        let mut claims = valid_claims("alice");
        claims["exp"] = json!((Utc::now() - Duration::hours(1)).timestamp());
        let token = sign(&claims, JWT_SECRET);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &bearer(&token))])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), Some("Basic, Bearer"));
        assert_eq!(response.error().0, "BACKEND_NOT_APPLICABLE");
    }

    #[tokio::test]
    async fn test_expired_token_within_leeway() {
        let app = TestApp::with_env(&[("JWT_LEEWAY", "600")]).unwrap();
        let mut claims = valid_claims("alice");
        claims["exp"] = json!((Utc::now() - Duration::seconds(60)).timestamp());
        let token = sign(&claims, JWT_SECRET);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &bearer(&token))])
            .await;

        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_leeway_out_of_range_rejected_at_startup() {
        assert!(TestApp::with_env(&[("JWT_LEEWAY", "18446744073709551615")]).is_err());
        assert!(TestApp::with_env(&[("JWT_LEEWAY", "86401")]).is_err());
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let app = TestApp::new().unwrap();
        let mut claims = valid_claims("alice");
        claims["aud"] = json!("someone-else");
        let token = sign(&claims, JWT_SECRET);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &bearer(&token))])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error().0, "BACKEND_NOT_APPLICABLE");
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let app = TestApp::new().unwrap();
        let token = sign(&valid_claims("alice"), "another-secret");

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &bearer(&token))])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_subject() {
        let app = TestApp::new().unwrap();
        let mut claims = valid_claims("alice");
        claims.as_object_mut().unwrap().remove("sub");
        let token = sign(&claims, JWT_SECRET);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &bearer(&token))])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), Some("Basic, Bearer"));
    }

    #[tokio::test]
    async fn test_bearer_rejected_when_disabled() {
        let app = TestApp::with_env(&[("JWT_SECRET", "")]).unwrap();
        let token = sign(&valid_claims("alice"), JWT_SECRET);

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &bearer(&token))])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), Some("Basic"));
        assert_eq!(
            response.error().1,
            "Invalid Authorization header: Must start with Basic"
        );
    }
}

mod test_missing_credentials {
    use super::*;

    #[tokio::test]
    async fn test_all_challenges_reported() {
        let app = TestApp::new().unwrap();

        let response = app.call(Method::GET, "/hello", &[]).await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), Some("Basic, Bearer"));
        assert_eq!(
            response.error(),
            (
                "BACKEND_NOT_APPLICABLE".to_string(),
                "Cannot authenticate the request".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let app = TestApp::new().unwrap();

        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), "Digest abc")])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error().0, "BACKEND_NOT_APPLICABLE");
    }
}
