//! Per-route authentication integration tests
//!
//! Covers route overrides (backend, exempt methods, disabled routes) and
//! the settings-driven exemptions.

use axum::http::{header::AUTHORIZATION, Method, StatusCode};

use crate::common::*;

mod test_generic {
    use super::*;

    #[tokio::test]
    async fn test_get_is_exempt() {
        let app = TestApp::new().unwrap();

        let response = app.call(Method::GET, "/generic", &[]).await;

        assert_eq!(response.status, StatusCode::OK);
        let body = response.json();
        assert_eq!(body["type"], "No authentication for GET");
        assert_eq!(body["authenticated"], false);
    }

    #[test_log::test(tokio::test)]
    async fn test_post_reads_user_header() {
        let app = TestApp::new().unwrap();

        let response = app.call(Method::POST, "/generic", &[("User", "foo")]).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["info"], "User header foo");
    }

    #[tokio::test]
    async fn test_post_without_header() {
        let app = TestApp::new().unwrap();

        let response = app.call(Method::POST, "/generic", &[]).await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.challenge(), None);
        assert_eq!(
            response.error(),
            (
                "BACKEND_NOT_APPLICABLE".to_string(),
                "Missing User header".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_global_backend_not_used() {
        let app = TestApp::new().unwrap();
        let auth = basic_auth(DEMO_USERNAME, DEMO_PASSWORD);

        let response = app
            .call(Method::POST, "/generic", &[(AUTHORIZATION.as_str(), &auth)])
            .await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error().1, "Missing User header");
    }
}

mod test_open_routes {
    use super::*;

    #[tokio::test]
    async fn test_no_auth_any_method() {
        let app = TestApp::new().unwrap();

        for method in [Method::GET, Method::POST, Method::DELETE] {
            let response = app.call(method, "/no-auth", &[]).await;
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, "No auth in this resource");
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().unwrap();

        let response = app.call(Method::GET, "/health", &[]).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "OK");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_authenticated() {
        let app = TestApp::new().unwrap();

        let response = app.call(Method::GET, "/missing", &[]).await;

        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}

mod test_settings {
    use super::*;

    #[tokio::test]
    async fn test_exempt_template_skips_authentication() {
        let app = TestApp::with_env(&[("AUTH_EXEMPT_TEMPLATES", "/hello")]).unwrap();

        let response = app.call(Method::GET, "/hello", &[]).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["message"], "Hello anonymous");
    }

    #[tokio::test]
    async fn test_exempt_template_requiring_result() {
        let app = TestApp::with_env(&[("AUTH_EXEMPT_TEMPLATES", "/generic")]).unwrap();

        let response = app.call(Method::POST, "/generic", &[]).await;

        // The handler requires a result, which was never installed.
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error().0, "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_exempt_methods_from_settings() {
        let app = TestApp::with_env(&[("AUTH_EXEMPT_METHODS", "post")]).unwrap();

        // The route override still exempts only GET.
        let response = app.call(Method::POST, "/generic", &[]).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let response = app.call(Method::GET, "/hello", &[]).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_exempt_method_on_global_backend() {
        let app = TestApp::with_env(&[("AUTH_EXEMPT_METHODS", "get")]).unwrap();

        let response = app.call(Method::GET, "/hello", &[]).await;

        assert_eq!(response.status, StatusCode::OK);
        let body = response.json();
        assert_eq!(body["message"], "Hello anonymous");
        assert!(body["backend"].is_null());

        // Credentials are ignored on exempt requests.
        let auth = basic_auth(DEMO_USERNAME, DEMO_PASSWORD);
        let response = app
            .call(Method::GET, "/hello", &[(AUTHORIZATION.as_str(), &auth)])
            .await;
        assert_eq!(response.json()["message"], "Hello anonymous");
    }
}
