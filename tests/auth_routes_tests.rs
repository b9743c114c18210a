//! HTTP-level tests driving the router with `oneshot`

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
        Router,
    };
    use chrono::Duration;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use authvault_server::auth::{
        AuthService, CookieManager, InMemoryStore, TokenCodec, TokenService,
    };
    use authvault_server::routes::app_router;
    use authvault_server::state::AppState;

    fn app() -> Router {
        app_with(Duration::minutes(30), vec![])
    }

    fn app_with(access_ttl: Duration, superusers: Vec<String>) -> Router {
        let store = Arc::new(InMemoryStore::new());
        let tokens = TokenService::new(
            TokenCodec::new("router-secret"),
            store.clone(),
            access_ttl,
            Duration::days(7),
        );
        let auth = Arc::new(AuthService::new(store, tokens, 4).with_superusers(superusers));
        let cookies = CookieManager::new(false, Duration::minutes(30), Duration::days(7));
        app_router(AppState::new(auth, cookies, None))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn cookie_value(response: &Response, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        set_cookies(response).into_iter().find_map(|c| {
            c.split(';')
                .next()
                .and_then(|pair| pair.strip_prefix(prefix.as_str()))
                .map(str::to_string)
        })
    }

    async fn register_and_login(app: &Router) -> Response {
        register_and_login_as(app, "alice").await
    }

    async fn register_and_login_as(app: &Router, username: &str) -> Response {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/register",
                json!({
                    "username": username,
                    "password": "correct-pw",
                    "password_again": "correct-pw"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                json!({"username": username, "password": "correct-pw", "device_info": "laptop"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
    }

    fn refresh_body(refresh: &str) -> Request<Body> {
        json_request("POST", "/auth/refresh", json!({"refresh_token": refresh}))
    }

    #[tokio::test]
    async fn test_login_sets_cookies_and_returns_pair() {
        let app = app();
        let response = register_and_login(&app).await;

        let cookies = set_cookies(&response);
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("access=") && c.contains("HttpOnly") && c.contains("SameSite=Lax")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh=")));
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );

        let refresh_cookie = cookie_value(&response, "refresh").unwrap();
        let body = body_json(response).await;
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 1800);
        assert_eq!(body["refresh_token"], refresh_cookie.as_str());
    }

    #[tokio::test]
    async fn test_wrong_password_is_generic_unauthorized() {
        let app = app();
        register_and_login(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                json!({"username": "alice", "password": "wrong-pw"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], "Authentication failed");
    }

    #[tokio::test]
    async fn test_refresh_rotation_and_reuse_over_http() {
        let app = app();
        let login = register_and_login(&app).await;
        let old_refresh = cookie_value(&login, "refresh").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(header::COOKIE, format!("refresh={}", old_refresh))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let new_refresh = cookie_value(&response, "refresh").unwrap();
        assert_ne!(new_refresh, old_refresh);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(header::COOKIE, format!("refresh={}", old_refresh))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("refresh=;") && c.contains("Max-Age=0")));
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "REAUTHENTICATION_REQUIRED");

        // The whole family was revoked, so the successor is dead too
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/refresh",
                json!({"refresh_token": new_refresh}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_from_json_body() {
        let app = app();
        let login = register_and_login(&app).await;
        let refresh = cookie_value(&login, "refresh").unwrap();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/refresh",
                json!({"refresh_token": refresh}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_without_token() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_with_bearer_and_cookie() {
        let app = app();
        let login = register_and_login(&app).await;
        let access = cookie_value(&login, "access").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], "alice");
        assert!(body.get("password_hash").is_none());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .header(header::COOKIE, format!("access={}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_and_clears_cookies() {
        let app = app();
        let login = register_and_login(&app).await;
        let access = cookie_value(&login, "access").unwrap();
        let refresh = cookie_value(&login, "refresh").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(
                        header::COOKIE,
                        format!("access={}; refresh={}", access, refresh),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookies = set_cookies(&response);
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("access=;") && c.contains("Max-Age=0")));
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("refresh=;") && c.contains("Max-Age=0")));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/refresh",
                json!({"refresh_token": refresh}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_unauthenticated_still_clears_cookies() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(set_cookies(&response).len(), 2);
    }

    #[tokio::test]
    async fn test_logout_with_expired_access_token_revokes_refresh() {
        let app = app_with(Duration::seconds(-1), vec![]);
        let login = register_and_login(&app).await;
        let access = cookie_value(&login, "access").unwrap();
        let refresh = cookie_value(&login, "refresh").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(
                        header::COOKIE,
                        format!("access={}; refresh={}", access, refresh),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(set_cookies(&response).len(), 2);

        let response = app.clone().oneshot(refresh_body(&refresh)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sessions_and_device_revoke() {
        let app = app();
        let login = register_and_login(&app).await;
        let access = cookie_value(&login, "access").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/sessions")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["device_info"], "laptop");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/auth/sessions/device")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"device_info": "laptop"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["revoked"], 1);
    }

    #[tokio::test]
    async fn test_admin_purge_requires_superuser() {
        let app = app();
        let login = register_and_login(&app).await;
        let access = cookie_value(&login, "access").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/admin/refresh-tokens")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_superuser_purges_refresh_tokens() {
        let app = app_with(Duration::minutes(30), vec!["root".to_string()]);
        let alice = register_and_login(&app).await;
        let alice_refresh = cookie_value(&alice, "refresh").unwrap();
        let root = register_and_login_as(&app, "root").await;
        let root_access = cookie_value(&root, "access").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/admin/refresh-tokens")
                    .header(header::AUTHORIZATION, format!("Bearer {}", root_access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["revoked"], 2);

        let response = app
            .clone()
            .oneshot(refresh_body(&alice_refresh))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_reports_in_memory_store() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storage"], "in-memory");
    }
}
