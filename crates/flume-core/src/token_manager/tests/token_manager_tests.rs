use super::{harness, token_body};
use crate::clock::Clock;
use crate::token_manager::TokenStore;
use chrono::Duration as ChronoDuration;
use flume_types::UpstreamError;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_ensure_valid_without_token_authenticates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({
            "grant_type": "password",
            "client_id": "client-id",
            "client_secret": "client-secret",
            "username": "user@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1", 604800)))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    let token = h.manager.ensure_valid().await.expect("authentication should succeed");
    assert_eq!(token, "access-1");

    let status = h.manager.status();
    assert!(status.has_access_token);
    assert!(status.has_refresh_token);
    assert!(!status.is_expired);
    assert!(!status.needs_auth);
    assert_eq!(status.token_expiry, Some(h.clock.now() + ChronoDuration::seconds(604800)));
    assert_eq!(status.access_token_preview.as_deref(), Some("access-1..."));
}

#[tokio::test]
async fn test_ensure_valid_with_fresh_token_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1", 7200)))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    h.manager.authenticate().await.expect("authenticate");

    // Still beyond the one-hour refresh window.
    h.clock.advance(ChronoDuration::minutes(30));
    for _ in 0..3 {
        assert_eq!(h.manager.ensure_valid().await.ok().as_deref(), Some("access-1"));
    }
}

#[tokio::test]
async fn test_ensure_valid_refreshes_inside_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({"grant_type": "password"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1", 3600)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2", "", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    h.manager.authenticate().await.expect("authenticate");

    h.clock.advance(ChronoDuration::minutes(10));
    assert!(h.manager.status().is_expiring_soon);

    let token = h.manager.ensure_valid().await.expect("refresh should succeed");
    assert_eq!(token, "access-2");

    // Refresh token is kept when the response does not rotate it.
    let status = h.manager.status();
    assert_eq!(status.refresh_token_preview.as_deref(), Some("refresh-1..."));
}

#[tokio::test]
async fn test_failed_refresh_falls_back_to_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({"grant_type": "refresh_token"})))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({"grant_type": "password"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-new", "refresh-new", 3600)))
        .expect(2)
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    h.manager.authenticate().await.expect("authenticate");

    // Past hard expiry with a refresh token present: refresh is tried first.
    h.clock.advance(ChronoDuration::hours(2));
    assert!(h.manager.status().is_expired);

    let token = h.manager.ensure_valid().await.expect("fallback authentication");
    assert_eq!(token, "access-new");
    assert!(h.delay.sleeps().is_empty());
}

#[tokio::test]
async fn test_invalidate_clears_memory_and_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1", 3600)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let token_path = dir.path().join("tokens.json");
    let h = harness(&server, TokenStore::new(&token_path));

    h.manager.authenticate().await.expect("authenticate");
    assert!(token_path.exists());

    h.manager.invalidate().await;

    let status = h.manager.status();
    assert!(!status.has_access_token);
    assert!(status.needs_auth);
    assert!(h.manager.access_token().is_none());
    assert!(!token_path.exists());
}

#[tokio::test]
async fn test_authenticate_rejects_failure_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "message": "Invalid credentials",
            "data": [],
            "count": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    let err = h.manager.authenticate().await.unwrap_err();
    assert_eq!(
        err,
        UpstreamError::Logical { endpoint: "token".to_string(), message: "Invalid credentials".to_string() }
    );
    assert!(h.manager.access_token().is_none());
}

#[tokio::test]
async fn test_authenticate_rejects_empty_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("", "refresh", 3600)))
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    assert!(matches!(h.manager.authenticate().await, Err(UpstreamError::Logical { .. })));
}

#[tokio::test]
async fn test_load_persisted_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("persisted", "refresh", 86400)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let token_path = dir.path().join("tokens.json");

    let first = harness(&server, TokenStore::new(&token_path));
    first.manager.authenticate().await.expect("authenticate");

    let second = harness(&server, TokenStore::new(&token_path));
    assert!(second.manager.load_persisted().await);
    assert_eq!(second.manager.ensure_valid().await.ok().as_deref(), Some("persisted"));
}

#[test]
fn test_status_without_token_needs_auth() {
    let manager = crate::token_manager::TokenManager::new(
        reqwest::Client::new(),
        super::settings("http://127.0.0.1:9"),
        TokenStore::disabled(),
    );
    let status = manager.status();
    assert!(!status.has_access_token);
    assert!(status.is_expired);
    assert!(status.needs_auth);
    assert!(status.token_file.is_none());
    assert!(status.access_token_preview.is_none());
}

#[tokio::test]
async fn test_concurrent_callers_share_one_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("access-1", "refresh-1", 604800))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    let results = futures::future::join_all((0..8).map(|_| h.manager.ensure_valid())).await;

    for result in results {
        assert_eq!(result.ok().as_deref(), Some("access-1"));
    }
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({"grant_type": "password"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1", 7200)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({"grant_type": "refresh_token"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("access-2", "refresh-2", 604800))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, TokenStore::disabled());
    h.manager.authenticate().await.expect("authenticate");
    h.clock.advance(ChronoDuration::minutes(90));

    let results = futures::future::join_all((0..8).map(|_| h.manager.ensure_valid())).await;
    for result in results {
        assert_eq!(result.ok().as_deref(), Some("access-2"));
    }
}
