use super::UpstreamClient;
use crate::rate_limiter::RateLimiter;
use crate::sink::RecordingSink;
use crate::token_manager::{OAuthSettings, TokenManager, TokenStore};
use chrono::NaiveDate;
use flume_types::{DeviceKind, Endpoint, UpstreamError, UsageBucket};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    client: UpstreamClient,
    tokens: Arc<TokenManager>,
    sink: Arc<RecordingSink>,
}

fn fixture(server: &MockServer, store: TokenStore) -> Fixture {
    let settings = OAuthSettings {
        base_url: server.uri(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        username: "user@example.com".to_string(),
        password: "hunter2".to_string(),
    };
    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(http.clone(), settings, store));
    let sink = Arc::new(RecordingSink::new());
    let client = UpstreamClient::new(
        http,
        &server.uri(),
        Arc::new(RateLimiter::new(Duration::ZERO)),
        tokens.clone(),
        sink.clone(),
    );
    Fixture { client, tokens, sink }
}

async fn mount_token(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [{
                "token_type": "bearer",
                "access_token": "access-token-value",
                "expires_in": 604800,
                "refresh_token": "refresh-token-value"
            }],
            "count": 1
        })))
        .expect(expected)
        .mount(server)
        .await;
}

fn day(d: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 8, d)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[tokio::test]
async fn test_list_devices_sends_bearer_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me/devices"))
        .and(header("authorization", "Bearer access-token-value"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [
                {"id": "6248", "type": 2, "location": {"name": "Home"}},
                {"id": "1111", "type": 1}
            ],
            "count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    let devices = f.client.list_devices().await.expect("devices");
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].kind, DeviceKind::Sensor);
    assert_eq!(devices[0].display_name(), "Home");
    assert_eq!(devices[1].kind, DeviceKind::Bridge);
    assert_eq!(devices[1].display_name(), "1111");
}

#[tokio::test]
async fn test_unauthorized_invalidates_tokens() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me/devices"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let token_path = dir.path().join("tokens.json");
    let f = fixture(&server, TokenStore::new(&token_path));

    let err = f.client.list_devices().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!f.tokens.status().has_access_token);
    assert!(!token_path.exists());
}

#[tokio::test]
async fn test_late_unauthorized_keeps_refreshed_token() {
    let server = MockServer::start().await;
    let grant = |access: &str, refresh: &str| {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [{
                "token_type": "bearer",
                "access_token": access,
                "expires_in": 604800,
                "refresh_token": refresh
            }]
        }))
    };
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({"grant_type": "password"})))
        .respond_with(grant("access-1", "refresh-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({"grant_type": "refresh_token"})))
        .respond_with(grant("access-2", "refresh-2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/devices"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let token_path = dir.path().join("tokens.json");
    let f = fixture(&server, TokenStore::new(&token_path));
    f.tokens.authenticate().await.expect("authenticate");

    let (listing, refreshed) = tokio::join!(f.client.list_devices(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.tokens.refresh().await
    });

    assert!(listing.unwrap_err().is_unauthorized());
    refreshed.expect("refresh");
    assert_eq!(f.tokens.access_token().as_deref(), Some("access-2"));
    assert!(token_path.exists());
}

#[tokio::test]
async fn test_invalidate_if_only_clears_matching_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let f = fixture(&server, TokenStore::disabled());
    f.tokens.authenticate().await.expect("authenticate");

    assert!(!f.tokens.invalidate_if("some-older-token").await);
    assert!(f.tokens.status().has_access_token);
    assert!(f.tokens.invalidate_if("access-token-value").await);
    assert!(!f.tokens.status().has_access_token);
}

#[tokio::test]
async fn test_rate_limited_is_counted_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me/devices"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    let err = f.client.list_devices().await.unwrap_err();
    assert_eq!(err, UpstreamError::RateLimited { endpoint: "devices".to_string() });
    assert_eq!(f.sink.rate_limited(), vec![Endpoint::Devices]);
    // The token survives a 429.
    assert!(f.tokens.status().has_access_token);
}

#[tokio::test]
async fn test_http_and_logical_failures() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me/devices"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "message": "Invalid user"
        })))
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    assert_eq!(
        f.client.list_devices().await.unwrap_err(),
        UpstreamError::Http { endpoint: "devices".to_string(), status: 503, body: "maintenance".to_string() }
    );
    assert_eq!(
        f.client.list_devices().await.unwrap_err(),
        UpstreamError::Logical { endpoint: "devices".to_string(), message: "Invalid user".to_string() }
    );
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    assert!(matches!(f.client.list_devices().await, Err(UpstreamError::Decode { .. })));
}

#[tokio::test]
async fn test_current_rate_resolves_user_id_once() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [{"id": 4321, "email_address": "user@example.com"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/4321/devices/6248/query/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [{"active": true, "gpm": 1.25, "datetime": "2025-08-01 12:00:00"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    let first = f.client.get_current_rate("6248").await.expect("rate");
    let second = f.client.get_current_rate("6248").await.expect("rate");
    assert_eq!(first.value, 1.25);
    assert!(first.active);
    assert_eq!(first.units, "gallons_per_minute");
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_current_rate_empty_data_is_zero() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"user_id": "77"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/77/devices/6248/query/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    let rate = f.client.get_current_rate("6248").await.expect("rate");
    assert_eq!(rate.value, 0.0);
    assert!(!rate.active);
}

#[tokio::test]
async fn test_current_rate_without_user_id_fails() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": [{}]})))
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    // The token is not a JWT, so there is no claim to fall back on.
    assert!(matches!(
        f.client.get_current_rate("6248").await,
        Err(UpstreamError::MissingUserId { .. })
    ));
}

#[tokio::test]
async fn test_bulk_history_query_encoding() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/me/devices/6248/query"))
        .and(body_partial_json(serde_json::json!({
            "queries": [{
                "request_id": "daily_total_water_usage",
                "bucket": "DAY",
                "since_datetime": "2025-08-01 00:00:00",
                "until_datetime": "2025-08-03 00:00:00"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [{"daily_total_water_usage": [
                {"datetime": "2025-08-01 00:00:00", "value": 120.5},
                {"datetime": "2025-08-02 00:00:00", "value": 98.0}
            ]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    let points = f.client.query_bulk_history("6248", day(1), day(3)).await.expect("history");
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date(), "2025-08-01");
    assert_eq!(points[1].value, 98.0);
}

#[tokio::test]
async fn test_usage_query_omits_absent_until() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/me/devices/6248/query"))
        .respond_with(|req: &wiremock::Request| {
            let body: serde_json::Value =
                serde_json::from_slice(&req.body).unwrap_or(serde_json::Value::Null);
            let query = &body["queries"][0];
            if query.get("until_datetime").is_some() || query["bucket"] != "HR" {
                return ResponseTemplate::new(400);
            }
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"query_data": [["2025-08-01 10:00:00", 3.5]]}]
            }))
        })
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    let points =
        f.client.query_usage("6248", UsageBucket::Hour, day(1), None).await.expect("usage");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, 3.5);
}

#[tokio::test]
async fn test_validate_authentication() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": [{"id": 1}]})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let f = fixture(&server, TokenStore::disabled());
    assert_eq!(f.client.validate_authentication().await, Err(UpstreamError::NoToken));

    f.tokens.authenticate().await.expect("authenticate");
    assert!(f.client.validate_authentication().await.is_ok());

    assert!(f.client.validate_authentication().await.unwrap_err().is_unauthorized());
    assert!(f.tokens.status().needs_auth);
}
