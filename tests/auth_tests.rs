//! OAuth2 refresh against a local token endpoint.

use integrations_drive_browser::auth::{AuthProvider, OAuth2Provider, ServiceAccountProvider};
use integrations_drive_browser::errors::AuthenticationError;
use secrecy::ExposeSecret;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OAuth2Provider {
    OAuth2Provider::new_with_strings("client-id", "client-secret", "refresh-me")
        .with_token_url(format!("{}/token", server.uri()))
}

#[tokio::test]
async fn test_refresh_token_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.fresh",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "https://www.googleapis.com/auth/drive"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    assert!(provider.is_expired());

    let token = provider.get_access_token().await.unwrap();
    assert_eq!(token.token.expose_secret(), "ya29.fresh");
    assert_eq!(token.authorization_header(), "Bearer ya29.fresh");
    assert_eq!(token.scopes, vec!["https://www.googleapis.com/auth/drive"]);

    // Served from cache; the mock expects exactly one call.
    let again = provider.get_access_token().await.unwrap();
    assert_eq!(again.token.expose_secret(), "ya29.fresh");
    assert!(!provider.is_expired());
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "brief",
            "token_type": "Bearer",
            "expires_in": 60
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider(&server);
    provider.get_access_token().await.unwrap();
    provider.get_access_token().await.unwrap();
}

#[tokio::test]
async fn test_rejected_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
        )
        .mount(&server)
        .await;

    let result = provider(&server).refresh_token().await;
    match result {
        Err(AuthenticationError::RefreshFailed(message)) => {
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("expected refresh failure, got {:?}", other.map(|t| t.token_type)),
    }
}

#[tokio::test]
async fn test_service_account_rejects_bad_key_file() {
    let result = ServiceAccountProvider::from_json(r#"{"client_email": "x"}"#, vec![]);
    assert!(result.is_err());

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(ServiceAccountProvider::from_json_file(&missing, vec![]).await.is_err());
}
