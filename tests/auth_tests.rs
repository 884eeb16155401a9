use quickaway::{EcobeeClient, Error, ThermostatGateway};
use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tokens_expiring_at(expires_at: &str) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let session = json!({
        "access_token": "access",
        "token_type": "Bearer",
        "refresh_token": "refresh",
        "expires_at": expires_at,
    });
    std::fs::write(file.path(), session.to_string()).unwrap();
    file
}

fn client_for(server: &MockServer, tokens: &NamedTempFile) -> EcobeeClient {
    EcobeeClient::builder(tokens.path().to_str().unwrap())
        .base_url(server.uri())
        .build()
        .unwrap()
}

fn token_response() -> serde_json::Value {
    json!({
        "access_token": "new-access",
        "token_type": "Bearer",
        "refresh_token": "new-refresh",
        "expires_in": 3600,
    })
}

async fn mount_empty_summary(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/1/thermostatSummary"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"revisionList": []})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn expired_session_refreshes_before_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(query_param("code", "refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response()))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_summary(&server).await;

    let tokens = tokens_expiring_at("2000-01-01T00:00:00Z");
    let mut client = client_for(&server, &tokens);
    client.fetch_summary().await.expect("summary should succeed");

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(tokens.path()).unwrap()).unwrap();
    assert_eq!(saved["access_token"], "new-access");
    assert_eq!(saved["refresh_token"], "new-refresh");
}

#[tokio::test]
async fn fresh_session_skips_the_token_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response()))
        .expect(0)
        .mount(&server)
        .await;
    mount_empty_summary(&server).await;

    let tokens = tokens_expiring_at("2999-01-01T00:00:00Z");
    let mut client = client_for(&server, &tokens);
    client.fetch_summary().await.expect("summary should succeed");
}

#[tokio::test]
async fn unauthorized_invalidates_then_next_call_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/thermostatSummary"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let tokens = tokens_expiring_at("2999-01-01T00:00:00Z");
    let mut client = client_for(&server, &tokens);

    let err = client.fetch_summary().await.unwrap_err();
    assert!(matches!(err, Error::AuthRejected), "got {err:?}");

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(tokens.path()).unwrap()).unwrap();
    assert!(saved["expires_at"].is_null(), "session should be invalidated");

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response()))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_summary(&server).await;

    client.fetch_summary().await.expect("refreshed call should succeed");
}

#[tokio::test]
async fn no_tokens_on_file_is_not_authorized() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut client = EcobeeClient::builder(dir.path().join("tokens.json").to_str().unwrap())
        .base_url(server.uri())
        .build()
        .unwrap();

    let err = client.fetch_summary().await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized), "got {err:?}");
}

#[tokio::test]
async fn refresh_failure_is_auth_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = tokens_expiring_at("2000-01-01T00:00:00Z");
    let mut client = client_for(&server, &tokens);

    let err = client.fetch_summary().await.unwrap_err();
    assert!(matches!(err, Error::AuthRejected), "got {err:?}");
}

#[tokio::test]
async fn install_flow_persists_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .and(query_param("response_type", "ecobeePin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ecobeePin": "dn8v",
            "code": "authcode",
            "scope": "smartWrite",
            "expires_in": 9,
            "interval": 30,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("grant_type", "ecobeePin"))
        .and(query_param("code", "authcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("tokens.json");
    let mut client = EcobeeClient::builder(token_path.to_str().unwrap())
        .base_url(server.uri())
        .build()
        .unwrap();
    assert!(!client.is_authorized());

    let challenge = client.request_pin().await.expect("pin request should succeed");
    assert_eq!(challenge.pin, "dn8v");
    assert_eq!(challenge.expires_in, 9);

    client
        .complete_install(&challenge.code)
        .await
        .expect("install should succeed");
    assert!(client.is_authorized());

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&token_path).unwrap()).unwrap();
    assert_eq!(saved["refresh_token"], "new-refresh");
}
