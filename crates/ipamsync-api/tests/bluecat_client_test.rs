#![allow(clippy::unwrap_used)]
// Integration tests for `BluecatClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ipamsync_api::{BluecatClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const TOKEN: &str = "BAMAuthToken: t0k3n";

async fn setup() -> (MockServer, BluecatClient) {
    let server = MockServer::start().await;
    let client = BluecatClient::with_token(
        &server.uri(),
        SecretString::from(TOKEN.to_owned()),
        TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

fn rest(method_name: &str) -> String {
    format!("/Services/REST/v1/{method_name}")
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_stores_session_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(rest("login")))
        .and(query_param("username", "api"))
        .and(query_param("password", "hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            "Session Token-> BAMAuthToken: t0k3n <- for User : api"
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(rest("getEntities")))
        .and(header("authorization", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = BluecatClient::new(&server.uri(), TransportConfig::default()).unwrap();
    assert!(!client.is_authenticated());

    let password = SecretString::from("hunter2".to_owned());
    client.login("api", &password).await.unwrap();
    assert!(client.is_authenticated());

    let entities = client.get_entities(0, "Configuration", 0, 10).await.unwrap();
    assert!(entities.is_empty());
}

#[tokio::test]
async fn test_login_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(rest("login")))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!("Invalid username or password")),
        )
        .mount(&server)
        .await;

    let mut client = BluecatClient::new(&server.uri(), TransportConfig::default()).unwrap();
    let password = SecretString::from("wrong".to_owned());
    let result = client.login("api", &password).await;

    assert!(
        matches!(result, Err(Error::Authentication { ref message }) if message.contains("Invalid username")),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_requests_without_login_are_rejected() {
    let server = MockServer::start().await;
    let client = BluecatClient::new(&server.uri(), TransportConfig::default()).unwrap();

    let result = client.get_entities(0, "Configuration", 0, 10).await;
    assert!(matches!(result, Err(Error::NotLoggedIn)));
}

// ── Entity tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_entities_decodes_properties() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(rest("getEntities")))
        .and(query_param("parentId", "100"))
        .and(query_param("type", "IP4Network"))
        .and(query_param("start", "0"))
        .and(query_param("count", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 2001,
                "name": "lab-net",
                "type": "IP4Network",
                "properties": "CIDR=10.1.0.0/24|gateway=10.1.0.1|"
            },
            {
                "id": 2002,
                "name": null,
                "type": "IP4Network",
                "properties": "CIDR=10.1.1.0/24|"
            }
        ])))
        .mount(&server)
        .await;

    let entities = client
        .get_entities(100, "IP4Network", 0, 1000)
        .await
        .unwrap();

    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].id, 2001);
    assert_eq!(entities[0].name.as_deref(), Some("lab-net"));
    assert_eq!(entities[0].properties["CIDR"], "10.1.0.0/24");
    assert_eq!(entities[0].properties["gateway"], "10.1.0.1");
    assert!(entities[1].name.is_none());
}

#[tokio::test]
async fn test_get_entity_by_id_unknown_returns_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(rest("getEntityById")))
        .and(query_param("id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 0, "name": null, "type": null, "properties": null
        })))
        .mount(&server)
        .await;

    assert!(client.get_entity_by_id(42).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_configuration_by_name() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(rest("getEntities")))
        .and(query_param("parentId", "0"))
        .and(query_param("type", "Configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 10, "name": "Lab", "type": "Configuration", "properties": null },
            { "id": 11, "name": "Production", "type": "Configuration", "properties": null }
        ])))
        .mount(&server)
        .await;

    let first = client.find_configuration(None).await.unwrap();
    assert_eq!(first.id, 10);

    let named = client.find_configuration(Some("Production")).await.unwrap();
    assert_eq!(named.id, 11);

    let missing = client.find_configuration(Some("Staging")).await;
    assert!(missing.unwrap_err().is_not_found());
}

// ── Error handling ──────────────────────────────────────────────────

#[tokio::test]
async fn test_server_fault_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(rest("getEntities")))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = client
        .get_entities(1, "IP4Block", 0, 1000)
        .await
        .unwrap_err();

    assert!(err.is_transient(), "expected transient error, got {err:?}");
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_unauthorized_maps_to_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(rest("getEntities")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .get_entities(1, "IP4Block", 0, 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
}

#[tokio::test]
async fn test_malformed_body_reports_preview() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(rest("getEntities")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client
        .get_entities(1, "IP4Block", 0, 1000)
        .await
        .unwrap_err();

    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("maintenance")),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

// ── Forking ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_forked_client_carries_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(rest("getEntities")))
        .and(header("authorization", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let fork = client.fork().unwrap();
    client.get_entities(1, "IP4Block", 0, 10).await.unwrap();
    fork.get_entities(1, "IP4Block", 0, 10).await.unwrap();
}
