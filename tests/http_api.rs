//! Exercises the HTTP backend implementations against a local axum server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::RawQuery;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use url::Url;

use linkkit::{
    CatalogApi, CreateConnectionRequest, Endpoints, Error, HttpLinkApi, LinkApi, LinkConfig,
    SECRET_HEADER,
};

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn config_for(base: &str) -> LinkConfig {
    let base_url = Url::parse(base).expect("parse base url");
    LinkConfig {
        endpoints: Endpoints {
            platform_api: base_url.clone(),
            link_api: base_url.clone(),
            tools_api: base_url.clone(),
            lookup_api: base_url.join("api").expect("join lookup base"),
        },
        secret: Some("sk_test_secret".to_string()),
        timeout: Duration::from_secs(2),
    }
}

fn definition_row() -> Value {
    json!({
        "_id": "cd_1",
        "platform": "stripe",
        "settings": {"oauth": false},
        "frontend": {
            "spec": {"title": "Stripe"},
            "connectionForm": {"formData": [
                {"name": "apiKey", "label": "API Key", "type": "text", "required": true}
            ]}
        }
    })
}

#[tokio::test]
async fn test_create_session_forwards_host_headers() {
    let captured: Arc<Mutex<Option<HeaderMap>>> = Arc::new(Mutex::new(None));
    let session_id = uuid::Uuid::new_v4().to_string();

    let router = Router::new().route(
        "/tokens",
        post({
            let captured = captured.clone();
            let session_id = session_id.clone();
            move |headers: HeaderMap| {
                let captured = captured.clone();
                let session_id = session_id.clone();
                async move {
                    *captured.lock().unwrap() = Some(headers);
                    Json(json!({
                        "sessionId": session_id,
                        "linkSettings": {"connectedPlatforms": [], "connectToken": "tok_1"}
                    }))
                }
            }
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let headers = HashMap::from([("x-org-token".to_string(), "org_1".to_string())]);
    let session = api
        .create_link_session(&format!("{base}/tokens"), &headers)
        .await
        .unwrap();

    assert_eq!(session.session_id, session_id);
    assert_eq!(
        session.link_settings.connect_token.as_deref(),
        Some("tok_1")
    );
    let seen = captured.lock().unwrap().take().unwrap();
    assert_eq!(seen.get("x-org-token").unwrap(), "org_1");
}

#[tokio::test]
async fn test_session_endpoints_speak_session_id_bodies() {
    let get_bodies: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let update_bodies: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

    let router = Router::new()
        .route(
            "/public/v1/link-sessions/get",
            post({
                let get_bodies = get_bodies.clone();
                move |Json(body): Json<Value>| {
                    let get_bodies = get_bodies.clone();
                    async move {
                        get_bodies.lock().unwrap().push(body);
                        Json(json!([{"sessionId": "sess_1"}]))
                    }
                }
            }),
        )
        .route(
            "/public/v1/link-sessions/update",
            post({
                let update_bodies = update_bodies.clone();
                move |Json(body): Json<Value>| {
                    let update_bodies = update_bodies.clone();
                    async move {
                        update_bodies.lock().unwrap().push(body);
                        StatusCode::OK
                    }
                }
            }),
        );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let rows = api.get_link_session("sess_1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].session_id, "sess_1");
    assert_eq!(get_bodies.lock().unwrap()[0], json!({"sessionId": "sess_1"}));

    let form = serde_json::Map::from_iter([("apiKey".to_string(), json!("sk"))]);
    api.update_link_session("sess_1", Some(&form)).await.unwrap();
    api.update_link_session("sess_1", None).await.unwrap();

    let updates = update_bodies.lock().unwrap();
    assert_eq!(
        updates[0],
        json!({"sessionId": "sess_1", "formData": {"apiKey": "sk"}})
    );
    assert_eq!(updates[1], json!({"sessionId": "sess_1"}));
}

#[tokio::test]
async fn test_session_failure_maps_to_session_unavailable() {
    let router = Router::new().route(
        "/public/v1/link-sessions/get",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let err = api.get_link_session("sess_1").await.unwrap_err();
    assert!(matches!(err, Error::SessionUnavailable(_)));
}

#[tokio::test]
async fn test_definition_served_from_cache_after_first_fetch() {
    let hits = Arc::new(AtomicU32::new(0));
    let router = Router::new().route(
        "/v1/public/connection-definitions",
        get({
            let hits = hits.clone();
            move |headers: HeaderMap| {
                let hits = hits.clone();
                async move {
                    assert_eq!(headers.get(SECRET_HEADER).unwrap(), "sk_test_secret");
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"rows": [definition_row()]}))
                }
            }
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let first = api.get_connection_definition("cd_1").await.unwrap();
    let second = api.get_connection_definition("cd_1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.platform, "stripe");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_definition_rows_not_found() {
    let router = Router::new().route(
        "/v1/public/connection-definitions",
        get(|| async { Json(json!({"rows": []})) }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let err = api.get_connection_definition("cd_gone").await.unwrap_err();
    assert!(matches!(err, Error::DefinitionNotFound(id) if id == "cd_gone"));
}

#[tokio::test]
async fn test_oauth_definition_list_filtered_and_cached() {
    let hits = Arc::new(AtomicU32::new(0));
    let router = Router::new().route(
        "/v1/public/connection-oauth-definition-schema",
        get({
            let hits = hits.clone();
            move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"rows": [
                        {"_id": "oauth_1", "connectionPlatform": "shopify",
                         "frontend": {"callbackUri": "https://link.example/cb",
                                      "redirectUri": "https://shopify.example/auth"}},
                        {"_id": "oauth_2", "connectionPlatform": "stripe",
                         "frontend": {"callbackUri": "https://link.example/cb",
                                      "redirectUri": "https://stripe.example/auth"}}
                    ]}))
                }
            }
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let stripe = api.get_oauth_definition("stripe").await.unwrap();
    assert_eq!(stripe.frontend.redirect_uri, "https://stripe.example/auth");

    let err = api.get_oauth_definition("notion").await.unwrap_err();
    assert!(matches!(err, Error::OAuthNotConfigured(p) if p == "notion"));

    // Both lookups were answered by one list fetch.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_create_sends_flattened_body() {
    let bodies: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new().route(
        "/public/v1/connections/create-embedded",
        post({
            let bodies = bodies.clone();
            move |Json(body): Json<Value>| {
                let bodies = bodies.clone();
                async move {
                    bodies.lock().unwrap().push(body);
                    Json(json!({"_id": "conn_1", "platform": "stripe"}))
                }
            }
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let request = CreateConnectionRequest {
        connect_token: Some("tok_1".to_string()),
        form_data: serde_json::Map::from_iter([("apiKey".to_string(), json!("sk_live"))]),
        definition_id: "cd_1".to_string(),
        platform: "stripe".to_string(),
        headers: HashMap::new(),
    };
    let connection = api.create_connection(&request).await.unwrap();
    assert_eq!(connection.id.as_deref(), Some("conn_1"));

    let body = &bodies.lock().unwrap()[0];
    assert_eq!(body["apiKey"], "sk_live");
    assert_eq!(body["connectionDefinitionId"], "cd_1");
    assert_eq!(body["platform"], "stripe");
    assert_eq!(body["connectToken"], "tok_1");
}

#[tokio::test]
async fn test_rejection_message_extracted_from_error_body() {
    let router = Router::new().route(
        "/public/v1/connections/create-embedded",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": {"message": "API key is invalid"}})),
            )
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let err = api
        .create_connection(&CreateConnectionRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SubmissionRejected(m) if m == "API key is invalid"));
}

#[tokio::test]
async fn test_unreachable_backend_yields_generic_rejection() {
    // Bind then drop so the port refuses connections.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let err = api
        .create_connection(&CreateConnectionRequest::default())
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::SubmissionRejected(m) if m == "Something went wrong. Please try again later.")
    );
}

#[tokio::test]
async fn test_assistant_lookup_reads_snake_case_response() {
    let bodies: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new().route(
        "/api/assistant/lookup",
        post({
            let bodies = bodies.clone();
            move |Json(body): Json<Value>| {
                let bodies = bodies.clone();
                async move {
                    bodies.lock().unwrap().push(body);
                    Json(json!({"success": true, "assistant_id": "asst_1"}))
                }
            }
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let assistant = api.lookup_assistant("sk_embed").await.unwrap();
    assert_eq!(assistant, "asst_1");
    assert_eq!(
        bodies.lock().unwrap()[0],
        json!({
            "secret": "sk_embed",
            "options": {
                "retryAlternative": true,
                "includeMetadata": false,
                "skipToolsFetch": true,
            },
        })
    );
}

#[tokio::test]
async fn test_unsuccessful_lookup_is_retryable_transport() {
    let router = Router::new().route(
        "/api/assistant/lookup",
        post(|| async { Json(json!({"success": false})) }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let err = api.lookup_assistant("sk_embed").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_tool_listing_mapped_from_wire_rows() {
    let query: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let router = Router::new().route(
        "/v1/tools",
        get({
            let query = query.clone();
            move |RawQuery(q): RawQuery| {
                let query = query.clone();
                async move {
                    *query.lock().unwrap() = q;
                    Json(json!({"status_code": 0, "data": [{
                        "id": 7,
                        "name": "gdrive",
                        "title": "Google Drive",
                        "provider": "google",
                        "description": "File storage",
                        "category": "storage",
                        "tags": ["files"],
                        "logo_url": "https://cdn.example/gdrive.png"
                    }]}))
                }
            }
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let tools = api.list_tools(Some("asst 1")).await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].id, "7");
    assert_eq!(tools[0].title, "Google Drive");
    assert_eq!(tools[0].categories, vec!["storage", "files"]);
    assert_eq!(tools[0].long_description.as_deref(), Some("<p>File storage</p>"));
    assert_eq!(
        query.lock().unwrap().as_deref(),
        Some("assistant_id=asst%201")
    );
}

#[tokio::test]
async fn test_actions_unwrapped_from_nested_envelope() {
    let router = Router::new().route(
        "/v1/connection-model-actions",
        get(|| async {
            Json(json!({"status_code": 0, "data": {"args": {"rows": [
                {"title": "Create Invoice", "connectionPlatform": "stripe"}
            ]}}}))
        }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();

    let actions = api.tool_actions("stripe").await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].title, "Create Invoice");

    // A non-zero status is a transport-level failure for the caller.
    let router = Router::new().route(
        "/v1/connection-model-actions",
        get(|| async { Json(json!({"status_code": 12, "data": null})) }),
    );
    let base = spawn_server(router).await;
    let api = HttpLinkApi::new(config_for(&base)).unwrap();
    assert!(api.tool_actions("stripe").await.is_err());
}
