//! Router-level smoke tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use intervox_gateway::config::ServerConfig;
use intervox_gateway::core::live::GeminiLiveModel;
use intervox_gateway::session::MemoryResultStore;
use intervox_gateway::{AppState, routes};

fn test_state(api_key: Option<&str>) -> Arc<AppState> {
    AppState::with_store(
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            tls: None,
            gemini_api_key: api_key.map(String::from),
            default_model: GeminiLiveModel::default(),
            result_store_path: "unused".into(),
            cors_allowed_origins: None,
        },
        Arc::new(MemoryResultStore::new()),
    )
}

#[tokio::test]
async fn health_check_responds_ok() {
    let app = routes::create_router().with_state(test_state(Some("key")));

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "intervox-gateway");
}

#[tokio::test]
async fn models_endpoint_lists_catalog() {
    let app = routes::create_router().with_state(test_state(Some("key")));

    let response = app
        .oneshot(Request::get("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), GeminiLiveModel::all().len());
    assert!(models.iter().any(|m| m["default"] == true));
}

#[tokio::test]
async fn live_endpoint_requires_websocket_upgrade() {
    let app = routes::create_router().with_state(test_state(Some("key")));

    // A plain GET without upgrade headers must not be treated as a
    // successful session start.
    let response = app
        .oneshot(Request::get("/ws/live").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = routes::create_router().with_state(test_state(None));

    let response = app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
