//! Plain HTTP API handlers.

use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;

use crate::core::live::GeminiLiveModel;

/// Health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "intervox-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// List the supported Gemini Live models.
pub async fn list_models() -> impl IntoResponse {
    let models: Vec<_> = GeminiLiveModel::all()
        .iter()
        .map(|m| {
            json!({
                "id": m.as_str(),
                "default": *m == GeminiLiveModel::default(),
            })
        })
        .collect();
    Json(json!({ "models": models }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_shape() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_models_shape() {
        let response = list_models().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
