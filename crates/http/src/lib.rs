pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Builds the Axum router: `GET /v1/tools`, `POST /v1/tools/:name` (both
/// behind the registry's own auth check) and `GET /v1/openapi.json`
/// (public, no credentials required).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/tools", get(routes::tools::list_tools))
        .route("/v1/tools/:name", post(routes::tools::call_tool))
        .route("/v1/openapi.json", get(routes::openapi::openapi_document))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use meridian_config::AppConfig;
    use meridian_runtime::MemoryService;
    use tower::ServiceExt;

    fn state() -> AppState {
        let dir = tempfile::tempdir().unwrap().into_path();
        let mut config = AppConfig::default();
        config.storage.db_path = dir.join("meridian.redb").to_string_lossy().to_string();
        config.auth.permissions_mode = meridian_config::PermissionsMode::Permissive;
        let service = MemoryService::new(config).unwrap();
        AppState::new(Arc::new(service))
    }

    #[tokio::test]
    async fn openapi_is_public() {
        let app = router(state());
        let response = app.oneshot(Request::builder().uri("/v1/openapi.json").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_tool_is_404() {
        let app = router(state());
        let response = app
            .oneshot(Request::builder().method("POST").uri("/v1/tools/nope").header("content-type", "application/json").body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_json_body_is_415() {
        let app = router(state());
        let response = app
            .oneshot(Request::builder().method("POST").uri("/v1/tools/nope").header("content-type", "text/plain").body(Body::from("hi")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
