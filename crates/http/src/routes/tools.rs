use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use meridian_core::ErrorBuilder;

use crate::extract::Authenticated;
use crate::state::AppState;

pub async fn list_tools(State(state): State<AppState>) -> Json<meridian_boundary::ToolListResponse> {
    Json(state.service.list_tools())
}

/// `POST /v1/tools/:name`. A non-empty body must declare
/// `Content-Type: application/json`; anything else is rejected before the
/// registry ever sees it.
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Authenticated(ctx): Authenticated,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if !body.is_empty() {
        let is_json = headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if !is_json {
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
    }

    let params: serde_json::Value = if body.is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(err) => {
                let error = ErrorBuilder::new(format!("body is not valid JSON: {err}")).validation();
                let response = meridian_boundary::ToolResponse::err(&error);
                return (StatusCode::BAD_REQUEST, Json(response)).into_response();
            }
        }
    };

    let response = state.service.execute_tool(&name, params, &ctx).await;
    match &response {
        meridian_boundary::ToolResponse::Success { .. } => (StatusCode::OK, Json(response)).into_response(),
        meridian_boundary::ToolResponse::Failure { error, .. } => {
            let status = if error.code == "NOT_FOUND" { StatusCode::NOT_FOUND } else { StatusCode::BAD_REQUEST };
            (status, Json(response)).into_response()
        }
    }
}
