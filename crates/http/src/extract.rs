use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use meridian_boundary::{authenticate, AuthContext, Credentials};

use crate::state::AppState;

/// Extracts and authenticates the caller from either credential channel
/// before a handler body runs. A request with no usable credential (and no
/// permissive bypass configured) never reaches a tool.
pub struct Authenticated(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let api_key = parts.headers.get("x-api-key").and_then(|v| v.to_str().ok());

        let credentials = Credentials { bearer, api_key };
        authenticate(&credentials, state.service.auth_config())
            .map(Authenticated)
            .map_err(|err| (crate::error::status_for(&err), err.context().message.clone()))
    }
}
