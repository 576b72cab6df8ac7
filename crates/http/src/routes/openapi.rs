use axum::Json;

/// Static OpenAPI 3.0.3 document served publicly at `/v1/openapi.json`.
/// Describes the list-and-execute shape rather than one path per tool,
/// since the tool catalog is data-driven and discoverable at runtime via
/// `GET /v1/tools`.
pub async fn openapi_document() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Meridian Memory Service",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/v1/tools": {
                "get": {
                    "summary": "List registered tools",
                    "responses": { "200": { "description": "tool catalog" } },
                },
            },
            "/v1/tools/{name}": {
                "post": {
                    "summary": "Execute a tool",
                    "parameters": [
                        { "name": "name", "in": "path", "required": true, "schema": { "type": "string" } },
                    ],
                    "requestBody": {
                        "content": { "application/json": { "schema": { "type": "object" } } },
                    },
                    "responses": {
                        "200": { "description": "tool result, success or failure payload" },
                        "400": { "description": "validation error" },
                        "401": { "description": "missing or invalid credentials" },
                        "404": { "description": "unknown tool" },
                        "415": { "description": "non-JSON body" },
                        "500": { "description": "internal error" },
                    },
                    "security": [{ "bearerAuth": [] }, { "apiKeyAuth": [] }],
                },
            },
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer" },
                "apiKeyAuth": { "type": "apiKey", "in": "header", "name": "X-API-Key" },
            },
        },
    }))
}
