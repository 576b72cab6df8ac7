use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use meridian_core::{ErrorBuilder, MemoryError};

use crate::auth::AuthContext;

/// Static description of a tool, returned verbatim by `list()`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "hasActions")]
    pub has_actions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<&'static [&'static str]>,
}

impl ToolSpec {
    pub fn simple(name: &'static str, description: &'static str) -> Self {
        Self { name, description, has_actions: false, actions: None }
    }

    pub fn with_actions(name: &'static str, description: &'static str, actions: &'static [&'static str]) -> Self {
        Self { name, description, has_actions: true, actions: Some(actions) }
    }
}

/// One tool in the registry. Simple tools ignore `action` entirely; an
/// action-based tool declares its valid set via [`ToolSpec::actions`] and
/// the dispatcher validates `params.action` against it before calling in.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn call(&self, action: Option<&str>, params: serde_json::Value, ctx: &AuthContext) -> Result<serde_json::Value, MemoryError>;
}

#[derive(Debug, Serialize)]
pub struct ToolListEntry {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "hasActions")]
    pub has_actions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<&'static [&'static str]>,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolListEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ToolResponse {
    Success { success: bool, data: serde_json::Value },
    Failure { success: bool, error: ToolError },
}

#[derive(Debug, Serialize)]
pub struct ToolError {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolResponse {
    fn ok(data: serde_json::Value) -> Self {
        Self::Success { success: true, data }
    }

    pub fn err(error: &MemoryError) -> Self {
        let context = error.context();
        let mut details = serde_json::Map::new();
        if !context.valid_actions.is_empty() {
            details.insert("validActions".to_string(), serde_json::json!(context.valid_actions));
        }
        for (key, value) in &context.extra {
            details.insert(key.clone(), serde_json::json!(value));
        }
        Self::Failure {
            success: false,
            error: ToolError {
                message: context.message.clone(),
                code: error.code(),
                details: if details.is_empty() { None } else { Some(serde_json::Value::Object(details)) },
            },
        }
    }
}

/// Data-driven tool dispatcher. Validates the action contract
/// before any tool body runs, so every registered tool can assume
/// `action.is_some()` iff it declared actions.
#[derive(Default)]
pub struct ToolRegistry<'a> {
    tools: HashMap<&'static str, Box<dyn Tool + 'a>>,
}

impl<'a> ToolRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool + 'a>) {
        self.tools.insert(tool.spec().name, tool);
    }

    pub fn list(&self) -> ToolListResponse {
        let mut tools: Vec<ToolListEntry> = self
            .tools
            .values()
            .map(|t| {
                let spec = t.spec();
                ToolListEntry { name: spec.name, description: spec.description, has_actions: spec.has_actions, actions: spec.actions }
            })
            .collect();
        tools.sort_by_key(|t| t.name);
        let count = tools.len();
        ToolListResponse { tools, count }
    }

    pub async fn execute(&self, name: &str, params: serde_json::Value, ctx: &AuthContext) -> ToolResponse {
        let Some(tool) = self.tools.get(name) else {
            return ToolResponse::err(&ErrorBuilder::new(format!("no tool named '{name}'")).resource("tool").identifier(name).not_found());
        };
        let spec = tool.spec();

        let action = match validate_action(&spec, &params) {
            Ok(action) => action,
            Err(err) => return ToolResponse::err(&err),
        };

        match tool.call(action.as_deref(), params, ctx).await {
            Ok(data) => ToolResponse::ok(data),
            Err(err) => ToolResponse::err(&err),
        }
    }
}

fn validate_action(spec: &ToolSpec, params: &serde_json::Value) -> Result<Option<String>, MemoryError> {
    let Some(valid_actions) = spec.actions else {
        return Ok(None);
    };
    let Some(raw) = params.get("action") else {
        return Err(ErrorBuilder::new(format!("tool '{}' requires an action", spec.name)).valid_actions(valid_actions.iter().copied()).missing_action());
    };
    let Some(action) = raw.as_str() else {
        return Err(ErrorBuilder::new(format!("tool '{}' action must be a string", spec.name)).field("action").invalid_action_type());
    };
    if !valid_actions.contains(&action) {
        return Err(ErrorBuilder::new(format!("'{action}' is not a valid action for '{}'", spec.name))
            .extra("providedAction", action)
            .valid_actions(valid_actions.iter().copied())
            .invalid_action());
    }
    Ok(Some(action.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    #[async_trait]
    impl Tool for Echo {
        fn spec(&self) -> ToolSpec {
            ToolSpec::with_actions("echo", "echoes params", &["ping"])
        }
        async fn call(&self, action: Option<&str>, params: serde_json::Value, _ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
            Ok(serde_json::json!({"action": action, "params": params}))
        }
    }

    fn ctx() -> AuthContext {
        AuthContext { agent_id: "tester".to_string(), is_admin: false }
    }

    #[tokio::test]
    async fn missing_action_on_action_based_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo));
        let response = registry.execute("echo", serde_json::json!({}), &ctx()).await;
        match response {
            ToolResponse::Failure { error, .. } => assert_eq!(error.code, "MISSING_ACTION"),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo));
        let response = registry.execute("echo", serde_json::json!({"action": "pong"}), &ctx()).await;
        match response {
            ToolResponse::Failure { error, .. } => assert_eq!(error.code, "INVALID_ACTION"),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn wrong_type_action_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo));
        let response = registry.execute("echo", serde_json::json!({"action": 1}), &ctx()).await;
        match response {
            ToolResponse::Failure { error, .. } => assert_eq!(error.code, "INVALID_ACTION_TYPE"),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let response = registry.execute("nope", serde_json::json!({}), &ctx()).await;
        match response {
            ToolResponse::Failure { error, .. } => assert_eq!(error.code, "NOT_FOUND"),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn valid_action_calls_through() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo));
        let response = registry.execute("echo", serde_json::json!({"action": "ping"}), &ctx()).await;
        match response {
            ToolResponse::Success { data, .. } => assert_eq!(data["action"], "ping"),
            _ => panic!("expected success"),
        }
    }
}
