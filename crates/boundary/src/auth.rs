use meridian_core::{AgentId, ErrorBuilder, MemoryError};

/// Process-wide write-gating policy, `permissionsMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Permissive,
    Standard,
    Strict,
}

impl PermissionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "permissive" => Some(Self::Permissive),
            "standard" => Some(Self::Standard),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub rest_api_key: Option<String>,
    pub admin_key: Option<String>,
    pub rest_agent_id: AgentId,
    pub permission_mode: PermissionMode,
}

/// The two credential channels: `Authorization: Bearer <key>`
/// and `X-API-Key: <key>`.
#[derive(Debug, Clone, Default)]
pub struct Credentials<'a> {
    pub bearer: Option<&'a str>,
    pub api_key: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub agent_id: AgentId,
    pub is_admin: bool,
}

/// Authenticates a request against either credential channel. In
/// `Permissive` mode, an absent `restApiKey` configuration admits every
/// caller as the configured `restAgentId` rather than rejecting outright.
pub fn authenticate(credentials: &Credentials<'_>, config: &AuthConfig) -> Result<AuthContext, MemoryError> {
    let presented = credentials.bearer.or(credentials.api_key);

    let Some(expected) = &config.rest_api_key else {
        if config.permission_mode == PermissionMode::Permissive {
            return Ok(AuthContext { agent_id: config.rest_agent_id.clone(), is_admin: false });
        }
        return Err(unauthorized("no restApiKey configured and permission mode is not permissive"));
    };

    let Some(presented) = presented else {
        return Err(unauthorized("missing Authorization bearer token or X-API-Key header"));
    };

    if presented == expected {
        return Ok(AuthContext { agent_id: config.rest_agent_id.clone(), is_admin: is_admin_key(presented, config) });
    }
    if is_admin_key(presented, config) {
        return Ok(AuthContext { agent_id: config.rest_agent_id.clone(), is_admin: true });
    }
    Err(unauthorized("credential does not match restApiKey or adminKey"))
}

fn is_admin_key(presented: &str, config: &AuthConfig) -> bool {
    config.admin_key.as_deref().is_some_and(|admin| admin == presented)
}

/// Guards destructive or project-creation actions: the admin
/// key is required unless the process runs in `Permissive` mode.
pub fn require_admin(ctx: &AuthContext, mode: PermissionMode) -> Result<(), MemoryError> {
    if mode == PermissionMode::Permissive || ctx.is_admin {
        return Ok(());
    }
    Err(ErrorBuilder::new("this action requires the admin key").suggestion("retry with the adminKey credential").permission_denied())
}

/// Guards any write under `Strict` mode, which requires the admin key for
/// every mutation, not only destructive ones.
pub fn require_write(ctx: &AuthContext, mode: PermissionMode) -> Result<(), MemoryError> {
    if mode != PermissionMode::Strict || ctx.is_admin {
        return Ok(());
    }
    Err(ErrorBuilder::new("strict permission mode requires the admin key for writes").permission_denied())
}

fn unauthorized(message: impl Into<String>) -> MemoryError {
    ErrorBuilder::new(message).unauthorized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: PermissionMode) -> AuthConfig {
        AuthConfig {
            rest_api_key: Some("rest-key".to_string()),
            admin_key: Some("admin-key".to_string()),
            rest_agent_id: "svc-agent".to_string(),
            permission_mode: mode,
        }
    }

    #[test]
    fn bearer_matching_rest_key_authenticates() {
        let creds = Credentials { bearer: Some("rest-key"), api_key: None };
        let ctx = authenticate(&creds, &config(PermissionMode::Standard)).unwrap();
        assert!(!ctx.is_admin);
    }

    #[test]
    fn api_key_matching_admin_key_is_admin() {
        let creds = Credentials { bearer: None, api_key: Some("admin-key") };
        let ctx = authenticate(&creds, &config(PermissionMode::Standard)).unwrap();
        assert!(ctx.is_admin);
    }

    #[test]
    fn missing_credentials_is_unauthorized() {
        let creds = Credentials::default();
        assert!(authenticate(&creds, &config(PermissionMode::Standard)).is_err());
    }

    #[test]
    fn require_admin_rejects_non_admin_outside_permissive() {
        let ctx = AuthContext { agent_id: "a".to_string(), is_admin: false };
        assert!(require_admin(&ctx, PermissionMode::Standard).is_err());
        assert!(require_admin(&ctx, PermissionMode::Permissive).is_ok());
    }
}
