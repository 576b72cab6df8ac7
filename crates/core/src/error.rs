use serde::Serialize;
use std::collections::BTreeMap;

/// The full error taxonomy shared by every layer of the service.
///
/// Validation and policy errors are surfaced immediately and never retried.
/// Transient errors are retried by callers inside a circuit-breaker envelope
/// (see [`crate::breaker::CircuitBreaker`]); on exhaustion they are rewrapped
/// as [`MemoryError::RetryExhausted`].
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[serde(tag = "code", content = "context")]
pub enum MemoryError {
    #[error("validation failed: {0}")]
    Validation(ErrorContext),

    #[error("not found: {0}")]
    NotFound(ErrorContext),

    #[error("conflict: {0}")]
    Conflict(ErrorContext),

    #[error("permission denied: {0}")]
    PermissionDenied(ErrorContext),

    #[error("file locked: {0}")]
    FileLocked(ErrorContext),

    #[error("unauthorized: {0}")]
    Unauthorized(ErrorContext),

    #[error("missing action: {0}")]
    MissingAction(ErrorContext),

    #[error("invalid action: {0}")]
    InvalidAction(ErrorContext),

    #[error("invalid action type: {0}")]
    InvalidActionType(ErrorContext),

    #[error("size limit exceeded: {0}")]
    SizeLimitExceeded(ErrorContext),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(ErrorContext),

    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(ErrorContext),

    #[error("rate limited: {0}")]
    RateLimited(ErrorContext),

    #[error("timeout: {0}")]
    Timeout(ErrorContext),

    #[error("retry exhausted: {0}")]
    RetryExhausted(ErrorContext),

    #[error("network error: {0}")]
    NetworkError(ErrorContext),

    #[error("embedding error: {0}")]
    EmbeddingError(ErrorContext),

    #[error("vector error: {0}")]
    VectorError(ErrorContext),

    #[error("database error: {0}")]
    DatabaseError(ErrorContext),

    #[error("migration error: {0}")]
    MigrationError(ErrorContext),

    #[error("extraction failed: {0}")]
    ExtractionFailed(ErrorContext),

    #[error("extraction unavailable: {0}")]
    ExtractionUnavailable(ErrorContext),

    #[error("internal error: {0}")]
    Internal(ErrorContext),

    #[error("unknown error: {0}")]
    Unknown(ErrorContext),
}

/// Structured context attached to every error, user-visible
/// format: `{error|message, code, context?}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorContext {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub valid_actions: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub extra: BTreeMap<String, String>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Fluent builder producing a consistent [`ErrorContext`] shape
#[derive(Debug, Clone, Default)]
pub struct ErrorBuilder {
    ctx: ErrorContext,
}

impl ErrorBuilder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ctx: ErrorContext {
                message: message.into(),
                ..Default::default()
            },
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.ctx.field = Some(field.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.ctx.resource = Some(resource.into());
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.ctx.identifier = Some(identifier.into());
        self
    }

    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.ctx.suggestion = Some(suggestion.into());
        self
    }

    pub fn valid_actions(mut self, actions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ctx.valid_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.extra.insert(key.into(), value.into());
        self
    }

    pub fn validation(self) -> MemoryError {
        MemoryError::Validation(self.ctx)
    }

    pub fn not_found(self) -> MemoryError {
        MemoryError::NotFound(self.ctx)
    }

    pub fn conflict(self) -> MemoryError {
        MemoryError::Conflict(self.ctx)
    }

    pub fn permission_denied(self) -> MemoryError {
        MemoryError::PermissionDenied(self.ctx)
    }

    pub fn file_locked(self) -> MemoryError {
        MemoryError::FileLocked(self.ctx)
    }

    pub fn unauthorized(self) -> MemoryError {
        MemoryError::Unauthorized(self.ctx)
    }

    pub fn missing_action(self) -> MemoryError {
        MemoryError::MissingAction(self.ctx)
    }

    pub fn invalid_action(self) -> MemoryError {
        MemoryError::InvalidAction(self.ctx)
    }

    pub fn invalid_action_type(self) -> MemoryError {
        MemoryError::InvalidActionType(self.ctx)
    }

    pub fn internal(self) -> MemoryError {
        MemoryError::Internal(self.ctx)
    }

    pub fn build(self, kind: fn(ErrorContext) -> MemoryError) -> MemoryError {
        kind(self.ctx)
    }
}

impl MemoryError {
    /// The stable `code` string used in the boundary-facing error payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::FileLocked(_) => "FILE_LOCKED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::MissingAction(_) => "MISSING_ACTION",
            Self::InvalidAction(_) => "INVALID_ACTION",
            Self::InvalidActionType(_) => "INVALID_ACTION_TYPE",
            Self::SizeLimitExceeded(_) => "SIZE_LIMIT_EXCEEDED",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::CircuitBreakerOpen(_) => "CIRCUIT_BREAKER_OPEN",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Timeout(_) => "TIMEOUT",
            Self::RetryExhausted(_) => "RETRY_EXHAUSTED",
            Self::NetworkError(_) => "NETWORK_ERROR",
            Self::EmbeddingError(_) => "EMBEDDING_ERROR",
            Self::VectorError(_) => "VECTOR_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::MigrationError(_) => "MIGRATION_ERROR",
            Self::ExtractionFailed(_) => "EXTRACTION_FAILED",
            Self::ExtractionUnavailable(_) => "EXTRACTION_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Validation(c)
            | Self::NotFound(c)
            | Self::Conflict(c)
            | Self::PermissionDenied(c)
            | Self::FileLocked(c)
            | Self::Unauthorized(c)
            | Self::MissingAction(c)
            | Self::InvalidAction(c)
            | Self::InvalidActionType(c)
            | Self::SizeLimitExceeded(c)
            | Self::ServiceUnavailable(c)
            | Self::CircuitBreakerOpen(c)
            | Self::RateLimited(c)
            | Self::Timeout(c)
            | Self::RetryExhausted(c)
            | Self::NetworkError(c)
            | Self::EmbeddingError(c)
            | Self::VectorError(c)
            | Self::DatabaseError(c)
            | Self::MigrationError(c)
            | Self::ExtractionFailed(c)
            | Self::ExtractionUnavailable(c)
            | Self::Internal(c)
            | Self::Unknown(c) => c,
        }
    }

    /// Whether this error kind may be retried by a caller wrapping the
    /// operation in a circuit-breaker envelope.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::Timeout(_) | Self::ServiceUnavailable(_)
        )
    }

    /// Redact absolute paths, IPs, connection strings, and stack-like frames
    /// from a message before it leaves the process in production mode.
    pub fn sanitized_message(&self, production: bool) -> String {
        let raw = self.context().message.clone();
        if !production {
            return raw;
        }
        sanitize(&raw)
    }
}

fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("at ") || trimmed.starts_with("0:") || trimmed.contains(".rs:") {
            continue; // drop stack-frame-looking lines
        }
        out.push_str(&redact_tokens(line));
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn redact_tokens(line: &str) -> String {
    let mut result = String::new();
    for word in line.split_inclusive(' ') {
        let trimmed = word.trim();
        if looks_like_path(trimmed) || looks_like_ip(trimmed) || looks_like_connection_string(trimmed) {
            let suffix = &word[trimmed.len()..];
            result.push_str("[redacted]");
            result.push_str(suffix);
        } else {
            result.push_str(word);
        }
    }
    result
}

fn looks_like_path(token: &str) -> bool {
    token.starts_with('/') && token.len() > 1
}

fn looks_like_ip(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 4 && parts.iter().all(|p| !p.is_empty() && p.parse::<u8>().is_ok())
}

fn looks_like_connection_string(token: &str) -> bool {
    token.contains("://") && token.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_variant() {
        let err = ErrorBuilder::new("bad field").field("name").validation();
        assert_eq!(err.code(), "VALIDATION");
        assert_eq!(err.context().field.as_deref(), Some("name"));
    }

    #[test]
    fn sanitizes_paths_and_ips_in_production() {
        let err = ErrorBuilder::new("failed to open /etc/secrets/db.conf at 10.0.0.5").internal();
        let sanitized = err.sanitized_message(true);
        assert!(!sanitized.contains("/etc/secrets"));
        assert!(!sanitized.contains("10.0.0.5"));
        let unsanitized = err.sanitized_message(false);
        assert!(unsanitized.contains("/etc/secrets"));
    }

    #[test]
    fn transient_classification() {
        assert!(ErrorBuilder::new("x").build(MemoryError::Timeout).is_transient());
        assert!(!ErrorBuilder::new("x").validation().is_transient());
    }
}
