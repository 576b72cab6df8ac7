pub mod breaker;
pub mod error;
pub mod retry;
pub mod scope;

pub use breaker::{BreakerState, CircuitBreaker};
pub use error::{ErrorBuilder, ErrorContext, MemoryError};
pub use scope::{EntryKind, Scope, ScopeChain, ScopeType};

/// The agent identifier recorded on every write as `createdBy`.
pub type AgentId = String;

/// An entry's immutable identity, independent of its current version.
pub type EntryId = uuid::Uuid;
