//! Tool dispatcher and auth policy. The registry is
//! data-driven: `meridian-http` and `meridian-cli` both call through
//! [`ToolRegistry`] rather than matching on tool names themselves. The
//! catalog here covers the core entry, query, capture, and maintenance
//! families; additional tool families (`memory_conflict`, `graph_node`,
//! `graph_edge`, `memory_onboard`, `memory_context`, ...) register against
//! the same [`Tool`] trait and are a natural extension of this module, not a
//! different mechanism.
pub mod auth;
pub mod registry;
pub mod tools;

pub use auth::{authenticate, require_admin, require_write, AuthConfig, AuthContext, Credentials, PermissionMode};
pub use registry::{Tool, ToolError, ToolListResponse, ToolRegistry, ToolResponse, ToolSpec};
