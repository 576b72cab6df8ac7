pub mod entry_tool;
pub mod experience_tool;
pub mod health_tool;
pub mod maintenance_tool;
pub mod query_tool;
pub mod remember_tool;
pub mod suggest_tool;

pub use entry_tool::EntryTool;
pub use experience_tool::ExperienceTool;
pub use health_tool::HealthTool;
pub use maintenance_tool::MaintenanceTool;
pub use query_tool::QueryTool;
pub use remember_tool::RememberTool;
pub use suggest_tool::SuggestTool;
