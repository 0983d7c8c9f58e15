pub mod log_sink;
pub mod tool_errors;
pub mod tool_registry;
pub mod tool_schema;

pub use log_sink::{LogLevel, LogSink, TracingLogSink};
pub use tool_errors::{RegistryError, ToolError};
pub use tool_registry::{RenderText, Tool, ToolContext, ToolRegistry};
pub use tool_schema::{FunctionDef, Scalar, SchemaViolation};
