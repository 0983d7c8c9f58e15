// =============================================================================
// TOOL REGISTRY AND DISPATCHER
// =============================================================================
//
// Tools are registered once at startup and looked up by name for every call.
// The dispatcher owns the whole invocation pipeline so individual tools never
// validate or format errors themselves:
//
//   lookup -> validate -> resolve services -> execute -> normalize

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::log_sink::LogSink;
use super::tool_errors::{RegistryError, ToolError};
use super::tool_schema::{input_schema_for, validate_arguments, FunctionDef, SchemaViolation};
use crate::core::session::{ServiceClientSet, SessionManager};

/// Turns a tool's structured result into the text returned to the agent.
pub trait RenderText {
    fn render(&self) -> String;
}

impl RenderText for String {
    fn render(&self) -> String {
        self.clone()
    }
}

/// What a tool gets to work with once its input has been validated.
pub struct ToolContext {
    pub services: ServiceClientSet,
    pub log: Arc<dyn LogSink>,
}

/// One named operation with a typed input and a typed output.
///
/// The schema generated from `Input` is checked against raw arguments before
/// `Input` is deserialized, so `execute` only ever sees input that passed it.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Input: DeserializeOwned + JsonSchema + Send + Sync + 'static;
    type Output: RenderText + Send + 'static;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Cross-field rules the schema cannot express.
    fn check(&self, _input: &Self::Input) -> Result<(), SchemaViolation> {
        Ok(())
    }

    async fn execute(&self, input: &Self::Input, ctx: &ToolContext)
        -> anyhow::Result<Self::Output>;
}

/// Type-erased registry entry for a `Tool`.
trait RegisteredTool: Send + Sync {
    fn definition(&self) -> &FunctionDef;

    fn prepare(&self, arguments: Value) -> Result<Box<dyn PreparedCall>, SchemaViolation>;
}

/// A validated call waiting for its services.
#[async_trait]
trait PreparedCall: Send + Sync {
    async fn run(&self, ctx: &ToolContext) -> anyhow::Result<String>;
}

struct Registration<T: Tool> {
    tool: Arc<T>,
    definition: FunctionDef,
}

impl<T: Tool> RegisteredTool for Registration<T> {
    fn definition(&self) -> &FunctionDef {
        &self.definition
    }

    fn prepare(&self, mut arguments: Value) -> Result<Box<dyn PreparedCall>, SchemaViolation> {
        validate_arguments(&self.definition.input_schema, &mut arguments)?;

        let input: T::Input = serde_json::from_value(arguments)
            .map_err(|e| SchemaViolation::new("arguments", e.to_string()))?;
        self.tool.check(&input)?;

        Ok(Box::new(Prepared {
            tool: Arc::clone(&self.tool),
            input,
        }))
    }
}

struct Prepared<T: Tool> {
    tool: Arc<T>,
    input: T::Input,
}

#[async_trait]
impl<T: Tool> PreparedCall for Prepared<T> {
    async fn run(&self, ctx: &ToolContext) -> anyhow::Result<String> {
        let output = self.tool.execute(&self.input, ctx).await?;
        Ok(output.render())
    }
}

/// Aborts the wrapped task if the dispatch future is dropped first, so a
/// cancelled request does not leave its tool running in the background.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct ToolRegistry {
    sessions: Arc<SessionManager>,
    tools: BTreeMap<&'static str, Arc<dyn RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            tools: BTreeMap::new(),
        }
    }

    /// Add a tool. Names must be unique.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), RegistryError> {
        let name = tool.name();
        if self.tools.contains_key(name) {
            return Err(RegistryError::DuplicateTool(name.to_string()));
        }

        let definition = FunctionDef {
            name: name.to_string(),
            description: tool.description().to_string(),
            input_schema: Arc::new(input_schema_for::<T::Input>()),
        };
        self.tools.insert(
            name,
            Arc::new(Registration {
                tool: Arc::new(tool),
                definition,
            }),
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of every registered tool, sorted by name.
    pub fn definitions(&self) -> Vec<FunctionDef> {
        self.tools
            .values()
            .map(|tool| tool.definition().clone())
            .collect()
    }

    /// Run one tool invocation end to end.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Value,
        log: Arc<dyn LogSink>,
    ) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let call = tool.prepare(arguments).map_err(|violation| {
            tracing::debug!(tool = name, field = %violation.field, "Rejected tool arguments");
            ToolError::InvalidInput {
                tool: name.to_string(),
                field: violation.field,
                reason: violation.reason,
            }
        })?;

        let services = self.sessions.client_set().await.map_err(|err| {
            log.error(&err.to_string());
            ToolError::Initialization(err.to_string())
        })?;

        let ctx = ToolContext {
            services,
            log: Arc::clone(&log),
        };

        // Run on its own task so a panicking tool surfaces as a JoinError
        // instead of taking the server down with it.
        let mut task = AbortOnDrop(tokio::spawn(async move { call.run(&ctx).await }));

        match (&mut task.0).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => {
                let message = format!("{:#}", err);
                log.error(&message);
                Err(ToolError::Execution(message))
            }
            Err(join_err) if join_err.is_panic() => {
                tracing::error!(tool = name, "Tool panicked");
                Err(ToolError::Execution(format!(
                    "Tool {} failed unexpectedly. See server logs for details.",
                    name
                )))
            }
            Err(_) => Err(ToolError::Execution(format!("Tool {} was cancelled", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{CountingProvider, MockWorkspace, RecordingLogSink};
    use anyhow::Context;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct EchoInput {
        /// Text to repeat.
        #[schemars(length(min = 1))]
        text: String,
        /// Repetitions.
        #[serde(default = "default_times")]
        #[schemars(range(min = 1, max = 3))]
        times: usize,
    }

    fn default_times() -> usize {
        1
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        type Input = EchoInput;
        type Output = String;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Repeats text."
        }

        async fn execute(&self, input: &EchoInput, ctx: &ToolContext) -> anyhow::Result<String> {
            ctx.log.info("echoing");
            Ok(input.text.repeat(input.times))
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        type Input = serde_json::Map<String, Value>;
        type Output = String;

        fn name(&self) -> &'static str {
            "failing"
        }

        fn description(&self) -> &'static str {
            "Always fails remotely."
        }

        async fn execute(&self, _: &Self::Input, ctx: &ToolContext) -> anyhow::Result<String> {
            let files = ctx.services.files.get_file("missing").await;
            files
                .map(|f| f.name)
                .context("Failed to read file missing")
        }
    }

    struct Panicking;

    #[async_trait]
    impl Tool for Panicking {
        type Input = serde_json::Map<String, Value>;
        type Output = String;

        fn name(&self) -> &'static str {
            "panicking"
        }

        fn description(&self) -> &'static str {
            "Has a bug."
        }

        async fn execute(&self, _: &Self::Input, _: &ToolContext) -> anyhow::Result<String> {
            panic!("index out of bounds");
        }
    }

    fn registry(provider: CountingProvider) -> (ToolRegistry, Arc<CountingProvider>, Arc<MockWorkspace>) {
        let provider = Arc::new(provider);
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = Arc::new(SessionManager::new(provider.clone(), workspace.clone()));
        let mut registry = ToolRegistry::new(sessions);
        registry.register(Echo).unwrap();
        registry.register(Failing).unwrap();
        registry.register(Panicking).unwrap();
        (registry, provider, workspace)
    }

    #[tokio::test]
    async fn successful_calls_return_rendered_text() {
        let (registry, _, _) = registry(CountingProvider::new());
        let log = Arc::new(RecordingLogSink::default());

        let text = registry
            .dispatch("echo", serde_json::json!({ "text": "ab", "times": 2 }), log.clone())
            .await
            .unwrap();

        assert_eq!(text, "abab");
        assert!(log.has("info", "echoing"));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let (mut registry, _, _) = registry(CountingProvider::new());
        assert_eq!(
            registry.register(Echo),
            Err(RegistryError::DuplicateTool("echo".into()))
        );
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn unknown_tools_fail_without_authenticating() {
        let (registry, provider, _) = registry(CountingProvider::new());
        let err = registry
            .dispatch("nope", Value::Null, Arc::new(RecordingLogSink::default()))
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(provider.attempts(), 0);
    }

    #[tokio::test]
    async fn invalid_input_short_circuits_before_authentication() {
        let (registry, provider, workspace) = registry(CountingProvider::new());
        let err = registry
            .dispatch(
                "echo",
                serde_json::json!({ "text": "x", "times": 4 }),
                Arc::new(RecordingLogSink::default()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidInput { ref field, .. } if field == "times"));
        assert_eq!(provider.attempts(), 0);
        assert_eq!(workspace.total_calls(), 0);
    }

    #[tokio::test]
    async fn initialization_failures_are_distinct_and_recoverable() {
        let (registry, provider, _) = registry(CountingProvider::failing(1));
        let log = Arc::new(RecordingLogSink::default());

        let err = registry
            .dispatch("echo", serde_json::json!({ "text": "x" }), log.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Initialization(_)));
        assert!(log.has("error", "initialization failed"));

        let text = registry
            .dispatch("echo", serde_json::json!({ "text": "x" }), log)
            .await
            .unwrap();
        assert_eq!(text, "x");
        assert_eq!(provider.attempts(), 2);
    }

    #[tokio::test]
    async fn remote_failures_are_wrapped_with_context() {
        let (registry, _, workspace) = registry(CountingProvider::new());
        workspace
            .files
            .calls
            .fail("files.get", crate::core::workspace::RemoteError::api(404, "File not found"));

        let err = registry
            .dispatch("failing", Value::Null, Arc::new(RecordingLogSink::default()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ToolError::Execution("Failed to read file missing: File not found".into())
        );
    }

    #[tokio::test]
    async fn panics_become_execution_errors() {
        let (registry, _, _) = registry(CountingProvider::new());
        let err = registry
            .dispatch("panicking", Value::Null, Arc::new(RecordingLogSink::default()))
            .await
            .unwrap_err();

        match err {
            ToolError::Execution(message) => assert!(message.contains("failed unexpectedly")),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn definitions_are_sorted_and_carry_schemas() {
        let (registry, _, _) = registry(CountingProvider::new());
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo", "failing", "panicking"]);
        assert!(registry.contains("echo"));

        let echo = &registry.definitions()[0];
        assert_eq!(echo.input_schema["properties"]["times"]["maximum"], 3);
        assert_eq!(echo.input_schema["properties"]["text"]["description"], "Text to repeat.");
        assert_eq!(echo.input_schema["required"], serde_json::json!(["text"]));
    }

    #[tokio::test]
    async fn whole_number_floats_reach_integer_fields() {
        let (registry, _, _) = registry(CountingProvider::new());
        let text = registry
            .dispatch(
                "echo",
                serde_json::json!({ "text": "ab", "times": 2.0 }),
                Arc::new(RecordingLogSink::default()),
            )
            .await
            .unwrap();
        assert_eq!(text, "abab");

        let err = registry
            .dispatch(
                "echo",
                serde_json::json!({ "text": "ab", "times": 1.5 }),
                Arc::new(RecordingLogSink::default()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { ref field, .. } if field == "times"));
    }
}
