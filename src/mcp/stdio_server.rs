// =============================================================================
// MCP STDIO SERVER
// =============================================================================
//
// rmcp owns the protocol: framing, the initialize handshake, request ids and
// cancellation notifications. This handler only publishes the registry's
// tools and turns each `tools/call` into one `ToolRegistry::dispatch`.
//
// stdout carries the protocol only. Logging goes to stderr (see main.rs).

use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::tools::{ToolError, ToolRegistry, TracingLogSink};

pub const SERVER_NAME: &str = "google-workspace-mcp";

#[derive(Clone)]
pub struct WorkspaceServer {
    registry: Arc<ToolRegistry>,
}

impl WorkspaceServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        tracing::info!(tools = self.registry.len(), "MCP server listening on stdio");
        let running = self.serve(rmcp::transport::stdio()).await?;
        let reason = running.waiting().await?;
        tracing::info!(?reason, "MCP session ended");
        Ok(())
    }

    fn tools(&self) -> Vec<McpTool> {
        self.registry
            .definitions()
            .into_iter()
            .map(|def| McpTool::new(def.name, def.description, def.input_schema))
            .collect()
    }

    /// Run one tool call, giving up as soon as `ct` fires. Dropping the
    /// dispatch future aborts the tool's task.
    pub async fn invoke(
        &self,
        request: CallToolRequestParam,
        request_id: String,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name.to_string();
        let arguments = request.arguments.map(Value::Object).unwrap_or(Value::Null);
        let log = Arc::new(TracingLogSink::new(name.as_str(), request_id.as_str()));

        let outcome = tokio::select! {
            outcome = self.registry.dispatch(&name, arguments, log) => outcome,
            _ = ct.cancelled() => {
                tracing::info!(tool = %name, request_id = %request_id, "Cancelled tool call");
                return Err(McpError::internal_error("Request cancelled", None));
            }
        };

        match outcome {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(err @ ToolError::UnknownTool(_)) => Err(McpError::invalid_params(err.to_string(), None)),
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "Tool call failed");
                Ok(CallToolResult::error(vec![Content::text(err.normalized().message)]))
            }
        }
    }
}

impl ServerHandler for WorkspaceServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = %request.name, id = %context.id, "tools/call");
        self.invoke(request, context.id.to_string(), context.ct).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::SessionManager;
    use crate::core::testing::{CountingProvider, MockWorkspace};
    use crate::core::tools::{Tool, ToolContext};
    use crate::tools::script_tools;
    use async_trait::async_trait;
    use rmcp::model::ErrorCode;
    use rmcp::service::RunningService;
    use rmcp::{RoleClient, ServiceError};
    use serde_json::json;
    use std::time::Duration;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        type Input = serde_json::Map<String, Value>;
        type Output = String;

        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn description(&self) -> &'static str {
            "Takes a long time."
        }

        async fn execute(&self, _: &Self::Input, _: &ToolContext) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("woke up".to_string())
        }
    }

    fn server() -> (WorkspaceServer, Arc<MockWorkspace>) {
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::new(CountingProvider::new()),
            workspace.clone(),
        ));
        let mut registry = ToolRegistry::new(sessions);
        script_tools::register(&mut registry).unwrap();
        registry.register(Sleepy).unwrap();
        (WorkspaceServer::new(Arc::new(registry)), workspace)
    }

    /// Connect an rmcp client to `server` over an in-memory pipe.
    async fn connect(server: WorkspaceServer) -> RunningService<RoleClient, ()> {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            let running = server.serve(server_io).await?;
            running.waiting().await?;
            anyhow::Ok(())
        });
        ().serve(client_io).await.unwrap()
    }

    fn call(name: &str, arguments: Value) -> CallToolRequestParam {
        CallToolRequestParam {
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
        }
    }

    fn text_of(result: &CallToolResult) -> &str {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.as_str())
            .unwrap()
    }

    #[test]
    fn server_info_reports_protocol_and_tools_capability() {
        let (server, _) = server();
        let info = server.get_info();

        assert_eq!(info.protocol_version, ProtocolVersion::V_2024_11_05);
        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, SERVER_NAME);
        assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn tools_list_publishes_input_schemas() {
        let (server, _) = server();
        let client = connect(server).await;

        let listed = client.list_tools(Default::default()).await.unwrap();
        assert_eq!(listed.tools.len(), 5);
        let projects = listed
            .tools
            .iter()
            .find(|t| t.name == "getScriptProjects")
            .unwrap();
        assert_eq!(projects.input_schema["type"], "object");
        assert_eq!(projects.input_schema["properties"]["pageSize"]["maximum"], 50);

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn successful_calls_return_text_content() {
        let (server, workspace) = server();
        let client = connect(server).await;

        let result = client
            .call_tool(call("getScriptProjects", json!({ "pageSize": 2 })))
            .await
            .unwrap();

        assert_ne!(result.is_error, Some(true));
        assert!(text_of(&result).contains("(2 found)"));
        assert_eq!(workspace.files.calls.count(), 1);

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn tool_failures_are_results_not_protocol_errors() {
        let (server, workspace) = server();
        let client = connect(server).await;

        let result = client
            .call_tool(call("getScriptProjects", json!({ "pageSize": 0 })))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("pageSize must be at least 1"));
        assert_eq!(workspace.total_calls(), 0);

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_tools_are_invalid_params() {
        let (server, _) = server();
        let client = connect(server).await;

        let err = client
            .call_tool(call("nope", json!({})))
            .await
            .unwrap_err();
        match err {
            ServiceError::McpError(data) => {
                assert_eq!(data.code, ErrorCode::INVALID_PARAMS);
                assert_eq!(data.message, "Unknown tool: nope");
            }
            other => panic!("expected an MCP error, got {other:?}"),
        }

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn cancelling_stops_a_running_call() {
        let (server, _) = server();
        let ct = CancellationToken::new();

        let pending = tokio::spawn({
            let ct = ct.clone();
            async move { server.invoke(call("sleepy", json!({})), "10".to_string(), ct).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        ct.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("cancelled call kept running")
            .unwrap();
        let err = outcome.unwrap_err();
        assert_eq!(err.message, "Request cancelled");
    }
}
