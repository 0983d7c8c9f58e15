// Entry point of the Google Workspace MCP server.
//
// **Architecture Overview:**
// - `core/` = Session lifecycle, tool registry and the service ports (platform-agnostic)
// - `infra/` = Google implementations of the core traits (auth providers, REST clients)
// - `tools/` = The leaf operations published to the agent
// - `mcp/` = MCP server handler (rmcp) over stdin/stdout
//
// This file's job is to:
// 1. Load configuration
// 2. Wire the services together (dependency injection)
// 3. Register every tool
// 4. Serve requests until stdin closes

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "mcp/stdio_server.rs"]
mod mcp;
#[path = "tools/tool_catalog.rs"]
mod tools;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::core::session::SessionManager;
use crate::core::tools::ToolRegistry;
use crate::infra::google_api::GoogleServiceFactory;
use crate::infra::google_auth::AuthConfig;
use crate::mcp::WorkspaceServer;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // stdout belongs to the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Nothing talks to Google yet. The session is acquired on the first tool
    // call that needs one.

    let auth = AuthConfig::from_env();
    tracing::info!(auth = %auth.describe(), "Using Google credentials");
    let provider = auth.into_provider();

    let sessions = Arc::new(SessionManager::new(
        provider,
        Arc::new(GoogleServiceFactory::new()),
    ));

    let mut registry = ToolRegistry::new(sessions);
    tools::register_all(&mut registry).context("Failed to register tools")?;
    tracing::info!(tools = registry.len(), "Registered tools");

    let server = WorkspaceServer::new(Arc::new(registry));
    server.serve_stdio().await.context("MCP server stopped")?;

    tracing::info!("Shutting down");
    Ok(())
}
