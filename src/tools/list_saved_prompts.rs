use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use crate::{
    orchestrator::PromptOrchestrator,
    tools::{json_result, to_mcp_error},
};

#[derive(Serialize)]
struct SavedPromptsResponse {
    count: usize,
    prompts: Vec<String>,
}

pub async fn list_saved_prompts(orchestrator: &PromptOrchestrator) -> Result<CallToolResult, McpError> {
    let prompts = orchestrator
        .list_saved_prompts()
        .await
        .map_err(to_mcp_error)?;
    json_result(&SavedPromptsResponse {
        count: prompts.len(),
        prompts,
    })
}
