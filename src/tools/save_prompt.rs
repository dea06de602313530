use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    orchestrator::PromptOrchestrator,
    tools::{json_result, to_mcp_error},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SavePromptRequest {
    #[schemars(description = "Prompt text to keep for later")]
    pub prompt: String,
}

pub async fn save_prompt(
    orchestrator: &PromptOrchestrator,
    Parameters(request): Parameters<SavePromptRequest>,
) -> Result<CallToolResult, McpError> {
    let saved = orchestrator
        .save_prompt(&request.prompt)
        .await
        .map_err(to_mcp_error)?;
    json_result(&saved)
}
