use std::path::Path;

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
pub struct UploadVideoRequest {
    #[schemars(description = "Path of the video to upload, inside the output directory or relative to it")]
    pub video_path: String,
    #[schemars(description = "Destination blob name. Defaults to generated_videos/<file name>")]
    pub blob_name: Option<String>,
}

pub async fn upload_video(
    orchestrator: &PromptOrchestrator,
    Parameters(request): Parameters<UploadVideoRequest>,
) -> Result<CallToolResult, McpError> {
    let outcome = orchestrator
        .upload_video(Path::new(request.video_path.trim()), request.blob_name.as_deref())
        .await
        .map_err(to_mcp_error)?;
    json_result(&outcome)
}
