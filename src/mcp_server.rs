use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::config::Settings;
use crate::orchestrator::PromptOrchestrator;
use crate::tools::{
    ConcatenateVideosRequest, GenerateVideoRequest, SavePromptRequest, UploadVideoRequest,
};

#[derive(Clone)]
pub struct VideoPromptServer {
    tool_router: ToolRouter<Self>,
    orchestrator: Arc<PromptOrchestrator>,
    settings: Arc<Settings>,
}

impl VideoPromptServer {
    pub fn new(orchestrator: Arc<PromptOrchestrator>, settings: Arc<Settings>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            orchestrator,
            settings,
        }
    }
}

#[tool_router]
impl VideoPromptServer {
    #[tool(
        description = "Generate a video from a text prompt. Tell the user this can take several minutes. Optional aspect_ratio (16:9, 9:16) and content_policy (dont_allow, allow_adult); set upload to also store the video in the bucket"
    )]
    async fn generate_video(
        &self,
        Parameters(request): Parameters<GenerateVideoRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::generate_video(&self.orchestrator, &self.settings, Parameters(request)).await
    }

    #[tool(description = "Save a prompt to cloud storage so it can be reused later")]
    async fn save_prompt(
        &self,
        Parameters(request): Parameters<SavePromptRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::save_prompt(&self.orchestrator, Parameters(request)).await
    }

    #[tool(description = "List all previously saved prompts, oldest first")]
    async fn list_saved_prompts(&self) -> Result<CallToolResult, McpError> {
        crate::tools::list_saved_prompts(&self.orchestrator).await
    }

    #[tool(description = "Join two or more videos from the server's output directory, in the given order, into one mp4")]
    async fn concatenate_videos(
        &self,
        Parameters(request): Parameters<ConcatenateVideosRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::concatenate_videos(&self.orchestrator, &self.settings, Parameters(request)).await
    }

    #[tool(description = "Upload a video from the server's output directory to the configured bucket under generated_videos/")]
    async fn upload_video(
        &self,
        Parameters(request): Parameters<UploadVideoRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::upload_video(&self.orchestrator, Parameters(request)).await
    }
}

#[tool_handler]
impl ServerHandler for VideoPromptServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
