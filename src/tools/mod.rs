pub mod concatenate_videos;
pub mod generate_video;
pub mod list_saved_prompts;
pub mod save_prompt;
pub mod upload_video;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use serde_json::json;

use crate::error::VideoError;

pub use concatenate_videos::{ConcatenateVideosRequest, concatenate_videos};
pub use generate_video::{GenerateVideoRequest, generate_video};
pub use list_saved_prompts::list_saved_prompts;
pub use save_prompt::{SavePromptRequest, save_prompt};
pub use upload_video::{UploadVideoRequest, upload_video};

#[derive(Serialize)]
pub struct VideoToolResponse {
    pub path: String,
    pub url: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

/// Input problems become `invalid_params`, everything else `internal_error`
/// with the error kind attached.
pub fn to_mcp_error(err: VideoError) -> McpError {
    if err.is_user_input() {
        return McpError::invalid_params(err.to_string(), None);
    }
    McpError::internal_error(
        err.to_string(),
        Some(json!({ "kind": format!("{:?}", err.kind()) })),
    )
}

pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string(value).map_err(|err| {
        McpError::internal_error(
            "serialize tool response failed",
            Some(serde_json::Value::String(err.to_string())),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
