pub mod config;
pub mod error;
pub mod generation;
pub mod mcp_server;
pub mod media;
pub mod orchestrator;
pub mod prompt;
pub mod storage;
pub mod tools;
