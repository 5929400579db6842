//! Command-line and environment configuration shared by both binaries

use std::sync::Arc;

use clap::Args;

use crate::agent::AgentConfig;
use crate::model::{ChatClient, ChatError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model endpoint and agent limits
#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// API key for the chat-completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model identifier
    #[arg(long, env = "OPENAI_MODEL", default_value = "deepseek-v3-2-251201")]
    pub model: String,

    /// Model invocations allowed per user message
    #[arg(long, env = "AGENTBOX_MAX_TURNS", default_value_t = 50)]
    pub max_turns: usize,

    /// Wall-clock limit for one shell command, in seconds
    #[arg(long, env = "AGENTBOX_COMMAND_TIMEOUT", default_value_t = 60)]
    pub command_timeout: u64,

    /// max_tokens for the top-level agent
    #[arg(long, env = "AGENTBOX_MAX_TOKENS", default_value_t = 32 * 1024)]
    pub max_tokens: u32,

    /// OTLP collector endpoint; traces are exported only when set
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl ModelArgs {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model.clone(),
            max_turns: self.max_turns,
            max_output_tokens: self.max_tokens,
            command_timeout_secs: self.command_timeout,
            ..AgentConfig::default()
        }
    }

    pub fn client(&self) -> Result<Arc<ChatClient>, ChatError> {
        Ok(Arc::new(ChatClient::new(
            self.base_url.clone(),
            self.api_key.clone(),
        )?))
    }
}
