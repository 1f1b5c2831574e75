use async_trait::async_trait;

use crate::config::GeminiConfig;
use crate::infrastructure::error::AiError;

/// AI 提供商配置
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl From<&GeminiConfig> for ProviderConfig {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// AI 提供商接口
#[async_trait]
pub trait AIProvider: Send + Sync {
    fn name(&self) -> &str;

    /// 生成响应（非流式）
    async fn generate(&self, prompt: &str, config: &ProviderConfig) -> Result<String, AiError>;
}
