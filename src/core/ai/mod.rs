use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

pub mod http;
pub mod prompt;
pub mod provider;
pub mod providers;

pub use prompt::build_fix_prompt;
pub use provider::{AIProvider, ProviderConfig};
pub use providers::GeminiProvider;

use crate::config::GeminiConfig;
use crate::infrastructure::error::AiError;

/// 修复建议
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestion {
    pub patch: String,
    pub model: String,
    pub response_time: String,
}

/// AI 修复建议服务
///
/// 启动时构建一次；未配置 API key 时不存在，调用方需先检查。
pub struct FixAdvisor {
    provider: Arc<dyn AIProvider>,
    config: ProviderConfig,
}

impl FixAdvisor {
    pub fn new(provider: Arc<dyn AIProvider>, config: ProviderConfig) -> Self {
        Self { provider, config }
    }

    /// 根据配置创建 Gemini 修复服务，缺少 API key 时返回 `None`
    pub fn from_config(config: &GeminiConfig) -> Option<Self> {
        if config.api_key.is_none() {
            tracing::warn!("Gemini API key not found, AI suggestions will be disabled");
            return None;
        }

        tracing::info!(model = %config.model, "Gemini AI initialized");
        Some(Self::new(
            Arc::new(GeminiProvider::new()),
            ProviderConfig::from(config),
        ))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// 为一条违规生成修复建议
    pub async fn suggest_fix(&self, violation: &str, code: &str) -> Result<FixSuggestion, AiError> {
        let prompt = build_fix_prompt(violation, code);

        let start_time = Instant::now();
        let patch = self.provider.generate(&prompt, &self.config).await?;
        let duration = start_time.elapsed().as_millis();

        tracing::info!(
            provider = self.provider.name(),
            duration_ms = duration as u64,
            "AI response received"
        );

        Ok(FixSuggestion {
            patch,
            model: self.config.model.clone(),
            response_time: format!("{}ms", duration),
        })
    }
}
