use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::ai::http::shared_client;
use crate::core::ai::provider::{AIProvider, ProviderConfig};
use crate::infrastructure::error::AiError;

/// Google Generative AI 请求
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

/// Gemini 生成配置，未设置的字段使用服务端默认值
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GeminiResponse {
    /// 拼接第一个候选中的全部文本片段（跳过思考片段）
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Gemini (Google) AI 提供商
///
/// model 嵌入 URL 路径: `{api_url}/models/{model}:generateContent?key={api_key}`
pub struct GeminiProvider {
    client: &'static reqwest::Client,
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: shared_client(),
        }
    }

    fn build_url(&self, config: &ProviderConfig) -> Result<String, AiError> {
        let api_key = config.api_key.as_ref().ok_or(AiError::MissingApiKey)?;

        Ok(format!(
            "{}/models/{}:generateContent?key={}",
            config.api_url.trim_end_matches('/'),
            config.model,
            api_key
        ))
    }

    fn build_request<'a>(prompt: &'a str, config: &ProviderConfig) -> GeminiRequest<'a> {
        let generation_config = if config.temperature.is_some() || config.max_output_tokens.is_some() {
            Some(GeminiGenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            })
        } else {
            None
        };

        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config,
        }
    }
}

/// 将失败响应映射为错误，配额类错误单独区分
fn classify_failure(status: u16, body: String) -> AiError {
    if status == 429 || body.to_lowercase().contains("quota") {
        AiError::QuotaExceeded
    } else {
        AiError::Request { status, body }
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str, config: &ProviderConfig) -> Result<String, AiError> {
        let url = self.build_url(config)?;
        let request = Self::build_request(prompt, config);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request)
            .timeout(Duration::from_secs(config.timeout_secs))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), body));
        }

        let api_response: GeminiResponse = response.json().await?;
        api_response.into_text().ok_or(AiError::EmptyResponse)
    }
}
