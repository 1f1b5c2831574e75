use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// 扫描错误类型
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ScanError {
    #[error("workspace error: {message}")]
    Workspace { message: String, path: Option<String> },

    #[error("execution error: {message}")]
    Execution {
        message: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("execution error: analysis timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("parse error: {message}")]
    Parse { message: String },
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Workspace,
    Execution,
    Parse,
}

impl ScanError {
    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScanError::Workspace { .. } => ErrorCategory::Workspace,
            ScanError::Execution { .. } => ErrorCategory::Execution,
            ScanError::Timeout { .. } => ErrorCategory::Execution,
            ScanError::Parse { .. } => ErrorCategory::Parse,
        }
    }

    /// 该错误是否会中止整个请求
    ///
    /// 解析错误在本地降级为空结果，其余错误直接返回给调用方。
    pub fn is_fatal(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Parse)
    }

    /// 创建工作区错误
    pub fn workspace(message: impl Into<String>, path: Option<&Path>) -> Self {
        ScanError::Workspace {
            message: message.into(),
            path: path.map(|p| p.display().to_string()),
        }
    }

    /// 创建执行错误（进程无法启动）
    pub fn execution(message: impl Into<String>) -> Self {
        ScanError::Execution {
            message: message.into(),
            exit_code: None,
            stderr: None,
        }
    }

    /// 创建执行错误（进程以无法识别的状态码退出）
    pub fn exit_failure(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        let code = exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let detail = stderr.trim();
        let message = if detail.is_empty() {
            format!("analysis tool exited with status {}", code)
        } else {
            format!("analysis tool exited with status {}: {}", code, detail)
        };

        ScanError::Execution {
            message,
            exit_code,
            stderr: Some(stderr),
        }
    }

    /// 创建超时错误
    pub fn timeout(timeout_seconds: u64) -> Self {
        ScanError::Timeout { timeout_seconds }
    }

    /// 创建解析错误
    pub fn parse(message: impl Into<String>) -> Self {
        ScanError::Parse {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(error: serde_json::Error) -> Self {
        ScanError::parse(error.to_string())
    }
}

/// AI 服务错误
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Gemini API key is required")]
    MissingApiKey,

    #[error("API quota exceeded")]
    QuotaExceeded,

    #[error("Gemini request failed: {status} - {body}")]
    Request { status: u16, body: String },

    #[error("Gemini returned no text")]
    EmptyResponse,

    #[error("Gemini transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
