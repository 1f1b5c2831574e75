use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::analysis::static_analysis::{ClassSource, FileReport, NormalizedViolation};
use crate::core::ai::FixSuggestion;
use crate::infrastructure::error::ScanError;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub classes: Option<Vec<ClassSource>>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub filename: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FixRequest {
    pub prompt: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub mode: String,
    pub gemini_available: bool,
    pub pmd_status: String,
    pub timestamp: String,
}

/// 在独立任务中执行扫描
///
/// 客户端断开时 hyper 会丢弃处理函数的 future；扫描放在独立任务里，
/// 子进程与临时目录清理照常走完，不受连接状态影响。
async fn run_detached<T, F>(scan: F) -> Result<T, ScanError>
where
    T: Send + 'static,
    F: std::future::Future<Output = Result<T, ScanError>> + Send + 'static,
{
    tokio::spawn(scan.in_current_span()).await.map_err(|e| {
        tracing::error!(error = %e, "scan task did not complete");
        ScanError::execution(format!("scan task aborted: {}", e))
    })?
}

/// 取出非空字段
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pmd_status = match state.scanner.tool().version().await {
        Ok(version) => format!("available ({})", version),
        Err(e) => format!("not available: {}", e),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        message: "PMD-Gemini Native Service is running".to_string(),
        mode: "High Performance (Native PMD)".to_string(),
        gemini_available: state.advisor.is_some(),
        pmd_status,
        timestamp: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<NormalizedViolation>>> {
    const INVALID: &str = "Invalid payload: 'classes' array is required";

    let classes = match payload {
        Ok(Json(AnalyzeRequest {
            classes: Some(classes),
        })) => classes,
        Ok(_) => return Err(ApiError::BadRequest(INVALID.to_string())),
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected batch scan payload");
            return Err(ApiError::BadRequest(INVALID.to_string()));
        }
    };

    tracing::info!(classes = classes.len(), "received batch PMD scan request");
    let scanner = state.scanner.clone();
    let violations = run_detached(async move { scanner.analyze_batch(&classes).await }).await?;

    Ok(Json(violations))
}

pub async fn run(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<FileReport>>> {
    const INVALID: &str = "Both 'filename' and 'source' fields are required";

    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "rejected single file scan payload");
        ApiError::BadRequest(INVALID.to_string())
    })?;
    let (filename, source) = match (required(request.filename), required(request.source)) {
        (Some(filename), Some(source)) => (filename, source),
        _ => return Err(ApiError::BadRequest(INVALID.to_string())),
    };

    tracing::info!(filename = %filename, "received single file PMD scan request");
    let scanner = state.scanner.clone();
    let files = run_detached(async move { scanner.analyze_file(&filename, &source).await }).await?;

    Ok(Json(files))
}

pub async fn fix(
    State(state): State<AppState>,
    payload: Result<Json<FixRequest>, JsonRejection>,
) -> ApiResult<Json<FixSuggestion>> {
    const INVALID: &str = "Both 'prompt' and 'code' fields are required";

    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "rejected fix request payload");
        ApiError::BadRequest(INVALID.to_string())
    })?;
    let (prompt, code) = match (required(request.prompt), required(request.code)) {
        (Some(prompt), Some(code)) => (prompt, code),
        _ => return Err(ApiError::BadRequest(INVALID.to_string())),
    };

    let advisor = state.advisor.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Gemini AI service not available".to_string())
    })?;

    tracing::info!("received AI fix suggestion request");
    let suggestion = advisor.suggest_fix(&prompt, &code).await.map_err(|e| {
        tracing::error!(error = %e, "AI suggestion failed");
        ApiError::from(e)
    })?;

    Ok(Json(suggestion))
}
