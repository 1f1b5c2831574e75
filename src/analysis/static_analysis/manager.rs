use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use super::result::{
    flatten_report, group_by_file, parse_report, ClassSource, FileReport, NormalizedViolation,
    PmdReport,
};
use super::tools::PmdTool;
use super::workspace::ScratchWorkspace;
use super::{StaticAnalysisTool, ToolOutcome};
use crate::config::Config;
use crate::infrastructure::error::ScanError;

/// 扫描生命周期阶段
///
/// `Created → PopulatedFiles → Invoked → Parsed → CleanedUp → Done`，
/// 从 `Invoked` 或 `Parsed` 进入 `Failed` 时同样先经过 `CleanedUp`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Created,
    PopulatedFiles,
    Invoked,
    Parsed,
    CleanedUp,
    Done,
    Failed,
}

/// 批量静态分析管理器
pub struct StaticAnalysisManager {
    tool: Arc<dyn StaticAnalysisTool>,
    scratch_root: PathBuf,
    batch_timeout: Duration,
    single_timeout: Duration,
}

impl StaticAnalysisManager {
    pub fn new(tool: Arc<dyn StaticAnalysisTool>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            scratch_root: scratch_root.into(),
            batch_timeout: Duration::from_secs(120),
            single_timeout: Duration::from_secs(55),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let tool = Arc::new(PmdTool::from_config(&config.pmd));
        Self::new(tool, config.scratch_root.clone()).with_timeouts(
            Duration::from_secs(config.pmd.batch_timeout_secs),
            Duration::from_secs(config.pmd.single_timeout_secs),
        )
    }

    pub fn with_timeouts(mut self, batch: Duration, single: Duration) -> Self {
        self.batch_timeout = batch;
        self.single_timeout = single;
        self
    }

    pub fn tool(&self) -> &Arc<dyn StaticAnalysisTool> {
        &self.tool
    }

    /// 批量扫描多个类，返回扁平化的违规列表
    pub async fn analyze_batch(
        &self,
        classes: &[ClassSource],
    ) -> Result<Vec<NormalizedViolation>, ScanError> {
        if classes.is_empty() {
            tracing::debug!("empty batch, skipping analysis");
            return Ok(Vec::new());
        }

        let files: Vec<(String, &str)> = classes
            .iter()
            .map(|class| (class.file_name(), class.source.as_str()))
            .collect();

        let report = self.scan(&files, self.batch_timeout).await?;
        Ok(flatten_report(report))
    }

    /// 扫描单个文件，文件名原样使用
    pub async fn analyze_file(
        &self,
        filename: &str,
        source: &str,
    ) -> Result<Vec<FileReport>, ScanError> {
        let files = [(filename.to_string(), source)];
        let report = self.scan(&files, self.single_timeout).await?;
        Ok(group_by_file(report))
    }

    async fn scan(
        &self,
        files: &[(String, &str)],
        timeout: Duration,
    ) -> Result<PmdReport, ScanError> {
        let workspace = ScratchWorkspace::create(&self.scratch_root).await?;
        let span = tracing::info_span!(
            "scan",
            scan_id = %workspace.id(),
            tool = self.tool.name(),
            files = files.len()
        );

        async move {
            let start_time = Instant::now();
            let path = workspace.path().to_path_buf();
            tracing::debug!(stage = ?ScanStage::Created, path = %path.display());

            let result = self.populate_and_run(&workspace, files, timeout).await;
            if let Err(e) = &result {
                tracing::error!(
                    stage = ?ScanStage::Failed,
                    path = %path.display(),
                    error = %e,
                    "scan failed"
                );
            }

            // 无论成功与否都删除临时目录
            match workspace.cleanup().await {
                Ok(()) => tracing::debug!(stage = ?ScanStage::CleanedUp),
                Err(e) => tracing::error!(error = %e, "failed to clean up scratch workspace"),
            }

            let report = match result {
                Ok(report) => report,
                Err(e) => return Err(e),
            };
            tracing::info!(
                stage = ?ScanStage::Done,
                violations = report.total_violations(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "scan completed"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn populate_and_run(
        &self,
        workspace: &ScratchWorkspace,
        files: &[(String, &str)],
        timeout: Duration,
    ) -> Result<PmdReport, ScanError> {
        for (file_name, source) in files {
            workspace.write_source(file_name, source).await?;
        }
        tracing::debug!(stage = ?ScanStage::PopulatedFiles);

        let outcome = tokio::time::timeout(timeout, self.tool.run(workspace.path()))
            .await
            .map_err(|_| ScanError::timeout(timeout.as_secs()))??;
        tracing::debug!(stage = ?ScanStage::Invoked);

        let output = match outcome {
            ToolOutcome::Clean { output } => output,
            ToolOutcome::Findings { output } => {
                if output.trim().is_empty() {
                    tracing::warn!("tool reported findings but produced no report");
                }
                output
            }
            ToolOutcome::Failed { exit_code, stderr } => {
                tracing::error!(
                    exit_code = ?exit_code,
                    stderr = %stderr.trim(),
                    "analysis tool exited with an unrecognized status"
                );
                return Err(ScanError::exit_failure(exit_code, stderr));
            }
        };

        let report = match parse_report(&output) {
            Ok(report) => report,
            Err(e) => {
                // 尽力而为：解析失败通常意味着工具没有输出任何违规
                tracing::warn!(error = %e, "failed to parse analysis report, returning no violations");
                tracing::debug!(raw_output = %output);
                PmdReport::default()
            }
        };
        tracing::debug!(stage = ?ScanStage::Parsed);

        Ok(report)
    }
}
