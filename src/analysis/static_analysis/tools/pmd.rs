use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::analysis::static_analysis::{StaticAnalysisTool, ToolOutcome};
use crate::config::PmdConfig;
use crate::infrastructure::error::ScanError;

/// 本地 PMD 命令行工具
///
/// 每次调用针对整个目录运行一次 `pmd check`，输出 JSON 报告。
#[derive(Debug, Clone)]
pub struct PmdTool {
    binary: PathBuf,
    rulesets: String,
    findings_exit_code: i32,
    version_timeout: Duration,
}

impl PmdTool {
    pub fn new(binary: impl Into<PathBuf>, rulesets: &[String], findings_exit_code: i32) -> Self {
        Self {
            binary: binary.into(),
            rulesets: rulesets.join(","),
            findings_exit_code,
            version_timeout: Duration::from_secs(15),
        }
    }

    pub fn from_config(config: &PmdConfig) -> Self {
        Self::new(&config.binary, &config.rulesets, config.findings_exit_code)
            .with_version_timeout(Duration::from_secs(config.version_timeout_secs))
    }

    pub fn with_version_timeout(mut self, timeout: Duration) -> Self {
        self.version_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn check_args(&self, target: &Path) -> Vec<OsString> {
        vec![
            "check".into(),
            "--dir".into(),
            target.as_os_str().to_os_string(),
            "--format".into(),
            "json".into(),
            "--rulesets".into(),
            self.rulesets.clone().into(),
            "--no-cache".into(),
        ]
    }

    /// 按退出码区分干净运行、发现违规与执行失败
    fn classify(&self, exit_code: Option<i32>, stdout: String, stderr: String) -> ToolOutcome {
        match exit_code {
            Some(0) => ToolOutcome::Clean { output: stdout },
            Some(code) if code == self.findings_exit_code => ToolOutcome::Findings { output: stdout },
            _ => ToolOutcome::Failed { exit_code, stderr },
        }
    }

    fn launch_error(&self, error: std::io::Error) -> ScanError {
        ScanError::execution(format!(
            "failed to launch {}: {}",
            self.binary.display(),
            error
        ))
    }
}

#[async_trait]
impl StaticAnalysisTool for PmdTool {
    fn name(&self) -> &str {
        "pmd"
    }

    async fn run(&self, target: &Path) -> Result<ToolOutcome, ScanError> {
        // 调用方通过超时丢弃 future 时子进程随之被终止
        let output = Command::new(&self.binary)
            .args(self.check_args(target))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        Ok(self.classify(output.status.code(), stdout, stderr))
    }

    async fn version(&self) -> Result<String, ScanError> {
        let output = tokio::time::timeout(
            self.version_timeout,
            Command::new(&self.binary)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ScanError::timeout(self.version_timeout.as_secs()))?
        .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            return Err(ScanError::exit_failure(
                output.status.code(),
                String::from_utf8_lossy(&output.stderr),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
