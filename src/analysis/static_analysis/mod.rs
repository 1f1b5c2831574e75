pub mod manager;
pub mod result;
pub mod tools;
pub mod workspace;

pub use manager::{ScanStage, StaticAnalysisManager};
pub use result::{
    ClassSource, FileReport, FileViolation, NormalizedViolation, PmdReport, Severity,
};
pub use tools::PmdTool;
pub use workspace::ScratchWorkspace;

use async_trait::async_trait;
use std::path::Path;

use crate::infrastructure::error::ScanError;

/// 分析工具一次运行的结果，按退出状态区分
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// 退出码 0
    Clean { output: String },
    /// 约定的“发现违规”退出码，标准输出中仍是完整报告
    Findings { output: String },
    /// 其他非零退出或被信号终止
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

#[async_trait]
pub trait StaticAnalysisTool: Send + Sync {
    fn name(&self) -> &str;

    /// 对整个目录执行一次分析
    async fn run(&self, target: &Path) -> Result<ToolOutcome, ScanError>;

    /// 工具版本，用于健康检查
    async fn version(&self) -> Result<String, ScanError>;
}
