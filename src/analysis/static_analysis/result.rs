use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infrastructure::error::ScanError;

/// Apex 类文件后缀
pub const APEX_CLASS_SUFFIX: &str = ".cls";

/// 待扫描的 Apex 类
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassSource {
    pub name: String,
    pub source: String,
}

impl ClassSource {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// 写入临时目录时使用的文件名
    pub fn file_name(&self) -> String {
        normalize_class_file_name(&self.name)
    }
}

/// 违规优先级，PMD 通常给出数字，也兼容字符串
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Severity {
    Level(i64),
    Label(String),
}

/// PMD JSON 报告
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PmdReport {
    #[serde(default)]
    pub files: Vec<PmdFileReport>,
}

/// 单个文件的 PMD 结果
#[derive(Debug, Clone, Deserialize)]
pub struct PmdFileReport {
    pub filename: String,
    #[serde(default)]
    pub violations: Vec<PmdViolation>,
}

/// PMD 原始违规记录
#[derive(Debug, Clone, Deserialize)]
pub struct PmdViolation {
    pub beginline: u32,
    #[serde(default)]
    pub endline: Option<u32>,
    pub rule: String,
    #[serde(default)]
    pub ruleset: Option<String>,
    pub description: String,
    pub priority: Severity,
}

impl PmdReport {
    pub fn total_violations(&self) -> usize {
        self.files.iter().map(|f| f.violations.len()).sum()
    }
}

/// 返回给调用方的扁平化违规记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedViolation {
    pub class_name: String,
    pub line: u32,
    pub rule: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// 单文件扫描结果，按文件分组
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file_name: String,
    pub violations: Vec<FileViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileViolation {
    pub line: u32,
    pub end_line: Option<u32>,
    pub rule_name: String,
    pub message: String,
    pub severity: Severity,
    pub category: Option<String>,
}

/// 为类名补上 `.cls` 后缀（已有后缀时保持不变）
pub fn normalize_class_file_name(name: &str) -> String {
    if name.ends_with(APEX_CLASS_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, APEX_CLASS_SUFFIX)
    }
}

/// 从 PMD 报告中的文件路径推导类名
pub fn class_name_from_path(path: &str) -> String {
    let base = file_base_name(path);
    base.strip_suffix(APEX_CLASS_SUFFIX)
        .unwrap_or(base)
        .to_string()
}

fn file_base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// 解析 PMD 输出；空输出视为没有违规
pub fn parse_report(output: &str) -> Result<PmdReport, ScanError> {
    if output.trim().is_empty() {
        return Ok(PmdReport::default());
    }
    Ok(serde_json::from_str(output)?)
}

/// 将两级报告展平成违规列表，保持文件与违规的原始顺序
pub fn flatten_report(report: PmdReport) -> Vec<NormalizedViolation> {
    let mut violations = Vec::with_capacity(report.total_violations());

    for file in report.files {
        let class_name = class_name_from_path(&file.filename);
        violations.extend(file.violations.into_iter().map(|v| NormalizedViolation {
            class_name: class_name.clone(),
            line: v.beginline,
            rule: v.rule,
            message: v.description,
            severity: v.priority,
            end_line: v.endline,
            category: v.ruleset,
        }));
    }

    violations
}

/// 按文件分组的结果，文件名只保留基础名
pub fn group_by_file(report: PmdReport) -> Vec<FileReport> {
    report
        .files
        .into_iter()
        .map(|file| FileReport {
            file_name: file_base_name(&file.filename).to_string(),
            violations: file
                .violations
                .into_iter()
                .map(|v| FileViolation {
                    line: v.beginline,
                    end_line: v.endline,
                    rule_name: v.rule,
                    message: v.description,
                    severity: v.priority,
                    category: v.ruleset,
                })
                .collect(),
        })
        .collect()
}
