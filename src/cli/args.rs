use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "pmd-gemini-service",
    version,
    about = "PMD 静态分析与 Gemini 修复建议服务",
    long_about = "为 Apex 类提供批量 PMD 扫描、单文件扫描以及基于 Gemini 的违规修复建议的 HTTP 服务。"
)]
pub struct Args {
    /// TOML 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 监听地址
    #[arg(long)]
    pub host: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    pub port: Option<u16>,

    /// PMD 可执行文件路径
    #[arg(long = "pmd-binary", value_name = "PATH")]
    pub pmd_binary: Option<PathBuf>,

    /// 临时扫描目录的根目录
    #[arg(long = "scratch-root", value_name = "DIR")]
    pub scratch_root: Option<PathBuf>,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// 日志格式 (pretty, compact, json)
    #[arg(long = "log-format")]
    pub log_format: Option<String>,
}
