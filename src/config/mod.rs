use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cli::args::Args;
use crate::infrastructure::logging::{LogFormat, LogOutput, LoggingConfig};

/// PMD 6/7 要求的 `category/...` 规则集写法
pub const DEFAULT_RULESETS: &[&str] = &[
    "category/apex/design.xml",
    "category/apex/bestpractices.xml",
    "category/apex/errorprone.xml",
    "category/apex/performance.xml",
    "category/apex/security.xml",
    "category/apex/documentation.xml",
    "category/apex/codestyle.xml",
];

/// PMD 发现违规时使用的退出码
pub const DEFAULT_FINDINGS_EXIT_CODE: i32 = 4;

const BYTES_PER_MB: usize = 1024 * 1024;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// 请求体大小上限（MB）
    pub max_body_mb: usize,
    /// 临时扫描目录所在的根目录
    pub scratch_root: PathBuf,
    pub pmd: PmdConfig,
    pub gemini: GeminiConfig,
    pub logging: LogSettings,
}

/// PMD 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PmdConfig {
    pub binary: PathBuf,
    pub rulesets: Vec<String>,
    /// 表示“存在违规”而非执行失败的退出码，随 PMD 版本可能变化
    pub findings_exit_code: i32,
    pub batch_timeout_secs: u64,
    pub single_timeout_secs: u64,
    pub version_timeout_secs: u64,
}

/// Gemini 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_mb: 50,
            scratch_root: env::temp_dir(),
            pmd: PmdConfig::default(),
            gemini: GeminiConfig::default(),
            logging: LogSettings::default(),
        }
    }
}

impl Default for PmdConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/opt/pmd/bin/pmd"),
            rulesets: DEFAULT_RULESETS.iter().map(|r| r.to_string()).collect(),
            findings_exit_code: DEFAULT_FINDINGS_EXIT_CODE,
            batch_timeout_secs: 120,
            single_timeout_secs: 55,
            version_timeout_secs: 15,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_url: DEFAULT_GEMINI_URL.to_string(),
            timeout_secs: 30,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// 按 默认值 < 配置文件 < 环境变量 < 命令行参数 的优先级加载配置
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.load_from_env_file();
        config.load_from_env()?;
        config.update_from_args(args);
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn load_from_env_file(&mut self) {
        // 尝试从当前目录加载，不覆盖已有环境变量
        dotenvy::dotenv().ok();
    }

    pub fn load_from_env(&mut self) -> anyhow::Result<()> {
        self.apply_env(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取覆盖项
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = parse_var("PORT", &port)?;
        }
        if let Some(dir) = lookup("SCRATCH_ROOT") {
            self.scratch_root = PathBuf::from(dir);
        }
        if let Some(limit) = lookup("MAX_BODY_MB") {
            self.max_body_mb = parse_var("MAX_BODY_MB", &limit)?;
        }

        if let Some(binary) = lookup("PMD_BINARY") {
            self.pmd.binary = PathBuf::from(binary);
        }
        if let Some(rulesets) = lookup("PMD_RULESETS") {
            self.pmd.rulesets = rulesets
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }
        if let Some(code) = lookup("PMD_FINDINGS_EXIT_CODE") {
            self.pmd.findings_exit_code = parse_var("PMD_FINDINGS_EXIT_CODE", &code)?;
        }
        if let Some(secs) = lookup("PMD_BATCH_TIMEOUT_SECS") {
            self.pmd.batch_timeout_secs = parse_var("PMD_BATCH_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("PMD_SINGLE_TIMEOUT_SECS") {
            self.pmd.single_timeout_secs = parse_var("PMD_SINGLE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("PMD_VERSION_TIMEOUT_SECS") {
            self.pmd.version_timeout_secs = parse_var("PMD_VERSION_TIMEOUT_SECS", &secs)?;
        }

        if let Some(api_key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = Some(api_key).filter(|k| !k.trim().is_empty());
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(url) = lookup("GEMINI_API_URL") {
            self.gemini.api_url = url;
        }
        if let Some(secs) = lookup("GEMINI_TIMEOUT_SECS") {
            self.gemini.timeout_secs = parse_var("GEMINI_TIMEOUT_SECS", &secs)?;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn update_from_args(&mut self, args: &Args) {
        // 命令行参数优先级最高
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(binary) = &args.pmd_binary {
            self.pmd.binary = binary.clone();
        }
        if let Some(root) = &args.scratch_root {
            self.scratch_root = root.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = &args.log_format {
            self.logging.format = format.clone();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pmd.binary.as_os_str().is_empty() {
            anyhow::bail!("PMD binary path is empty. Set PMD_BINARY or pmd.binary in the config file");
        }
        if self.pmd.rulesets.is_empty() {
            anyhow::bail!("At least one PMD ruleset is required");
        }
        if self.pmd.findings_exit_code == 0 {
            anyhow::bail!("PMD findings exit code must be non-zero");
        }
        if self.pmd.batch_timeout_secs == 0
            || self.pmd.single_timeout_secs == 0
            || self.pmd.version_timeout_secs == 0
        {
            anyhow::bail!("PMD timeouts must be greater than zero");
        }
        if self.gemini.timeout_secs == 0 {
            anyhow::bail!("Gemini timeout must be greater than zero");
        }
        if self.max_body_mb == 0 {
            anyhow::bail!("Request body limit must be greater than zero");
        }
        if self.max_body_mb.checked_mul(BYTES_PER_MB).is_none() {
            anyhow::bail!("Request body limit is too large: {} MB", self.max_body_mb);
        }
        self.logging_config()?;
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn logging_config(&self) -> anyhow::Result<LoggingConfig> {
        let level = tracing::Level::from_str(&self.logging.level)
            .map_err(|_| anyhow::anyhow!("Unknown log level: {}", self.logging.level))?;
        let format = self.logging.format.parse::<LogFormat>()?;
        let output = match &self.logging.file {
            Some(path) => LogOutput::File(path.display().to_string()),
            None => LogOutput::Stdout,
        };

        Ok(LoggingConfig {
            level,
            format,
            output,
            ..LoggingConfig::default()
        })
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(BYTES_PER_MB)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.pmd.binary, PathBuf::from("/opt/pmd/bin/pmd"));
        assert_eq!(config.pmd.rulesets.len(), 7);
        assert_eq!(config.pmd.findings_exit_code, 4);
        assert_eq!(config.pmd.batch_timeout_secs, 120);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.max_body_bytes(), 50 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(lookup_from(&[
                ("PORT", "9000"),
                ("PMD_BINARY", "/usr/bin/pmd"),
                ("PMD_RULESETS", "category/apex/design.xml, category/apex/security.xml,"),
                ("PMD_FINDINGS_EXIT_CODE", "5"),
                ("GEMINI_API_KEY", "secret"),
                ("LOG_FORMAT", "json"),
            ]))
            .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.pmd.binary, PathBuf::from("/usr/bin/pmd"));
        assert_eq!(
            config.pmd.rulesets,
            vec!["category/apex/design.xml", "category/apex/security.xml"]
        );
        assert_eq!(config.pmd.findings_exit_code, 5);
        assert_eq!(config.gemini.api_key.as_deref(), Some("secret"));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_apply_env_rejects_bad_numbers() {
        let mut config = Config::default();
        let result = config.apply_env(lookup_from(&[("PORT", "eighty")]));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("PORT"));
    }

    #[test]
    fn test_args_take_precedence() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[("PORT", "9000")])).unwrap();

        let args = Args {
            port: Some(7000),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };
        config.update_from_args(&args);

        assert_eq!(config.port, 7000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects_zero_findings_code() {
        let mut config = Config::default();
        config.pmd.findings_exit_code = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_version_timeout_from_env() {
        let mut config = Config::default();
        config
            .apply_env(lookup_from(&[("PMD_VERSION_TIMEOUT_SECS", "5")]))
            .unwrap();
        assert_eq!(config.pmd.version_timeout_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_version_timeout() {
        let mut config = Config::default();
        config
            .apply_env(lookup_from(&[("PMD_VERSION_TIMEOUT_SECS", "0")]))
            .unwrap();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("timeouts"));
    }

    #[test]
    fn test_oversized_body_limit() {
        let mut config = Config::default();
        config
            .apply_env(lookup_from(&[("MAX_BODY_MB", usize::MAX.to_string().as_str())]))
            .unwrap();

        assert!(config.validate().is_err());
        assert_eq!(config.max_body_bytes(), usize::MAX);
    }

    #[test]
    fn test_validate_rejects_empty_rulesets() {
        let mut config = Config::default();
        config.pmd.rulesets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port = 3000

[pmd]
binary = "/srv/pmd/bin/pmd"
findings_exit_code = 4
batch_timeout_secs = 60

[gemini]
model = "gemini-2.0-flash"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.pmd.binary, PathBuf::from("/srv/pmd/bin/pmd"));
        assert_eq!(config.pmd.batch_timeout_secs, 60);
        // 未指定的字段使用默认值
        assert_eq!(config.pmd.single_timeout_secs, 55);
        assert_eq!(config.pmd.rulesets.len(), 7);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.host, "0.0.0.0");
    }
}
