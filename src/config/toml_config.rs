use crate::domain::model::ExportFormat;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, ScreenError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_SCREENING_PATH: &str = "/api/o3/screening-stream";
pub const DEFAULT_DEEP_ANALYSIS_PATH: &str = "/api/o3/deep-analysis";
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_THRESHOLD: u8 = 85;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    pub service: ServiceConfig,
    pub job: JobConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    pub export: ExportConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub endpoint: String,
    #[serde(default = "default_screening_path")]
    pub screening_path: String,
    #[serde(default = "default_deep_analysis_path")]
    pub deep_analysis_path: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub title: String,
    pub description: String,
    pub elimination_conditions: Option<String>,
    #[serde(default = "default_threshold")]
    pub qualification_threshold: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub top_n: Option<usize>,
    pub deep_analysis: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,
    pub bundle: Option<bool>,
    pub archive: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_format: Option<LogFormat>,
}

fn default_screening_path() -> String {
    DEFAULT_SCREENING_PATH.to_string()
}

fn default_deep_analysis_path() -> String {
    DEFAULT_DEEP_ANALYSIS_PATH.to_string()
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

fn default_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Json]
}

impl ServiceConfig {
    /// 端點加上路徑，避免重複的斜線
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl ScreeningConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScreenError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScreenError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${IRIS_TOKEN})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ScreenError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_format(&self) -> LogFormat {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format)
            .unwrap_or_default()
    }
}

impl Validate for ScreeningConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("service.endpoint", &self.service.endpoint)?;
        for (field, path) in [
            ("service.screening_path", &self.service.screening_path),
            ("service.deep_analysis_path", &self.service.deep_analysis_path),
            ("service.health_path", &self.service.health_path),
        ] {
            validation::validate_non_empty_string(field, path)?;
        }
        if let Some(timeout) = self.service.timeout_seconds {
            validation::validate_positive_number("service.timeout_seconds", timeout as usize, 1)?;
        }

        validation::validate_non_empty_string("job.title", &self.job.title)?;
        validation::validate_non_empty_string("job.description", &self.job.description)?;
        validation::validate_range(
            "job.qualification_threshold",
            self.job.qualification_threshold,
            0,
            100,
        )?;

        if let Some(top_n) = self.selection.top_n {
            validation::validate_positive_number("selection.top_n", top_n, 1)?;
        }

        validation::validate_path("export.output_path", &self.export.output_path)?;
        if self.export.formats.is_empty() {
            return Err(ScreenError::MissingConfigError {
                field: "export.formats".to_string(),
            });
        }

        // 標頭值若仍含 ${...}，代表環境變數沒有設定
        if let Some(headers) = &self.service.headers {
            for (key, value) in headers {
                if value.contains("${") {
                    return Err(ScreenError::InvalidConfigValueError {
                        field: format!("service.headers.{}", key),
                        value: value.clone(),
                        reason: "Environment variable is not set".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl ConfigProvider for ScreeningConfig {
    fn service_endpoint(&self) -> &str {
        &self.service.endpoint
    }

    fn output_path(&self) -> &str {
        &self.export.output_path
    }

    fn export_formats(&self) -> &[ExportFormat] {
        &self.export.formats
    }

    fn top_n(&self) -> Option<usize> {
        self.selection.top_n
    }

    fn deep_analysis_enabled(&self) -> bool {
        self.selection.deep_analysis.unwrap_or(true)
    }

    fn bundle_exports(&self) -> bool {
        self.export.bundle.unwrap_or(false)
    }

    fn archive_sessions(&self) -> bool {
        self.export.archive.unwrap_or(false)
    }
}
