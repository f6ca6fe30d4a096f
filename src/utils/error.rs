use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Remote service returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Screening stream ended before completion ({processed}/{total} candidates processed)")]
    StreamTerminated {
        processed: usize,
        total: usize,
        reason: String,
    },

    #[error("Deep analysis failed: {message}")]
    DeepAnalysisError { message: String },

    #[error("Export to {format} failed: {message}")]
    ExportError { format: String, message: String },
}

pub type Result<T> = std::result::Result<T, ScreenError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Validation,
    Stream,
    Analysis,
    Export,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScreenError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn export(format: impl ToString, message: impl Into<String>) -> Self {
        Self::ExportError {
            format: format.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::ApiError { .. } => ErrorCategory::Network,
            Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::ValidationError { .. } => ErrorCategory::Validation,
            Self::StreamTerminated { .. } => ErrorCategory::Stream,
            Self::DeepAnalysisError { .. } => ErrorCategory::Analysis,
            Self::ExportError { .. } | Self::ZipError(_) | Self::CsvError(_) => {
                ErrorCategory::Export
            }
            Self::IoError(_) => ErrorCategory::Storage,
            Self::SerializationError(_) => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ValidationError { .. } => ErrorSeverity::Low,
            Self::HttpError(_)
            | Self::StreamTerminated { .. }
            | Self::DeepAnalysisError { .. } => ErrorSeverity::Medium,
            Self::ApiError { status, .. } if *status >= 500 || *status == 429 => {
                ErrorSeverity::Medium
            }
            Self::ApiError { .. }
            | Self::ExportError { .. }
            | Self::ZipError(_)
            | Self::CsvError(_)
            | Self::SerializationError(_) => ErrorSeverity::High,
            Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 可重試的錯誤：部分結果保留，操作員可以直接重新送出
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StreamTerminated { .. } | Self::DeepAnalysisError { .. } | Self::HttpError(_) => {
                true
            }
            Self::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check the service endpoint and network connectivity, then retry"
            }
            ErrorCategory::Configuration => {
                "Review the configuration file and fix the reported field"
            }
            ErrorCategory::Validation => "Adjust the request or selection and try again",
            ErrorCategory::Stream => {
                "Partial results were kept; start the screening again to finish the remaining candidates"
            }
            ErrorCategory::Analysis => {
                "The selection was kept; retry the deep analysis without re-selecting"
            }
            ErrorCategory::Export => {
                "Other export formats are unaffected; retry this format or choose another"
            }
            ErrorCategory::Storage => "Check that the output path exists and is writable",
            ErrorCategory::Data => "The remote payload was not valid JSON; report it to the service owner",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::StreamTerminated {
                processed, total, ..
            } => format!(
                "Screening was interrupted after {} of {} candidates. Partial results are still available.",
                processed, total
            ),
            Self::DeepAnalysisError { message } => {
                format!("Deep analysis could not be completed: {}", message)
            }
            Self::ValidationError { message } => message.clone(),
            Self::ExportError { format, message } => {
                format!("Could not produce the {} export: {}", format, message)
            }
            Self::ApiError { status, message } => {
                format!("The screening service rejected the request ({}): {}", status, message)
            }
            Self::HttpError(_) => "Could not reach the screening service".to_string(),
            other => other.to_string(),
        }
    }
}
