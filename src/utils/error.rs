use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Could not parse timestamp '{value}': {reason}")]
    TimestampError { value: String, reason: String },

    #[error("JSOC export failed (status {status}): {message}")]
    ExportError { status: i64, message: String },

    #[error("FITS error: {message}")]
    FitsError { message: String },

    #[error("Resample error: {message}")]
    ResampleError { message: String },

    #[error("Invalid HTML selector: {selector}")]
    SelectorError { selector: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Storage,
    Archive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::ExportError { .. } => ErrorCategory::Archive,
            EtlError::IoError(_) | EtlError::ImageError(_) | EtlError::FitsError { .. } => {
                ErrorCategory::Storage
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. }
            | EtlError::TimestampError { .. }
            | EtlError::ResampleError { .. }
            | EtlError::SelectorError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Archive => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ApiError(_) => "Check network connectivity and that the remote site is up, then rerun",
            EtlError::ExportError { .. } => {
                "Check that the JSOC email is registered and the series/segment names are valid"
            }
            EtlError::IoError(_) => "Check that input files exist and the output directory is writable",
            EtlError::ImageError(_) | EtlError::FitsError { .. } => {
                "Delete the partial output and rerun; the downloaded file may be truncated"
            }
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Check the input CSV for malformed rows or mismatched column counts"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix the configuration file or command-line flags",
            EtlError::TimestampError { .. } => {
                "Use 'DD/MM/YYYY HH.MM.SS' or 'needs to be after HH:MM on DD/MM/YYYY'"
            }
            EtlError::ResampleError { .. } => "The map is smaller than the crop multiple; lower sharp.crop_multiple",
            EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. }
            | EtlError::SelectorError { .. } => "Inspect the input data and rerun with --verbose",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Archive => format!("Archive export problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Storage => format!("File problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_errors_are_retryable_severity() {
        let err = EtlError::ExportError {
            status: 4,
            message: "bad query".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Archive);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().contains("bad query"));
    }

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = EtlError::MissingConfigError {
            field: "jsoc.email".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
