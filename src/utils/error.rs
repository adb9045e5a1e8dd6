use thiserror::Error;

/// MySQL 唯一鍵衝突錯誤碼
pub const MYSQL_DUPLICATE_ENTRY: u16 = 1062;

/// 身分提供者回傳的錯誤
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Duplicate key (code {code:?}): {message}")]
    DuplicateKey { code: Option<u16>, message: String },

    #[error("Identity provider store error (code {code:?}): {message}")]
    Store { code: Option<u16>, message: String },

    #[error("Identity provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid identity provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, ProviderError::DuplicateKey { .. })
    }

    /// 依錯誤訊息分類；訊息含 1062 或 "Duplicate entry" 視為唯一鍵衝突
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = extract_error_code(&message);

        if code == Some(MYSQL_DUPLICATE_ENTRY) || message.contains("Duplicate entry") {
            ProviderError::DuplicateKey {
                code: Some(MYSQL_DUPLICATE_ENTRY),
                message,
            }
        } else {
            ProviderError::Store { code, message }
        }
    }
}

/// 解析 "Error 1062: ..." 形式的錯誤碼
fn extract_error_code(message: &str) -> Option<u16> {
    let rest = &message[message.find("Error ")? + "Error ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// 單筆舊會員資料轉換失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Member {uid} has an empty username")]
    EmptyUsername { uid: u64 },

    #[error("Member {uid} has an invalid username: {reason}")]
    InvalidUsername { uid: u64, reason: String },

    #[error("Member {uid} has an invalid timestamp: {value}")]
    InvalidTimestamp { uid: u64, value: i64 },

    #[error("Row at line {line} could not be parsed: {message}")]
    MalformedRow { line: u64, message: String },

    #[error("Transform task for record #{position} panicked: {message}")]
    Panicked { position: usize, message: String },
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Identity provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Failed to transform record #{position}: {source}")]
    TransformError {
        position: usize,
        #[source]
        source: TransformError,
    },

    #[error("Source error: {message}")]
    SourceError { message: String },

    #[error("Migration cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Transform,
    IdentityProvider,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl MigrationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MigrationError::ConfigError { .. }
            | MigrationError::ConfigValidationError { .. }
            | MigrationError::InvalidConfigValueError { .. }
            | MigrationError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MigrationError::SourceError { .. } => ErrorCategory::Source,
            MigrationError::TransformError { .. } => ErrorCategory::Transform,
            MigrationError::ProviderError(_) => ErrorCategory::IdentityProvider,
            MigrationError::IoError(_)
            | MigrationError::SerializationError(_)
            | MigrationError::Cancelled => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MigrationError::Cancelled => ErrorSeverity::Medium,
            MigrationError::ProviderError(_)
            | MigrationError::TransformError { .. }
            | MigrationError::SourceError { .. } => ErrorSeverity::High,
            MigrationError::ConfigError { .. }
            | MigrationError::ConfigValidationError { .. }
            | MigrationError::InvalidConfigValueError { .. }
            | MigrationError::MissingConfigError { .. } => ErrorSeverity::High,
            MigrationError::IoError(_) | MigrationError::SerializationError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MigrationError::ProviderError(ProviderError::Transport(_)) => {
                "Check that the identity provider endpoint is reachable and retry"
            }
            MigrationError::ProviderError(ProviderError::Http { status: 401, .. })
            | MigrationError::ProviderError(ProviderError::Http { status: 403, .. }) => {
                "Check provider.client_id and provider.client_secret"
            }
            MigrationError::ProviderError(_) => {
                "Inspect the identity provider logs; records imported by earlier batches are kept, re-running is safe"
            }
            MigrationError::TransformError { .. } => {
                "Fix the legacy record or set migration.on_transform_error = \"skip\""
            }
            MigrationError::SourceError { .. } => {
                "Check that the exported CSV files have a header row and numeric ids"
            }
            MigrationError::Cancelled => "Re-run the migration; duplicates are tolerated",
            MigrationError::ConfigError { .. }
            | MigrationError::ConfigValidationError { .. }
            | MigrationError::InvalidConfigValueError { .. }
            | MigrationError::MissingConfigError { .. } => {
                "Review the TOML configuration file"
            }
            MigrationError::IoError(_) => "Check file paths and permissions",
            MigrationError::SerializationError(_) => "Report this as a bug",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Source => format!("Could not read legacy members: {}", self),
            ErrorCategory::Transform => format!("Legacy member could not be converted: {}", self),
            ErrorCategory::IdentityProvider => {
                format!("Identity provider rejected the import: {}", self)
            }
            ErrorCategory::System => format!("Migration stopped: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
