use crate::adapters::csv_source::{DEFAULT_MEMBERS_FILE, DEFAULT_UCENTER_MEMBERS_FILE};
use crate::core::fanout::DEFAULT_CONCURRENCY;
use crate::core::importer::DEFAULT_BATCH_SIZE;
use crate::core::migration::{MigrationSettings, TransformErrorPolicy};
use crate::core::transform::TransformOptions;
use crate::domain::model::MemberKind;
use crate::utils::error::{MigrationError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_CONCURRENCY: usize = 1000;
const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub migration: MigrationSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub organization: String,
    #[serde(default = "default_signup_application")]
    pub signup_application: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_members_file")]
    pub members_file: String,
    #[serde(default = "default_ucenter_members_file")]
    pub ucenter_members_file: String,
    #[serde(default)]
    pub avatar_base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            members_file: default_members_file(),
            ucenter_members_file: default_ucenter_members_file(),
            avatar_base_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSection {
    #[serde(default = "default_kind")]
    pub kind: MemberKind,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub on_transform_error: TransformErrorPolicy,
    #[serde(default = "default_forbidden_statuses")]
    pub forbidden_statuses: Vec<i32>,
    pub report_path: Option<String>,
}

impl Default for MigrationSection {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            on_transform_error: TransformErrorPolicy::default(),
            forbidden_statuses: default_forbidden_statuses(),
            report_path: None,
        }
    }
}

fn default_signup_application() -> String {
    "app-built-in".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_base_path() -> String {
    ".".to_string()
}

fn default_members_file() -> String {
    DEFAULT_MEMBERS_FILE.to_string()
}

fn default_ucenter_members_file() -> String {
    DEFAULT_UCENTER_MEMBERS_FILE.to_string()
}

fn default_kind() -> MemberKind {
    MemberKind::Member
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_forbidden_statuses() -> Vec<i32> {
    vec![-1]
}

impl MigrationConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MigrationError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MigrationError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CLIENT_SECRET})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| MigrationError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            organization: self.provider.organization.clone(),
            signup_application: self.provider.signup_application.clone(),
            avatar_base_url: self.source.avatar_base_url.clone(),
            forbidden_statuses: self.migration.forbidden_statuses.clone(),
        }
    }

    pub fn settings(&self) -> MigrationSettings {
        MigrationSettings {
            kind: self.migration.kind,
            concurrency: self.migration.concurrency,
            batch_size: self.migration.batch_size,
            on_transform_error: self.migration.on_transform_error,
            transform: self.transform_options(),
            dry_run: false,
        }
    }
}

impl Validate for MigrationConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("provider.endpoint", &self.provider.endpoint)?;
        validation::validate_non_empty_string("provider.client_id", &self.provider.client_id)?;
        validation::validate_non_empty_string(
            "provider.client_secret",
            &self.provider.client_secret,
        )?;
        validation::validate_non_empty_string("provider.organization", &self.provider.organization)?;
        validation::validate_range("provider.timeout_seconds", self.provider.timeout_seconds, 1, 3600)?;

        // 未替換的 ${VAR} 代表環境變數缺失
        for (field, value) in [
            ("provider.client_id", &self.provider.client_id),
            ("provider.client_secret", &self.provider.client_secret),
        ] {
            if value.starts_with("${") {
                return Err(MigrationError::MissingConfigError {
                    field: format!("{} (environment variable {})", field, value),
                });
            }
        }

        validation::validate_path("source.base_path", &self.source.base_path)?;
        let (field, file) = match self.migration.kind {
            MemberKind::Member => ("source.members_file", &self.source.members_file),
            MemberKind::UcenterMember => {
                ("source.ucenter_members_file", &self.source.ucenter_members_file)
            }
        };
        validation::validate_file_extension(field, file, &["csv"])?;
        if !self.source.avatar_base_url.is_empty() {
            validation::validate_url("source.avatar_base_url", &self.source.avatar_base_url)?;
        }

        validation::validate_range("migration.concurrency", self.migration.concurrency, 1, MAX_CONCURRENCY)?;
        validation::validate_range("migration.batch_size", self.migration.batch_size, 1, MAX_BATCH_SIZE)?;
        if let Some(report_path) = &self.migration.report_path {
            validation::validate_path("migration.report_path", report_path)?;
        }

        Ok(())
    }
}
