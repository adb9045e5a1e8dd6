use crate::config::toml_config::MigrationConfig;
use crate::domain::model::MemberKind;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "member-migrate")]
#[command(about = "Import legacy forum members into an identity provider")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "migrate.toml")]
    pub config: String,

    /// Which legacy table to import: member or ucenter_member
    #[arg(long)]
    pub kind: Option<MemberKind>,

    /// Maximum number of records transformed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Number of users per add-users request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Transform only, do not call the identity provider
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Log CPU and memory usage per phase
    #[arg(long)]
    pub monitor: bool,
}

impl CliArgs {
    /// 命令列參數覆蓋 TOML 設定
    pub fn apply_overrides(&self, config: &mut MigrationConfig) {
        if let Some(kind) = self.kind {
            tracing::info!("🔧 Member kind overridden to: {}", kind);
            config.migration.kind = kind;
        }
        if let Some(concurrency) = self.concurrency {
            tracing::info!("🔧 Concurrency overridden to: {}", concurrency);
            config.migration.concurrency = concurrency;
        }
        if let Some(batch_size) = self.batch_size {
            tracing::info!("🔧 Batch size overridden to: {}", batch_size);
            config.migration.batch_size = batch_size;
        }
    }
}
