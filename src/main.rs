use clap::Parser;
use member_migrate::domain::ports::Storage;
use member_migrate::utils::error::ErrorSeverity;
use member_migrate::utils::{logger, validation::Validate};
use member_migrate::{
    CliArgs, CsvMemberSource, HttpIdentityProvider, LocalStorage, MigrationConfig,
    MigrationEngine, MigrationReport,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting member-migrate");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match MigrationConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };
    args.apply_overrides(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    tracing::info!(
        "✅ Configuration loaded: kind={}, concurrency={}, batch_size={}, provider={}",
        config.migration.kind,
        config.migration.concurrency,
        config.migration.batch_size,
        config.provider.endpoint
    );

    let provider = Arc::new(HttpIdentityProvider::new(&config.provider)?);
    let source = CsvMemberSource::new(LocalStorage::new(config.source.base_path.clone()))
        .with_files(
            config.source.members_file.clone(),
            config.source.ucenter_members_file.clone(),
        );

    let mut settings = config.settings();
    settings.dry_run = args.dry_run;
    if settings.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the identity provider will not be called");
    }

    let engine = MigrationEngine::new_with_monitoring(source, provider, settings, args.monitor);

    // Ctrl-C：停止啟動新的轉換，等待進行中的工作
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl-C, cancelling migration");
            cancel_on_signal.cancel();
        }
    });

    match engine.run(&cancel).await {
        Ok(report) => {
            print_summary(&report);
            if let Some(report_path) = &config.migration.report_path {
                let data = report.to_json()?;
                LocalStorage::new(".").write_file(report_path, &data).await?;
                tracing::info!("📁 Report saved to: {}", report_path);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Migration failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 依錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn print_summary(report: &MigrationReport) {
    println!("✅ {} migration finished", report.kind);
    println!(
        "   records: {}, transformed: {}, skipped: {}",
        report.total,
        report.transformed,
        report.failed.len()
    );
    match &report.import {
        Some(import) => println!(
            "   batches: {}, bulk inserted: {}, inserted one by one: {}, duplicates: {}, affected: {}",
            import.chunks,
            import.bulk_inserted,
            import.fallback_inserted,
            import.duplicates,
            import.affected
        ),
        None => println!("   dry run, nothing imported"),
    }
}
