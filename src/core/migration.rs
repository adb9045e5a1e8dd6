use crate::core::fanout::{FanoutExecutor, RecordSlot};
use crate::core::importer::{BatchImporter, ImportOutcome};
use crate::core::transform::{transform, TransformOptions};
use crate::domain::model::{MemberKind, TargetIdentity};
use crate::domain::ports::{IdentityProvider, SourceStore};
use crate::utils::error::{MigrationError, Result};
use crate::utils::monitor::SystemMonitor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 舊記錄轉換失敗時的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformErrorPolicy {
    /// 記錄並略過該筆，其餘照常匯入
    #[default]
    Skip,
    /// 任何一筆失敗就在匯入前中止
    Abort,
}

#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub kind: MemberKind,
    pub concurrency: usize,
    pub batch_size: usize,
    pub on_transform_error: TransformErrorPolicy,
    pub transform: TransformOptions,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRecord {
    pub position: usize,
    pub uid: u64,
    pub username: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub kind: MemberKind,
    pub total: usize,
    pub transformed: usize,
    pub failed: Vec<FailedRecord>,
    pub dry_run: bool,
    /// 試跑時為 None
    pub import: Option<ImportOutcome>,
}

impl MigrationReport {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// 讀取 → 並發轉換 → 分批匯入
pub struct MigrationEngine<S: SourceStore> {
    source: S,
    provider: Arc<dyn IdentityProvider>,
    settings: MigrationSettings,
    monitor: SystemMonitor,
}

impl<S: SourceStore> MigrationEngine<S> {
    pub fn new(source: S, provider: Arc<dyn IdentityProvider>, settings: MigrationSettings) -> Self {
        Self::new_with_monitoring(source, provider, settings, false)
    }

    pub fn new_with_monitoring(
        source: S,
        provider: Arc<dyn IdentityProvider>,
        settings: MigrationSettings,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            source,
            provider,
            settings,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<MigrationReport> {
        let kind = self.settings.kind;
        tracing::info!("Starting {} migration", kind);

        // Extract
        let records = match kind {
            MemberKind::Member => self.source.list_members().await?,
            MemberKind::UcenterMember => self.source.list_ucenter_members().await?,
        };
        let total = records.len();
        tracing::info!("Extracted {} legacy records", total);
        self.monitor.log_stats("Extract");

        let identities: Vec<(u64, String)> = records
            .iter()
            .map(|r| (r.uid(), r.username().to_string()))
            .collect();

        // Transform
        let options = Arc::new(self.settings.transform.clone());
        let executor = FanoutExecutor::new(self.settings.concurrency);
        let outcome = executor
            .run(records, move |record| transform(record, &options), cancel)
            .await;
        self.monitor.log_stats("Transform");

        if outcome.cancelled {
            tracing::warn!(
                "Migration cancelled during transform: {} of {} records were not started",
                outcome.not_started(),
                total
            );
            return Err(MigrationError::Cancelled);
        }

        let mut users: Vec<TargetIdentity> = Vec::with_capacity(total);
        let mut failed = Vec::new();
        for (position, slot) in outcome.slots.into_iter().enumerate() {
            match slot {
                RecordSlot::Done(user) => users.push(user),
                RecordSlot::Failed(source) => {
                    if self.settings.on_transform_error == TransformErrorPolicy::Abort {
                        tracing::error!("Aborting: record #{} could not be transformed", position);
                        return Err(MigrationError::TransformError { position, source });
                    }
                    let (uid, username) = identities[position].clone();
                    tracing::warn!("Skipping record #{} [{}, {}]: {}", position, uid, username, source);
                    failed.push(FailedRecord {
                        position,
                        uid,
                        username,
                        error: source.to_string(),
                    });
                }
                RecordSlot::Cancelled => return Err(MigrationError::Cancelled),
            }
        }
        tracing::info!(
            "Transformed {} of {} records ({} skipped)",
            users.len(),
            total,
            failed.len()
        );

        let mut report = MigrationReport {
            kind,
            total,
            transformed: users.len(),
            failed,
            dry_run: self.settings.dry_run,
            import: None,
        };

        if self.settings.dry_run {
            tracing::info!("🔍 Dry run: {} users would be imported", users.len());
            self.monitor.log_final_stats();
            return Ok(report);
        }

        // Load
        let importer = BatchImporter::new(Arc::clone(&self.provider), self.settings.batch_size);
        let imported = importer.import(&users, cancel).await?;
        self.monitor.log_stats("Import");
        self.monitor.log_final_stats();

        report.import = Some(imported);
        Ok(report)
    }
}
