use crate::domain::model::TargetIdentity;
use crate::domain::ports::IdentityProvider;
use crate::utils::error::{MigrationError, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    /// 是否有任何新資料寫入
    pub affected: bool,
    pub chunks: usize,
    pub bulk_inserted: usize,
    pub fallback_inserted: usize,
    pub duplicates: usize,
}

/// 分批匯入；批次遇到唯一鍵衝突時改為逐筆匯入
pub struct BatchImporter {
    provider: Arc<dyn IdentityProvider>,
    batch_size: usize,
}

impl BatchImporter {
    pub fn new(provider: Arc<dyn IdentityProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn import(
        &self,
        users: &[TargetIdentity],
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome> {
        let mut outcome = ImportOutcome::default();
        if users.is_empty() {
            return Ok(outcome);
        }

        let chunk_count = (users.len() - 1) / self.batch_size + 1;
        for (index, chunk) in users.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Import cancelled before batch {}/{}, {} users already submitted",
                    index + 1,
                    chunk_count,
                    index * self.batch_size
                );
                return Err(MigrationError::Cancelled);
            }

            let start = index * self.batch_size;
            let end = start + chunk.len();
            tracing::info!(
                "Add users: [{} - {}] (batch {}/{})",
                start,
                end,
                index + 1,
                chunk_count
            );
            outcome.chunks += 1;

            match self.provider.add_users(chunk).await {
                Ok(affected) => {
                    if affected {
                        outcome.affected = true;
                        outcome.bulk_inserted += chunk.len();
                    }
                }
                Err(e) if e.is_duplicate_key() => {
                    tracing::warn!(
                        "Batch [{} - {}] hit a duplicate key ({}), falling back to single inserts",
                        start,
                        end,
                        e
                    );
                    self.import_one_by_one(chunk, start, cancel, &mut outcome)
                        .await?;
                }
                Err(e) => {
                    tracing::error!("Batch [{} - {}] failed: {}", start, end, e);
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            "Import finished: {} batches, {} bulk inserted, {} inserted one by one, {} duplicates skipped",
            outcome.chunks,
            outcome.bulk_inserted,
            outcome.fallback_inserted,
            outcome.duplicates
        );

        Ok(outcome)
    }

    async fn import_one_by_one(
        &self,
        chunk: &[TargetIdentity],
        offset: usize,
        cancel: &CancellationToken,
        outcome: &mut ImportOutcome,
    ) -> Result<()> {
        for (i, user) in chunk.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Import cancelled during single inserts, stopped before user #{}",
                    offset + i
                );
                return Err(MigrationError::Cancelled);
            }
            match self.provider.add_user(user).await {
                Ok(true) => {
                    outcome.affected = true;
                    outcome.fallback_inserted += 1;
                }
                Ok(false) => {}
                Err(e) if e.is_duplicate_key() => {
                    tracing::warn!("User #{} [{}] already exists: {}", offset + i, user.name, e);
                    outcome.duplicates += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to add user #{} [{}]: {}", offset + i, user.name, e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryIdentityProvider;
    use crate::utils::error::ProviderError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// 在第 N 次批次或單筆呼叫後觸發取消
    struct CancellingProvider {
        inner: Arc<InMemoryIdentityProvider>,
        cancel: CancellationToken,
        after_bulk_calls: Option<usize>,
        after_single_calls: Option<usize>,
    }

    #[async_trait]
    impl IdentityProvider for CancellingProvider {
        async fn add_user(
            &self,
            user: &TargetIdentity,
        ) -> std::result::Result<bool, ProviderError> {
            let result = self.inner.add_user(user).await;
            if Some(self.inner.single_call_count().await) == self.after_single_calls {
                self.cancel.cancel();
            }
            result
        }

        async fn add_users(
            &self,
            users: &[TargetIdentity],
        ) -> std::result::Result<bool, ProviderError> {
            let result = self.inner.add_users(users).await;
            if Some(self.inner.bulk_call_sizes().await.len()) == self.after_bulk_calls {
                self.cancel.cancel();
            }
            result
        }
    }

    fn user(i: usize) -> TargetIdentity {
        TargetIdentity {
            owner: "casnode".to_string(),
            name: format!("user{}", i),
            created_time: "2011-03-13T07:06:40+00:00".to_string(),
            id: i.to_string(),
            user_type: "normal-user".to_string(),
            password: String::new(),
            password_salt: String::new(),
            password_type: "md5".to_string(),
            display_name: format!("user{}", i),
            avatar: String::new(),
            email: String::new(),
            phone: String::new(),
            location: String::new(),
            affiliation: String::new(),
            homepage: String::new(),
            bio: String::new(),
            gender: String::new(),
            birthday: String::new(),
            score: 0,
            is_admin: false,
            is_forbidden: false,
            signup_application: "app-casnode".to_string(),
            properties: BTreeMap::new(),
        }
    }

    fn users(n: usize) -> Vec<TargetIdentity> {
        (0..n).map(user).collect()
    }

    fn importer(provider: &Arc<InMemoryIdentityProvider>, batch_size: usize) -> BatchImporter {
        BatchImporter::new(provider.clone() as Arc<dyn IdentityProvider>, batch_size)
    }

    #[tokio::test]
    async fn test_one_bulk_call_per_chunk() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let outcome = importer(&provider, 1000)
            .import(&users(2500), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.affected);
        assert_eq!(outcome.chunks, 3);
        assert_eq!(outcome.bulk_inserted, 2500);
        assert_eq!(provider.bulk_call_sizes().await, vec![1000, 1000, 500]);
        assert_eq!(provider.single_call_count().await, 0);
        assert_eq!(provider.user_count().await, 2500);
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_calls() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let outcome = importer(&provider, 1000)
            .import(&[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ImportOutcome::default());
        assert!(provider.bulk_call_sizes().await.is_empty());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let all = users(1200);
        importer(&provider, 500)
            .import(&all, &CancellationToken::new())
            .await
            .unwrap();

        let outcome = importer(&provider, 500)
            .import(&all, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.affected);
        assert_eq!(outcome.duplicates, 1200);
        assert_eq!(outcome.fallback_inserted, 0);
        assert_eq!(provider.user_count().await, 1200);
    }

    #[tokio::test]
    async fn test_single_duplicate_falls_back_for_whole_chunk() {
        let all = users(1000);
        let provider = Arc::new(InMemoryIdentityProvider::with_existing(vec![all[417].clone()]));

        let outcome = importer(&provider, 1000)
            .import(&all, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.affected);
        assert_eq!(outcome.fallback_inserted, 999);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.bulk_inserted, 0);
        assert_eq!(provider.single_call_count().await, 1000);
        assert_eq!(provider.user_count().await, 1000);
    }

    #[tokio::test]
    async fn test_duplicate_in_middle_chunk_keeps_other_chunks_on_bulk_path() {
        let all = users(2500);
        let provider = Arc::new(InMemoryIdentityProvider::with_existing(vec![all[1500].clone()]));

        let outcome = importer(&provider, 1000)
            .import(&all, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(provider.bulk_call_sizes().await, vec![1000, 1000, 500]);
        assert_eq!(provider.single_call_count().await, 1000);
        assert_eq!(outcome.bulk_inserted, 1500);
        assert_eq!(outcome.fallback_inserted, 999);
        assert_eq!(outcome.duplicates, 1);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_before_next_chunk() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        provider
            .fail_bulk_call(1, "Error 1205: Lock wait timeout exceeded")
            .await;

        let err = importer(&provider, 1000)
            .import(&users(2500), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MigrationError::ProviderError(ProviderError::Store { code: Some(1205), .. })
        ));
        assert_eq!(provider.bulk_call_sizes().await.len(), 2);
        assert_eq!(provider.single_call_count().await, 0);
        assert_eq!(provider.user_count().await, 1000);
    }

    #[tokio::test]
    async fn test_fatal_error_during_fallback_aborts() {
        let all = users(10);
        let provider = Arc::new(InMemoryIdentityProvider::with_existing(vec![all[0].clone()]));
        provider
            .fail_single_call(3, "Error 1406: Data too long for column 'bio'")
            .await;

        let err = importer(&provider, 10)
            .import(&all, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::ProviderError(_)));
        assert_eq!(provider.single_call_count().await, 4);
    }

    #[tokio::test]
    async fn test_cancelled_import_submits_nothing() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = importer(&provider, 10)
            .import(&users(5), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Cancelled));
        assert!(provider.bulk_call_sizes().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_between_chunks_stops_remaining_batches() {
        let inner = Arc::new(InMemoryIdentityProvider::new());
        let cancel = CancellationToken::new();
        let provider = Arc::new(CancellingProvider {
            inner: inner.clone(),
            cancel: cancel.clone(),
            after_bulk_calls: Some(1),
            after_single_calls: None,
        });

        let err = BatchImporter::new(provider, 1000)
            .import(&users(2500), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Cancelled));
        assert_eq!(inner.bulk_call_sizes().await, vec![1000]);
        assert_eq!(inner.user_count().await, 1000);
    }

    #[tokio::test]
    async fn test_cancel_during_fallback_stops_single_inserts() {
        let all = users(100);
        let inner = Arc::new(InMemoryIdentityProvider::with_existing(vec![all[50].clone()]));
        let cancel = CancellationToken::new();
        let provider = Arc::new(CancellingProvider {
            inner: inner.clone(),
            cancel: cancel.clone(),
            after_bulk_calls: None,
            after_single_calls: Some(3),
        });

        let err = BatchImporter::new(provider, 100)
            .import(&all, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Cancelled));
        assert_eq!(inner.bulk_call_sizes().await, vec![100]);
        assert_eq!(inner.single_call_count().await, 3);
        // with_existing 的 1 筆加上取消前逐筆寫入的 3 筆
        assert_eq!(inner.user_count().await, 4);
    }
}
