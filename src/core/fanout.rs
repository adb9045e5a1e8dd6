use crate::domain::model::{LegacyMemberRecord, TargetIdentity};
use crate::utils::error::TransformError;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CONCURRENCY: usize = 20;

/// 每筆輸入記錄對應的結果位置
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSlot {
    Done(TargetIdentity),
    Failed(TransformError),
    /// 取消後未啟動的記錄
    Cancelled,
}

#[derive(Debug)]
pub struct FanoutOutcome {
    /// 與輸入順序一一對應，長度恆等於輸入筆數
    pub slots: Vec<RecordSlot>,
    pub cancelled: bool,
}

impl FanoutOutcome {
    pub fn succeeded(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, RecordSlot::Done(_)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &TransformError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| match slot {
                RecordSlot::Failed(err) => Some((position, err)),
                _ => None,
            })
    }

    pub fn not_started(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, RecordSlot::Cancelled))
            .count()
    }
}

/// 以固定上限並發轉換舊會員記錄
#[derive(Debug, Clone)]
pub struct FanoutExecutor {
    concurrency: usize,
}

impl Default for FanoutExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl FanoutExecutor {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// 每筆記錄一個 task，同時最多 `concurrency` 個在執行。
    ///
    /// 啟動前先取得 permit，task 結束時釋放；回傳前等待所有已啟動的 task。
    /// 轉換失敗或 task panic 只影響該筆記錄的位置。取消後不再啟動新 task，
    /// 未啟動的位置標記為 [`RecordSlot::Cancelled`]。
    pub async fn run<F>(
        &self,
        records: Vec<LegacyMemberRecord>,
        transform: F,
        cancel: &CancellationToken,
    ) -> FanoutOutcome
    where
        F: Fn(&LegacyMemberRecord) -> Result<TargetIdentity, TransformError>
            + Send
            + Sync
            + 'static,
    {
        let total = records.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let transform = Arc::new(transform);
        let mut handles = Vec::with_capacity(total);
        let mut cancelled = false;

        tracing::debug!(
            "Transforming {} records with concurrency {}",
            total,
            self.concurrency
        );

        for (position, record) in records.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("Transform permits closed, stopping at record #{}", position);
                        cancelled = true;
                        break;
                    }
                },
            };

            let transform = Arc::clone(&transform);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = (*transform)(&record);
                match &result {
                    Ok(_) => tracing::info!(
                        "[{}/{}]: Transformed user: [{}, {}]",
                        position + 1,
                        total,
                        record.uid(),
                        record.username()
                    ),
                    Err(e) => tracing::warn!(
                        "[{}/{}]: Failed to transform {} [{}, {}]: {}",
                        position + 1,
                        total,
                        record.kind(),
                        record.uid(),
                        record.username(),
                        e
                    ),
                }
                result
            }));
        }

        if cancelled {
            tracing::warn!(
                "Cancellation requested, waiting for {} in-flight transforms",
                handles.len()
            );
        }

        let mut slots: Vec<RecordSlot> = (0..total).map(|_| RecordSlot::Cancelled).collect();
        // handles 依啟動順序排列，索引即原始位置
        for (position, handle) in handles.into_iter().enumerate() {
            slots[position] = match handle.await {
                Ok(Ok(user)) => RecordSlot::Done(user),
                Ok(Err(e)) => RecordSlot::Failed(e),
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        panic_message(join_error.into_panic())
                    } else {
                        "task was cancelled".to_string()
                    };
                    tracing::error!("Transform task for record #{} panicked: {}", position, message);
                    RecordSlot::Failed(TransformError::Panicked { position, message })
                }
            };
        }

        FanoutOutcome { slots, cancelled }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
