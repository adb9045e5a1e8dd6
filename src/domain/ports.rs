use crate::domain::model::{LegacyMemberRecord, TargetIdentity};
use crate::utils::error::{ProviderError, Result};
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 舊論壇會員來源（唯讀）
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_members(&self) -> Result<Vec<LegacyMemberRecord>>;
    async fn list_ucenter_members(&self) -> Result<Vec<LegacyMemberRecord>>;
}

/// 新身分提供者；回傳值表示是否真的寫入了資料
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn add_user(&self, user: &TargetIdentity) -> std::result::Result<bool, ProviderError>;
    async fn add_users(
        &self,
        users: &[TargetIdentity],
    ) -> std::result::Result<bool, ProviderError>;
}
