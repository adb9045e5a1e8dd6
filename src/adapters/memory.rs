use crate::domain::model::{LegacyMemberRecord, TargetIdentity};
use crate::domain::ports::{IdentityProvider, SourceStore};
use crate::utils::error::{ProviderError, Result, MYSQL_DUPLICATE_ENTRY};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// 記憶體內的會員來源，主要供測試與試跑使用
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    members: Vec<LegacyMemberRecord>,
    ucenter_members: Vec<LegacyMemberRecord>,
}

impl InMemorySource {
    pub fn new(
        members: Vec<LegacyMemberRecord>,
        ucenter_members: Vec<LegacyMemberRecord>,
    ) -> Self {
        Self {
            members,
            ucenter_members,
        }
    }
}

#[async_trait]
impl SourceStore for InMemorySource {
    async fn list_members(&self) -> Result<Vec<LegacyMemberRecord>> {
        Ok(self.members.clone())
    }

    async fn list_ucenter_members(&self) -> Result<Vec<LegacyMemberRecord>> {
        Ok(self.ucenter_members.clone())
    }
}

#[derive(Default)]
struct ProviderState {
    users: Vec<TargetIdentity>,
    keys: HashSet<(String, String)>,
    bulk_calls: Vec<usize>,
    single_calls: usize,
    bulk_failures: HashMap<usize, String>,
    single_failures: HashMap<usize, String>,
}

impl ProviderState {
    fn duplicate_error(user: &TargetIdentity) -> ProviderError {
        ProviderError::from_message(format!(
            "Error {}: Duplicate entry '{}-{}' for key 'PRIMARY'",
            MYSQL_DUPLICATE_ENTRY, user.owner, user.name
        ))
    }
}

/// 以 (owner, name) 為主鍵的記憶體身分提供者。
///
/// 批次寫入是全有或全無：任一筆重複則整批回傳唯一鍵衝突。
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    state: Mutex<ProviderState>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(users: Vec<TargetIdentity>) -> Self {
        let keys = users
            .iter()
            .map(|u| (u.owner.clone(), u.name.clone()))
            .collect();
        Self {
            state: Mutex::new(ProviderState {
                users,
                keys,
                ..ProviderState::default()
            }),
        }
    }

    /// 讓第 `call_index` 次（從 0 起算）批次呼叫回傳指定錯誤訊息
    pub async fn fail_bulk_call(&self, call_index: usize, message: &str) {
        let mut state = self.state.lock().await;
        state.bulk_failures.insert(call_index, message.to_string());
    }

    pub async fn fail_single_call(&self, call_index: usize, message: &str) {
        let mut state = self.state.lock().await;
        state.single_failures.insert(call_index, message.to_string());
    }

    pub async fn users(&self) -> Vec<TargetIdentity> {
        self.state.lock().await.users.clone()
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn bulk_call_sizes(&self) -> Vec<usize> {
        self.state.lock().await.bulk_calls.clone()
    }

    pub async fn single_call_count(&self) -> usize {
        self.state.lock().await.single_calls
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn add_user(&self, user: &TargetIdentity) -> std::result::Result<bool, ProviderError> {
        let mut state = self.state.lock().await;
        let call_index = state.single_calls;
        state.single_calls += 1;

        if let Some(message) = state.single_failures.remove(&call_index) {
            return Err(ProviderError::from_message(message));
        }

        let key = (user.owner.clone(), user.name.clone());
        if state.keys.contains(&key) {
            return Err(ProviderState::duplicate_error(user));
        }
        state.keys.insert(key);
        state.users.push(user.clone());
        Ok(true)
    }

    async fn add_users(
        &self,
        users: &[TargetIdentity],
    ) -> std::result::Result<bool, ProviderError> {
        let mut state = self.state.lock().await;
        let call_index = state.bulk_calls.len();
        state.bulk_calls.push(users.len());

        if let Some(message) = state.bulk_failures.remove(&call_index) {
            return Err(ProviderError::from_message(message));
        }

        let mut batch_keys = HashSet::with_capacity(users.len());
        for user in users {
            let key = (user.owner.clone(), user.name.clone());
            if state.keys.contains(&key) || !batch_keys.insert(key) {
                return Err(ProviderState::duplicate_error(user));
            }
        }

        state.keys.extend(batch_keys);
        state.users.extend_from_slice(users);
        Ok(!users.is_empty())
    }
}
