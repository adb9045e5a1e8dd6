use crate::config::toml_config::ProviderConfig;
use crate::domain::model::TargetIdentity;
use crate::domain::ports::IdentityProvider;
use crate::utils::error::{ProviderError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 身分提供者 API 的統一回應格式
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// 透過 `/api/add-user` 與 `/api/add-users` 寫入使用者
pub struct HttpIdentityProvider {
    client: Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(ProviderError::from)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}{}", self.endpoint, path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("{} responded with {}", path, status);

        if status == StatusCode::CONFLICT {
            return Err(ProviderError::DuplicateKey {
                code: None,
                message: text,
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let reply: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", e, text)))?;

        match reply.status.as_str() {
            "ok" => Ok(reply.data.as_str() == Some("Affected")),
            "error" => Err(ProviderError::from_message(reply.msg)),
            other => Err(ProviderError::InvalidResponse(format!(
                "unexpected status '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn add_user(&self, user: &TargetIdentity) -> std::result::Result<bool, ProviderError> {
        self.post("/api/add-user", user).await
    }

    async fn add_users(
        &self,
        users: &[TargetIdentity],
    ) -> std::result::Result<bool, ProviderError> {
        self.post("/api/add-users", users).await
    }
}
