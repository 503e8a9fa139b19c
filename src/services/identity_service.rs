//! 身份服务层
//! 身份元数据写数据库，秘密写保险库，两者按身份 id 关联

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::identity::*;
use crate::repository::{IdentityRepository, ServerRepository};
use crate::vault::CredentialVault;

/// 身份服务
pub struct IdentityService {
    identities: IdentityRepository,
    servers: ServerRepository,
    vault: Arc<dyn CredentialVault>,
}

impl IdentityService {
    pub fn new(db: SqlitePool, vault: Arc<dyn CredentialVault>) -> Self {
        Self {
            identities: IdentityRepository::new(db.clone()),
            servers: ServerRepository::new(db),
            vault,
        }
    }

    pub async fn list(&self) -> Result<Vec<Identity>> {
        self.identities.list().await
    }

    pub async fn get(&self, id: i64) -> Result<Identity> {
        self.identities
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("identity {}", id)))
    }

    /// 创建身份；秘密写入失败时撤销已写入的元数据
    #[instrument(skip(self, payload), fields(name = %payload.identity.name))]
    pub async fn create(&self, payload: IdentityPayload) -> Result<Identity> {
        payload.validate()?;
        let identity = self.identities.create(&payload.identity).await?;

        if let Some(secret) = non_empty(payload.secret.as_ref()) {
            if let Err(e) = self.vault.set_secret(identity.id, secret) {
                warn!(identity_id = identity.id, error = %e, "Failed to store secret, rolling back");
                self.identities.delete(identity.id).await?;
                return Err(e);
            }
        }

        info!(identity_id = identity.id, kind = ?identity.kind, "Identity created");
        Ok(identity)
    }

    /// 更新身份；提供了新秘密时轮换保险库条目
    #[instrument(skip(self, payload))]
    pub async fn update(&self, id: i64, payload: IdentityPayload) -> Result<Identity> {
        payload.validate()?;
        let identity = self
            .identities
            .update(id, &payload.identity)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("identity {}", id)))?;

        if let Some(secret) = non_empty(payload.secret.as_ref()) {
            self.vault.set_secret(id, secret)?;
            info!(identity_id = id, "Identity secret rotated");
        }

        Ok(identity)
    }

    /// 删除身份并尽力清除保险库条目
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.identities.delete(id).await? {
            return Err(AppError::NotFound(format!("identity {}", id)));
        }

        if let Err(e) = self.vault.delete_secret(id) {
            warn!(identity_id = id, error = %e, "Failed to purge identity secret");
        }

        info!(identity_id = id, "Identity deleted");
        Ok(())
    }

    /// 读取秘密，供基于密码的扩展使用
    pub fn get_secret(&self, id: i64) -> Result<Option<SecretString>> {
        self.vault.get_secret(id)
    }

    // ==================== SSH profiles ====================

    pub async fn get_ssh_profile(&self, server_name: &str) -> Result<Option<SshProfile>> {
        let server = self.require_server(server_name).await?;
        self.identities.get_ssh_profile(server.id).await
    }

    #[instrument(skip(self, req))]
    pub async fn set_ssh_profile(
        &self,
        server_name: &str,
        req: SshProfileRequest,
    ) -> Result<SshProfile> {
        req.validate()?;
        let server = self.require_server(server_name).await?;

        if let Some(identity_id) = req.identity_id {
            self.get(identity_id).await?;
        }

        let profile = self.identities.set_ssh_profile(server.id, &req).await?;
        info!(server = %server.name, port = profile.port, "SSH profile saved");
        Ok(profile)
    }

    async fn require_server(&self, name: &str) -> Result<crate::models::server::Server> {
        self.servers
            .get_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("server '{}'", name.trim())))
    }
}

/// 空秘密不写入保险库
fn non_empty(secret: Option<&SecretString>) -> Option<&SecretString> {
    secret.filter(|s| !s.expose_secret().is_empty())
}
