//! 凭据保险库
//!
//! 密码 / 令牌只存放在这里，以身份 id 为键。执行引擎不持有保险库的引用。

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, Result};

/// 系统钥匙串中的服务名
pub const KEYRING_SERVICE: &str = "ops-actions";

/// 身份在保险库中的条目名
pub fn entry_name(identity_id: i64) -> String {
    format!("identity:{}", identity_id)
}

/// 凭据保险库
///
/// 钥匙串接口本身是阻塞的，这里保持同步签名。
pub trait CredentialVault: Send + Sync {
    /// 读取秘密，不存在时返回 None
    fn get_secret(&self, identity_id: i64) -> Result<Option<SecretString>>;

    /// 写入或覆盖秘密
    fn set_secret(&self, identity_id: i64, secret: &SecretString) -> Result<()>;

    /// 删除秘密，条目不存在不算错误
    fn delete_secret(&self, identity_id: i64) -> Result<()>;
}

/// 基于系统钥匙串的保险库
#[derive(Debug, Clone)]
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, identity_id: i64) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &entry_name(identity_id))
            .map_err(|e| AppError::Vault(e.to_string()))
    }
}

impl Default for KeyringVault {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVault for KeyringVault {
    fn get_secret(&self, identity_id: i64) -> Result<Option<SecretString>> {
        match self.entry(identity_id)?.get_password() {
            Ok(value) => Ok(Some(SecretString::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::Vault(e.to_string())),
        }
    }

    fn set_secret(&self, identity_id: i64, secret: &SecretString) -> Result<()> {
        self.entry(identity_id)?
            .set_password(secret.expose_secret())
            .map_err(|e| AppError::Vault(e.to_string()))?;
        debug!(identity_id, "Secret stored in keyring");
        Ok(())
    }

    fn delete_secret(&self, identity_id: i64) -> Result<()> {
        match self.entry(identity_id)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::Vault(e.to_string())),
        }
    }
}

/// 内存保险库，用于测试和无钥匙串环境
#[derive(Debug, Default)]
pub struct MemoryVault {
    secrets: Mutex<HashMap<i64, SecretString>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.secrets.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, SecretString>>> {
        self.secrets
            .lock()
            .map_err(|_| AppError::Vault("memory vault lock poisoned".to_string()))
    }
}

impl CredentialVault for MemoryVault {
    fn get_secret(&self, identity_id: i64) -> Result<Option<SecretString>> {
        Ok(self
            .lock()?
            .get(&identity_id)
            .map(|s| SecretString::new(s.expose_secret().clone())))
    }

    fn set_secret(&self, identity_id: i64, secret: &SecretString) -> Result<()> {
        self.lock()?
            .insert(identity_id, SecretString::new(secret.expose_secret().clone()));
        Ok(())
    }

    fn delete_secret(&self, identity_id: i64) -> Result<()> {
        self.lock()?.remove(&identity_id);
        Ok(())
    }
}
