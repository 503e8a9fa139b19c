//! 身份与 SSH 配置模型
//!
//! 这里只有元数据：密码 / 令牌等秘密只存放在凭据保险库中，
//! 以身份 id 为键，从不出现在这些结构体或由它们派生的任何持久化记录里。

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 身份类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum IdentityKind {
    /// 私钥文件路径
    SshKeyPath,
    /// 密码
    Password,
    /// 令牌
    Token,
}

/// 身份元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
    pub kind: IdentityKind,
    /// 仅 kind = ssh_key_path 时有值
    pub key_path: Option<String>,
}

/// 服务器的 SSH 配置，每台服务器至多一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SshProfile {
    pub server_id: i64,
    pub port: u16,
    pub identity_id: Option<i64>,
    pub username_override: Option<String>,
}

/// 创建 / 更新身份请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdentityRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub username: Option<String>,
    pub kind: IdentityKind,
    pub key_path: Option<String>,
}

/// 带秘密的身份请求，秘密只会被写入保险库
#[derive(Debug, Deserialize, Validate)]
pub struct IdentityPayload {
    #[serde(flatten)]
    #[validate(nested)]
    pub identity: IdentityRequest,
    #[serde(default)]
    pub secret: Option<SecretString>,
}

/// 设置 SSH 配置请求（upsert）
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SshProfileRequest {
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,
    pub identity_id: Option<i64>,
    pub username_override: Option<String>,
}

fn default_port() -> u16 {
    22
}

/// 去除首尾空白，空字符串视为未设置
pub(crate) fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
