//! Database repository layer

pub mod action_repo;
pub mod identity_repo;
pub mod server_repo;

pub use action_repo::*;
pub use identity_repo::*;
pub use server_repo::*;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::identity::{Identity, SshProfile};
use crate::models::server::Server;

/// 按名称查找服务器
#[async_trait]
pub trait ServerLookup: Send + Sync {
    async fn lookup_server(&self, name: &str) -> Result<Option<Server>>;
}

/// 查找 SSH 配置与身份元数据（不含秘密）
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup_profile(&self, server_id: i64) -> Result<Option<SshProfile>>;

    async fn lookup_identity(&self, identity_id: i64) -> Result<Option<Identity>>;
}
