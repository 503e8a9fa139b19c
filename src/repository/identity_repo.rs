//! Identity repository (身份元数据与 SSH 配置)
//!
//! 这张表里没有秘密列，秘密由 `vault` 负责。

use sqlx::SqlitePool;

use crate::error::{map_constraint_error, AppError};
use crate::models::identity::*;

use super::ProfileLookup;

pub struct IdentityRepository {
    db: SqlitePool,
}

impl IdentityRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ==================== Identities ====================

    pub async fn list(&self) -> Result<Vec<Identity>, AppError> {
        let identities =
            sqlx::query_as::<_, Identity>("SELECT * FROM identities ORDER BY name")
                .fetch_all(&self.db)
                .await?;

        Ok(identities)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Identity>, AppError> {
        let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(identity)
    }

    /// 创建身份元数据
    pub async fn create(&self, req: &IdentityRequest) -> Result<Identity, AppError> {
        let fields = IdentityFields::from_request(req)?;

        let identity = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO identities (name, username, kind, key_path)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.username)
        .bind(req.kind)
        .bind(&fields.key_path)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_constraint_error(e, "identity name already exists"))?;

        Ok(identity)
    }

    /// 更新身份元数据
    pub async fn update(&self, id: i64, req: &IdentityRequest) -> Result<Option<Identity>, AppError> {
        let fields = IdentityFields::from_request(req)?;

        let identity = sqlx::query_as::<_, Identity>(
            r#"
            UPDATE identities
            SET name = ?, username = ?, kind = ?, key_path = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.username)
        .bind(req.kind)
        .bind(&fields.key_path)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_constraint_error(e, "identity name already exists"))?;

        Ok(identity)
    }

    /// 删除身份，引用它的 SSH 配置置空
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== SSH profiles ====================

    pub async fn get_ssh_profile(&self, server_id: i64) -> Result<Option<SshProfile>, AppError> {
        let profile =
            sqlx::query_as::<_, SshProfile>("SELECT * FROM ssh_profiles WHERE server_id = ?")
                .bind(server_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(profile)
    }

    /// 设置服务器的 SSH 配置，每台服务器至多一条
    pub async fn set_ssh_profile(
        &self,
        server_id: i64,
        req: &SshProfileRequest,
    ) -> Result<SshProfile, AppError> {
        let profile = sqlx::query_as::<_, SshProfile>(
            r#"
            INSERT INTO ssh_profiles (server_id, port, identity_id, username_override)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (server_id) DO UPDATE SET
                port = excluded.port,
                identity_id = excluded.identity_id,
                username_override = excluded.username_override
            RETURNING *
            "#,
        )
        .bind(server_id)
        .bind(req.port)
        .bind(req.identity_id)
        .bind(normalize_optional(req.username_override.as_deref()))
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_constraint_error(e, "server or identity does not exist"))?;

        Ok(profile)
    }
}

#[async_trait::async_trait]
impl ProfileLookup for IdentityRepository {
    async fn lookup_profile(&self, server_id: i64) -> Result<Option<SshProfile>, AppError> {
        self.get_ssh_profile(server_id).await
    }

    async fn lookup_identity(&self, identity_id: i64) -> Result<Option<Identity>, AppError> {
        self.get(identity_id).await
    }
}

/// 写入前规整过的字段
struct IdentityFields {
    name: String,
    username: Option<String>,
    key_path: Option<String>,
}

impl IdentityFields {
    fn from_request(req: &IdentityRequest) -> Result<Self, AppError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("identity name must not be empty"));
        }

        // 私钥路径只对 ssh_key_path 类型有意义
        let key_path = match req.kind {
            IdentityKind::SshKeyPath => normalize_optional(req.key_path.as_deref()),
            IdentityKind::Password | IdentityKind::Token => None,
        };

        Ok(Self {
            name: name.to_string(),
            username: normalize_optional(req.username.as_deref()),
            key_path,
        })
    }
}
