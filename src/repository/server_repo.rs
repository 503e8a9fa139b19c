//! Server repository (服务器与地址)

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{map_constraint_error, AppError};
use crate::models::server::*;

use super::ServerLookup;

pub struct ServerRepository {
    db: SqlitePool,
}

impl ServerRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// 创建服务器及其地址
    pub async fn create(&self, req: &ServerRequest) -> Result<Server, AppError> {
        let name = validated_name(&req.name)?;
        let hosts = req.hosts.trimmed();

        let mut tx = self.db.begin().await?;

        let id: i64 = sqlx::query_scalar("INSERT INTO servers (name) VALUES (?) RETURNING id")
            .bind(&name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_constraint_error(e, "server name already exists"))?;

        write_hosts(&mut tx, id, &hosts).await?;
        tx.commit().await?;

        tracing::debug!(server_id = id, name = %name, "Server created");

        Ok(Server { id, name, hosts })
    }

    /// 按名称获取服务器（名称去除首尾空白后匹配）
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Server>, AppError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM servers WHERE name = ?")
                .bind(name.trim())
                .fetch_optional(&self.db)
                .await?;

        match row {
            Some((id, name)) => Ok(Some(self.assemble(id, name).await?)),
            None => Ok(None),
        }
    }

    /// 按 id 获取服务器
    pub async fn get(&self, id: i64) -> Result<Option<Server>, AppError> {
        let row: Option<(i64, String)> = sqlx::query_as("SELECT id, name FROM servers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some((id, name)) => Ok(Some(self.assemble(id, name).await?)),
            None => Ok(None),
        }
    }

    /// 列出服务器，按名称排序
    pub async fn list(&self) -> Result<Vec<Server>, AppError> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, name FROM servers ORDER BY name")
            .fetch_all(&self.db)
            .await?;

        let mut servers = Vec::with_capacity(rows.len());
        for (id, name) in rows {
            servers.push(self.assemble(id, name).await?);
        }

        Ok(servers)
    }

    /// 更新服务器：重命名并整体替换地址
    pub async fn update(&self, id: i64, req: &ServerRequest) -> Result<Option<Server>, AppError> {
        let name = validated_name(&req.name)?;
        let hosts = req.hosts.trimmed();

        let mut tx = self.db.begin().await?;

        let result = sqlx::query("UPDATE servers SET name = ? WHERE id = ?")
            .bind(&name)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint_error(e, "server name already exists"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM hosts WHERE server_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        write_hosts(&mut tx, id, &hosts).await?;
        tx.commit().await?;

        Ok(Some(Server { id, name, hosts }))
    }

    /// 删除服务器；已有执行历史的服务器不能删除
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM servers WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| map_constraint_error(e, "server has run history and cannot be deleted"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn assemble(&self, id: i64, name: String) -> Result<Server, AppError> {
        let rows: Vec<(String, i64, String)> =
            sqlx::query_as("SELECT kind, priority, address FROM hosts WHERE server_id = ?")
                .bind(id)
                .fetch_all(&self.db)
                .await?;

        let mut hosts = HostSet::default();
        for (kind, priority, address) in rows {
            hosts.assign(&kind, priority, address);
        }

        Ok(Server { id, name, hosts })
    }
}

#[async_trait::async_trait]
impl ServerLookup for ServerRepository {
    async fn lookup_server(&self, name: &str) -> Result<Option<Server>, AppError> {
        self.get_by_name(name).await
    }
}

fn validated_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("server name must not be empty"));
    }
    Ok(name.to_string())
}

/// 只写入非空地址
async fn write_hosts(
    tx: &mut Transaction<'_, Sqlite>,
    server_id: i64,
    hosts: &HostSet,
) -> Result<(), AppError> {
    for (kind, priority, address) in hosts.slots() {
        if address.is_empty() {
            continue;
        }
        sqlx::query("INSERT INTO hosts (server_id, kind, priority, address) VALUES (?, ?, ?, ?)")
            .bind(server_id)
            .bind(kind.as_str())
            .bind(priority)
            .bind(address)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
