//! 服务器服务层

use sqlx::SqlitePool;
use tracing::{info, instrument};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::server::*;
use crate::repository::ServerRepository;

/// 服务器服务
pub struct ServerService {
    servers: ServerRepository,
}

impl ServerService {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            servers: ServerRepository::new(db),
        }
    }

    pub async fn list(&self) -> Result<Vec<Server>> {
        self.servers.list().await
    }

    pub async fn get(&self, name: &str) -> Result<Server> {
        self.servers
            .get_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("server '{}'", name.trim())))
    }

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create(&self, req: ServerRequest) -> Result<Server> {
        req.validate()?;
        let server = self.servers.create(&req).await?;
        info!(server_id = server.id, "Server created");
        Ok(server)
    }

    /// 重命名或替换地址
    #[instrument(skip(self, req))]
    pub async fn update(&self, name: &str, req: ServerRequest) -> Result<Server> {
        req.validate()?;
        let existing = self.get(name).await?;
        let server = self
            .servers
            .update(existing.id, &req)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("server '{}'", name.trim())))?;
        info!(server_id = server.id, name = %server.name, "Server updated");
        Ok(server)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let existing = self.get(name).await?;
        self.servers.delete(existing.id).await?;
        info!(server_id = existing.id, "Server deleted");
        Ok(())
    }
}
