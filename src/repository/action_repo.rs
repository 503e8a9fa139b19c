//! Action repository (动作模板与执行历史)

use sqlx::SqlitePool;

use crate::error::{map_constraint_error, AppError};
use crate::models::action::*;
use crate::models::identity::normalize_optional;
use crate::output::truncate_for_history;

const RUN_COLUMNS: &str = r#"
    r.id, r.action_id, r.server_id, s.name AS server_name,
    r.started_at, r.finished_at, r.status, r.exit_code, r.duration_ms,
    r.command_rendered, r.stdout, r.stderr
"#;

#[derive(Clone)]
pub struct ActionRepository {
    db: SqlitePool,
}

impl ActionRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ==================== Templates ====================

    /// 列出动作，按名称排序
    pub async fn list(&self) -> Result<Vec<ActionTemplate>, AppError> {
        let actions =
            sqlx::query_as::<_, ActionTemplate>("SELECT * FROM actions ORDER BY name, id")
                .fetch_all(&self.db)
                .await?;

        Ok(actions)
    }

    /// 获取动作
    pub async fn get(&self, id: i64) -> Result<Option<ActionTemplate>, AppError> {
        let action = sqlx::query_as::<_, ActionTemplate>("SELECT * FROM actions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(action)
    }

    /// 创建动作
    pub async fn create(&self, req: &ActionRequest) -> Result<ActionTemplate, AppError> {
        let action = sqlx::query_as::<_, ActionTemplate>(
            r#"
            INSERT INTO actions (name, description, command_template, requires_confirm, execution_target)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(req.name.trim())
        .bind(normalize_optional(req.description.as_deref()))
        .bind(req.command_template.trim())
        .bind(req.requires_confirm)
        .bind(req.execution_target)
        .fetch_one(&self.db)
        .await?;

        Ok(action)
    }

    /// 更新动作（整体替换）
    pub async fn update(
        &self,
        id: i64,
        req: &ActionRequest,
    ) -> Result<Option<ActionTemplate>, AppError> {
        let action = sqlx::query_as::<_, ActionTemplate>(
            r#"
            UPDATE actions
            SET name = ?, description = ?, command_template = ?,
                requires_confirm = ?, execution_target = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(req.name.trim())
        .bind(normalize_optional(req.description.as_deref()))
        .bind(req.command_template.trim())
        .bind(req.requires_confirm)
        .bind(req.execution_target)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(action)
    }

    /// 删除动作；已有执行历史的动作不能删除
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM actions WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| map_constraint_error(e, "action has run history and cannot be deleted"))?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Runs ====================

    /// 追加一条执行记录
    ///
    /// 命令、stdout、stderr 在写入前各自截断到 50,000 字符，
    /// 返回的记录与持久化内容完全一致。
    pub async fn insert_run(&self, run: &NewActionRun) -> Result<ActionRun, AppError> {
        let mut tx = self.db.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO action_runs
                (action_id, server_id, started_at, finished_at, status, exit_code,
                 duration_ms, command_rendered, stdout, stderr)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(run.action_id)
        .bind(run.server_id)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.status)
        .bind(run.exit_code)
        .bind(run.duration_ms)
        .bind(truncate_for_history(&run.command_rendered))
        .bind(truncate_for_history(&run.stdout))
        .bind(truncate_for_history(&run.stderr))
        .fetch_one(&mut *tx)
        .await?;

        let inserted = sqlx::query_as::<_, ActionRun>(&format!(
            "SELECT {} FROM action_runs r JOIN servers s ON s.id = r.server_id WHERE r.id = ?",
            RUN_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(inserted)
    }

    /// 获取执行记录
    pub async fn get_run(&self, id: i64) -> Result<Option<ActionRun>, AppError> {
        let run = sqlx::query_as::<_, ActionRun>(&format!(
            "SELECT {} FROM action_runs r JOIN servers s ON s.id = r.server_id WHERE r.id = ?",
            RUN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(run)
    }

    /// 最近的执行记录，新的在前
    pub async fn list_runs(&self, limit: i64) -> Result<Vec<ActionRun>, AppError> {
        let runs = sqlx::query_as::<_, ActionRun>(&format!(
            r#"
            SELECT {} FROM action_runs r JOIN servers s ON s.id = r.server_id
            ORDER BY r.started_at DESC, r.id DESC
            LIMIT ?
            "#,
            RUN_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(runs)
    }

    /// 某个动作的执行记录，新的在前
    pub async fn list_runs_for_action(
        &self,
        action_id: i64,
        limit: i64,
    ) -> Result<Vec<ActionRun>, AppError> {
        let runs = sqlx::query_as::<_, ActionRun>(&format!(
            r#"
            SELECT {} FROM action_runs r JOIN servers s ON s.id = r.server_id
            WHERE r.action_id = ?
            ORDER BY r.started_at DESC, r.id DESC
            LIMIT ?
            "#,
            RUN_COLUMNS
        ))
        .bind(action_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(runs)
    }
}
