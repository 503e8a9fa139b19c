//! Action domain models
//! 动作模板与执行历史

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 执行目标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionTarget {
    /// 在本机 shell 中执行
    #[default]
    Local,
    /// 通过 ssh 在远端主机执行
    Ssh,
}

impl ExecutionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionTarget::Local => "local",
            ExecutionTarget::Ssh => "ssh",
        }
    }
}

/// 执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
    /// 仅渲染，未启动进程
    DryRun,
    /// 退出码为 0
    Success,
    /// 非零退出码、超时或进程级错误
    Error,
}

impl RunStatus {
    pub fn from_exit_code(exit_code: i32) -> Self {
        if exit_code == 0 {
            RunStatus::Success
        } else {
            RunStatus::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::DryRun => "dry_run",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }
}

/// 动作模板
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActionTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// 含 `{{placeholder}}` 的命令模板
    pub command_template: String,
    pub requires_confirm: bool,
    pub execution_target: ExecutionTarget,
}

/// 创建 / 更新动作请求（更新为整体替换）
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub command_template: String,
    #[serde(default = "default_requires_confirm")]
    pub requires_confirm: bool,
    #[serde(default)]
    pub execution_target: ExecutionTarget,
}

fn default_requires_confirm() -> bool {
    true
}

/// 执行动作请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RunActionRequest {
    #[validate(length(min = 1))]
    pub server_name: String,
    #[serde(default)]
    pub dry_run: bool,
}

/// 执行历史记录（只追加）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActionRun {
    pub id: i64,
    pub action_id: i64,
    pub server_id: i64,
    pub server_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
    pub command_rendered: String,
    pub stdout: String,
    pub stderr: String,
}

/// 待写入的执行记录
#[derive(Debug, Clone)]
pub struct NewActionRun {
    pub action_id: i64,
    pub server_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
    pub command_rendered: String,
    pub stdout: String,
    pub stderr: String,
}

/// 历史查询参数
#[derive(Debug, Clone, Deserialize)]
pub struct RunListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}
