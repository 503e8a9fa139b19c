//! 动作服务层
//! 解析动作与服务器、渲染命令、分派执行、记录历史
//!
//! 每次 `run` 的状态：解析 → 渲染 → {演练 | 执行} → 记录。
//! 解析失败（动作 / 服务器不存在、SSH 无可用主机）在启动进程和写入历史之前返回；
//! 进程层面的失败写成 status = error 的历史记录正常返回。
//!
//! 服务只持有元数据查询接口和执行器，不持有凭据保险库。

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn, Instrument};
use validator::Validate;

use crate::config::ExecutionConfig;
use crate::error::{AppError, Result};
use crate::exec::{CommandExecutor, SystemExecutor};
use crate::hosts::choose_best_host;
use crate::models::action::*;
use crate::models::identity::{Identity, SshProfile};
use crate::models::server::Server;
use crate::render::{render, RenderContext};
use crate::repository::{
    ActionRepository, IdentityRepository, ProfileLookup, ServerLookup, ServerRepository,
};
use crate::ssh::command::{build_ssh_invocation, DEFAULT_SSH_PORT};
use crate::telemetry::{METRIC_RUNS_TOTAL, METRIC_RUN_DURATION_MS, METRIC_RUN_TIMEOUTS};

/// 历史查询条数上限
pub const MAX_RUN_LIST_LIMIT: i64 = 500;

/// 动作服务
pub struct ActionService {
    actions: ActionRepository,
    servers: Arc<dyn ServerLookup>,
    profiles: Arc<dyn ProfileLookup>,
    executor: Arc<dyn CommandExecutor>,
    local_timeout: Duration,
    ssh_timeout: Duration,
}

/// 解析后的执行目标
struct ResolvedTarget {
    server: Server,
    profile: Option<SshProfile>,
    identity: Option<Identity>,
}

impl ActionService {
    /// 使用数据库和系统执行器创建服务
    pub fn new(db: SqlitePool, config: &ExecutionConfig) -> Self {
        Self::with_parts(
            ActionRepository::new(db.clone()),
            Arc::new(ServerRepository::new(db.clone())),
            Arc::new(IdentityRepository::new(db)),
            Arc::new(SystemExecutor::new(config.ssh_binary.clone())),
            config,
        )
    }

    /// 由各组件组装服务
    pub fn with_parts(
        actions: ActionRepository,
        servers: Arc<dyn ServerLookup>,
        profiles: Arc<dyn ProfileLookup>,
        executor: Arc<dyn CommandExecutor>,
        config: &ExecutionConfig,
    ) -> Self {
        Self {
            actions,
            servers,
            profiles,
            executor,
            local_timeout: config.local_timeout(),
            ssh_timeout: config.ssh_timeout(),
        }
    }

    // ==================== Templates ====================

    pub async fn list_actions(&self) -> Result<Vec<ActionTemplate>> {
        self.actions.list().await
    }

    pub async fn get_action(&self, id: i64) -> Result<ActionTemplate> {
        self.actions
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("action {}", id)))
    }

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create_action(&self, req: ActionRequest) -> Result<ActionTemplate> {
        validate_action(&req)?;
        let action = self.actions.create(&req).await?;
        info!(action_id = action.id, "Action created");
        Ok(action)
    }

    #[instrument(skip(self, req))]
    pub async fn update_action(&self, id: i64, req: ActionRequest) -> Result<ActionTemplate> {
        validate_action(&req)?;
        let action = self
            .actions
            .update(id, &req)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("action {}", id)))?;
        info!(action_id = id, "Action updated");
        Ok(action)
    }

    #[instrument(skip(self))]
    pub async fn delete_action(&self, id: i64) -> Result<()> {
        if !self.actions.delete(id).await? {
            return Err(AppError::NotFound(format!("action {}", id)));
        }
        info!(action_id = id, "Action deleted");
        Ok(())
    }

    // ==================== Run ====================

    /// 执行动作并记录一条历史
    ///
    /// 分派与记录在独立任务中完成：调用方放弃等待（例如 HTTP 客户端断开）
    /// 不会中断已启动的进程，历史记录照常写入。
    #[instrument(skip(self))]
    pub async fn run(&self, action_id: i64, server_name: &str, dry_run: bool) -> Result<ActionRun> {
        // 解析
        let action = self.get_action(action_id).await?;
        let target = self.resolve_target(server_name).await?;

        // 渲染
        let host = choose_best_host(&target.server).unwrap_or_default().to_string();
        let port = target
            .profile
            .as_ref()
            .map(|p| p.port)
            .unwrap_or(DEFAULT_SSH_PORT);
        let ctx = RenderContext::for_server(&target.server, &host, port);
        let command_rendered = render(&action.command_template, &ctx);

        debug!(command = %command_rendered, "Command rendered");

        if !dry_run && action.execution_target == ExecutionTarget::Ssh && host.is_empty() {
            warn!(server = %target.server.name, "SSH run rejected: no host");
            return Err(AppError::no_host(&target.server.name));
        }

        let dispatch = Dispatch {
            actions: self.actions.clone(),
            executor: self.executor.clone(),
            timeout: match action.execution_target {
                ExecutionTarget::Ssh => self.ssh_timeout,
                ExecutionTarget::Local => self.local_timeout,
            },
            action,
            target,
            command_rendered,
            dry_run,
        };

        tokio::spawn(dispatch.run_and_record().in_current_span())
            .await
            .map_err(|e| AppError::Internal(format!("run task failed: {}", e)))?
    }

    /// 完整 ssh 调用预览，用于执行前确认
    #[instrument(skip(self, remote_command))]
    pub async fn ssh_preview(&self, server_name: &str, remote_command: &str) -> Result<String> {
        let target = self.resolve_target(server_name).await?;
        let preview = build_ssh_invocation(
            &target.server,
            target.profile.as_ref(),
            target.identity.as_ref(),
            remote_command,
        );
        if preview.is_empty() {
            return Err(AppError::no_host(&target.server.name));
        }
        Ok(preview)
    }

    // ==================== History ====================

    pub async fn list_runs(&self, limit: i64) -> Result<Vec<ActionRun>> {
        self.actions.list_runs(clamp_limit(limit)).await
    }

    pub async fn list_runs_for_action(&self, action_id: i64, limit: i64) -> Result<Vec<ActionRun>> {
        self.get_action(action_id).await?;
        self.actions
            .list_runs_for_action(action_id, clamp_limit(limit))
            .await
    }

    pub async fn get_run(&self, id: i64) -> Result<ActionRun> {
        self.actions
            .get_run(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("run {}", id)))
    }

    async fn resolve_target(&self, server_name: &str) -> Result<ResolvedTarget> {
        let server = self
            .servers
            .lookup_server(server_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("server '{}'", server_name.trim())))?;

        let profile = self.profiles.lookup_profile(server.id).await?;
        let identity = match profile.as_ref().and_then(|p| p.identity_id) {
            Some(identity_id) => self.profiles.lookup_identity(identity_id).await?,
            None => None,
        };

        Ok(ResolvedTarget {
            server,
            profile,
            identity,
        })
    }
}

/// 已解析完毕、待分派的一次执行，持有全部所需数据以便脱离调用方运行
struct Dispatch {
    actions: ActionRepository,
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
    action: ActionTemplate,
    target: ResolvedTarget,
    command_rendered: String,
    dry_run: bool,
}

impl Dispatch {
    async fn run_and_record(self) -> Result<ActionRun> {
        let Dispatch {
            actions,
            executor,
            timeout,
            action,
            target,
            command_rendered,
            dry_run,
        } = self;

        // 分派
        let started_at = Utc::now();
        let (status, exit_code, duration_ms, stdout, stderr) = if dry_run {
            (RunStatus::DryRun, None, 0, String::new(), String::new())
        } else {
            let result = match action.execution_target {
                ExecutionTarget::Ssh => {
                    executor
                        .run_ssh(
                            &target.server,
                            target.profile.as_ref(),
                            target.identity.as_ref(),
                            &command_rendered,
                            timeout,
                        )
                        .await
                }
                ExecutionTarget::Local => executor.run_local(&command_rendered, timeout).await,
            };
            if result.timed_out {
                metrics::counter!(METRIC_RUN_TIMEOUTS).increment(1);
            }
            (
                RunStatus::from_exit_code(result.exit_code),
                Some(result.exit_code),
                result.duration_ms,
                result.stdout,
                result.stderr,
            )
        };
        let finished_at = Utc::now();

        // 记录
        let run = actions
            .insert_run(&NewActionRun {
                action_id: action.id,
                server_id: target.server.id,
                started_at,
                finished_at,
                status,
                exit_code,
                duration_ms,
                command_rendered,
                stdout,
                stderr,
            })
            .await?;

        metrics::counter!(
            METRIC_RUNS_TOTAL,
            "status" => status.as_str(),
            "target" => action.execution_target.as_str()
        )
        .increment(1);
        if !dry_run {
            metrics::histogram!(METRIC_RUN_DURATION_MS).record(duration_ms as f64);
        }

        info!(
            run_id = run.id,
            action_id = action.id,
            server = %target.server.name,
            status = status.as_str(),
            exit_code = ?exit_code,
            duration_ms,
            "Action run recorded"
        );

        Ok(run)
    }
}

fn validate_action(req: &ActionRequest) -> Result<()> {
    req.validate()?;
    if req.name.trim().is_empty() {
        return Err(AppError::validation("action name must not be empty"));
    }
    if req.command_template.trim().is_empty() {
        return Err(AppError::validation("command template must not be empty"));
    }
    Ok(())
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_RUN_LIST_LIMIT)
}
