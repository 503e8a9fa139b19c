//! 测试公共模块
//! 提供测试数据库、固定数据和记录调用的假执行器

#![allow(dead_code)]

use async_trait::async_trait;
use ops_actions::{
    config::{AppConfig, DatabaseConfig, ExecutionConfig, LoggingConfig, ServerConfig},
    db,
    exec::{CommandExecutor, ExecutionResult},
    middleware::AppState,
    models::{
        action::{ActionRequest, ActionTemplate, ExecutionTarget},
        identity::{Identity, SshProfile},
        server::{HostSet, Server, ServerRequest},
    },
    repository::{ActionRepository, IdentityRepository, ServerRepository},
    services::ActionService,
    vault::MemoryVault,
};
use secrecy::Secret;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 创建测试配置（内存数据库）
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            url: Secret::new("sqlite::memory:".to_string()),
            // 内存数据库按连接隔离，只能使用一个常驻连接
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 3600,
            busy_timeout_ms: 5000,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        execution: ExecutionConfig {
            local_timeout_secs: 10,
            ssh_timeout_secs: 10,
            ssh_binary: "ssh".to_string(),
        },
    }
}

/// 初始化测试数据库
pub async fn setup_test_db(config: &AppConfig) -> SqlitePool {
    let pool = db::create_pool(&config.database)
        .await
        .expect("Failed to create test database pool");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// 创建测试应用状态
pub fn create_test_app_state(pool: SqlitePool) -> Arc<AppState> {
    Arc::new(AppState::new(
        create_test_config(),
        pool,
        Arc::new(MemoryVault::new()),
    ))
}

// ==================== Fixtures ====================

pub fn hosts_with_internal_primary(address: &str) -> HostSet {
    HostSet {
        internal_primary: address.to_string(),
        ..Default::default()
    }
}

pub async fn create_test_server(pool: &SqlitePool, name: &str, hosts: HostSet) -> Server {
    ServerRepository::new(pool.clone())
        .create(&ServerRequest {
            name: name.to_string(),
            hosts,
        })
        .await
        .expect("Failed to create server")
}

pub async fn create_test_action(
    pool: &SqlitePool,
    name: &str,
    template: &str,
    target: ExecutionTarget,
) -> ActionTemplate {
    ActionRepository::new(pool.clone())
        .create(&ActionRequest {
            name: name.to_string(),
            description: None,
            command_template: template.to_string(),
            requires_confirm: true,
            execution_target: target,
        })
        .await
        .expect("Failed to create action")
}

pub async fn count_runs(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM action_runs")
        .fetch_one(pool)
        .await
        .expect("Failed to count runs")
}

// ==================== Recording executor ====================

/// 记录到的执行调用
#[derive(Debug, Clone, PartialEq)]
pub enum ExecCall {
    Local {
        command: String,
    },
    Ssh {
        server: String,
        port: Option<u16>,
        identity: Option<String>,
        remote_command: String,
    },
}

/// 不启动进程，只记录调用并返回预设结果
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecCall>>,
    result: ExecutionResult,
}

impl RecordingExecutor {
    pub fn new(result: ExecutionResult) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            result,
        }
    }

    pub fn succeeding(stdout: &str) -> Self {
        Self::new(ExecutionResult {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration_ms: 12,
            timed_out: false,
        })
    }

    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn run_local(&self, command: &str, _timeout: Duration) -> ExecutionResult {
        self.calls.lock().unwrap().push(ExecCall::Local {
            command: command.to_string(),
        });
        self.result.clone()
    }

    async fn run_ssh(
        &self,
        server: &Server,
        profile: Option<&SshProfile>,
        identity: Option<&Identity>,
        remote_command: &str,
        _timeout: Duration,
    ) -> ExecutionResult {
        self.calls.lock().unwrap().push(ExecCall::Ssh {
            server: server.name.clone(),
            port: profile.map(|p| p.port),
            identity: identity.map(|i| i.name.clone()),
            remote_command: remote_command.to_string(),
        });
        self.result.clone()
    }
}

/// 使用假执行器组装动作服务
pub fn action_service_with(pool: &SqlitePool, executor: Arc<RecordingExecutor>) -> ActionService {
    ActionService::with_parts(
        ActionRepository::new(pool.clone()),
        Arc::new(ServerRepository::new(pool.clone())),
        Arc::new(IdentityRepository::new(pool.clone())),
        executor,
        &create_test_config().execution,
    )
}
