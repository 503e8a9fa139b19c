//! 命令执行
//!
//! 本地执行器与 SSH 执行器共用同一套超时与输出采集逻辑（见 `process`）。
//! 执行失败（非零退出码、超时、找不到可执行文件）不是错误，
//! 一律以 `ExecutionResult` 返回，由调用方记录到执行历史。

pub mod local;
mod process;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::identity::{Identity, SshProfile};
use crate::models::server::Server;

pub use process::TIMEOUT_MARKER;

/// 执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// 退出码，超时或进程级错误时为 -1
    pub exit_code: i32,
    /// 标准输出
    pub stdout: String,
    /// 标准错误
    pub stderr: String,
    /// 执行时长（毫秒），超时和错误时同样计时
    pub duration_ms: i64,
    /// 是否超时
    pub timed_out: bool,
}

impl ExecutionResult {
    /// 未能启动进程时的结果
    pub fn failure(stderr: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms,
            timed_out: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// 命令执行器
///
/// 执行器只接收元数据（服务器、SSH 配置、身份），从不接触凭据保险库。
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// 通过本机 shell 执行
    async fn run_local(&self, command: &str, timeout: Duration) -> ExecutionResult;

    /// 通过 ssh 在远端执行
    async fn run_ssh(
        &self,
        server: &Server,
        profile: Option<&SshProfile>,
        identity: Option<&Identity>,
        remote_command: &str,
        timeout: Duration,
    ) -> ExecutionResult;
}

/// 基于系统 shell 与 ssh 客户端的执行器
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    ssh: crate::ssh::executor::SshExecutor,
}

impl SystemExecutor {
    pub fn new(ssh_binary: impl Into<String>) -> Self {
        Self {
            ssh: crate::ssh::executor::SshExecutor::new(ssh_binary),
        }
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new("ssh")
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run_local(&self, command: &str, timeout: Duration) -> ExecutionResult {
        local::execute(command, timeout).await
    }

    async fn run_ssh(
        &self,
        server: &Server,
        profile: Option<&SshProfile>,
        identity: Option<&Identity>,
        remote_command: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        self.ssh
            .execute(server, profile, identity, remote_command, timeout)
            .await
    }
}

pub(crate) use process::run_with_timeout;
