//! SSH 执行器
//! 以子进程方式调用系统 ssh 客户端

use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::command::SshTarget;
use crate::exec::{run_with_timeout, ExecutionResult};
use crate::models::identity::{Identity, SshProfile};
use crate::models::server::Server;

pub const NO_HOST_MESSAGE: &str = "No host available";
pub const SSH_NOT_FOUND_MESSAGE: &str = "ssh command not found";

/// SSH 执行器
#[derive(Debug, Clone)]
pub struct SshExecutor {
    /// ssh 可执行文件
    binary: String,
}

impl SshExecutor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// 在远端执行命令
    ///
    /// - 无可用主机：立即返回 -1，不启动进程
    /// - 找不到 ssh：返回 -1 和说明性 stderr
    /// - 远端命令失败：原样返回 ssh 的退出码
    pub async fn execute(
        &self,
        server: &Server,
        profile: Option<&SshProfile>,
        identity: Option<&Identity>,
        remote_command: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        let Some(target) = SshTarget::resolve(server, profile, identity) else {
            warn!(server = %server.name, "No host available for ssh execution");
            return ExecutionResult::failure(NO_HOST_MESSAGE, 0);
        };

        debug!(
            server = %server.name,
            host = %target.host,
            port = target.port,
            "Executing SSH command"
        );

        let start = Instant::now();
        let mut cmd = Command::new(&self.binary);
        cmd.args(target.invocation_args(remote_command));

        match run_with_timeout(cmd, timeout).await {
            Ok(result) => {
                info!(
                    server = %server.name,
                    host = %target.host,
                    exit_code = result.exit_code,
                    duration_ms = result.duration_ms,
                    timed_out = result.timed_out,
                    "SSH command finished"
                );
                result
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(binary = %self.binary, "ssh binary not found");
                ExecutionResult::failure(SSH_NOT_FOUND_MESSAGE, start.elapsed().as_millis() as i64)
            }
            Err(e) => {
                warn!(binary = %self.binary, error = %e, "Failed to start ssh");
                ExecutionResult::failure(
                    format!("failed to start ssh: {}", e),
                    start.elapsed().as_millis() as i64,
                )
            }
        }
    }
}
