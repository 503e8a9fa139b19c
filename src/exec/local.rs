//! 本地执行器

use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{run_with_timeout, ExecutionResult};

/// 默认超时时间
pub const DEFAULT_LOCAL_TIMEOUT: Duration = Duration::from_secs(60);

/// 通过平台 shell 执行命令
///
/// 单次调用，不重试。超时时退出码为 -1，保留已产生的部分输出，
/// 并在 stderr 末尾追加 `[timeout]`。
pub async fn execute(command: &str, timeout: Duration) -> ExecutionResult {
    let start = Instant::now();
    debug!(timeout_secs = timeout.as_secs(), "Executing local command");

    match run_with_timeout(shell_command(command), timeout).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Failed to spawn local shell");
            ExecutionResult::failure(
                format!("failed to start shell: {}", e),
                start.elapsed().as_millis() as i64,
            )
        }
    }
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
