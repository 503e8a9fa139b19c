//! 子进程执行与超时守护
//!
//! 所有命令都经由这里启动：stdout / stderr 在后台任务中持续读取到共享缓冲区，
//! 超时后终止子进程并保留已读取的部分输出。
//!
//! Unix 下子进程自成一个进程组，超时时向整个组发送 SIGKILL，
//! shell 派生的子 shell 和管道各段随之终止。`GroupGuard` 在未正常回收的
//! 任何退出路径上做同样的事，`kill_on_drop` 兜底回收直接子进程。

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::ExecutionResult;
use crate::output::{BoundedBuffer, MAX_CAPTURE_BYTES};

/// 超时后附加在 stderr 末尾的标记
pub const TIMEOUT_MARKER: &str = "[timeout]";

/// 子进程退出后等待管道读完的宽限时间
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// 超时终止后等待管道的宽限时间
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(200);

type SharedBuffer = Arc<Mutex<BoundedBuffer>>;

/// 启动命令并在超时内等待其结束
///
/// 只有启动失败会返回 `Err`；超时和非零退出码都体现在结果里。
pub(crate) async fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> std::io::Result<ExecutionResult> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let start = Instant::now();
    let mut child = command.spawn()?;
    let mut group = GroupGuard::new(child.id());

    let stdout_buf: SharedBuffer = Arc::new(Mutex::new(BoundedBuffer::new(MAX_CAPTURE_BYTES)));
    let stderr_buf: SharedBuffer = Arc::new(Mutex::new(BoundedBuffer::new(MAX_CAPTURE_BYTES)));

    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(tokio::spawn(drain(pipe, stdout_buf.clone())));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(tokio::spawn(drain(pipe, stderr_buf.clone())));
    }

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    let (exit_code, timed_out, wait_error) = match waited {
        Ok(Ok(status)) => {
            group.disarm();
            (status.code().unwrap_or(-1), false, None)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to wait for child process");
            group.kill();
            let _ = child.start_kill();
            (-1, false, Some(e.to_string()))
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Command timed out, terminating process group");
            group.kill();
            let _ = child.start_kill();
            let _ = child.wait().await;
            (-1, true, None)
        }
    };

    let grace = if timed_out { KILL_DRAIN_GRACE } else { PIPE_DRAIN_GRACE };
    finish_readers(readers, grace).await;

    let stdout = read_buffer(&stdout_buf);
    let mut stderr = read_buffer(&stderr_buf);
    if let Some(message) = wait_error {
        append_line(&mut stderr, &message);
    }
    if timed_out {
        append_line(&mut stderr, TIMEOUT_MARKER);
    }

    let duration_ms = start.elapsed().as_millis() as i64;

    debug!(
        exit_code,
        timed_out,
        duration_ms,
        stdout_len = stdout.len(),
        stderr_len = stderr.len(),
        "Child process finished"
    );

    Ok(ExecutionResult {
        exit_code,
        stdout,
        stderr,
        duration_ms,
        timed_out,
    })
}

/// 子进程所在进程组的守护
///
/// 直接子进程被正常回收前一直处于武装状态；被丢弃时仍武装则杀掉整个组。
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// 子进程已正常退出，后台残留进程交由管道宽限期处理
    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    // 组内进程可能已全部退出，ESRCH 忽略
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(pgid, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// 持续读取管道，直到 EOF 或出错
async fn drain<R>(mut pipe: R, sink: SharedBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut buf) = sink.lock() {
                    buf.push(&chunk[..n]);
                }
            }
        }
    }
}

/// 后台进程可能继承了管道而迟迟不关闭，宽限期后放弃读取
async fn finish_readers(readers: Vec<JoinHandle<()>>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for mut reader in readers {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
            reader.abort();
        }
    }
}

fn read_buffer(buf: &SharedBuffer) -> String {
    buf.lock().map(|b| b.to_string_lossy()).unwrap_or_default()
}

fn append_line(text: &mut String, line: &str) {
    text.push('\n');
    text.push_str(line);
}
