//! SSH 模块
//! 构造加固的 ssh 调用并在子进程中执行
//!
//! 认证完全交给系统 ssh 客户端：这里只处理主机、端口、私钥路径和用户名，
//! 没有任何途径读取密码或令牌。

pub mod command;
pub mod config_file;
pub mod executor;

pub use command::{build_ssh_command, build_ssh_invocation, SshTarget};
pub use config_file::{parse_ssh_config, SshConfigEntry};
pub use executor::SshExecutor;
