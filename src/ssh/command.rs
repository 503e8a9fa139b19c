//! SSH 命令构造

use crate::hosts::choose_best_host;
use crate::models::identity::{normalize_optional, Identity, IdentityKind, SshProfile};
use crate::models::server::Server;

/// 默认 SSH 端口，使用该端口时省略 `-p`
pub const DEFAULT_SSH_PORT: u16 = 22;

/// 固定的传输加固选项：非交互、5 秒连接超时、自动接受新主机密钥
pub const HARDENED_OPTIONS: [&str; 6] = [
    "-o",
    "BatchMode=yes",
    "-o",
    "ConnectTimeout=5",
    "-o",
    "StrictHostKeyChecking=accept-new",
];

/// 解析后的 SSH 目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub key_path: Option<String>,
    pub user: Option<String>,
}

impl SshTarget {
    /// 解析目标；服务器没有任何地址时返回 None
    pub fn resolve(
        server: &Server,
        profile: Option<&SshProfile>,
        identity: Option<&Identity>,
    ) -> Option<Self> {
        let host = choose_best_host(server)?.to_string();

        let port = profile.map(|p| p.port).unwrap_or(DEFAULT_SSH_PORT);

        let key_path = identity
            .filter(|i| i.kind == IdentityKind::SshKeyPath)
            .and_then(|i| normalize_optional(i.key_path.as_deref()));

        // username_override 优先于身份上的用户名
        let user = profile
            .and_then(|p| normalize_optional(p.username_override.as_deref()))
            .or_else(|| identity.and_then(|i| normalize_optional(i.username.as_deref())));

        Some(Self {
            host,
            port,
            key_path,
            user,
        })
    }

    /// `user@host` 或裸主机
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// ssh 参数（不含可执行文件本身）
    pub fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.port != DEFAULT_SSH_PORT {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }
        if let Some(key_path) = &self.key_path {
            args.push("-i".to_string());
            args.push(key_path.clone());
        }
        args.push(self.destination());
        args
    }

    /// 完整参数：基础参数 + 加固选项 + `--` + 远端命令（作为单个参数）
    pub fn invocation_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(HARDENED_OPTIONS.iter().map(|s| s.to_string()));
        args.push("--".to_string());
        args.push(remote_command.to_string());
        args
    }

    /// 展示用命令行，私钥路径加引号以容纳空格
    pub fn to_command_line(&self) -> String {
        let mut parts = vec!["ssh".to_string()];
        if self.port != DEFAULT_SSH_PORT {
            parts.push(format!("-p {}", self.port));
        }
        if let Some(key_path) = &self.key_path {
            parts.push(format!("-i \"{}\"", key_path));
        }
        parts.push(self.destination());
        parts.join(" ")
    }
}

/// 构造基础 ssh 命令行：`ssh [-p <port>] [-i "<key_path>"] [<user>@]<host>`
///
/// 无可用主机时返回空字符串。
pub fn build_ssh_command(
    server: &Server,
    profile: Option<&SshProfile>,
    identity: Option<&Identity>,
) -> String {
    SshTarget::resolve(server, profile, identity)
        .map(|target| target.to_command_line())
        .unwrap_or_default()
}

/// 构造用于确认对话框的完整调用预览
///
/// 无可用主机时返回空字符串。
pub fn build_ssh_invocation(
    server: &Server,
    profile: Option<&SshProfile>,
    identity: Option<&Identity>,
    remote_command: &str,
) -> String {
    match SshTarget::resolve(server, profile, identity) {
        Some(target) => format!(
            "{} {} -- {}",
            target.to_command_line(),
            HARDENED_OPTIONS.join(" "),
            remote_command
        ),
        None => String::new(),
    }
}
