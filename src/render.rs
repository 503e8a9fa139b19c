//! 命令模板渲染
//!
//! 把 `{{key}}` 替换为上下文中的值。未识别的占位符原样保留；
//! 不做任何 shell 转义，模板作者是受信任的。

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

use crate::models::server::Server;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"));

pub const KEY_SERVER_NAME: &str = "server.name";
pub const KEY_HOST: &str = "host";
pub const KEY_INTERNAL_PRIMARY: &str = "hosts.internal_primary";
pub const KEY_INTERNAL_SECONDARY: &str = "hosts.internal_secondary";
pub const KEY_EXTERNAL_PRIMARY: &str = "hosts.external_primary";
pub const KEY_EXTERNAL_SECONDARY: &str = "hosts.external_secondary";
pub const KEY_SSH_PORT: &str = "ssh.port";

/// 渲染上下文
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由服务器、选中的主机和 SSH 端口构建上下文
    pub fn for_server(server: &Server, host: &str, ssh_port: u16) -> Self {
        let hosts = &server.hosts;
        let mut ctx = Self::new();
        ctx.insert(KEY_SERVER_NAME, &server.name);
        ctx.insert(KEY_HOST, host);
        ctx.insert(KEY_INTERNAL_PRIMARY, &hosts.internal_primary);
        ctx.insert(KEY_INTERNAL_SECONDARY, &hosts.internal_secondary);
        ctx.insert(KEY_EXTERNAL_PRIMARY, &hosts.external_primary);
        ctx.insert(KEY_EXTERNAL_SECONDARY, &hosts.external_secondary);
        ctx.insert(KEY_SSH_PORT, &ssh_port.to_string());
        ctx
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// 单遍替换：替换进去的值不会被再次扫描
pub fn render(template: &str, ctx: &RenderContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match ctx.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
