//! OpenSSH 客户端配置解析
//!
//! 只识别 `Host`、`HostName`、`User`、`Port`、`IdentityFile` 五个指令，
//! 其余指令忽略。含通配符的 `Host` 模式不是具体主机，跳过。

use serde::Serialize;

/// 配置文件中的一个具体主机条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshConfigEntry {
    /// `Host` 行的第一个具体别名，用作服务器名
    pub alias: String,
    /// 连接地址，未写 `HostName` 时取别名
    pub host_name: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    /// 私钥路径，原样保留（不展开 `~`）
    pub identity_file: Option<String>,
}

#[derive(Default)]
struct Block {
    aliases: Vec<String>,
    host_name: Option<String>,
    user: Option<String>,
    port: Option<u16>,
    identity_file: Option<String>,
}

impl Block {
    fn into_entry(self) -> Option<SshConfigEntry> {
        let alias = self.aliases.into_iter().find(|a| !is_pattern(a))?;
        let host_name = non_empty(self.host_name).unwrap_or_else(|| alias.clone());
        Some(SshConfigEntry {
            alias,
            host_name,
            user: non_empty(self.user),
            port: self.port,
            identity_file: non_empty(self.identity_file),
        })
    }
}

/// 解析配置文本，按出现顺序返回具体主机条目
pub fn parse_ssh_config(text: &str) -> Vec<SshConfigEntry> {
    let mut entries = Vec::new();
    let mut current: Option<Block> = None;

    for line in text.lines() {
        let Some((key, value)) = split_directive(line) else {
            continue;
        };

        if key.eq_ignore_ascii_case("host") {
            if let Some(entry) = current.take().and_then(Block::into_entry) {
                entries.push(entry);
            }
            current = Some(Block {
                aliases: value.split_whitespace().map(str::to_string).collect(),
                ..Default::default()
            });
            continue;
        }

        // Host 块之外的指令忽略
        let Some(block) = current.as_mut() else {
            continue;
        };

        match key.to_ascii_lowercase().as_str() {
            "hostname" => block.host_name = Some(value),
            "user" => block.user = Some(value),
            "port" => block.port = value.parse().ok().filter(|p| *p != 0),
            "identityfile" => block.identity_file = Some(value),
            _ => {}
        }
    }

    if let Some(entry) = current.and_then(Block::into_entry) {
        entries.push(entry);
    }
    entries
}

/// 拆出 `关键字 值`，支持 `Key=Value` 写法，值两侧的双引号去掉
fn split_directive(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let split_at = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let key = &line[..split_at];
    let rest = line[split_at..].trim_start_matches(|c: char| c.is_whitespace() || c == '=');
    let value = rest.trim().trim_matches('"').trim();
    Some((key.to_string(), value.to_string()))
}

fn is_pattern(alias: &str) -> bool {
    alias.contains(['*', '?', '!'])
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
