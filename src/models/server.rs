//! 服务器与地址集合模型

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 地址类别（内网 / 外网）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Internal,
    External,
}

impl HostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostKind::Internal => "internal",
            HostKind::External => "external",
        }
    }
}

/// 服务器的四个候选地址
///
/// 字段顺序即目标选择的优先级：内网主、内网备、外网主、外网备。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSet {
    #[serde(default)]
    pub internal_primary: String,
    #[serde(default)]
    pub internal_secondary: String,
    #[serde(default)]
    pub external_primary: String,
    #[serde(default)]
    pub external_secondary: String,
}

impl HostSet {
    /// 按优先级列出 (类别, 序号, 地址)
    pub fn slots(&self) -> [(HostKind, i64, &str); 4] {
        [
            (HostKind::Internal, 1, self.internal_primary.as_str()),
            (HostKind::Internal, 2, self.internal_secondary.as_str()),
            (HostKind::External, 1, self.external_primary.as_str()),
            (HostKind::External, 2, self.external_secondary.as_str()),
        ]
    }

    /// 按 hosts 表中的 (kind, priority) 写入对应字段，未知组合忽略
    pub fn assign(&mut self, kind: &str, priority: i64, address: String) {
        match (kind, priority) {
            ("internal", 1) => self.internal_primary = address,
            ("internal", 2) => self.internal_secondary = address,
            ("external", 1) => self.external_primary = address,
            ("external", 2) => self.external_secondary = address,
            _ => {}
        }
    }

    /// 去除各地址首尾空白
    pub fn trimmed(&self) -> HostSet {
        HostSet {
            internal_primary: self.internal_primary.trim().to_string(),
            internal_secondary: self.internal_secondary.trim().to_string(),
            external_primary: self.external_primary.trim().to_string(),
            external_secondary: self.external_secondary.trim().to_string(),
        }
    }
}

/// 服务器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub hosts: HostSet,
}

/// 创建 / 更新服务器请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub hosts: HostSet,
}
