//! 导入服务层
//! 把 OpenSSH 配置中的主机写入服务器清单、SSH 配置和私钥路径身份

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::identity::{Identity, IdentityKind, IdentityRequest, SshProfileRequest};
use crate::models::server::{HostSet, ServerRequest};
use crate::repository::{IdentityRepository, ServerRepository};
use crate::ssh::command::DEFAULT_SSH_PORT;
use crate::ssh::config_file::{parse_ssh_config, SshConfigEntry};

/// 导入请求
#[derive(Debug, Clone, Deserialize)]
pub struct SshConfigImportRequest {
    /// ssh_config 文件内容
    pub content: String,
    /// 只解析不写入
    #[serde(default)]
    pub preview: bool,
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub entries: Vec<SshConfigEntry>,
    pub servers_created: usize,
    pub servers_updated: usize,
    pub identities_created: usize,
}

/// 导入服务
pub struct ImportService {
    servers: ServerRepository,
    identities: IdentityRepository,
}

impl ImportService {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            servers: ServerRepository::new(db.clone()),
            identities: IdentityRepository::new(db),
        }
    }

    /// 解析并（非预览时）应用 ssh_config
    pub async fn import_ssh_config(&self, req: SshConfigImportRequest) -> Result<ImportSummary> {
        let entries = parse_ssh_config(&req.content);
        if req.preview {
            return Ok(ImportSummary {
                entries,
                ..Default::default()
            });
        }
        self.apply(entries).await
    }

    /// 应用解析出的条目
    ///
    /// - 服务器按别名匹配：不存在则创建，存在则只替换内网主地址
    /// - 私钥路径按 key_path 去重，只保存路径，不读取私钥内容
    /// - SSH 配置整体覆盖：端口（默认 22）、身份、用户名
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn apply(&self, entries: Vec<SshConfigEntry>) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut known = self.identities.list().await?;

        for entry in &entries {
            let server = match self.servers.get_by_name(&entry.alias).await? {
                Some(existing) => {
                    let hosts = HostSet {
                        internal_primary: entry.host_name.clone(),
                        ..existing.hosts.clone()
                    };
                    let req = ServerRequest {
                        name: existing.name.clone(),
                        hosts,
                    };
                    summary.servers_updated += 1;
                    self.servers.update(existing.id, &req).await?.unwrap_or(existing)
                }
                None => {
                    summary.servers_created += 1;
                    self.servers
                        .create(&ServerRequest {
                            name: entry.alias.clone(),
                            hosts: HostSet {
                                internal_primary: entry.host_name.clone(),
                                ..Default::default()
                            },
                        })
                        .await?
                }
            };

            let identity_id = match entry.identity_file.as_deref() {
                Some(key_path) => match find_key_identity(&known, key_path) {
                    Some(identity) => Some(identity.id),
                    None => {
                        let identity = self
                            .identities
                            .create(&IdentityRequest {
                                name: unique_identity_name(&known, key_path),
                                username: entry.user.clone(),
                                kind: IdentityKind::SshKeyPath,
                                key_path: Some(key_path.to_string()),
                            })
                            .await?;
                        summary.identities_created += 1;
                        let id = identity.id;
                        known.push(identity);
                        Some(id)
                    }
                },
                None => None,
            };

            self.identities
                .set_ssh_profile(
                    server.id,
                    &SshProfileRequest {
                        port: entry.port.unwrap_or(DEFAULT_SSH_PORT),
                        identity_id,
                        username_override: entry.user.clone(),
                    },
                )
                .await?;
        }

        info!(
            created = summary.servers_created,
            updated = summary.servers_updated,
            identities = summary.identities_created,
            "SSH config imported"
        );

        summary.entries = entries;
        Ok(summary)
    }
}

fn find_key_identity<'a>(known: &'a [Identity], key_path: &str) -> Option<&'a Identity> {
    let key_path = key_path.trim();
    known.iter().find(|i| {
        i.kind == IdentityKind::SshKeyPath && i.key_path.as_deref().map(str::trim) == Some(key_path)
    })
}

/// `ssh-key:<文件名>`，与已有身份重名时追加序号
fn unique_identity_name(known: &[Identity], key_path: &str) -> String {
    let file_name = Path::new(key_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| key_path.to_string());
    let base = format!("ssh-key:{}", file_name);

    let taken: HashSet<&str> = known.iter().map(|i| i.name.as_str()).collect();
    if !taken.contains(base.as_str()) {
        return base;
    }
    (2..)
        .map(|n| format!("{} ({})", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or(base)
}
