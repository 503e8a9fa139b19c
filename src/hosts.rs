//! 目标主机选择

use crate::models::server::Server;

/// 按优先级返回去除首尾空白后的非空地址：内网主、内网备、外网主、外网备
pub fn candidate_hosts(server: &Server) -> Vec<&str> {
    server
        .hosts
        .slots()
        .into_iter()
        .map(|(_, _, address)| address.trim())
        .filter(|address| !address.is_empty())
        .collect()
}

/// 返回优先级最高的地址；服务器没有任何地址时返回 None
pub fn choose_best_host(server: &Server) -> Option<&str> {
    candidate_hosts(server).into_iter().next()
}
