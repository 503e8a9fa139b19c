//! 服务器动作执行引擎
//! 渲染命令模板、在本机或通过 SSH 执行，并记录只追加的执行历史

pub mod config;
pub mod db;
pub mod error;
pub mod exec;
pub mod handlers;
pub mod hosts;
pub mod middleware;
pub mod models;
pub mod output;
pub mod render;
pub mod repository;
pub mod routes;
pub mod services;
pub mod ssh;
pub mod telemetry;
pub mod vault;
