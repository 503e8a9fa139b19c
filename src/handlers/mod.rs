//! HTTP 处理器模块

pub mod action;
pub mod health;
pub mod identity;
pub mod server;
