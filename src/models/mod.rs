//! 数据模型模块

pub mod action;
pub mod identity;
pub mod server;
