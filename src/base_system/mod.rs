//! 基础设施：配置、日志、本地缓存、轮询等。

pub mod config;
pub mod context;
pub mod json_extract;
pub mod local_store;
pub mod logging;
pub mod poll;
