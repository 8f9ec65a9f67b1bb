pub mod client;
pub mod csrf;
pub mod models;
pub mod request;

use thiserror::Error;

pub use client::ApiClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("网络请求失败: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// 服务器返回 `success: false`（或带 `error` 的失败响应）
    #[error("{0}")]
    Server(String),
    #[error("响应解析失败: {0}")]
    Decode(String),
    /// 发请求之前就被拒绝（参数不合法、文件读不到等）
    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    /// 展示给用户的一行文字。
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Server(msg) | ApiError::Rejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
