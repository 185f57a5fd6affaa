//! 错误类型定义

use crate::types::AbenityError;
use std::fmt;
use thiserror::Error;

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 配置错误（凭据缺失、密钥文件不可读或格式错误）
    #[error("Configuration error: {0}")]
    Config(String),

    /// 密码学错误
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(String),

    /// API 错误
    #[error("{0}")]
    Api(ApiFailure),

    /// 参数错误
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// 编解码错误
    #[error("Encoding/Decoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// 仅网络错误值得调用方重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// 若为 API 错误，返回其详情
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            Error::Api(failure) => Some(failure),
            _ => None,
        }
    }
}

/// 厂商返回的失败响应
#[derive(Debug, Clone)]
pub struct ApiFailure {
    /// HTTP 状态码
    pub http_status: u16,
    /// 解析出的错误体（两种历史格式均已归一化）
    pub error: Option<AbenityError>,
    /// 原始响应体
    pub raw_response: String,
    /// 判定为失败的原因
    pub reason: String,
}

impl ApiFailure {
    /// 厂商错误签名或消息
    pub fn signature(&self) -> Option<&str> {
        self.error.as_ref().and_then(AbenityError::signature)
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error.as_ref().and_then(AbenityError::message) {
            Some(message) => write!(f, "Received error response from Abenity API: {}", message),
            None => write!(f, "Received error response from Abenity API: {}", self.raw_response),
        }
    }
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
