//! 客户端配置

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;

/// 生产环境地址
pub const PRODUCTION_URL: &str = "https://api.abenity.com";
/// 沙箱环境地址
pub const SANDBOX_URL: &str = "https://sandbox.abenity.com";

/// 目标环境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn from_use_production(use_production: bool) -> Self {
        if use_production {
            Environment::Production
        } else {
            Environment::Sandbox
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_URL,
            Environment::Production => PRODUCTION_URL,
        }
    }
}

/// API 调用方凭据
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
    pub api_key: String,
}

impl ApiCredentials {
    pub fn new(username: &str, password: &str, api_key: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// PEM 密钥文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    /// 调用方 RSA 私钥（签名）
    pub private_key_path: PathBuf,
    /// 厂商 RSA 公钥（封装对称密钥）
    pub public_key_path: PathBuf,
}

impl KeyPaths {
    pub fn new(private_key_path: impl Into<PathBuf>, public_key_path: impl Into<PathBuf>) -> Self {
        Self {
            private_key_path: private_key_path.into(),
            public_key_path: public_key_path.into(),
        }
    }
}

/// 客户端配置，构造后不可变
#[derive(Debug, Clone)]
pub struct AbenityConfig {
    /// 是否使用生产环境（否则为沙箱）
    pub use_production: bool,
    pub credentials: ApiCredentials,
    pub key_paths: KeyPaths,
}

impl AbenityConfig {
    pub fn environment(&self) -> Environment {
        Environment::from_use_production(self.use_production)
    }

    /// 校验凭据与密钥路径均已填写
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("username", self.credentials.username.is_empty()),
            ("password", self.credentials.password.is_empty()),
            ("api_key", self.credentials.api_key.is_empty()),
            (
                "private_key_path",
                self.key_paths.private_key_path.as_os_str().is_empty(),
            ),
            (
                "public_key_path",
                self.key_paths.public_key_path.as_os_str().is_empty(),
            ),
        ];

        match required.iter().find(|(_, missing)| *missing) {
            Some((name, _)) => Err(Error::Config(format!("{} must not be empty", name))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AbenityConfig {
        AbenityConfig {
            use_production: false,
            credentials: ApiCredentials::new("user", "secret", "key-123"),
            key_paths: KeyPaths::new("./keys/private.pem", "./keys/public.pem"),
        }
    }

    #[test]
    fn test_environment_selection() {
        assert_eq!(config().environment().base_url(), "https://sandbox.abenity.com");

        let mut production = config();
        production.use_production = true;
        assert_eq!(production.environment(), Environment::Production);
        assert_eq!(production.environment().base_url(), "https://api.abenity.com");
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        assert!(config().validate().is_ok());

        let mut missing = config();
        missing.credentials.api_key.clear();
        let err = missing.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("api_key")));

        let mut no_key = config();
        no_key.key_paths.public_key_path = PathBuf::new();
        assert!(matches!(no_key.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", config().credentials);
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("key-123"));
    }
}
