//! Abenity 会员 API 客户端核心库
//!
//! 提供 Abenity 会员接口的完整客户端实现，包括：
//! - SSO 登录（载荷 3DES 加密、RSA 封装密钥、MD5withRSA 签名）
//! - 会员停用
//! - 会员恢复

pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod protocol;
pub mod types;

pub use client::{AbenityClient, Clock, SaltSource, SystemClock, ThreadRngSalt, USER_AGENT};
pub use config::{AbenityConfig, ApiCredentials, Environment, KeyPaths};
pub use error::{ApiFailure, Error, Result};
pub use protocol::{EnvelopeCrypto, KeyMaterial, SealedPayload, SymmetricAlgorithm};
pub use types::*;
