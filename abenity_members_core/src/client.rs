//! Abenity 会员 API 客户端

use crate::config::AbenityConfig;
use crate::error::{ApiFailure, Error, Result};
use crate::form::to_form_string;
use crate::protocol::{EnvelopeCrypto, KeyMaterial, SymmetricAlgorithm};
use crate::types::*;
use chrono::{DateTime, FixedOffset, Local};
use rand::Rng;
use reqwest::header::{CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// 客户端标识
pub const USER_AGENT: &str = "abenity/abenity-members-rust";

pub const SSO_MEMBER_PATH: &str = "/v2/client/sso_member.json";
pub const DEACTIVATE_MEMBER_PATH: &str = "/v2/client/deactivate_member.json";
pub const REACTIVATE_MEMBER_PATH: &str = "/v2/client/reactivate_member.json";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const CREATION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// 时钟，提供 `creation_time`
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// 本地时间
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().into()
    }
}

/// 随机源，提供 `salt`
#[cfg_attr(test, mockall::automock)]
pub trait SaltSource: Send + Sync {
    /// 非负的 31 位整数
    fn next_salt(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSalt;

impl SaltSource for ThreadRngSalt {
    fn next_salt(&self) -> i64 {
        rand::thread_rng().gen_range(0..i64::from(i32::MAX))
    }
}

/// Abenity 会员 API 客户端
///
/// 除共享的配置与 HTTP 连接池外不持有任何可变状态，可在多个任务间并发使用。
#[derive(Clone)]
pub struct AbenityClient {
    config: AbenityConfig,
    base_url: String,
    http_client: Client,
    crypto: EnvelopeCrypto,
    clock: Arc<dyn Clock>,
    salt_source: Arc<dyn SaltSource>,
}

impl AbenityClient {
    /// 创建新的客户端实例
    pub fn new(config: AbenityConfig) -> Result<Self> {
        config.validate()?;
        let http_client = Client::builder()
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self::build(config, http_client))
    }

    /// 复用调用方的 HTTP 客户端
    pub fn with_http_client(config: AbenityConfig, http_client: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, http_client))
    }

    fn build(config: AbenityConfig, http_client: Client) -> Self {
        let base_url = config.environment().base_url().to_string();
        Self {
            config,
            base_url,
            http_client,
            crypto: EnvelopeCrypto::default(),
            clock: Arc::new(SystemClock),
            salt_source: Arc::new(ThreadRngSalt),
        }
    }

    /// 覆盖环境地址（代理或模拟服务）
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_salt_source(mut self, salt_source: impl SaltSource + 'static) -> Self {
        self.salt_source = Arc::new(salt_source);
        self
    }

    pub fn with_cipher(mut self, algorithm: SymmetricAlgorithm) -> Self {
        self.crypto = EnvelopeCrypto::new(algorithm);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// SSO 登录（不存在的会员会被注册）
    pub async fn authenticate(&self, request: &SsoRequest) -> Result<SsoResponse> {
        request.validate()?;
        info!("Authenticating member via SSO");

        let body = self.build_sso_body(request).await?;
        let response = self
            .post(SSO_MEMBER_PATH, body, |data: Option<SsoResponse>| match data {
                Some(sso) if !sso.token.is_empty() => Ok(sso),
                Some(_) => Err("SSO response contains an empty token".to_string()),
                None => Err("SSO response contains no data".to_string()),
            })
            .await?;

        info!("Member authenticated, token expires at {}", response.token_expiration);
        Ok(response)
    }

    /// 停用会员
    pub async fn deactivate(&self, user_id: &str, send_notification: bool) -> Result<()> {
        info!("Deactivating member");
        self.change_activation(DEACTIVATE_MEMBER_PATH, user_id, send_notification)
            .await?;
        info!("Member deactivated");
        Ok(())
    }

    /// 恢复会员
    pub async fn reactivate(&self, user_id: &str, send_notification: bool) -> Result<()> {
        info!("Reactivating member");
        self.change_activation(REACTIVATE_MEMBER_PATH, user_id, send_notification)
            .await?;
        info!("Member reactivated");
        Ok(())
    }

    async fn change_activation(
        &self,
        endpoint: &str,
        user_id: &str,
        send_notification: bool,
    ) -> Result<()> {
        let body = self.build_activation_body(user_id, send_notification)?;
        self.post(endpoint, body, |_: Option<IgnoredAny>| Ok(()))
            .await
    }

    fn build_activation_body(&self, user_id: &str, send_notification: bool) -> Result<String> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidParam("user_id is required".to_string()));
        }
        let change = ActivationChange {
            credentials: self.config.credentials.clone(),
            client_user_id: user_id.to_string(),
            send_notification,
        };
        Ok(to_form_string(&change))
    }

    /// 生成时间戳与盐值，加密签名载荷，组装 SSO 请求体
    async fn build_sso_body(&self, request: &SsoRequest) -> Result<String> {
        let payload = SsoPayload {
            request: request.clone(),
            creation_time: self.clock.now().format(CREATION_TIME_FORMAT).to_string(),
            salt: self.salt_source.next_salt(),
        };
        let plaintext = Zeroizing::new(to_form_string(&payload));

        let keys = KeyMaterial::load(&self.config.key_paths).await?;
        let sealed = self.crypto.seal(plaintext.as_bytes(), &keys)?;
        debug!("SSO payload sealed ({} plaintext bytes)", plaintext.len());

        let form = SsoForm {
            credentials: self.config.credentials.clone(),
            payload: sealed.payload,
            signature: sealed.signature,
            cipher: sealed.cipher,
            iv: sealed.iv,
        };
        Ok(to_form_string(&form))
    }

    /// 发送表单请求并解析响应信封
    ///
    /// HTTP 成功且信封状态为 ok 时，由 `accept` 检查数据；其余情况都以同一响应体
    /// 解析错误信息，返回 [`Error::Api`]。
    async fn post<T, R>(
        &self,
        endpoint: &str,
        body: String,
        accept: impl FnOnce(Option<T>) -> std::result::Result<R, String>,
    ) -> Result<R>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .header(USER_AGENT_HEADER, USER_AGENT)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to connect to {}: {}", url, e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response from {}: {}", url, e)))?;

        let reason = if status.is_success() {
            match serde_json::from_slice::<AbenityResponse<T>>(&bytes) {
                Ok(envelope) if envelope.status == AbenityStatus::Ok => match accept(envelope.data) {
                    Ok(result) => return Ok(result),
                    Err(reason) => reason,
                },
                Ok(_) => "Response envelope status is fail".to_string(),
                Err(e) => format!("Malformed response envelope: {}", e),
            }
        } else {
            format!("HTTP {}", status)
        };

        Err(Error::Api(ApiFailure {
            http_status: status.as_u16(),
            error: serde_json::from_slice(&bytes).ok(),
            raw_response: String::from_utf8_lossy(&bytes).into_owned(),
            reason,
        }))
    }
}
