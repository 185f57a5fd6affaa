//! 数据类型定义

use crate::config::ApiCredentials;
use crate::error::{Error, Result};
use crate::form::{FieldValue, FormEncode, FormField};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// SSO 会员信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsoRequest {
    /// 会员在调用方系统内不可变的唯一 ID（厂商存储其哈希，用于区分新老会员）
    pub client_user_id: String,
    /// 会员邮箱，默认同时作为用户名
    pub email: String,
    /// 覆盖默认用户名，需在全体会员中唯一
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// 邮编，格式按国家校验
    pub zip: Option<String>,
    /// ISO 3166-1 alpha-2 国家代码
    pub country: Option<String>,
    /// 注册后是否发送欢迎邮件
    pub send_welcome_email: bool,
    /// 是否订阅每月 Spotlight 邮件
    pub spotlight: bool,
    /// 自定义密码（已废弃，仅为兼容线上字段保留）
    pub password: Option<String>,
    pub registration_code: Option<String>,
}

impl SsoRequest {
    pub fn new(client_user_id: &str, email: &str) -> Self {
        Self {
            client_user_id: client_user_id.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    /// 校验必填字段
    pub fn validate(&self) -> Result<()> {
        if self.client_user_id.trim().is_empty() {
            return Err(Error::InvalidParam("client_user_id is required".to_string()));
        }
        if !is_valid_email(&self.email) {
            return Err(Error::InvalidParam(format!(
                "email is not a valid address: {:?}",
                self.email
            )));
        }
        Ok(())
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// 待加密的 SSO 载荷：会员信息加上每次调用生成的时间戳与盐值
#[derive(Debug, Clone)]
pub struct SsoPayload {
    pub request: SsoRequest,
    /// `YYYY-MM-DDTHH:MM:SS±HH:MM`
    pub creation_time: String,
    pub salt: i64,
}

impl FormEncode for SsoPayload {
    const FIELDS: &'static [FormField<Self>] = &[
        FormField {
            name: "creation_time",
            encode: true,
            value: |p| FieldValue::Text(Some(&p.creation_time)),
        },
        FormField {
            name: "salt",
            encode: false,
            value: |p| FieldValue::Number(p.salt),
        },
        FormField {
            name: "send_welcome_email",
            encode: false,
            value: |p| FieldValue::Flag(p.request.send_welcome_email),
        },
        FormField {
            name: "client_user_id",
            encode: true,
            value: |p| FieldValue::Text(Some(&p.request.client_user_id)),
        },
        FormField {
            name: "email",
            encode: true,
            value: |p| FieldValue::Text(Some(&p.request.email)),
        },
        FormField {
            name: "username",
            encode: true,
            value: |p| FieldValue::Text(p.request.username.as_deref()),
        },
        FormField {
            name: "firstname",
            encode: true,
            value: |p| FieldValue::Text(p.request.first_name.as_deref()),
        },
        FormField {
            name: "lastname",
            encode: true,
            value: |p| FieldValue::Text(p.request.last_name.as_deref()),
        },
        FormField {
            name: "address",
            encode: true,
            value: |p| FieldValue::Text(p.request.address.as_deref()),
        },
        FormField {
            name: "city",
            encode: true,
            value: |p| FieldValue::Text(p.request.city.as_deref()),
        },
        FormField {
            name: "state",
            encode: true,
            value: |p| FieldValue::Text(p.request.state.as_deref()),
        },
        FormField {
            name: "zip",
            encode: true,
            value: |p| FieldValue::Text(p.request.zip.as_deref()),
        },
        FormField {
            name: "country",
            encode: true,
            value: |p| FieldValue::Text(p.request.country.as_deref()),
        },
        FormField {
            name: "spotlight",
            encode: false,
            value: |p| FieldValue::Flag(p.request.spotlight),
        },
        FormField {
            name: "password",
            encode: true,
            value: |p| FieldValue::Text(p.request.password.as_deref()),
        },
        FormField {
            name: "registration_code",
            encode: true,
            value: |p| FieldValue::Text(p.request.registration_code.as_deref()),
        },
    ];
}

/// SSO 请求体，四个密文字段已完成 base64 + URL 编码
#[derive(Debug, Clone)]
pub struct SsoForm {
    pub credentials: ApiCredentials,
    pub payload: String,
    pub signature: String,
    pub cipher: String,
    pub iv: String,
}

impl FormEncode for SsoForm {
    const FIELDS: &'static [FormField<Self>] = &[
        FormField {
            name: "Payload",
            encode: false,
            value: |f| FieldValue::Text(Some(&f.payload)),
        },
        FormField {
            name: "Signature",
            encode: false,
            value: |f| FieldValue::Text(Some(&f.signature)),
        },
        FormField {
            name: "Cipher",
            encode: false,
            value: |f| FieldValue::Text(Some(&f.cipher)),
        },
        FormField {
            name: "Iv",
            encode: false,
            value: |f| FieldValue::Text(Some(&f.iv)),
        },
    ];

    fn credentials(&self) -> Option<&ApiCredentials> {
        Some(&self.credentials)
    }
}

/// 停用 / 恢复会员请求体
#[derive(Debug, Clone)]
pub struct ActivationChange {
    pub credentials: ApiCredentials,
    pub client_user_id: String,
    pub send_notification: bool,
}

impl FormEncode for ActivationChange {
    const FIELDS: &'static [FormField<Self>] = &[
        FormField {
            name: "client_user_id",
            encode: true,
            value: |a| FieldValue::Text(Some(&a.client_user_id)),
        },
        FormField {
            name: "send_notification",
            encode: false,
            value: |a| FieldValue::Flag(a.send_notification),
        },
    ];

    fn credentials(&self) -> Option<&ApiCredentials> {
        Some(&self.credentials)
    }
}

/// 响应状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AbenityStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "fail")]
    Failure,
}

/// 统一响应信封
#[derive(Debug, Clone, Deserialize)]
pub struct AbenityResponse<T> {
    #[serde(default)]
    pub method: String,
    pub status: AbenityStatus,
    pub data: Option<T>,
    pub class: Option<String>,
}

/// SSO 成功响应数据
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SsoResponse {
    pub token: String,
    #[serde(deserialize_with = "deserialize_expiration")]
    pub token_expiration: DateTime<Utc>,
    pub token_url: Url,
}

fn deserialize_expiration<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_expiration(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid token_expiration: {}", raw)))
}

fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// 错误响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AbenityError {
    pub class: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
    pub error: Option<ErrorDetail>,
}

impl AbenityError {
    pub fn signature(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.signature.as_deref())
    }

    /// 可读的错误描述：优先 signature，否则拼接字段错误
    pub fn message(&self) -> Option<String> {
        let detail = self.error.as_ref()?;
        if let Some(signature) = &detail.signature {
            return Some(signature.clone());
        }
        if detail.fields.is_empty() {
            return None;
        }
        Some(
            detail
                .fields
                .iter()
                .map(|(field, message)| format!("{}: {}", field, message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// 错误详情
///
/// 厂商先后返回过两种格式：`"error": {"signature": "..."}` 与 `"error": "..."`。
/// 两者在解析时归一化为同一结构，扁平字符串记为 `signature`；
/// 嵌套对象中除 `signature` 外的键（如字段校验错误）放入 `fields`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawErrorDetail")]
pub struct ErrorDetail {
    pub signature: Option<String>,
    pub fields: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawErrorDetail {
    Flat(String),
    Nested(serde_json::Map<String, Value>),
}

impl From<RawErrorDetail> for ErrorDetail {
    fn from(raw: RawErrorDetail) -> Self {
        match raw {
            RawErrorDetail::Flat(message) => ErrorDetail {
                signature: Some(message),
                fields: BTreeMap::new(),
            },
            RawErrorDetail::Nested(map) => {
                let mut detail = ErrorDetail::default();
                for (key, value) in map {
                    let text = match value {
                        Value::String(s) => s,
                        Value::Null => continue,
                        other => other.to_string(),
                    };
                    if key == "signature" {
                        detail.signature = Some(text);
                    } else {
                        detail.fields.insert(key, text);
                    }
                }
                detail
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{to_form_string, to_pairs};
    use serde::de::IgnoredAny;

    #[test]
    fn test_status_parses_text_tokens() {
        let ok: AbenityStatus = serde_json::from_str(r#""ok""#).unwrap();
        let fail: AbenityStatus = serde_json::from_str(r#""fail""#).unwrap();
        assert_eq!(ok, AbenityStatus::Ok);
        assert_eq!(fail, AbenityStatus::Failure);
        assert!(serde_json::from_str::<AbenityStatus>("true").is_err());
        assert!(serde_json::from_str::<AbenityStatus>(r#""OK!""#).is_err());
    }

    #[test]
    fn test_sso_response_envelope() {
        let body = r#"{"method":"sso_member","status":"ok","data":{"token":"abc123","token_expiration":"2024-01-01T00:00:00Z","token_url":"https://sandbox.abenity.com/sso/abc123"}}"#;
        let envelope: AbenityResponse<SsoResponse> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.method, "sso_member");
        assert_eq!(envelope.status, AbenityStatus::Ok);

        let data = envelope.data.unwrap();
        assert_eq!(data.token, "abc123");
        assert_eq!(data.token_expiration.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(data.token_url.as_str(), "https://sandbox.abenity.com/sso/abc123");
    }

    #[test]
    fn test_expiration_without_offset_is_utc() {
        let parsed = parse_expiration("2024-06-30 12:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-30T12:30:00+00:00");
        assert!(parse_expiration("next tuesday").is_none());
    }

    #[test]
    fn test_void_envelope_ignores_class() {
        let body = r#"{"class":"client","method":"deactivate_member","status":"ok"}"#;
        let envelope: AbenityResponse<IgnoredAny> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.status, AbenityStatus::Ok);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.class.as_deref(), Some("client"));
    }

    #[test]
    fn test_nested_error_shape() {
        let body = r#"{"class":"client","method":"sso_member","status":"fail","error":{"signature":"Signature verification failed"}}"#;
        let error: AbenityError = serde_json::from_str(body).unwrap();
        assert_eq!(error.status.as_deref(), Some("fail"));
        assert_eq!(error.signature(), Some("Signature verification failed"));
        assert_eq!(error.message().as_deref(), Some("Signature verification failed"));
    }

    #[test]
    fn test_flat_error_shape() {
        let body = r#"{"method":"deactivate_member","status":"fail","error":"Member not found"}"#;
        let error: AbenityError = serde_json::from_str(body).unwrap();
        assert_eq!(error.signature(), Some("Member not found"));
        assert!(error.error.unwrap().fields.is_empty());
    }

    #[test]
    fn test_nested_field_errors() {
        let body = r#"{"status":"fail","error":{"email":"is already registered","zip":5}}"#;
        let error: AbenityError = serde_json::from_str(body).unwrap();
        assert_eq!(error.signature(), None);
        assert_eq!(
            error.message().as_deref(),
            Some("email: is already registered; zip: 5")
        );
    }

    #[test]
    fn test_sso_request_validation() {
        assert!(SsoRequest::new("1", "jane.doe@maildomain.com").validate().is_ok());
        assert!(matches!(
            SsoRequest::new("", "jane.doe@maildomain.com").validate(),
            Err(Error::InvalidParam(_))
        ));
        for email in ["", "jane", "jane@", "@maildomain.com", "jane@localhost", "jane doe@x.com", "a@b@c.com"] {
            assert!(
                SsoRequest::new("1", email).validate().is_err(),
                "accepted {:?}",
                email
            );
        }
    }

    #[test]
    fn test_sso_payload_field_order() {
        let mut request = SsoRequest::new("1", "jane.doe@maildomain.com");
        request.first_name = Some("Jane".to_string());
        request.spotlight = true;
        let payload = SsoPayload {
            request,
            creation_time: "2024-01-01T10:00:00+05:00".to_string(),
            salt: 77,
        };

        let names: Vec<_> = to_pairs(&payload).into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "creation_time", "salt", "send_welcome_email", "client_user_id", "email",
                "username", "firstname", "lastname", "address", "city", "state", "zip",
                "country", "spotlight", "password", "registration_code",
            ]
        );

        let body = to_form_string(&payload);
        assert!(body.starts_with(
            "creation_time=2024-01-01T10%3A00%3A00%2B05%3A00&salt=77&send_welcome_email=0&client_user_id=1&email=jane.doe%40maildomain.com&username=&firstname=Jane"
        ));
        assert!(body.contains("&spotlight=1&password=&registration_code="));
    }

    #[test]
    fn test_activation_change_form() {
        let change = ActivationChange {
            credentials: ApiCredentials::new("user", "pass", "key"),
            client_user_id: "42".to_string(),
            send_notification: false,
        };
        assert_eq!(
            to_form_string(&change),
            "api_username=user&api_password=pass&api_key=key&client_user_id=42&send_notification=0"
        );
    }

    #[test]
    fn test_sso_form_keeps_artifacts_verbatim() {
        let form = SsoForm {
            credentials: ApiCredentials::new("user", "pass", "key"),
            payload: "AAA%3Ddecode".to_string(),
            signature: "BBB%2Bdecode".to_string(),
            cipher: "CCC%2Fdecode".to_string(),
            iv: "DDDdecode".to_string(),
        };
        assert_eq!(
            to_form_string(&form),
            "api_username=user&api_password=pass&api_key=key&Payload=AAA%3Ddecode&Signature=BBB%2Bdecode&Cipher=CCC%2Fdecode&Iv=DDDdecode"
        );
    }
}
