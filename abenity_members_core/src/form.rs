//! 表单编码
//!
//! 每个请求类型通过 [`FormEncode::FIELDS`] 声明一张静态字段表（线上字段名、取值函数、
//! 是否百分号编码），由 [`to_pairs`] / [`to_form_string`] 统一按声明顺序输出。
//! 携带凭据的请求通过 [`FormEncode::credentials`] 把凭据字段合并到最前面。

use crate::config::ApiCredentials;

/// 字段取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// 文本，`None` 输出为空值（字段仍然保留）
    Text(Option<&'a str>),
    /// 布尔，输出 "1" / "0"
    Flag(bool),
    Number(i64),
}

/// 静态字段描述
pub struct FormField<T> {
    /// 线上字段名
    pub name: &'static str,
    /// 是否百分号编码
    pub encode: bool,
    pub value: fn(&T) -> FieldValue<'_>,
}

/// 可表单编码的请求类型
pub trait FormEncode: Sized + 'static {
    const FIELDS: &'static [FormField<Self>];

    /// 需要合并在字段表之前的凭据
    fn credentials(&self) -> Option<&ApiCredentials> {
        None
    }
}

impl FormEncode for ApiCredentials {
    const FIELDS: &'static [FormField<Self>] = &[
        FormField {
            name: "api_username",
            encode: true,
            value: |c| FieldValue::Text(Some(&c.username)),
        },
        FormField {
            name: "api_password",
            encode: true,
            value: |c| FieldValue::Text(Some(&c.password)),
        },
        FormField {
            name: "api_key",
            encode: true,
            value: |c| FieldValue::Text(Some(&c.api_key)),
        },
    ];
}

/// 按声明顺序输出 (字段名, 字段值)
pub fn to_pairs<T: FormEncode>(value: &T) -> Vec<(&'static str, String)> {
    let mut pairs = match value.credentials() {
        Some(credentials) => to_pairs(credentials),
        None => Vec::with_capacity(T::FIELDS.len()),
    };

    pairs.extend(
        T::FIELDS
            .iter()
            .map(|field| (field.name, render((field.value)(value), field.encode))),
    );
    pairs
}

/// 输出 `name=value&name=value` 形式的请求体
pub fn to_form_string<T: FormEncode>(value: &T) -> String {
    to_pairs(value)
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn render(value: FieldValue<'_>, encode: bool) -> String {
    match value {
        FieldValue::Flag(true) => "1".to_string(),
        FieldValue::Flag(false) => "0".to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Text(None) => String::new(),
        FieldValue::Text(Some(text)) if encode => urlencoding::encode(text).into_owned(),
        FieldValue::Text(Some(text)) => text.to_string(),
    }
}
