use axum::Json;
use chrono::{DateTime, NaiveDateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::SessionUser;

/// 外部认证服务签发的会话令牌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64, // 过期时间
    pub iat: i64, // 签发时间
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        SessionUser {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            image: claims.image,
            role: claims.role,
        }
    }
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(token_data.claims)
}

/// 签发会话令牌；正式环境由认证服务签发，这里供测试与本地调试使用
pub fn generate_token(
    user: &SessionUser,
    ttl: chrono::Duration,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        image: user.image.clone(),
        role: user.role.clone(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// 统一响应结构：成功时为 `{ msg, data }`，失败时为 `{ err }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

pub fn success_to_action_response<T: Serialize>(
    msg: impl Into<String>,
    data: T,
) -> Json<ActionResponse<T>> {
    Json(ActionResponse {
        msg: Some(msg.into()),
        data: Some(data),
        err: None,
    })
}

pub fn message_to_action_response(msg: impl Into<String>) -> Json<ActionResponse<()>> {
    Json(ActionResponse {
        msg: Some(msg.into()),
        data: None,
        err: None,
    })
}

pub fn error_to_action_response(err: impl Into<String>) -> Json<ActionResponse<()>> {
    Json(ActionResponse {
        msg: None,
        data: None,
        err: Some(err.into()),
    })
}

// ───────────── 表单字段解析 ─────────────

/// 必填字段：去除首尾空白后不能为空
pub fn required_field(value: Option<String>, name: &str) -> Result<String, AppError> {
    optional_field(value).ok_or_else(|| AppError::validation(format!("{} is required", name)))
}

/// 可选字段：空字符串视为未填写
pub fn optional_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_int_field(value: Option<String>, name: &str) -> Result<i32, AppError> {
    required_field(value, name)?
        .parse::<i32>()
        .map_err(|_| AppError::validation(format!("{} must be an integer", name)))
}

pub fn parse_uuid(raw: &str, name: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(format!("invalid {}", name)))
}

/// 接受 RFC 3339 或表单 datetime-local 格式（按 UTC 处理）
pub fn parse_datetime_field(value: Option<String>, name: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = required_field(value, name)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::validation(format!("{} is not a valid date and time", name)))
}
