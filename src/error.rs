use axum::{
    extract::rejection::{FormRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::database::StoreError;
use crate::models::RuleViolation;
use crate::utils::error_to_action_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    /// 未登录，跳转到认证页面
    #[error("login required")]
    Unauthorized { redirect_to: String },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::SEE_OTHER,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RuleViolation> for AppError {
    fn from(violation: RuleViolation) -> Self {
        let msg = violation.to_string();
        match violation {
            RuleViolation::NotAdmin | RuleViolation::NotCreator => AppError::Forbidden(msg),
            RuleViolation::NotMember => AppError::NotFound(msg),
            RuleViolation::TargetNotMember(_) | RuleViolation::CapacityBelowMembers(_) => {
                AppError::Validation(msg)
            }
            RuleViolation::GroupClosed
            | RuleViolation::GroupFull
            | RuleViolation::AlreadyMember
            | RuleViolation::NoSuccessor
            | RuleViolation::AlreadyRated
            | RuleViolation::AlreadyCommented => AppError::Conflict(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            StoreError::Rule(violation) => violation.into(),
            StoreError::Backend(detail) => AppError::Internal(detail),
        }
    }
}

// 表单或查询参数无法解析时同样返回 `{ err }`
impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized { redirect_to } => Redirect::to(&redirect_to).into_response(),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_action_response("internal server error"),
                )
                    .into_response()
            }
            other => (other.status(), error_to_action_response(other.to_string())).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_violations_map_to_statuses() {
        assert_eq!(
            AppError::from(RuleViolation::NotAdmin).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(RuleViolation::GroupFull).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(RuleViolation::TargetNotMember("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(StoreError::NotFound("group")).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn unauthorized_redirects() {
        let response = AppError::Unauthorized {
            redirect_to: "/auth".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/auth");
    }
}
