use axum::{http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::utils::success_to_action_response;

#[derive(Serialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: i64,
}

/// 健康检查接口
pub async fn ping() -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_action_response(
            "pong",
            PingResponse {
                status: "ok".to_string(),
                timestamp: chrono::Utc::now().timestamp(),
            },
        ),
    )
}
