use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError, models::SessionUser, utils::verify_token};

/// 校验会话令牌，成功后把 `SessionUser` 放入请求扩展；未登录时跳转到认证页面
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let bearer = request.headers().typed_get::<Authorization<Bearer>>();

    let claims = match bearer {
        Some(Authorization(bearer)) => match verify_token(bearer.token(), &state.config) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                return unauthorized(&state);
            }
        },
        None => return unauthorized(&state),
    };

    request.extensions_mut().insert(SessionUser::from(claims));
    next.run(request).await
}

fn unauthorized(state: &AppState) -> Response {
    AppError::Unauthorized {
        redirect_to: state.config.auth_redirect.clone(),
    }
    .into_response()
}
