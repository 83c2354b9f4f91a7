use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::{AppState, middleware::auth_middleware};

pub mod comment;
pub mod group;
pub mod health;
pub mod membership;
pub mod rating;
pub mod restaurant;

/// 创建主路由：公开路由与需要登录的路由挂在同一个 API 前缀下
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/ping", get(health::ping))
        // 餐厅列表对所有人公开
        .route("/restaurant/{id}", get(restaurant::find_restaurant));

    let protected_routes = Router::new()
        // 群组路由
        .route("/group", post(group::create_group))
        .route(
            "/group/{id}",
            get(group::find_group)
                .put(group::update_group)
                .delete(group::delete_group),
        )
        // 成员路由
        .route(
            "/membership/{id}",
            get(membership::list_memberships)
                .post(membership::join_group)
                .delete(membership::leave_group),
        )
        // 评分与留言
        .route(
            "/rating/{id}",
            get(rating::find_rating).post(rating::submit_rating),
        )
        .route(
            "/comment/{id}",
            get(comment::find_comment).post(comment::submit_comment),
        )
        // 餐厅管理，仅限站点管理员
        .route("/restaurant", post(restaurant::create_restaurant))
        .route("/restaurant/{id}", delete(restaurant::delete_restaurant))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    // axum 不允许在根路径 nest
    let router = match state.config.api_base_uri.as_str() {
        "/" => api,
        base => Router::new().nest(base, api),
    };

    router.with_state(state)
}
