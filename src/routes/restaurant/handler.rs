use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    error::AppError,
    models::{NewRestaurant, SessionUser},
    utils::{message_to_action_response, parse_uuid, success_to_action_response},
};

use super::model::RestaurantForm;

fn require_site_admin(user: &SessionUser) -> Result<(), AppError> {
    if user.is_site_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "only site administrators can manage restaurants".to_string(),
        ))
    }
}

// 公开接口，`all` 返回全部餐厅
pub async fn find_restaurant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if id == "all" {
        let restaurants = state.store.list_restaurants().await?;
        return Ok(success_to_action_response("restaurants", restaurants).into_response());
    }

    let restaurant = state
        .store
        .find_restaurant(parse_uuid(&id, "restaurant id")?)
        .await?
        .ok_or_else(|| AppError::NotFound("Restaurant not found".to_string()))?;

    Ok(success_to_action_response("restaurant", restaurant).into_response())
}

pub async fn create_restaurant(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Form(form), _): WithRejection<Form<RestaurantForm>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    require_site_admin(&user)?;
    let new = NewRestaurant::try_from(form)?;
    let restaurant = state.store.create_restaurant(new).await?;
    tracing::info!(restaurant_id = %restaurant.id, admin = %user.id, "Restaurant created");

    Ok((
        StatusCode::CREATED,
        success_to_action_response("restaurant created", restaurant),
    ))
}

pub async fn delete_restaurant(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_site_admin(&user)?;
    let restaurant = state
        .store
        .delete_restaurant(parse_uuid(&id, "restaurant id")?)
        .await?;
    tracing::info!(restaurant_id = %restaurant.id, admin = %user.id, "Restaurant deleted");

    Ok(message_to_action_response(format!(
        "restaurant {} deleted",
        restaurant.name
    )))
}
