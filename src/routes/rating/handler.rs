use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::AppError,
    models::{Rating, RatingSummary, SessionUser, rating},
    utils::{parse_int_field, parse_uuid, success_to_action_response},
};

#[derive(Debug, Deserialize)]
pub struct RatingForm {
    score: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingLookup {
    rating: Option<Rating>,
    summary: RatingSummary,
}

pub async fn find_rating(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(restaurant_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let restaurant_id = parse_uuid(&restaurant_id, "restaurant id")?;
    if state.store.find_restaurant(restaurant_id).await?.is_none() {
        return Err(AppError::NotFound("Restaurant not found".to_string()));
    }

    let rating = state.store.find_rating(restaurant_id, &user.id).await?;
    let summary = state.store.rating_summary(restaurant_id).await?;

    Ok(success_to_action_response(
        "rating",
        RatingLookup { rating, summary },
    ))
}

// 每位用户对同一餐厅只能评分一次
pub async fn submit_rating(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(restaurant_id): Path<String>,
    WithRejection(Form(form), _): WithRejection<Form<RatingForm>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let restaurant_id = parse_uuid(&restaurant_id, "restaurant id")?;
    let score = parse_int_field(form.score, "score")?;
    if !rating::is_valid_score(score) {
        return Err(AppError::validation(format!(
            "score must be between {} and {}",
            rating::MIN_SCORE,
            rating::MAX_SCORE
        )));
    }

    let rating = state
        .store
        .submit_rating(&user, restaurant_id, score)
        .await?;

    Ok((
        StatusCode::CREATED,
        success_to_action_response("rating submitted", rating),
    ))
}
