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
    models::{Comment, SessionUser, comment::MAX_COMMENT_CHARS},
    utils::{parse_uuid, required_field, success_to_action_response},
};

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentLookup {
    comment: Option<Comment>,
    comments: Vec<Comment>,
}

pub async fn find_comment(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(restaurant_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let restaurant_id = parse_uuid(&restaurant_id, "restaurant id")?;
    if state.store.find_restaurant(restaurant_id).await?.is_none() {
        return Err(AppError::NotFound("Restaurant not found".to_string()));
    }

    let comment = state.store.find_comment(restaurant_id, &user.id).await?;
    let comments = state.store.list_comments(restaurant_id).await?;

    Ok(success_to_action_response(
        "comments",
        CommentLookup { comment, comments },
    ))
}

pub async fn submit_comment(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(restaurant_id): Path<String>,
    WithRejection(Form(form), _): WithRejection<Form<CommentForm>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let restaurant_id = parse_uuid(&restaurant_id, "restaurant id")?;
    let content = required_field(form.content, "content")?;
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::validation(format!(
            "content must be at most {} characters",
            MAX_COMMENT_CHARS
        )));
    }

    let comment = state
        .store
        .submit_comment(&user, restaurant_id, &content)
        .await?;

    Ok((
        StatusCode::CREATED,
        success_to_action_response("comment submitted", comment),
    ))
}
