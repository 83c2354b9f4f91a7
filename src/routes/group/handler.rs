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
    models::SessionUser,
    utils::{parse_uuid, success_to_action_response},
};

use super::model::{ActiveGroups, CreatedGroup, DeleteGroupForm, DepartureResult, GroupForm};

pub async fn create_group(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Form(form), _): WithRejection<Form<GroupForm>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let draft = form.into_draft(false)?;
    let (group, admin) = state.store.create_group(&user, draft).await?;
    tracing::info!(group_id = %group.id, creator = %user.id, "Group created");

    Ok((
        StatusCode::CREATED,
        success_to_action_response("group created, admin joined", CreatedGroup { group, admin }),
    ))
}

/// `all` 返回所有招募中的群组，否则按 ID 查询
pub async fn find_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if id == "all" {
        let active_groups = state.store.list_active_groups().await?;
        return Ok(
            success_to_action_response("active groups", ActiveGroups { active_groups })
                .into_response(),
        );
    }

    let group = state
        .store
        .find_group(parse_uuid(&id, "group id")?)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;

    Ok(success_to_action_response("group", group).into_response())
}

pub async fn update_group(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    WithRejection(Form(form), _): WithRejection<Form<GroupForm>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = parse_uuid(&id, "group id")?;
    let draft = form.into_draft(true)?;
    let group = state.store.update_group(group_id, &user.id, draft).await?;

    Ok(success_to_action_response("group updated", group))
}

/// 仅管理员可操作：解散群组，或移交管理员后退出
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    WithRejection(Form(form), _): WithRejection<Form<DeleteGroupForm>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = parse_uuid(&id, "group id")?;
    let departure = form.into_departure()?;
    tracing::info!(group_id = %group_id, user = %user.id, ?departure, "Admin leaving group");

    let plan = state
        .store
        .depart_group(group_id, &user.id, departure)
        .await?;
    let result = DepartureResult::from(plan);

    Ok(success_to_action_response(result.message(), result))
}
