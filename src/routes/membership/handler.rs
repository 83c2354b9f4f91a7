use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::AppError,
    models::{Departure, Group, MemberProfile, SessionUser},
    routes::group::DepartureResult,
    utils::{optional_field, parse_uuid, success_to_action_response},
};

// 踢人时携带目标用户
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveQuery {
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Memberships {
    members: Vec<MemberProfile>,
    user_groups: Vec<Group>,
}

// 群组成员列表 + 当前用户加入的群组
pub async fn list_memberships(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = parse_uuid(&group_id, "group id")?;
    if state.store.find_group(group_id).await?.is_none() {
        return Err(AppError::NotFound("Group not found".to_string()));
    }

    let members = state.store.list_members(group_id).await?;
    let user_groups = state.store.list_user_groups(&user.id).await?;

    Ok(success_to_action_response(
        "group members",
        Memberships {
            members,
            user_groups,
        },
    ))
}

pub async fn join_group(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = parse_uuid(&group_id, "group id")?;
    let member = state.store.join_group(group_id, &user).await?;
    tracing::info!(group_id = %group_id, user = %user.id, "Joined group");

    Ok((
        StatusCode::CREATED,
        success_to_action_response("joined group", member),
    ))
}

/// 不带 userId 为自己退出，带 userId 为管理员踢人
pub async fn leave_group(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(group_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<LeaveQuery>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let group_id = parse_uuid(&group_id, "group id")?;
    let departure = match optional_field(query.user_id) {
        Some(member) => Departure::Remove { member },
        None => Departure::Leave,
    };

    let plan = state
        .store
        .depart_group(group_id, &user.id, departure)
        .await?;
    tracing::info!(group_id = %group_id, user = %user.id, ?plan, "Left group");
    let result = DepartureResult::from(plan);

    Ok(success_to_action_response(result.message(), result))
}
