use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Departure, DeparturePlan, Group, GroupDraft, GroupMember, GroupStatus};
use crate::utils::{
    optional_field, parse_datetime_field, parse_int_field, parse_uuid, required_field,
};

/// 创建与编辑群组共用的表单，兼容旧版前端的字段名
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupForm {
    #[serde(alias = "groupName")]
    pub name: Option<String>,
    #[serde(alias = "groupDescription")]
    pub description: Option<String>,
    #[serde(alias = "restaurantID")]
    pub restaurant_id: Option<String>,
    pub proposed_budget: Option<String>,
    pub food_preference: Option<String>,
    pub spoken_language: Option<String>,
    #[serde(alias = "numofPeople")]
    pub num_of_people: Option<String>,
    pub start_time: Option<String>,
    pub status: Option<String>,
}

impl GroupForm {
    /// 编辑时才读取 status 字段
    pub fn into_draft(self, with_status: bool) -> Result<GroupDraft, AppError> {
        let name = required_field(self.name, "name")?;
        let restaurant_id = parse_uuid(
            &required_field(self.restaurant_id, "restaurantId")?,
            "restaurantId",
        )?;
        let num_of_people = parse_int_field(self.num_of_people, "numOfPeople")?;
        if num_of_people < 1 {
            return Err(AppError::validation("numOfPeople must be at least 1"));
        }
        let start_time = parse_datetime_field(self.start_time, "startTime")?;

        let status = match optional_field(self.status).filter(|_| with_status) {
            None => None,
            Some(raw) => match raw.parse::<GroupStatus>() {
                Ok(status @ (GroupStatus::Active | GroupStatus::Completed)) => Some(status),
                _ => {
                    return Err(AppError::validation(
                        "status must be either active or completed",
                    ));
                }
            },
        };

        Ok(GroupDraft {
            name,
            description: optional_field(self.description),
            restaurant_id,
            proposed_budget: optional_field(self.proposed_budget),
            food_preference: optional_field(self.food_preference),
            spoken_language: optional_field(self.spoken_language),
            num_of_people,
            start_time,
            status,
        })
    }
}

/// 管理员删除群组时的选择：解散或移交
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupForm {
    pub action: Option<String>,
    pub new_admin_id: Option<String>,
}

impl DeleteGroupForm {
    pub fn into_departure(self) -> Result<Departure, AppError> {
        match optional_field(self.action).as_deref() {
            Some("delete") => Ok(Departure::Delete),
            Some("assign") => Ok(Departure::Assign {
                successor: optional_field(self.new_admin_id),
            }),
            _ => Err(AppError::validation(
                "action must be either delete or assign",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedGroup {
    pub group: Group,
    pub admin: GroupMember,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGroups {
    pub active_groups: Vec<Group>,
}

/// 退出或删除群组后的结果
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DepartureResult {
    pub group_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_admin_assigned: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<String>,
}

impl DepartureResult {
    pub fn message(&self) -> &'static str {
        if self.group_deleted {
            "group deleted"
        } else if self.new_admin_assigned.is_some() {
            "admin handed over"
        } else {
            "member removed"
        }
    }
}

impl From<DeparturePlan> for DepartureResult {
    fn from(plan: DeparturePlan) -> Self {
        match plan {
            DeparturePlan::DeleteGroup => Self {
                group_deleted: true,
                new_admin_assigned: None,
                removed: None,
            },
            DeparturePlan::Remove { user_id } => Self {
                group_deleted: false,
                new_admin_assigned: None,
                removed: Some(user_id),
            },
            DeparturePlan::HandOff {
                successor,
                outgoing,
            } => Self {
                group_deleted: false,
                new_admin_assigned: Some(successor),
                removed: Some(outgoing),
            },
        }
    }
}
