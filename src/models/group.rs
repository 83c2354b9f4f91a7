use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RuleViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Active,
    Full,
    Completed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Active => "active",
            GroupStatus::Full => "full",
            GroupStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(GroupStatus::Active),
            "full" => Ok(GroupStatus::Full),
            "completed" => Ok(GroupStatus::Completed),
            other => Err(format!("unknown group status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub restaurant_id: Uuid,
    pub status: GroupStatus,
    pub proposed_budget: Option<String>,
    pub food_preference: Option<String>,
    pub spoken_language: Option<String>,
    pub num_of_people: i32,
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 创建或编辑群组时提交的字段
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDraft {
    pub name: String,
    pub description: Option<String>,
    pub restaurant_id: Uuid,
    pub proposed_budget: Option<String>,
    pub food_preference: Option<String>,
    pub spoken_language: Option<String>,
    pub num_of_people: i32,
    pub start_time: DateTime<Utc>,
    /// 仅编辑时有效，只接受 active / completed
    pub status: Option<GroupStatus>,
}

impl GroupDraft {
    pub fn into_group(self, id: Uuid, creator_id: String, now: DateTime<Utc>) -> Group {
        Group {
            id,
            status: status_for(self.num_of_people, 1, None),
            name: self.name,
            description: self.description,
            creator_id,
            restaurant_id: self.restaurant_id,
            proposed_budget: self.proposed_budget,
            food_preference: self.food_preference,
            spoken_language: self.spoken_language,
            num_of_people: self.num_of_people,
            start_time: self.start_time,
            created_at: now,
        }
    }

    pub fn apply_to(&self, group: &mut Group, status: GroupStatus) {
        group.name = self.name.clone();
        group.description = self.description.clone();
        group.restaurant_id = self.restaurant_id;
        group.proposed_budget = self.proposed_budget.clone();
        group.food_preference = self.food_preference.clone();
        group.spoken_language = self.spoken_language.clone();
        group.num_of_people = self.num_of_people;
        group.start_time = self.start_time;
        group.status = status;
    }
}

/// 根据容量与当前人数推导群组状态，completed 由发起人显式指定
pub fn status_for(capacity: i32, member_count: i64, requested: Option<GroupStatus>) -> GroupStatus {
    if requested == Some(GroupStatus::Completed) {
        GroupStatus::Completed
    } else if member_count >= i64::from(capacity) {
        GroupStatus::Full
    } else {
        GroupStatus::Active
    }
}

/// 成员离开后的状态：满员群组有空位后重新开放
pub fn status_after_departure(current: GroupStatus, capacity: i32, remaining: i64) -> GroupStatus {
    match current {
        GroupStatus::Completed => GroupStatus::Completed,
        _ => status_for(capacity, remaining, None),
    }
}

/// 校验编辑权限并返回编辑后的状态
pub fn plan_update(
    group: &Group,
    requester_id: &str,
    draft: &GroupDraft,
    member_count: i64,
) -> Result<GroupStatus, RuleViolation> {
    if group.creator_id != requester_id {
        return Err(RuleViolation::NotCreator);
    }
    if group.status == GroupStatus::Completed {
        return Err(RuleViolation::GroupClosed);
    }
    if i64::from(draft.num_of_people) < member_count {
        return Err(RuleViolation::CapacityBelowMembers(member_count));
    }
    Ok(status_for(draft.num_of_people, member_count, draft.status))
}
