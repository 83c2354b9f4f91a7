use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::{Group, GroupStatus, status_for};
use super::RuleViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    Member,
    Admin,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Member => "Member",
            MemberRole::Admin => "Admin",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Member" => Ok(MemberRole::Member),
            "Admin" => Ok(MemberRole::Admin),
            other => Err(format!("unknown member role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub group_id: Uuid,
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

/// 成员列表中附带用户资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    #[serde(flatten)]
    pub member: GroupMember,
    pub user_name: String,
    pub user_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    /// 允许加入，附带加入后的群组状态
    Admit { status_after: GroupStatus },
    /// 已满员：把状态标记为 full 后拒绝
    RejectFull,
}

pub fn plan_join(
    group: &Group,
    members: &[GroupMember],
    user_id: &str,
) -> Result<JoinDecision, RuleViolation> {
    if group.status == GroupStatus::Completed {
        return Err(RuleViolation::GroupClosed);
    }
    if members.iter().any(|m| m.user_id == user_id) {
        return Err(RuleViolation::AlreadyMember);
    }
    let count = members.len() as i64;
    if count >= i64::from(group.num_of_people) {
        return Ok(JoinDecision::RejectFull);
    }
    Ok(JoinDecision::Admit {
        status_after: status_for(group.num_of_people, count + 1, None),
    })
}

/// 成员离开群组的几种方式，统一走 `plan_departure`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// 自己退出；最后一位管理员退出时自动移交
    Leave,
    /// 管理员解散群组
    Delete,
    /// 管理员移交后退出，未指定时选最早加入的成员
    Assign { successor: Option<String> },
    /// 管理员移除其他成员
    Remove { member: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeparturePlan {
    DeleteGroup,
    Remove { user_id: String },
    HandOff { successor: String, outgoing: String },
}

impl DeparturePlan {
    /// 执行后仍留在群组中的人数
    pub fn remaining(&self, current: usize) -> usize {
        match self {
            DeparturePlan::DeleteGroup => 0,
            DeparturePlan::Remove { .. } | DeparturePlan::HandOff { .. } => {
                current.saturating_sub(1)
            }
        }
    }
}

/// 最早加入的其他成员，加入时间相同时按 user_id 排序
pub fn earliest_successor<'a>(
    members: &'a [GroupMember],
    outgoing: &str,
) -> Option<&'a GroupMember> {
    members
        .iter()
        .filter(|m| m.user_id != outgoing)
        .min_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        })
}

pub fn plan_departure(
    members: &[GroupMember],
    actor_id: &str,
    departure: &Departure,
) -> Result<DeparturePlan, RuleViolation> {
    let actor = members.iter().find(|m| m.user_id == actor_id);

    match departure {
        Departure::Leave => {
            let actor = actor.ok_or(RuleViolation::NotMember)?;
            let other_admin = members
                .iter()
                .any(|m| m.is_admin() && m.user_id != actor_id);
            if !actor.is_admin() || other_admin {
                return Ok(DeparturePlan::Remove {
                    user_id: actor_id.to_string(),
                });
            }
            hand_off(members, actor_id, None)
        }
        Departure::Delete => {
            require_admin(actor)?;
            Ok(DeparturePlan::DeleteGroup)
        }
        Departure::Assign { successor } => {
            require_admin(actor)?;
            hand_off(members, actor_id, successor.as_deref())
        }
        Departure::Remove { member } if member == actor_id => {
            plan_departure(members, actor_id, &Departure::Leave)
        }
        Departure::Remove { member } => {
            require_admin(actor)?;
            if !members.iter().any(|m| &m.user_id == member) {
                return Err(RuleViolation::TargetNotMember(member.clone()));
            }
            Ok(DeparturePlan::Remove {
                user_id: member.clone(),
            })
        }
    }
}

fn require_admin(actor: Option<&GroupMember>) -> Result<(), RuleViolation> {
    match actor {
        Some(m) if m.is_admin() => Ok(()),
        Some(_) => Err(RuleViolation::NotAdmin),
        None => Err(RuleViolation::NotMember),
    }
}

fn hand_off(
    members: &[GroupMember],
    outgoing: &str,
    successor: Option<&str>,
) -> Result<DeparturePlan, RuleViolation> {
    let successor = match successor {
        Some(target) => members
            .iter()
            .find(|m| m.user_id == target && m.user_id != outgoing)
            .ok_or_else(|| RuleViolation::TargetNotMember(target.to_string()))?,
        None => earliest_successor(members, outgoing).ok_or(RuleViolation::NoSuccessor)?,
    };
    Ok(DeparturePlan::HandOff {
        successor: successor.user_id.clone(),
        outgoing: outgoing.to_string(),
    })
}
