// 领域模型与业务规则
// 规则函数都是纯函数，Postgres 与内存存储共用同一套判定

pub mod comment;
pub mod group;
pub mod membership;
pub mod rating;
pub mod restaurant;
pub mod user;

pub use comment::Comment;
pub use group::{Group, GroupDraft, GroupStatus};
pub use membership::{
    Departure, DeparturePlan, GroupMember, JoinDecision, MemberProfile, MemberRole,
};
pub use rating::{Rating, RatingSummary};
pub use restaurant::{NewRestaurant, Restaurant};
pub use user::SessionUser;

use thiserror::Error;

/// 违反业务规则时返回的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("you are not a member of this group")]
    NotMember,
    #[error("only the group admin can do this")]
    NotAdmin,
    #[error("only the group creator can edit this group")]
    NotCreator,
    #[error("this group is already completed")]
    GroupClosed,
    #[error("this group is full")]
    GroupFull,
    #[error("you have already joined this group")]
    AlreadyMember,
    #[error("user {0} is not another member of this group")]
    TargetNotMember(String),
    #[error("no member left to hand the group over to; delete the group instead")]
    NoSuccessor,
    #[error("numOfPeople cannot be lower than the current member count ({0})")]
    CapacityBelowMembers(i64),
    #[error("you have already rated this restaurant")]
    AlreadyRated,
    #[error("you have already commented on this restaurant")]
    AlreadyCommented,
}
