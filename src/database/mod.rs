// 数据访问层
// Store 抽象出所有数据库操作，handler 只依赖这个 trait

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, Departure, DeparturePlan, Group, GroupDraft, GroupMember, MemberProfile,
    NewRestaurant, Rating, RatingSummary, Restaurant, RuleViolation, SessionUser,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Rule(#[from] RuleViolation),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // ───────────── 餐厅 ─────────────

    /// 全表读取，按名称排序
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError>;

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError>;

    async fn create_restaurant(&self, new: NewRestaurant) -> Result<Restaurant, StoreError>;

    /// 删除餐厅并级联删除其群组、评分与留言，返回被删除的记录
    async fn delete_restaurant(&self, id: Uuid) -> Result<Restaurant, StoreError>;

    // ───────────── 群组 ─────────────

    async fn list_active_groups(&self) -> Result<Vec<Group>, StoreError>;

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>, StoreError>;

    /// 创建群组，同时把创建者加入为 Admin
    async fn create_group(
        &self,
        creator: &SessionUser,
        draft: GroupDraft,
    ) -> Result<(Group, GroupMember), StoreError>;

    async fn update_group(
        &self,
        id: Uuid,
        requester_id: &str,
        draft: GroupDraft,
    ) -> Result<Group, StoreError>;

    /// 退出、踢人、移交与解散的统一入口，整体原子执行
    async fn depart_group(
        &self,
        id: Uuid,
        actor_id: &str,
        departure: Departure,
    ) -> Result<DeparturePlan, StoreError>;

    // ───────────── 成员 ─────────────

    async fn join_group(&self, id: Uuid, user: &SessionUser) -> Result<GroupMember, StoreError>;

    async fn list_members(&self, id: Uuid) -> Result<Vec<MemberProfile>, StoreError>;

    async fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, StoreError>;

    // ───────────── 评分 ─────────────

    async fn submit_rating(
        &self,
        user: &SessionUser,
        restaurant_id: Uuid,
        score: i32,
    ) -> Result<Rating, StoreError>;

    async fn find_rating(
        &self,
        restaurant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Rating>, StoreError>;

    async fn rating_summary(&self, restaurant_id: Uuid) -> Result<RatingSummary, StoreError>;

    // ───────────── 留言 ─────────────

    async fn submit_comment(
        &self,
        user: &SessionUser,
        restaurant_id: Uuid,
        content: &str,
    ) -> Result<Comment, StoreError>;

    async fn find_comment(
        &self,
        restaurant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Comment>, StoreError>;

    /// 某餐厅的全部留言，最新的在前
    async fn list_comments(&self, restaurant_id: Uuid) -> Result<Vec<Comment>, StoreError>;
}
