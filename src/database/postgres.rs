use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{Executor, FromRow, PgPool};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::config::Config;
use crate::models::group::{plan_update, status_after_departure};
use crate::models::membership::{plan_departure, plan_join};
use crate::models::{
    Comment, Departure, DeparturePlan, Group, GroupDraft, GroupMember, GroupStatus, JoinDecision,
    MemberProfile, MemberRole, NewRestaurant, Rating, RatingSummary, Restaurant, RuleViolation,
    SessionUser,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const RESTAURANT_COLUMNS: &str = "restaurant_id, name, description, address, phone, \
     opening_hours, cuisine_type, price_range, rating";

const GROUP_COLUMNS: &str = "group_id, name, description, creator_id, restaurant_id, status, \
     proposed_budget, food_preference, spoken_language, num_of_people, start_time, created_at";

/// Postgres 存储，多语句操作都在同一个事务中完成
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'belly_buddies';")
                        .await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

// ───────────── 行结构 ─────────────

#[derive(FromRow)]
struct RestaurantRow {
    restaurant_id: Uuid,
    name: String,
    description: String,
    address: String,
    phone: String,
    opening_hours: String,
    cuisine_type: String,
    price_range: String,
    rating: i32,
}

impl From<RestaurantRow> for Restaurant {
    fn from(row: RestaurantRow) -> Self {
        Self {
            id: row.restaurant_id,
            name: row.name,
            description: row.description,
            address: row.address,
            phone: row.phone,
            opening_hours: row.opening_hours,
            cuisine_type: row.cuisine_type,
            price_range: row.price_range,
            rating: row.rating,
        }
    }
}

#[derive(FromRow)]
struct GroupRow {
    group_id: Uuid,
    name: String,
    description: Option<String>,
    creator_id: String,
    restaurant_id: Uuid,
    status: String,
    proposed_budget: Option<String>,
    food_preference: Option<String>,
    spoken_language: Option<String>,
    num_of_people: i32,
    start_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<GroupRow> for Group {
    type Error = StoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.group_id,
            name: row.name,
            description: row.description,
            creator_id: row.creator_id,
            restaurant_id: row.restaurant_id,
            status: row.status.parse().map_err(StoreError::Backend)?,
            proposed_budget: row.proposed_budget,
            food_preference: row.food_preference,
            spoken_language: row.spoken_language,
            num_of_people: row.num_of_people,
            start_time: row.start_time,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct MemberRow {
    group_id: Uuid,
    user_id: String,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for GroupMember {
    type Error = StoreError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            group_id: row.group_id,
            user_id: row.user_id,
            role: row.role.parse().map_err(StoreError::Backend)?,
            joined_at: row.joined_at,
        })
    }
}

#[derive(FromRow)]
struct MemberProfileRow {
    #[sqlx(flatten)]
    member: MemberRow,
    user_name: String,
    user_image: Option<String>,
}

#[derive(FromRow)]
struct RatingRow {
    rating_id: Uuid,
    user_id: String,
    restaurant_id: Uuid,
    score: i32,
    created_at: DateTime<Utc>,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Self {
            id: row.rating_id,
            user_id: row.user_id,
            restaurant_id: row.restaurant_id,
            score: row.score,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    comment_id: Uuid,
    user_id: String,
    restaurant_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.comment_id,
            user_id: row.user_id,
            restaurant_id: row.restaurant_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRow {
    average: Option<f64>,
    count: i64,
}

// ───────────── 事务内的辅助查询 ─────────────

fn collect_groups(rows: Vec<GroupRow>) -> Result<Vec<Group>, StoreError> {
    rows.into_iter().map(Group::try_from).collect()
}

fn unique_violation_as(err: sqlx::Error, violation: RuleViolation) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Rule(violation);
        }
    }
    err.into()
}

async fn upsert_user(conn: &mut PgConnection, user: &SessionUser) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO users (user_id, name, email, image, updated_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET name = EXCLUDED.name, email = EXCLUDED.email,
            image = EXCLUDED.image, updated_at = NOW()
        "#,
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.image)
    .execute(conn)
    .await?;

    Ok(())
}

async fn restaurant_exists(conn: &mut PgConnection, id: Uuid) -> Result<bool, StoreError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM restaurants WHERE restaurant_id = $1)",
    )
    .bind(id)
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

/// 锁住群组行，同一群组的加入与退出因此串行执行
async fn lock_group(conn: &mut PgConnection, id: Uuid) -> Result<Group, StoreError> {
    let row = sqlx::query_as::<_, GroupRow>(&format!(
        "SELECT {} FROM groups WHERE group_id = $1 FOR UPDATE",
        GROUP_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound("group"))?;

    Group::try_from(row)
}

async fn fetch_members(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<Vec<GroupMember>, StoreError> {
    let rows = sqlx::query_as::<_, MemberRow>(
        r#"
        SELECT group_id, user_id, role, joined_at
        FROM group_members
        WHERE group_id = $1
        ORDER BY joined_at ASC, user_id ASC
        "#,
    )
    .bind(group_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(GroupMember::try_from).collect()
}

async fn set_status(
    conn: &mut PgConnection,
    group_id: Uuid,
    status: GroupStatus,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE groups SET status = $2 WHERE group_id = $1")
        .bind(group_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;

    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
        let rows = sqlx::query_as::<_, RestaurantRow>(&format!(
            "SELECT {} FROM restaurants ORDER BY name ASC",
            RESTAURANT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Restaurant::from).collect())
    }

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError> {
        let row = sqlx::query_as::<_, RestaurantRow>(&format!(
            "SELECT {} FROM restaurants WHERE restaurant_id = $1",
            RESTAURANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Restaurant::from))
    }

    async fn create_restaurant(&self, new: NewRestaurant) -> Result<Restaurant, StoreError> {
        let row = sqlx::query_as::<_, RestaurantRow>(&format!(
            r#"
            INSERT INTO restaurants (
                restaurant_id, name, description, address, phone,
                opening_hours, cuisine_type, price_range, rating
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            RESTAURANT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.address)
        .bind(&new.phone)
        .bind(&new.opening_hours)
        .bind(&new.cuisine_type)
        .bind(&new.price_range)
        .bind(new.rating)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn delete_restaurant(&self, id: Uuid) -> Result<Restaurant, StoreError> {
        // 群组、评分、留言由外键 ON DELETE CASCADE 一并删除
        let row = sqlx::query_as::<_, RestaurantRow>(&format!(
            "DELETE FROM restaurants WHERE restaurant_id = $1 RETURNING {}",
            RESTAURANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("restaurant"))?;

        Ok(row.into())
    }

    async fn list_active_groups(&self) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {} FROM groups WHERE status = 'active' ORDER BY start_time ASC",
            GROUP_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        collect_groups(rows)
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {} FROM groups WHERE group_id = $1",
            GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Group::try_from).transpose()
    }

    async fn create_group(
        &self,
        creator: &SessionUser,
        draft: GroupDraft,
    ) -> Result<(Group, GroupMember), StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_user(&mut tx, creator).await?;
        if !restaurant_exists(&mut tx, draft.restaurant_id).await? {
            return Err(StoreError::NotFound("restaurant"));
        }

        let group = draft.into_group(Uuid::new_v4(), creator.id.clone(), Utc::now());
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            r#"
            INSERT INTO groups (
                group_id, name, description, creator_id, restaurant_id, status,
                proposed_budget, food_preference, spoken_language, num_of_people,
                start_time, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            GROUP_COLUMNS
        ))
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.creator_id)
        .bind(group.restaurant_id)
        .bind(group.status.as_str())
        .bind(&group.proposed_budget)
        .bind(&group.food_preference)
        .bind(&group.spoken_language)
        .bind(group.num_of_people)
        .bind(group.start_time)
        .bind(group.created_at)
        .fetch_one(&mut *tx)
        .await?;

        // 创建群组的同时把创建者设为管理员
        let admin = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO group_members (group_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING group_id, user_id, role, joined_at
            "#,
        )
        .bind(group.id)
        .bind(&creator.id)
        .bind(MemberRole::Admin.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((Group::try_from(row)?, GroupMember::try_from(admin)?))
    }

    async fn update_group(
        &self,
        id: Uuid,
        requester_id: &str,
        draft: GroupDraft,
    ) -> Result<Group, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut group = lock_group(&mut tx, id).await?;
        let members = fetch_members(&mut tx, id).await?;
        let status = plan_update(&group, requester_id, &draft, members.len() as i64)?;

        if draft.restaurant_id != group.restaurant_id
            && !restaurant_exists(&mut tx, draft.restaurant_id).await?
        {
            return Err(StoreError::NotFound("restaurant"));
        }
        draft.apply_to(&mut group, status);

        let row = sqlx::query_as::<_, GroupRow>(&format!(
            r#"
            UPDATE groups
            SET name = $2, description = $3, restaurant_id = $4, status = $5,
                proposed_budget = $6, food_preference = $7, spoken_language = $8,
                num_of_people = $9, start_time = $10
            WHERE group_id = $1
            RETURNING {}
            "#,
            GROUP_COLUMNS
        ))
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.restaurant_id)
        .bind(group.status.as_str())
        .bind(&group.proposed_budget)
        .bind(&group.food_preference)
        .bind(&group.spoken_language)
        .bind(group.num_of_people)
        .bind(group.start_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Group::try_from(row)
    }

    async fn depart_group(
        &self,
        id: Uuid,
        actor_id: &str,
        departure: Departure,
    ) -> Result<DeparturePlan, StoreError> {
        let mut tx = self.pool.begin().await?;

        let group = lock_group(&mut tx, id).await?;
        let members = fetch_members(&mut tx, id).await?;
        let plan = plan_departure(&members, actor_id, &departure)?;

        match &plan {
            DeparturePlan::DeleteGroup => {
                // group_members 通过 ON DELETE CASCADE 一并删除
                sqlx::query("DELETE FROM groups WHERE group_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            DeparturePlan::Remove { user_id } => {
                sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
            DeparturePlan::HandOff {
                successor,
                outgoing,
            } => {
                // 先提升再移除，两步在同一事务里
                sqlx::query(
                    "UPDATE group_members SET role = $3 WHERE group_id = $1 AND user_id = $2",
                )
                .bind(id)
                .bind(successor)
                .bind(MemberRole::Admin.as_str())
                .execute(&mut *tx)
                .await?;

                sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(outgoing)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        if plan != DeparturePlan::DeleteGroup {
            let remaining = plan.remaining(members.len()) as i64;
            let status = status_after_departure(group.status, group.num_of_people, remaining);
            if status != group.status {
                set_status(&mut tx, id, status).await?;
            }
        }

        tx.commit().await?;

        tracing::debug!(group_id = %id, actor = actor_id, ?plan, "group departure applied");
        Ok(plan)
    }

    async fn join_group(&self, id: Uuid, user: &SessionUser) -> Result<GroupMember, StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_user(&mut tx, user).await?;
        let group = lock_group(&mut tx, id).await?;
        let members = fetch_members(&mut tx, id).await?;

        match plan_join(&group, &members, &user.id)? {
            JoinDecision::RejectFull => {
                if group.status != GroupStatus::Full {
                    set_status(&mut tx, id, GroupStatus::Full).await?;
                    tx.commit().await?;
                }
                Err(RuleViolation::GroupFull.into())
            }
            JoinDecision::Admit { status_after } => {
                let row = sqlx::query_as::<_, MemberRow>(
                    r#"
                    INSERT INTO group_members (group_id, user_id, role, joined_at)
                    VALUES ($1, $2, $3, NOW())
                    RETURNING group_id, user_id, role, joined_at
                    "#,
                )
                .bind(id)
                .bind(&user.id)
                .bind(MemberRole::Member.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| unique_violation_as(e, RuleViolation::AlreadyMember))?;

                if status_after != group.status {
                    set_status(&mut tx, id, status_after).await?;
                }
                tx.commit().await?;

                GroupMember::try_from(row)
            }
        }
    }

    async fn list_members(&self, id: Uuid) -> Result<Vec<MemberProfile>, StoreError> {
        let rows = sqlx::query_as::<_, MemberProfileRow>(
            r#"
            SELECT m.group_id, m.user_id, m.role, m.joined_at,
                   u.name AS user_name, u.image AS user_image
            FROM group_members m
            JOIN users u ON u.user_id = m.user_id
            WHERE m.group_id = $1
            ORDER BY m.joined_at ASC, m.user_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MemberProfile {
                    member: GroupMember::try_from(row.member)?,
                    user_name: row.user_name,
                    user_image: row.user_image,
                })
            })
            .collect()
    }

    async fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT g.group_id, g.name, g.description, g.creator_id, g.restaurant_id, g.status,
                   g.proposed_budget, g.food_preference, g.spoken_language, g.num_of_people,
                   g.start_time, g.created_at
            FROM groups g
            JOIN group_members m ON m.group_id = g.group_id
            WHERE m.user_id = $1
            ORDER BY g.start_time ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        collect_groups(rows)
    }

    async fn submit_rating(
        &self,
        user: &SessionUser,
        restaurant_id: Uuid,
        score: i32,
    ) -> Result<Rating, StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_user(&mut tx, user).await?;
        if !restaurant_exists(&mut tx, restaurant_id).await? {
            return Err(StoreError::NotFound("restaurant"));
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM ratings WHERE user_id = $1 AND restaurant_id = $2)",
        )
        .bind(&user.id)
        .bind(restaurant_id)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(RuleViolation::AlreadyRated.into());
        }

        // 并发提交时由唯一索引兜底
        let row = sqlx::query_as::<_, RatingRow>(
            r#"
            INSERT INTO ratings (rating_id, user_id, restaurant_id, score, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING rating_id, user_id, restaurant_id, score, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.id)
        .bind(restaurant_id)
        .bind(score)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation_as(e, RuleViolation::AlreadyRated))?;

        tx.commit().await?;

        Ok(row.into())
    }

    async fn find_rating(
        &self,
        restaurant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Rating>, StoreError> {
        let row = sqlx::query_as::<_, RatingRow>(
            r#"
            SELECT rating_id, user_id, restaurant_id, score, created_at
            FROM ratings
            WHERE restaurant_id = $1 AND user_id = $2
            "#,
        )
        .bind(restaurant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Rating::from))
    }

    async fn rating_summary(&self, restaurant_id: Uuid) -> Result<RatingSummary, StoreError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT AVG(score)::DOUBLE PRECISION AS average, COUNT(*) AS count
            FROM ratings
            WHERE restaurant_id = $1
            "#,
        )
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RatingSummary {
            average: row.average,
            count: row.count,
        })
    }

    async fn submit_comment(
        &self,
        user: &SessionUser,
        restaurant_id: Uuid,
        content: &str,
    ) -> Result<Comment, StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_user(&mut tx, user).await?;
        if !restaurant_exists(&mut tx, restaurant_id).await? {
            return Err(StoreError::NotFound("restaurant"));
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM comments WHERE user_id = $1 AND restaurant_id = $2)",
        )
        .bind(&user.id)
        .bind(restaurant_id)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(RuleViolation::AlreadyCommented.into());
        }

        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (comment_id, user_id, restaurant_id, content, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING comment_id, user_id, restaurant_id, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.id)
        .bind(restaurant_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation_as(e, RuleViolation::AlreadyCommented))?;

        tx.commit().await?;

        Ok(row.into())
    }

    async fn find_comment(
        &self,
        restaurant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Comment>, StoreError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT comment_id, user_id, restaurant_id, content, created_at
            FROM comments
            WHERE restaurant_id = $1 AND user_id = $2
            "#,
        )
        .bind(restaurant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Comment::from))
    }

    async fn list_comments(&self, restaurant_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT comment_id, user_id, restaurant_id, content, created_at
            FROM comments
            WHERE restaurant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }
}
