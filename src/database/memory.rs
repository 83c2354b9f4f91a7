use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::group::{plan_update, status_after_departure};
use crate::models::membership::{plan_departure, plan_join};
use crate::models::{
    Comment, Departure, DeparturePlan, Group, GroupDraft, GroupMember, GroupStatus, JoinDecision,
    MemberProfile, MemberRole, NewRestaurant, Rating, RatingSummary, Restaurant, RuleViolation,
    SessionUser,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, SessionUser>,
    restaurants: HashMap<Uuid, Restaurant>,
    groups: HashMap<Uuid, Group>,
    members: Vec<GroupMember>,
    ratings: Vec<Rating>,
    comments: Vec<Comment>,
}

impl MemoryState {
    fn remember(&mut self, user: &SessionUser) {
        self.users.insert(user.id.clone(), user.clone());
    }

    fn group(&self, id: Uuid) -> Result<&Group, StoreError> {
        self.groups.get(&id).ok_or(StoreError::NotFound("group"))
    }

    fn members_of(&self, group_id: Uuid) -> Vec<GroupMember> {
        let mut members: Vec<GroupMember> = self
            .members
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        members
    }

    fn set_status(&mut self, group_id: Uuid, status: GroupStatus) {
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.status = status;
        }
    }

    fn remove_member(&mut self, group_id: Uuid, user_id: &str) {
        self.members
            .retain(|m| !(m.group_id == group_id && m.user_id == user_id));
    }

    fn delete_group(&mut self, group_id: Uuid) {
        self.groups.remove(&group_id);
        self.members.retain(|m| m.group_id != group_id);
    }
}

/// 进程内存储，用于测试与本地演示；所有操作在同一把锁下执行
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
        let state = self.state.lock().await;
        let mut restaurants: Vec<Restaurant> = state.restaurants.values().cloned().collect();
        restaurants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(restaurants)
    }

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError> {
        Ok(self.state.lock().await.restaurants.get(&id).cloned())
    }

    async fn create_restaurant(&self, new: NewRestaurant) -> Result<Restaurant, StoreError> {
        let restaurant = new.into_restaurant(Uuid::new_v4());
        self.state
            .lock()
            .await
            .restaurants
            .insert(restaurant.id, restaurant.clone());
        Ok(restaurant)
    }

    async fn delete_restaurant(&self, id: Uuid) -> Result<Restaurant, StoreError> {
        let mut state = self.state.lock().await;
        let restaurant = state
            .restaurants
            .remove(&id)
            .ok_or(StoreError::NotFound("restaurant"))?;

        let doomed: Vec<Uuid> = state
            .groups
            .values()
            .filter(|g| g.restaurant_id == id)
            .map(|g| g.id)
            .collect();
        for group_id in doomed {
            state.delete_group(group_id);
        }
        state.ratings.retain(|r| r.restaurant_id != id);
        state.comments.retain(|c| c.restaurant_id != id);

        Ok(restaurant)
    }

    async fn list_active_groups(&self) -> Result<Vec<Group>, StoreError> {
        let state = self.state.lock().await;
        let mut groups: Vec<Group> = state
            .groups
            .values()
            .filter(|g| g.status == GroupStatus::Active)
            .cloned()
            .collect();
        groups.sort_by_key(|g| g.start_time);
        Ok(groups)
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>, StoreError> {
        Ok(self.state.lock().await.groups.get(&id).cloned())
    }

    async fn create_group(
        &self,
        creator: &SessionUser,
        draft: GroupDraft,
    ) -> Result<(Group, GroupMember), StoreError> {
        let mut state = self.state.lock().await;
        if !state.restaurants.contains_key(&draft.restaurant_id) {
            return Err(StoreError::NotFound("restaurant"));
        }
        state.remember(creator);

        let now = Utc::now();
        let group = draft.into_group(Uuid::new_v4(), creator.id.clone(), now);
        let admin = GroupMember {
            group_id: group.id,
            user_id: creator.id.clone(),
            role: MemberRole::Admin,
            joined_at: now,
        };
        state.groups.insert(group.id, group.clone());
        state.members.push(admin.clone());

        Ok((group, admin))
    }

    async fn update_group(
        &self,
        id: Uuid,
        requester_id: &str,
        draft: GroupDraft,
    ) -> Result<Group, StoreError> {
        let mut state = self.state.lock().await;
        let mut group = state.group(id)?.clone();
        let member_count = state.members_of(id).len() as i64;
        let status = plan_update(&group, requester_id, &draft, member_count)?;
        if !state.restaurants.contains_key(&draft.restaurant_id) {
            return Err(StoreError::NotFound("restaurant"));
        }

        draft.apply_to(&mut group, status);
        state.groups.insert(id, group.clone());
        Ok(group)
    }

    async fn depart_group(
        &self,
        id: Uuid,
        actor_id: &str,
        departure: Departure,
    ) -> Result<DeparturePlan, StoreError> {
        let mut state = self.state.lock().await;
        let group = state.group(id)?.clone();
        let members = state.members_of(id);
        let plan = plan_departure(&members, actor_id, &departure)?;

        match &plan {
            DeparturePlan::DeleteGroup => state.delete_group(id),
            DeparturePlan::Remove { user_id } => state.remove_member(id, user_id),
            DeparturePlan::HandOff {
                successor,
                outgoing,
            } => {
                if let Some(next) = state
                    .members
                    .iter_mut()
                    .find(|m| m.group_id == id && &m.user_id == successor)
                {
                    next.role = MemberRole::Admin;
                }
                state.remove_member(id, outgoing);
            }
        }

        if plan != DeparturePlan::DeleteGroup {
            let remaining = plan.remaining(members.len()) as i64;
            state.set_status(
                id,
                status_after_departure(group.status, group.num_of_people, remaining),
            );
        }

        Ok(plan)
    }

    async fn join_group(&self, id: Uuid, user: &SessionUser) -> Result<GroupMember, StoreError> {
        let mut state = self.state.lock().await;
        let group = state.group(id)?.clone();
        let members = state.members_of(id);

        match plan_join(&group, &members, &user.id)? {
            JoinDecision::RejectFull => {
                state.set_status(id, GroupStatus::Full);
                Err(RuleViolation::GroupFull.into())
            }
            JoinDecision::Admit { status_after } => {
                state.remember(user);
                let member = GroupMember {
                    group_id: id,
                    user_id: user.id.clone(),
                    role: MemberRole::Member,
                    joined_at: Utc::now(),
                };
                state.members.push(member.clone());
                state.set_status(id, status_after);
                Ok(member)
            }
        }
    }

    async fn list_members(&self, id: Uuid) -> Result<Vec<MemberProfile>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .members_of(id)
            .into_iter()
            .map(|member| {
                let user = state.users.get(&member.user_id);
                MemberProfile {
                    user_name: user.map(|u| u.name.clone()).unwrap_or_default(),
                    user_image: user.and_then(|u| u.image.clone()),
                    member,
                }
            })
            .collect())
    }

    async fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, StoreError> {
        let state = self.state.lock().await;
        let mut groups: Vec<Group> = state
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| state.groups.get(&m.group_id).cloned())
            .collect();
        groups.sort_by_key(|g| g.start_time);
        Ok(groups)
    }

    async fn submit_rating(
        &self,
        user: &SessionUser,
        restaurant_id: Uuid,
        score: i32,
    ) -> Result<Rating, StoreError> {
        let mut state = self.state.lock().await;
        if !state.restaurants.contains_key(&restaurant_id) {
            return Err(StoreError::NotFound("restaurant"));
        }
        if state
            .ratings
            .iter()
            .any(|r| r.restaurant_id == restaurant_id && r.user_id == user.id)
        {
            return Err(RuleViolation::AlreadyRated.into());
        }

        state.remember(user);
        let rating = Rating {
            id: Uuid::new_v4(),
            user_id: user.id.clone(),
            restaurant_id,
            score,
            created_at: Utc::now(),
        };
        state.ratings.push(rating.clone());
        Ok(rating)
    }

    async fn find_rating(
        &self,
        restaurant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Rating>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .ratings
            .iter()
            .find(|r| r.restaurant_id == restaurant_id && r.user_id == user_id)
            .cloned())
    }

    async fn rating_summary(&self, restaurant_id: Uuid) -> Result<RatingSummary, StoreError> {
        let state = self.state.lock().await;
        Ok(RatingSummary::from_scores(
            state
                .ratings
                .iter()
                .filter(|r| r.restaurant_id == restaurant_id)
                .map(|r| r.score),
        ))
    }

    async fn submit_comment(
        &self,
        user: &SessionUser,
        restaurant_id: Uuid,
        content: &str,
    ) -> Result<Comment, StoreError> {
        let mut state = self.state.lock().await;
        if !state.restaurants.contains_key(&restaurant_id) {
            return Err(StoreError::NotFound("restaurant"));
        }
        if state
            .comments
            .iter()
            .any(|c| c.restaurant_id == restaurant_id && c.user_id == user.id)
        {
            return Err(RuleViolation::AlreadyCommented.into());
        }

        state.remember(user);
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id: user.id.clone(),
            restaurant_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comment(
        &self,
        restaurant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Comment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .iter()
            .find(|c| c.restaurant_id == restaurant_id && c.user_id == user_id)
            .cloned())
    }

    async fn list_comments(&self, restaurant_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        // 同一时刻写入的留言保持后写在前
        comments.reverse();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(id: &str) -> SessionUser {
        SessionUser {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: format!("{}@example.com", id),
            image: None,
            role: None,
        }
    }

    async fn seeded() -> (MemoryStore, Restaurant) {
        let store = MemoryStore::new();
        let restaurant = store
            .create_restaurant(NewRestaurant {
                name: "Pho 88".into(),
                description: "Vietnamese noodles".into(),
                address: "10 Xining S Rd".into(),
                phone: "02-5555-7777".into(),
                opening_hours: "09:00-20:00".into(),
                cuisine_type: "Vietnamese".into(),
                price_range: "$".into(),
                rating: 4,
            })
            .await
            .unwrap();
        (store, restaurant)
    }

    fn draft(restaurant_id: Uuid, capacity: i32) -> GroupDraft {
        GroupDraft {
            name: "Noodle lunch".into(),
            description: Some("slurp".into()),
            restaurant_id,
            proposed_budget: Some("300".into()),
            food_preference: None,
            spoken_language: Some("en".into()),
            num_of_people: capacity,
            start_time: Utc::now() + Duration::days(1),
            status: None,
        }
    }

    async fn count_members(store: &MemoryStore, group_id: Uuid) -> usize {
        store.list_members(group_id).await.unwrap().len()
    }

    #[tokio::test]
    async fn create_group_makes_creator_admin() {
        let (store, restaurant) = seeded().await;
        let (group, admin) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();

        assert_eq!(group.creator_id, "alice");
        assert_eq!(group.status, GroupStatus::Active);
        assert_eq!(admin.role, MemberRole::Admin);

        let members = store.list_members(group.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_name, "ALICE");
    }

    #[tokio::test]
    async fn create_group_for_unknown_restaurant_fails() {
        let (store, _) = seeded().await;
        let err = store
            .create_group(&user("alice"), draft(Uuid::new_v4(), 4))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("restaurant")));
    }

    #[tokio::test]
    async fn join_to_full_scenario() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 2))
            .await
            .unwrap();

        store.join_group(group.id, &user("bob")).await.unwrap();
        assert_eq!(count_members(&store, group.id).await, 2);
        let status = store.find_group(group.id).await.unwrap().unwrap().status;
        assert_eq!(status, GroupStatus::Full);

        let err = store.join_group(group.id, &user("carol")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rule(RuleViolation::GroupFull)));
        assert_eq!(count_members(&store, group.id).await, 2);
    }

    #[tokio::test]
    async fn capacity_holds_under_concurrent_joins() {
        let (store, restaurant) = seeded().await;
        let store = std::sync::Arc::new(store);
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 3))
            .await
            .unwrap();

        let group_id = group.id;
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .join_group(group_id, &user(&format!("guest{}", i)))
                    .await
                    .is_ok()
            }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 2);
        assert_eq!(store.list_members(group_id).await.unwrap().len(), 3);
        let status = store.find_group(group_id).await.unwrap().unwrap().status;
        assert_eq!(status, GroupStatus::Full);
    }

    #[tokio::test]
    async fn duplicate_join_is_rejected() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();

        let err = store.join_group(group.id, &user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rule(RuleViolation::AlreadyMember)));
        assert_eq!(count_members(&store, group.id).await, 1);
    }

    #[tokio::test]
    async fn assign_leaves_exactly_one_new_admin() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();
        store.join_group(group.id, &user("bob")).await.unwrap();
        store.join_group(group.id, &user("carol")).await.unwrap();

        let plan = store
            .depart_group(group.id, "alice", Departure::Assign { successor: None })
            .await
            .unwrap();
        assert_eq!(
            plan,
            DeparturePlan::HandOff {
                successor: "bob".into(),
                outgoing: "alice".into(),
            }
        );

        let members = store.list_members(group.id).await.unwrap();
        let admins: Vec<_> = members.iter().filter(|m| m.member.is_admin()).collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].member.user_id, "bob");
        assert!(members.iter().all(|m| m.member.user_id != "alice"));
    }

    #[tokio::test]
    async fn sole_admin_assign_is_an_error_and_changes_nothing() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();

        let err = store
            .depart_group(group.id, "alice", Departure::Assign { successor: None })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rule(RuleViolation::NoSuccessor)));
        assert!(store.find_group(group.id).await.unwrap().is_some());
        assert_eq!(count_members(&store, group.id).await, 1);
    }

    #[tokio::test]
    async fn delete_cascades_to_all_members() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();
        store.join_group(group.id, &user("bob")).await.unwrap();
        store.join_group(group.id, &user("carol")).await.unwrap();

        store
            .depart_group(group.id, "alice", Departure::Delete)
            .await
            .unwrap();

        assert!(store.find_group(group.id).await.unwrap().is_none());
        assert_eq!(count_members(&store, group.id).await, 0);
        for id in ["alice", "bob", "carol"] {
            assert!(store.list_user_groups(id).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn leaving_full_group_reopens_it() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 2))
            .await
            .unwrap();
        store.join_group(group.id, &user("bob")).await.unwrap();

        store
            .depart_group(group.id, "bob", Departure::Leave)
            .await
            .unwrap();

        let group = store.find_group(group.id).await.unwrap().unwrap();
        assert_eq!(group.status, GroupStatus::Active);
        store.join_group(group.id, &user("carol")).await.unwrap();
    }

    #[tokio::test]
    async fn update_rules_apply() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();

        let err = store
            .update_group(group.id, "bob", draft(restaurant.id, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rule(RuleViolation::NotCreator)));

        let mut changes = draft(restaurant.id, 6);
        changes.name = "Noodle dinner".into();
        let updated = store.update_group(group.id, "alice", changes).await.unwrap();
        assert_eq!(updated.name, "Noodle dinner");
        assert_eq!(updated.num_of_people, 6);

        let mut finish = draft(restaurant.id, 6);
        finish.status = Some(GroupStatus::Completed);
        store.update_group(group.id, "alice", finish).await.unwrap();
        let err = store
            .update_group(group.id, "alice", draft(restaurant.id, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rule(RuleViolation::GroupClosed)));
    }

    #[tokio::test]
    async fn last_admin_leaving_hands_group_to_earliest_member() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();
        store.join_group(group.id, &user("bob")).await.unwrap();
        store.join_group(group.id, &user("carol")).await.unwrap();

        let plan = store
            .depart_group(group.id, "alice", Departure::Leave)
            .await
            .unwrap();
        assert_eq!(
            plan,
            DeparturePlan::HandOff {
                successor: "bob".into(),
                outgoing: "alice".into(),
            }
        );

        let members = store.list_members(group.id).await.unwrap();
        assert_eq!(members.len(), 2);
        let bob = members.iter().find(|m| m.member.user_id == "bob").unwrap();
        assert_eq!(bob.member.role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn assign_to_named_member() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();
        store.join_group(group.id, &user("bob")).await.unwrap();
        store.join_group(group.id, &user("carol")).await.unwrap();

        let err = store
            .depart_group(
                group.id,
                "alice",
                Departure::Assign {
                    successor: Some("mallory".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(RuleViolation::TargetNotMember(_))
        ));
        assert_eq!(count_members(&store, group.id).await, 3);

        store
            .depart_group(
                group.id,
                "alice",
                Departure::Assign {
                    successor: Some("carol".into()),
                },
            )
            .await
            .unwrap();
        let members = store.list_members(group.id).await.unwrap();
        let admins: Vec<_> = members.iter().filter(|m| m.member.is_admin()).collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].member.user_id, "carol");
    }

    #[tokio::test]
    async fn outsider_cannot_delete_group() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();

        let err = store
            .depart_group(group.id, "mallory", Departure::Delete)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rule(RuleViolation::NotMember)));
        assert!(store.find_group(group.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_members() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();
        store.join_group(group.id, &user("bob")).await.unwrap();
        store.join_group(group.id, &user("carol")).await.unwrap();

        let err = store
            .update_group(group.id, "alice", draft(restaurant.id, 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(RuleViolation::CapacityBelowMembers(3))
        ));

        let shrunk = store
            .update_group(group.id, "alice", draft(restaurant.id, 3))
            .await
            .unwrap();
        assert_eq!(shrunk.status, GroupStatus::Full);
    }

    #[tokio::test]
    async fn second_rating_and_comment_are_rejected() {
        let (store, restaurant) = seeded().await;
        let alice = user("alice");

        store.submit_rating(&alice, restaurant.id, 5).await.unwrap();
        let err = store
            .submit_rating(&alice, restaurant.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rule(RuleViolation::AlreadyRated)));
        let summary = store.rating_summary(restaurant.id).await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, Some(5.0));

        store
            .submit_comment(&alice, restaurant.id, "great broth")
            .await
            .unwrap();
        let err = store
            .submit_comment(&alice, restaurant.id, "again")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(RuleViolation::AlreadyCommented)
        ));
        assert_eq!(store.list_comments(restaurant.id).await.unwrap().len(), 1);
        let mine = store
            .find_comment(restaurant.id, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mine.content, "great broth");
    }

    #[tokio::test]
    async fn deleting_restaurant_cascades() {
        let (store, restaurant) = seeded().await;
        let (group, _) = store
            .create_group(&user("alice"), draft(restaurant.id, 4))
            .await
            .unwrap();
        store
            .submit_rating(&user("bob"), restaurant.id, 3)
            .await
            .unwrap();

        let deleted = store.delete_restaurant(restaurant.id).await.unwrap();
        assert_eq!(deleted.name, "Pho 88");
        assert!(store.find_group(group.id).await.unwrap().is_none());
        assert!(store.find_rating(restaurant.id, "bob").await.unwrap().is_none());
        assert!(matches!(
            store.delete_restaurant(restaurant.id).await,
            Err(StoreError::NotFound("restaurant"))
        ));
    }
}
