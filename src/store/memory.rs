// In-memory store. Backs the test suite and the default server when no
// DATABASE_URL is configured. Writes go through the same validate-then-apply
// staging as the Postgres store: the whole batch is checked against the
// constraint set before the first row mutates.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{
    Comment, Community, FollowEdge, FollowStatus, Id, Like, Membership, Notification, Post, User,
};

use super::{SnowflakeIdGenerator, SocialStore, WriteBatch, WriteOp};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Id, User>,
    follows: HashMap<(Id, Id), FollowEdge>,
    posts: HashMap<Id, Post>,
    comments: HashMap<Id, Comment>,
    communities: HashMap<Id, Community>,
    memberships: HashMap<(Id, Id), Membership>,
    likes: HashMap<(Id, Id), Like>,
    notifications: Vec<Notification>,
    /// Remaining CAS attempts to fail deliberately (conflict injection).
    forced_conflicts: u32,
}

/// Overlay of rows staged by earlier ops in the same batch, so a later op
/// can reference them (community + admin membership in one batch).
#[derive(Default)]
struct Staged {
    users: HashSet<Id>,
    removed_users: HashSet<Id>,
    usernames: HashSet<String>,
    follows: HashSet<(Id, Id)>,
    posts: HashSet<Id>,
    removed_posts: HashSet<Id>,
    /// staged comment id -> post id, for same-post parent checks.
    comments: HashMap<Id, Id>,
    communities: HashSet<Id>,
    memberships: HashSet<(Id, Id)>,
    likes: HashSet<(Id, Id)>,
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    ids: SnowflakeIdGenerator,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ids: SnowflakeIdGenerator::new(0),
        }
    }

    /// Make the next `n` member-count CAS attempts fail with a conflict,
    /// regardless of version. Exercises the bounded retry path.
    pub fn force_counter_conflicts(&self, n: u32) {
        if let Ok(mut inner) = self.inner.write() {
            inner.forced_conflicts = n;
        }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))
    }
}

impl Inner {
    fn user_exists(&self, id: Id, staged: &Staged) -> bool {
        (self.users.contains_key(&id) && !staged.removed_users.contains(&id))
            || staged.users.contains(&id)
    }

    fn post_exists(&self, id: Id, staged: &Staged) -> bool {
        (self.posts.contains_key(&id) && !staged.removed_posts.contains(&id))
            || staged.posts.contains(&id)
    }

    fn community_exists(&self, id: Id, staged: &Staged) -> bool {
        self.communities.contains_key(&id) || staged.communities.contains(&id)
    }

    /// Validate the whole batch before mutating anything. Invalid input
    /// never produces a partial write.
    fn validate(&self, ops: &[WriteOp]) -> AppResult<()> {
        let mut staged = Staged::default();

        for op in ops {
            match op {
                WriteOp::InsertUser(user) => {
                    if user.username.trim().is_empty() {
                        return Err(AppError::Validation("username must not be empty".to_string()));
                    }
                    let taken = self
                        .users
                        .values()
                        .any(|u| u.username == user.username && !staged.removed_users.contains(&u.id))
                        || staged.usernames.contains(&user.username);
                    if taken {
                        return Err(AppError::Validation(format!(
                            "username '{}' already exists",
                            user.username
                        )));
                    }
                    staged.users.insert(user.id);
                    staged.usernames.insert(user.username.clone());
                }
                WriteOp::UpdateUser(user) => {
                    if !self.user_exists(user.id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", user.id)));
                    }
                }
                WriteOp::DeleteUser(id) => {
                    if !self.user_exists(*id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", id)));
                    }
                    staged.removed_users.insert(*id);
                }
                WriteOp::InsertFollow(edge) => {
                    if edge.follower_id == edge.following_id {
                        return Err(AppError::InvalidEdge(format!(
                            "user {} cannot follow themselves",
                            edge.follower_id
                        )));
                    }
                    if !self.user_exists(edge.follower_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", edge.follower_id)));
                    }
                    if !self.user_exists(edge.following_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", edge.following_id)));
                    }
                    let key = (edge.follower_id, edge.following_id);
                    if self.follows.contains_key(&key) || staged.follows.contains(&key) {
                        return Err(AppError::InvalidEdge(format!(
                            "follow {} -> {} already exists",
                            edge.follower_id, edge.following_id
                        )));
                    }
                    staged.follows.insert(key);
                }
                WriteOp::SetFollowStatus {
                    follower_id,
                    following_id,
                    ..
                } => {
                    let key = (*follower_id, *following_id);
                    match self.follows.get(&key) {
                        None if !staged.follows.contains(&key) => {
                            return Err(AppError::NotFound(format!(
                                "follow {} -> {}",
                                follower_id, following_id
                            )));
                        }
                        Some(edge) if edge.status != FollowStatus::Pending => {
                            return Err(AppError::InvalidEdge(format!(
                                "follow {} -> {} is already {}",
                                follower_id,
                                following_id,
                                edge.status.as_str()
                            )));
                        }
                        _ => {}
                    }
                }
                WriteOp::InsertPost(post) => {
                    if !self.user_exists(post.author_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", post.author_id)));
                    }
                    if let Some(cid) = post.community_id {
                        if !self.community_exists(cid, &staged) {
                            return Err(AppError::NotFound(format!("community {}", cid)));
                        }
                    }
                    if !post.has_body() {
                        return Err(AppError::ConstraintViolation(format!(
                            "post {} must have content or media",
                            post.id
                        )));
                    }
                    staged.posts.insert(post.id);
                }
                WriteOp::UpdatePost(post) => {
                    if !self.post_exists(post.id, &staged) {
                        return Err(AppError::NotFound(format!("post {}", post.id)));
                    }
                    if !post.has_body() {
                        return Err(AppError::ConstraintViolation(format!(
                            "post {} must have content or media",
                            post.id
                        )));
                    }
                }
                WriteOp::DeletePost(id) => {
                    if !self.post_exists(*id, &staged) {
                        return Err(AppError::NotFound(format!("post {}", id)));
                    }
                    staged.removed_posts.insert(*id);
                }
                WriteOp::InsertComment(comment) => {
                    if comment.content.trim().is_empty() {
                        return Err(AppError::Validation(format!(
                            "comment {} must have content",
                            comment.id
                        )));
                    }
                    if !self.user_exists(comment.author_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", comment.author_id)));
                    }
                    if !self.post_exists(comment.post_id, &staged) {
                        return Err(AppError::NotFound(format!("post {}", comment.post_id)));
                    }
                    if let Some(parent_id) = comment.parent_id {
                        let parent_post = self
                            .comments
                            .get(&parent_id)
                            .map(|c| c.post_id)
                            .or_else(|| staged.comments.get(&parent_id).copied());
                        match parent_post {
                            None => {
                                return Err(AppError::NotFound(format!("comment {}", parent_id)));
                            }
                            Some(pid) if pid != comment.post_id => {
                                return Err(AppError::ConstraintViolation(format!(
                                    "comment {} parent {} belongs to another post",
                                    comment.id, parent_id
                                )));
                            }
                            _ => {}
                        }
                    }
                    staged.comments.insert(comment.id, comment.post_id);
                }
                WriteOp::InsertCommunity(community) => {
                    if community.name.trim().is_empty() {
                        return Err(AppError::Validation("community name must not be empty".to_string()));
                    }
                    if !self.user_exists(community.creator_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", community.creator_id)));
                    }
                    staged.communities.insert(community.id);
                }
                WriteOp::InsertMembership(membership) => {
                    if !self.community_exists(membership.community_id, &staged) {
                        return Err(AppError::NotFound(format!(
                            "community {}",
                            membership.community_id
                        )));
                    }
                    if !self.user_exists(membership.user_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", membership.user_id)));
                    }
                    let key = (membership.community_id, membership.user_id);
                    if self.memberships.contains_key(&key) || staged.memberships.contains(&key) {
                        return Err(AppError::InvalidEdge(format!(
                            "user {} is already a member of community {}",
                            membership.user_id, membership.community_id
                        )));
                    }
                    staged.memberships.insert(key);
                }
                WriteOp::DeleteMembership {
                    community_id,
                    user_id,
                } => {
                    let key = (*community_id, *user_id);
                    if !self.memberships.contains_key(&key) && !staged.memberships.contains(&key) {
                        return Err(AppError::NotFound(format!(
                            "membership of user {} in community {}",
                            user_id, community_id
                        )));
                    }
                }
                WriteOp::InsertLike(like) => {
                    if !self.user_exists(like.user_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", like.user_id)));
                    }
                    if !self.post_exists(like.post_id, &staged) {
                        return Err(AppError::NotFound(format!("post {}", like.post_id)));
                    }
                    let key = (like.post_id, like.user_id);
                    if self.likes.contains_key(&key) || staged.likes.contains(&key) {
                        return Err(AppError::InvalidEdge(format!(
                            "user {} already liked post {}",
                            like.user_id, like.post_id
                        )));
                    }
                    staged.likes.insert(key);
                }
                WriteOp::DeleteLike { post_id, user_id } => {
                    let key = (*post_id, *user_id);
                    if !self.likes.contains_key(&key) && !staged.likes.contains(&key) {
                        return Err(AppError::NotFound(format!(
                            "like by user {} on post {}",
                            user_id, post_id
                        )));
                    }
                }
                WriteOp::InsertNotification(n) => {
                    if !self.user_exists(n.recipient_id, &staged) {
                        return Err(AppError::NotFound(format!("user {}", n.recipient_id)));
                    }
                }
                WriteOp::FailPoint(reason) => {
                    return Err(AppError::Internal(format!("injected failure: {}", reason)));
                }
            }
        }

        Ok(())
    }

    /// Second pass: every op validated, mutate for real.
    fn commit(&mut self, ops: Vec<WriteOp>) {
        for op in ops {
            match op {
                WriteOp::InsertUser(user) => {
                    self.users.insert(user.id, user);
                }
                WriteOp::UpdateUser(user) => {
                    self.users.insert(user.id, user);
                }
                WriteOp::DeleteUser(id) => self.cascade_delete_user(id),
                WriteOp::InsertFollow(edge) => {
                    self.follows
                        .insert((edge.follower_id, edge.following_id), edge);
                }
                WriteOp::SetFollowStatus {
                    follower_id,
                    following_id,
                    status,
                } => {
                    if let Some(edge) = self.follows.get_mut(&(follower_id, following_id)) {
                        edge.status = status;
                    }
                }
                WriteOp::InsertPost(post) | WriteOp::UpdatePost(post) => {
                    self.posts.insert(post.id, post);
                }
                WriteOp::DeletePost(id) => self.cascade_delete_post(id),
                WriteOp::InsertComment(comment) => {
                    self.comments.insert(comment.id, comment);
                }
                WriteOp::InsertCommunity(community) => {
                    self.communities.insert(community.id, community);
                }
                WriteOp::InsertMembership(membership) => {
                    self.memberships
                        .insert((membership.community_id, membership.user_id), membership);
                }
                WriteOp::DeleteMembership {
                    community_id,
                    user_id,
                } => {
                    self.memberships.remove(&(community_id, user_id));
                }
                WriteOp::InsertLike(like) => {
                    self.likes.insert((like.post_id, like.user_id), like);
                }
                WriteOp::DeleteLike { post_id, user_id } => {
                    self.likes.remove(&(post_id, user_id));
                }
                WriteOp::InsertNotification(n) => {
                    self.notifications.push(n);
                }
                WriteOp::FailPoint(_) => unreachable!("failpoint survives validation"),
            }
        }
    }

    /// Account removal cascades to owned edges and content.
    fn cascade_delete_user(&mut self, id: Id) {
        self.users.remove(&id);
        self.follows
            .retain(|(f, t), _| *f != id && *t != id);

        let owned_posts: Vec<Id> = self
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in owned_posts {
            self.cascade_delete_post(post_id);
        }

        self.comments.retain(|_, c| c.author_id != id);
        self.likes.retain(|(_, uid), _| *uid != id);
        self.notifications
            .retain(|n| n.recipient_id != id && n.actor_id != id);

        let memberships: Vec<Id> = self
            .memberships
            .keys()
            .filter(|(_, uid)| *uid == id)
            .map(|(cid, _)| *cid)
            .collect();
        for community_id in memberships {
            self.memberships.remove(&(community_id, id));
            if let Some(c) = self.communities.get_mut(&community_id) {
                c.member_count -= 1;
                c.version += 1;
            }
        }
    }

    fn cascade_delete_post(&mut self, id: Id) {
        self.posts.remove(&id);
        self.comments.retain(|_, c| c.post_id != id);
        self.likes.retain(|(pid, _), _| *pid != id);
    }
}

#[async_trait]
impl SocialStore for MemoryStore {
    async fn generate_id(&self) -> AppResult<Id> {
        Ok(self.ids.next_id())
    }

    async fn apply(&self, batch: WriteBatch) -> AppResult<()> {
        let mut inner = self.write()?;
        inner.validate(&batch.ops)?;
        inner.commit(batch.ops);
        Ok(())
    }

    async fn get_user(&self, id: Id) -> AppResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[Id]) -> AppResult<Vec<User>> {
        let inner = self.read()?;
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn all_users(&self) -> AppResult<Vec<User>> {
        let inner = self.read()?;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn get_follow(
        &self,
        follower_id: Id,
        following_id: Id,
    ) -> AppResult<Option<FollowEdge>> {
        Ok(self.read()?.follows.get(&(follower_id, following_id)).cloned())
    }

    async fn accepted_following(&self, user_id: Id) -> AppResult<Vec<Id>> {
        let inner = self.read()?;
        let mut ids: Vec<Id> = inner
            .follows
            .values()
            .filter(|e| e.follower_id == user_id && e.status == FollowStatus::Accepted)
            .map(|e| e.following_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn accepted_followers(&self, user_id: Id) -> AppResult<Vec<Id>> {
        let inner = self.read()?;
        let mut ids: Vec<Id> = inner
            .follows
            .values()
            .filter(|e| e.following_id == user_id && e.status == FollowStatus::Accepted)
            .map(|e| e.follower_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn follower_count(&self, user_id: Id) -> AppResult<u64> {
        let inner = self.read()?;
        Ok(inner
            .follows
            .values()
            .filter(|e| e.following_id == user_id && e.status == FollowStatus::Accepted)
            .count() as u64)
    }

    async fn get_post(&self, id: Id) -> AppResult<Option<Post>> {
        Ok(self.read()?.posts.get(&id).cloned())
    }

    async fn all_posts(&self) -> AppResult<Vec<Post>> {
        let inner = self.read()?;
        let mut posts: Vec<Post> = inner.posts.values().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn posts_by_authors(
        &self,
        author_ids: &[Id],
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<Post>> {
        let authors: HashSet<Id> = author_ids.iter().copied().collect();
        let inner = self.read()?;
        let mut posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| authors.contains(&p.author_id))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn post_count_by_author(&self, author_id: Id) -> AppResult<u64> {
        let inner = self.read()?;
        Ok(inner.posts.values().filter(|p| p.author_id == author_id).count() as u64)
    }

    async fn like_count(&self, post_id: Id) -> AppResult<u64> {
        let inner = self.read()?;
        Ok(inner.likes.keys().filter(|(pid, _)| *pid == post_id).count() as u64)
    }

    async fn comment_count(&self, post_id: Id) -> AppResult<u64> {
        let inner = self.read()?;
        Ok(inner.comments.values().filter(|c| c.post_id == post_id).count() as u64)
    }

    async fn get_comment(&self, id: Id) -> AppResult<Option<Comment>> {
        Ok(self.read()?.comments.get(&id).cloned())
    }

    async fn comments_for_post(&self, post_id: Id) -> AppResult<Vec<Comment>> {
        let inner = self.read()?;
        let mut comments: Vec<Comment> = inner
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn get_community(&self, id: Id) -> AppResult<Option<Community>> {
        Ok(self.read()?.communities.get(&id).cloned())
    }

    async fn get_membership(
        &self,
        community_id: Id,
        user_id: Id,
    ) -> AppResult<Option<Membership>> {
        Ok(self.read()?.memberships.get(&(community_id, user_id)).cloned())
    }

    async fn posts_in_community(&self, community_id: Id) -> AppResult<Vec<Post>> {
        let inner = self.read()?;
        let mut posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| p.community_id == Some(community_id))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn member_count_version(&self, community_id: Id) -> AppResult<(i64, u64)> {
        let inner = self.read()?;
        let community = inner
            .communities
            .get(&community_id)
            .ok_or_else(|| AppError::NotFound(format!("community {}", community_id)))?;
        Ok((community.member_count, community.version))
    }

    async fn set_member_count(
        &self,
        community_id: Id,
        count: i64,
        expected_version: u64,
    ) -> AppResult<()> {
        let mut inner = self.write()?;
        if inner.forced_conflicts > 0 {
            inner.forced_conflicts -= 1;
            return Err(AppError::Conflict(format!(
                "member count of community {} changed concurrently",
                community_id
            )));
        }
        let community = inner
            .communities
            .get_mut(&community_id)
            .ok_or_else(|| AppError::NotFound(format!("community {}", community_id)))?;
        if community.version != expected_version {
            return Err(AppError::Conflict(format!(
                "member count of community {} changed concurrently",
                community_id
            )));
        }
        community.member_count = count;
        community.version += 1;
        Ok(())
    }

    async fn user_activity_since(&self, user_id: Id, since: DateTime<Utc>) -> AppResult<u64> {
        let inner = self.read()?;
        let posts = inner
            .posts
            .values()
            .filter(|p| p.author_id == user_id && p.created_at >= since)
            .count();
        let comments = inner
            .comments
            .values()
            .filter(|c| c.author_id == user_id && c.created_at >= since)
            .count();
        let likes = inner
            .likes
            .values()
            .filter(|l| l.user_id == user_id && l.created_at >= since)
            .count();
        Ok((posts + comments + likes) as u64)
    }

    async fn community_posts_since(
        &self,
        community_id: Id,
        since: DateTime<Utc>,
    ) -> AppResult<u64> {
        let inner = self.read()?;
        Ok(inner
            .posts
            .values()
            .filter(|p| p.community_id == Some(community_id) && p.created_at >= since)
            .count() as u64)
    }

    async fn notifications_for(&self, recipient_id: Id) -> AppResult<Vec<Notification>> {
        let inner = self.read()?;
        let mut out: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}
