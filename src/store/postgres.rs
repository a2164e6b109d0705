// PostgreSQL store. Batches run inside a single transaction: each op is
// checked and executed in order, and any failure (including an injected
// FailPoint) rolls the whole batch back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::error::{AppError, AppResult};
use crate::models::{
    Comment, Community, FollowEdge, FollowStatus, Id, Membership, MemberRole, Notification, Post,
    User,
};

use super::{SnowflakeIdGenerator, SocialStore, WriteBatch, WriteOp};

#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
    ids: SnowflakeIdGenerator,
}

fn parse_status(s: &str) -> AppResult<FollowStatus> {
    match s {
        "pending" => Ok(FollowStatus::Pending),
        "accepted" => Ok(FollowStatus::Accepted),
        "rejected" => Ok(FollowStatus::Rejected),
        other => Err(AppError::Database(format!("unknown follow status '{}'", other))),
    }
}

fn parse_role(s: &str) -> AppResult<MemberRole> {
    match s {
        "admin" => Ok(MemberRole::Admin),
        "moderator" => Ok(MemberRole::Moderator),
        "member" => Ok(MemberRole::Member),
        other => Err(AppError::Database(format!("unknown member role '{}'", other))),
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        bio: row.get("bio"),
        is_private: row.get("is_private"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        community_id: row.get("community_id"),
        content: row.get("content"),
        media_url: row.get("media_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn community_from_row(row: &PgRow) -> Community {
    Community {
        id: row.get("id"),
        creator_id: row.get("creator_id"),
        name: row.get("name"),
        description: row.get("description"),
        is_private: row.get("is_private"),
        member_count: row.get("member_count"),
        version: row.get::<i64, _>("version") as u64,
        created_at: row.get("created_at"),
    }
}

impl PostgresStore {
    pub async fn connect(url: &str, shard_id: u16) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        let store = Self {
            pool,
            ids: SnowflakeIdGenerator::new(shard_id),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Create tables and indexes if missing.
    pub async fn initialize(&self) -> AppResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                bio TEXT,
                is_private BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS follows (
                follower_id BIGINT NOT NULL,
                following_id BIGINT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (follower_id, following_id),
                CHECK (follower_id <> following_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BIGINT PRIMARY KEY,
                author_id BIGINT NOT NULL,
                community_id BIGINT,
                content TEXT,
                media_url TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                CHECK (content IS NOT NULL OR media_url IS NOT NULL)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGINT PRIMARY KEY,
                post_id BIGINT NOT NULL,
                author_id BIGINT NOT NULL,
                parent_id BIGINT,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS communities (
                id BIGINT PRIMARY KEY,
                creator_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                is_private BOOLEAN NOT NULL DEFAULT FALSE,
                member_count BIGINT NOT NULL DEFAULT 0,
                version BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS memberships (
                community_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                role TEXT NOT NULL,
                joined_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (community_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS likes (
                post_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (post_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id BIGINT PRIMARY KEY,
                recipient_id BIGINT NOT NULL,
                actor_id BIGINT NOT NULL,
                post_id BIGINT NOT NULL,
                body TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id)",
            "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_posts_community ON posts(community_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)",
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::Database(format!("Failed to initialize schema: {}", e)))?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    async fn require_user(tx: &mut Transaction<'_, Postgres>, id: Id) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("user {}", id)))
        }
    }

    async fn require_post(tx: &mut Transaction<'_, Postgres>, id: Id) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("post {}", id)))
        }
    }

    async fn require_community(tx: &mut Transaction<'_, Postgres>, id: Id) -> AppResult<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM communities WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut **tx)
                .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("community {}", id)))
        }
    }

    async fn execute_op(tx: &mut Transaction<'_, Postgres>, op: &WriteOp) -> AppResult<()> {
        match op {
            WriteOp::InsertUser(user) => {
                if user.username.trim().is_empty() {
                    return Err(AppError::Validation("username must not be empty".to_string()));
                }
                let taken: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                        .bind(&user.username)
                        .fetch_one(&mut **tx)
                        .await?;
                if taken {
                    return Err(AppError::Validation(format!(
                        "username '{}' already exists",
                        user.username
                    )));
                }
                sqlx::query(
                    "INSERT INTO users (id, username, bio, is_private, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(user.id)
                .bind(&user.username)
                .bind(&user.bio)
                .bind(user.is_private)
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::UpdateUser(user) => {
                let updated = sqlx::query(
                    "UPDATE users SET username = $2, bio = $3, is_private = $4, updated_at = $5 \
                     WHERE id = $1",
                )
                .bind(user.id)
                .bind(&user.username)
                .bind(&user.bio)
                .bind(user.is_private)
                .bind(user.updated_at)
                .execute(&mut **tx)
                .await?;
                if updated.rows_affected() == 0 {
                    return Err(AppError::NotFound(format!("user {}", user.id)));
                }
            }
            WriteOp::DeleteUser(id) => {
                Self::require_user(tx, *id).await?;
                // Cascade to owned edges and content; memberships adjust
                // the denormalized counters they leave behind.
                sqlx::query(
                    "UPDATE communities SET member_count = member_count - 1, version = version + 1 \
                     WHERE id IN (SELECT community_id FROM memberships WHERE user_id = $1)",
                )
                .bind(id)
                .execute(&mut **tx)
                .await?;
                sqlx::query("DELETE FROM memberships WHERE user_id = $1").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM follows WHERE follower_id = $1 OR following_id = $1").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM likes WHERE user_id = $1 OR post_id IN (SELECT id FROM posts WHERE author_id = $1)").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM comments WHERE author_id = $1 OR post_id IN (SELECT id FROM posts WHERE author_id = $1)").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM notifications WHERE recipient_id = $1 OR actor_id = $1").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM posts WHERE author_id = $1").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut **tx).await?;
            }
            WriteOp::InsertFollow(edge) => {
                if edge.follower_id == edge.following_id {
                    return Err(AppError::InvalidEdge(format!(
                        "user {} cannot follow themselves",
                        edge.follower_id
                    )));
                }
                Self::require_user(tx, edge.follower_id).await?;
                Self::require_user(tx, edge.following_id).await?;
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
                )
                .bind(edge.follower_id)
                .bind(edge.following_id)
                .fetch_one(&mut **tx)
                .await?;
                if exists {
                    return Err(AppError::InvalidEdge(format!(
                        "follow {} -> {} already exists",
                        edge.follower_id, edge.following_id
                    )));
                }
                sqlx::query(
                    "INSERT INTO follows (follower_id, following_id, status, created_at) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(edge.follower_id)
                .bind(edge.following_id)
                .bind(edge.status.as_str())
                .bind(edge.created_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::SetFollowStatus {
                follower_id,
                following_id,
                status,
            } => {
                let current: Option<String> = sqlx::query_scalar(
                    "SELECT status FROM follows WHERE follower_id = $1 AND following_id = $2",
                )
                .bind(follower_id)
                .bind(following_id)
                .fetch_optional(&mut **tx)
                .await?;
                match current.as_deref() {
                    None => {
                        return Err(AppError::NotFound(format!(
                            "follow {} -> {}",
                            follower_id, following_id
                        )));
                    }
                    Some(s) if parse_status(s)? != FollowStatus::Pending => {
                        return Err(AppError::InvalidEdge(format!(
                            "follow {} -> {} is already {}",
                            follower_id, following_id, s
                        )));
                    }
                    _ => {}
                }
                sqlx::query(
                    "UPDATE follows SET status = $3 WHERE follower_id = $1 AND following_id = $2",
                )
                .bind(follower_id)
                .bind(following_id)
                .bind(status.as_str())
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::InsertPost(post) => {
                Self::require_user(tx, post.author_id).await?;
                if let Some(cid) = post.community_id {
                    Self::require_community(tx, cid).await?;
                }
                if !post.has_body() {
                    return Err(AppError::ConstraintViolation(format!(
                        "post {} must have content or media",
                        post.id
                    )));
                }
                sqlx::query(
                    "INSERT INTO posts (id, author_id, community_id, content, media_url, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(post.id)
                .bind(post.author_id)
                .bind(post.community_id)
                .bind(&post.content)
                .bind(&post.media_url)
                .bind(post.created_at)
                .bind(post.updated_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::UpdatePost(post) => {
                if !post.has_body() {
                    return Err(AppError::ConstraintViolation(format!(
                        "post {} must have content or media",
                        post.id
                    )));
                }
                let updated = sqlx::query(
                    "UPDATE posts SET community_id = $2, content = $3, media_url = $4, updated_at = $5 \
                     WHERE id = $1",
                )
                .bind(post.id)
                .bind(post.community_id)
                .bind(&post.content)
                .bind(&post.media_url)
                .bind(post.updated_at)
                .execute(&mut **tx)
                .await?;
                if updated.rows_affected() == 0 {
                    return Err(AppError::NotFound(format!("post {}", post.id)));
                }
            }
            WriteOp::DeletePost(id) => {
                Self::require_post(tx, *id).await?;
                sqlx::query("DELETE FROM comments WHERE post_id = $1").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM likes WHERE post_id = $1").bind(id).execute(&mut **tx).await?;
                sqlx::query("DELETE FROM posts WHERE id = $1").bind(id).execute(&mut **tx).await?;
            }
            WriteOp::InsertComment(comment) => {
                if comment.content.trim().is_empty() {
                    return Err(AppError::Validation(format!(
                        "comment {} must have content",
                        comment.id
                    )));
                }
                Self::require_user(tx, comment.author_id).await?;
                Self::require_post(tx, comment.post_id).await?;
                if let Some(parent_id) = comment.parent_id {
                    let parent_post: Option<Id> =
                        sqlx::query_scalar("SELECT post_id FROM comments WHERE id = $1")
                            .bind(parent_id)
                            .fetch_optional(&mut **tx)
                            .await?;
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
                sqlx::query(
                    "INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(comment.id)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(comment.parent_id)
                .bind(&comment.content)
                .bind(comment.created_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::InsertCommunity(community) => {
                if community.name.trim().is_empty() {
                    return Err(AppError::Validation("community name must not be empty".to_string()));
                }
                Self::require_user(tx, community.creator_id).await?;
                sqlx::query(
                    "INSERT INTO communities (id, creator_id, name, description, is_private, member_count, version, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(community.id)
                .bind(community.creator_id)
                .bind(&community.name)
                .bind(&community.description)
                .bind(community.is_private)
                .bind(community.member_count)
                .bind(community.version as i64)
                .bind(community.created_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::InsertMembership(membership) => {
                Self::require_community(tx, membership.community_id).await?;
                Self::require_user(tx, membership.user_id).await?;
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM memberships WHERE community_id = $1 AND user_id = $2)",
                )
                .bind(membership.community_id)
                .bind(membership.user_id)
                .fetch_one(&mut **tx)
                .await?;
                if exists {
                    return Err(AppError::InvalidEdge(format!(
                        "user {} is already a member of community {}",
                        membership.user_id, membership.community_id
                    )));
                }
                sqlx::query(
                    "INSERT INTO memberships (community_id, user_id, role, joined_at) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(membership.community_id)
                .bind(membership.user_id)
                .bind(membership.role.as_str())
                .bind(membership.joined_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::DeleteMembership {
                community_id,
                user_id,
            } => {
                let deleted = sqlx::query(
                    "DELETE FROM memberships WHERE community_id = $1 AND user_id = $2",
                )
                .bind(community_id)
                .bind(user_id)
                .execute(&mut **tx)
                .await?;
                if deleted.rows_affected() == 0 {
                    return Err(AppError::NotFound(format!(
                        "membership of user {} in community {}",
                        user_id, community_id
                    )));
                }
            }
            WriteOp::InsertLike(like) => {
                Self::require_user(tx, like.user_id).await?;
                Self::require_post(tx, like.post_id).await?;
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2)",
                )
                .bind(like.post_id)
                .bind(like.user_id)
                .fetch_one(&mut **tx)
                .await?;
                if exists {
                    return Err(AppError::InvalidEdge(format!(
                        "user {} already liked post {}",
                        like.user_id, like.post_id
                    )));
                }
                sqlx::query(
                    "INSERT INTO likes (post_id, user_id, created_at) VALUES ($1, $2, $3)",
                )
                .bind(like.post_id)
                .bind(like.user_id)
                .bind(like.created_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::DeleteLike { post_id, user_id } => {
                let deleted =
                    sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
                        .bind(post_id)
                        .bind(user_id)
                        .execute(&mut **tx)
                        .await?;
                if deleted.rows_affected() == 0 {
                    return Err(AppError::NotFound(format!(
                        "like by user {} on post {}",
                        user_id, post_id
                    )));
                }
            }
            WriteOp::InsertNotification(n) => {
                Self::require_user(tx, n.recipient_id).await?;
                sqlx::query(
                    "INSERT INTO notifications (id, recipient_id, actor_id, post_id, body, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(n.id)
                .bind(n.recipient_id)
                .bind(n.actor_id)
                .bind(n.post_id)
                .bind(&n.body)
                .bind(n.created_at)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::FailPoint(reason) => {
                return Err(AppError::Internal(format!("injected failure: {}", reason)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SocialStore for PostgresStore {
    async fn generate_id(&self) -> AppResult<Id> {
        Ok(self.ids.next_id())
    }

    async fn apply(&self, batch: WriteBatch) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        for op in &batch.ops {
            Self::execute_op(&mut tx, op).await?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn get_user(&self, id: Id) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_users(&self, ids: &[Id]) -> AppResult<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn all_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn get_follow(
        &self,
        follower_id: Id,
        following_id: Id,
    ) -> AppResult<Option<FollowEdge>> {
        let row = sqlx::query(
            "SELECT * FROM follows WHERE follower_id = $1 AND following_id = $2",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => Ok(None),
            Some(row) => Ok(Some(FollowEdge {
                follower_id: row.get("follower_id"),
                following_id: row.get("following_id"),
                status: parse_status(row.get("status"))?,
                created_at: row.get("created_at"),
            })),
        }
    }

    async fn accepted_following(&self, user_id: Id) -> AppResult<Vec<Id>> {
        let ids = sqlx::query_scalar(
            "SELECT following_id FROM follows \
             WHERE follower_id = $1 AND status = 'accepted' ORDER BY following_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn accepted_followers(&self, user_id: Id) -> AppResult<Vec<Id>> {
        let ids = sqlx::query_scalar(
            "SELECT follower_id FROM follows \
             WHERE following_id = $1 AND status = 'accepted' ORDER BY follower_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn follower_count(&self, user_id: Id) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE following_id = $1 AND status = 'accepted'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn get_post(&self, id: Id) -> AppResult<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(post_from_row))
    }

    async fn all_posts(&self) -> AppResult<Vec<Post>> {
        let rows = sqlx::query("SELECT * FROM posts ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn posts_by_authors(
        &self,
        author_ids: &[Id],
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE author_id = ANY($1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(author_ids)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn post_count_by_author(&self, author_id: Id) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn like_count(&self, post_id: Id) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn comment_count(&self, post_id: Id) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn get_comment(&self, id: Id) -> AppResult<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(comment_from_row))
    }

    async fn comments_for_post(&self, post_id: Id) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT * FROM comments WHERE post_id = $1 ORDER BY created_at, id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn get_community(&self, id: Id) -> AppResult<Option<Community>> {
        let row = sqlx::query("SELECT * FROM communities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(community_from_row))
    }

    async fn get_membership(
        &self,
        community_id: Id,
        user_id: Id,
    ) -> AppResult<Option<Membership>> {
        let row = sqlx::query(
            "SELECT * FROM memberships WHERE community_id = $1 AND user_id = $2",
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => Ok(None),
            Some(row) => Ok(Some(Membership {
                community_id: row.get("community_id"),
                user_id: row.get("user_id"),
                role: parse_role(row.get("role"))?,
                joined_at: row.get("joined_at"),
            })),
        }
    }

    async fn posts_in_community(&self, community_id: Id) -> AppResult<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE community_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(community_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn member_count_version(&self, community_id: Id) -> AppResult<(i64, u64)> {
        let row = sqlx::query("SELECT member_count, version FROM communities WHERE id = $1")
            .bind(community_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("community {}", community_id)))?;
        Ok((row.get("member_count"), row.get::<i64, _>("version") as u64))
    }

    async fn set_member_count(
        &self,
        community_id: Id,
        count: i64,
        expected_version: u64,
    ) -> AppResult<()> {
        let updated = sqlx::query(
            "UPDATE communities SET member_count = $2, version = version + 1 \
             WHERE id = $1 AND version = $3",
        )
        .bind(community_id)
        .bind(count)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 1 {
            return Ok(());
        }
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM communities WHERE id = $1)")
                .bind(community_id)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Err(AppError::Conflict(format!(
                "member count of community {} changed concurrently",
                community_id
            )))
        } else {
            Err(AppError::NotFound(format!("community {}", community_id)))
        }
    }

    async fn user_activity_since(&self, user_id: Id, since: DateTime<Utc>) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM posts WHERE author_id = $1 AND created_at >= $2) \
                  + (SELECT COUNT(*) FROM comments WHERE author_id = $1 AND created_at >= $2) \
                  + (SELECT COUNT(*) FROM likes WHERE user_id = $1 AND created_at >= $2)",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn community_posts_since(
        &self,
        community_id: Id,
        since: DateTime<Utc>,
    ) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts WHERE community_id = $1 AND created_at >= $2",
        )
        .bind(community_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn notifications_for(&self, recipient_id: Id) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| Notification {
                id: row.get("id"),
                recipient_id: row.get("recipient_id"),
                actor_id: row.get("actor_id"),
                post_id: row.get("post_id"),
                body: row.get("body"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
