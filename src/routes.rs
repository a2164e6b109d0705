// HTTP surface for the analytical core. Thin handlers only: parse, call
// the service, wrap the result. Identity and request validation beyond
// basic parsing live upstream of this layer.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{
        BatchItemResult, CombinedHit, CommunityCreated, CommunityStats, FeedItem, Id, PopularPost,
        PostHit, PostShared, Recommendation, UserActivity, UserHit,
    },
    search::Profile,
    services::BatchItem,
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/graph/distance/{from}/{to}", get(social_distance))
        .route("/users/{id}/recommendations", get(recommendations))
        .route("/users/{id}/feed", get(feed))
        .route("/users/{id}/activity", get(user_activity))
        .route("/posts/popular", get(popular))
        .route("/posts/{id}/thread", get(thread))
        .route("/comments/{id}/ancestors", get(ancestors))
        .route("/search/posts", get(search_posts))
        .route("/search/users", get(search_users))
        .route("/search/all", get(search_all))
        .route("/communities", post(create_community))
        .route("/communities/{id}/stats", get(community_stats))
        .route("/communities/{id}/join", post(join_community))
        .route("/communities/{id}/leave", post(leave_community))
        .route("/posts/share", post(share_post))
        .route("/batch", post(batch_create))
        .with_state(state)
}

async fn social_distance(
    State(state): State<AppState>,
    Path((from, to)): Path<(Id, Id)>,
) -> AppResult<Json<Value>> {
    let distance = state.graph.social_distance(from, to).await?;
    Ok(Json(json!({ "from": from, "to": to, "distance": distance })))
}

async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<Json<Vec<Recommendation>>> {
    Ok(Json(state.recommend.recommend(id).await?))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    50
}

async fn feed(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Vec<FeedItem>>> {
    Ok(Json(state.feed.feed(id, page.limit, page.offset).await?))
}

async fn user_activity(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<Json<UserActivity>> {
    Ok(Json(state.feed.user_activity(id).await?))
}

#[derive(Debug, Deserialize)]
struct PopularParams {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    recent_only: bool,
}

async fn popular(
    State(state): State<AppState>,
    Query(params): Query<PopularParams>,
) -> AppResult<Json<Vec<PopularPost>>> {
    Ok(Json(state.feed.popular(params.limit, params.recent_only).await?))
}

async fn thread(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<Json<Value>> {
    let nodes = state.threads.thread(id).await?;
    Ok(Json(json!({ "post_id": id, "comments": nodes })))
}

async fn ancestors(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<Json<Value>> {
    let nodes = state.threads.ancestors(id).await?;
    Ok(Json(json!({ "comment_id": id, "ancestors": nodes })))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    /// Enables AND/OR/NOT connectives and quoted phrases.
    #[serde(default)]
    advanced: bool,
}

fn parse_profile(profile: &Option<String>) -> AppResult<Profile> {
    match profile {
        None => Ok(Profile::Bilingual),
        Some(name) => Profile::parse(name)
            .ok_or_else(|| AppError::Validation(format!("unknown search profile '{}'", name))),
    }
}

async fn search_posts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<PostHit>>> {
    let profile = parse_profile(&params.profile)?;
    let hits = if params.advanced {
        state.search.search_posts_advanced(&params.q, profile, params.limit)?
    } else {
        state.search.search_posts(&params.q, profile, params.limit)?
    };
    Ok(Json(hits))
}

async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<UserHit>>> {
    let profile = parse_profile(&params.profile)?;
    let hits = if params.advanced {
        state.search.search_users_advanced(&params.q, profile, params.limit)?
    } else {
        state.search.search_users(&params.q, profile, params.limit)?
    };
    Ok(Json(hits))
}

async fn search_all(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<CombinedHit>>> {
    let profile = parse_profile(&params.profile)?;
    Ok(Json(state.search.search_all(&params.q, profile, params.limit)?))
}

#[derive(Debug, Deserialize)]
struct CreateCommunityRequest {
    creator_id: Id,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_private: bool,
}

async fn create_community(
    State(state): State<AppState>,
    Json(req): Json<CreateCommunityRequest>,
) -> AppResult<Json<CommunityCreated>> {
    let created = state
        .coordinator
        .create_community_with_admin(req.creator_id, &req.name, req.description, req.is_private)
        .await?;
    Ok(Json(created))
}

async fn community_stats(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<Json<CommunityStats>> {
    Ok(Json(state.feed.community_stats(id).await?))
}

#[derive(Debug, Deserialize)]
struct MembershipRequest {
    user_id: Id,
}

async fn join_community(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(req): Json<MembershipRequest>,
) -> AppResult<Json<Value>> {
    let membership = state
        .coordinator
        .join_community(id, req.user_id, crate::models::MemberRole::Member)
        .await?;
    Ok(Json(json!({ "community_id": id, "user_id": req.user_id, "role": membership.role })))
}

async fn leave_community(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(req): Json<MembershipRequest>,
) -> AppResult<Json<Value>> {
    state.coordinator.leave_community(id, req.user_id).await?;
    Ok(Json(json!({ "community_id": id, "user_id": req.user_id, "left": true })))
}

#[derive(Debug, Deserialize)]
struct SharePostRequest {
    user_id: Id,
    content: String,
    #[serde(default)]
    force_fail: bool,
}

async fn share_post(
    State(state): State<AppState>,
    Json(req): Json<SharePostRequest>,
) -> AppResult<Json<PostShared>> {
    let shared = state
        .coordinator
        .share_post_and_notify(req.user_id, &req.content, req.force_fail)
        .await?;
    Ok(Json(shared))
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    user_id: Id,
    items: Vec<BatchItem>,
    #[serde(default)]
    continue_on_error: bool,
}

async fn batch_create(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> AppResult<Json<Vec<BatchItemResult>>> {
    let results = state
        .coordinator
        .batch_create(req.user_id, req.items, req.continue_on_error)
        .await?;
    Ok(Json(results))
}
