//! Route registration and handlers: the synchronization layer.
//!
//! Each handler resolves the caller from the session, performs its
//! authorization assertions, then invokes concept operations in a fixed
//! sequence, awaiting each. Any failure aborts the remaining steps; nothing
//! here compensates or retries.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::responses;
use super::session::{clear_cookie, set_cookie, SessionToken};
use super::AppState;
use crate::concepts::badging::BadgeType;
use crate::concepts::posting::PostOptions;
use crate::error::ApiError;

/// The route table: every (method, path) pair the service answers.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session_user))
        .route("/users", get(get_users).post(create_user).delete(delete_user))
        .route("/users/:username", get(get_user))
        .route("/users/username", patch(update_username))
        .route("/users/password", patch(update_password))
        .route("/admins", get(get_admins).post(create_admin))
        .route("/admins/:id", delete(admin_delete_item))
        .route("/login", post(log_in))
        .route("/logout", post(log_out))
        .route("/posts", get(get_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/friends", get(get_friends))
        .route("/friends/:friend", delete(remove_friend))
        .route("/friend/requests", get(get_friend_requests))
        .route(
            "/friend/requests/:to",
            post(send_friend_request).delete(remove_friend_request),
        )
        .route("/friend/accept/:from", put(accept_friend_request))
        .route("/friend/reject/:from", put(reject_friend_request))
        .route("/badges", get(get_badges).post(give_badge))
        .route("/badges/:id", delete(delete_badge))
        .route("/reports", get(get_reports).post(create_report))
        .route("/reports/:id", delete(address_report))
        .route("/filters", get(get_filters).post(add_filter))
        .route("/filters/:id", delete(delete_filter))
        .route("/blur", post(blur_post))
        .route("/blur/:intensity", post(blur_post_at_intensity))
        .route("/comments", get(get_comments).post(create_comment))
        .route("/comments/:id", delete(delete_comment))
        .route("/likes", post(add_like))
        .route("/likes/:id", delete(remove_like))
        .route("/likes/items", get(get_item_like_count))
        .route("/likes/users", get(get_user_likes))
}

fn require_non_empty<'a>(value: &'a str, name: &str) -> Result<&'a str, ApiError> {
    if value.is_empty() {
        return Err(ApiError::BadInput(format!("{name} must be non-empty!")));
    }
    Ok(value)
}

// ========== Session & Users ==========

#[derive(Debug, Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

async fn get_session_user(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let user = state.authing.get_user_by_id(&user).await?;
    Ok(Json(json!(user)))
}

async fn get_users(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let users = state.authing.get_users().await?;
    Ok(Json(json!(users)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_non_empty(&username, "username")?;
    let user = state.authing.get_user_by_username(&username).await?;
    Ok(Json(json!(user)))
}

async fn create_user(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<Value>, ApiError> {
    state.sessioning.is_logged_out(token.as_deref()).await?;
    let user = state.authing.create(&body.username, &body.password).await?;
    Ok(Json(json!({ "msg": "User created successfully!", "user": user })))
}

async fn get_admins(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let admins = state.authing.get_admins().await?;
    Ok(Json(json!(admins)))
}

async fn create_admin(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.authing.assert_user_is_admin(&user).await?;
    let admin = state
        .authing
        .create_admin(&body.username, &body.password)
        .await?;
    Ok(Json(json!({ "msg": "Admin user created successfully!", "user": admin })))
}

/// Admin-initiated removal. The bare id is probed across concepts: a post id
/// cascades to its comments, its like tracking and its authoring user; a
/// comment id removes the comment; anything else is treated as a user id.
async fn admin_delete_item(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let caller = state.sessioning.get_user(token.as_deref()).await?;
    state.authing.assert_user_is_admin(&caller).await?;

    if let Some(post) = state.posting.get_post(&id).await? {
        state.commenting.delete_item_comments(&id).await?;
        state.liking.delete_item(&id).await?;
        state.posting.delete(&id).await?;
        state.sessioning.end_user_sessions(&post.author).await?;
        state.authing.delete(&post.author).await?;
    } else if state.commenting.get_comment(&id).await?.is_some() {
        state.commenting.delete(&id).await?;
    } else {
        state.sessioning.end_user_sessions(&id).await?;
        state.authing.delete(&id).await?;
    }

    Ok(Json(json!({ "msg": "Successfully deleted" })))
}

#[derive(Debug, Deserialize)]
struct UpdateUsernameBody {
    username: String,
}

async fn update_username(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<UpdateUsernameBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.authing.update_username(&user, &body.username).await?;
    Ok(Json(json!({ "msg": "Username updated successfully!" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePasswordBody {
    current_password: String,
    new_password: String,
}

async fn update_password(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<UpdatePasswordBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state
        .authing
        .update_password(&user, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(json!({ "msg": "Password updated successfully!" })))
}

async fn delete_user(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Response, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.sessioning.end(token.as_deref()).await?;
    state.sessioning.end_user_sessions(&user).await?;
    state.authing.delete(&user).await?;

    let headers = AppendHeaders([(SET_COOKIE, clear_cookie())]);
    Ok((headers, Json(json!({ "msg": "User deleted!" }))).into_response())
}

async fn log_in(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, ApiError> {
    let user = state
        .authing
        .authenticate(&body.username, &body.password)
        .await?;
    let new_token = state.sessioning.start(token.as_deref(), &user).await?;

    let headers = AppendHeaders([(SET_COOKIE, set_cookie(&new_token))]);
    Ok((headers, Json(json!({ "msg": "Logged in!" }))).into_response())
}

async fn log_out(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Response, ApiError> {
    state.sessioning.end(token.as_deref()).await?;

    let headers = AppendHeaders([(SET_COOKIE, clear_cookie())]);
    Ok((headers, Json(json!({ "msg": "Logged out!" }))).into_response())
}

// ========== Posts ==========

#[derive(Debug, Deserialize)]
struct PostsQuery {
    author: Option<String>,
}

async fn get_posts(
    State(state): State<AppState>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<Value>, ApiError> {
    let posts = if let Some(author) = query.author {
        let author = state.authing.get_user_by_username(&author).await?;
        state.posting.get_by_author(&author.id).await?
    } else {
        state.posting.get_posts().await?
    };

    let formatted = responses::posts(&state.authing, posts).await?;
    Ok(Json(json!(formatted)))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let post = state.posting.get_post(&id).await?;
    Ok(Json(json!(post)))
}

#[derive(Debug, Deserialize)]
struct CreatePostBody {
    image: String,
    caption: String,
    options: Option<PostOptions>,
}

async fn create_post(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<CreatePostBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    require_non_empty(&body.image, "image")?;

    let created = state
        .posting
        .create(&user, &body.image, &body.caption, body.options.as_ref())
        .await?;
    state.liking.init_item(&created.id).await?;

    let formatted = responses::post(&state.authing, created).await?;
    Ok(Json(json!({ "msg": "Post successfully created!", "post": formatted })))
}

#[derive(Debug, Deserialize)]
struct UpdatePostBody {
    caption: Option<String>,
    options: Option<PostOptions>,
}

async fn update_post(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
    Json(body): Json<UpdatePostBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.posting.assert_author_is_user(&id, &user).await?;
    state
        .posting
        .update(&id, body.caption.as_deref(), body.options.as_ref())
        .await?;
    Ok(Json(json!({ "msg": "Post successfully updated!" })))
}

async fn delete_post(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.posting.assert_author_is_user(&id, &user).await?;

    // Deletion cascades to dependent comments and like tracking.
    state.commenting.delete_item_comments(&id).await?;
    state.liking.delete_item(&id).await?;
    state.posting.delete(&id).await?;

    Ok(Json(json!({ "msg": "Post deleted successfully!" })))
}

// ========== Friends ==========

async fn get_friends(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let friends = state.friending.get_friends(&user).await?;
    let usernames = state.authing.ids_to_usernames(&friends).await?;
    Ok(Json(json!(usernames)))
}

async fn remove_friend(
    State(state): State<AppState>,
    token: SessionToken,
    Path(friend): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let friend = state.authing.get_user_by_username(&friend).await?;
    state.friending.remove_friend(&user, &friend.id).await?;
    Ok(Json(json!({ "msg": "Friend removed!" })))
}

async fn get_friend_requests(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let requests = state.friending.get_requests(&user).await?;
    let formatted = responses::friend_requests(&state.authing, requests).await?;
    Ok(Json(json!(formatted)))
}

async fn send_friend_request(
    State(state): State<AppState>,
    token: SessionToken,
    Path(to): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let to = state.authing.get_user_by_username(&to).await?;
    state.friending.send_request(&user, &to.id).await?;
    Ok(Json(json!({ "msg": "Friend request sent!" })))
}

async fn remove_friend_request(
    State(state): State<AppState>,
    token: SessionToken,
    Path(to): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let to = state.authing.get_user_by_username(&to).await?;
    state.friending.remove_request(&user, &to.id).await?;
    Ok(Json(json!({ "msg": "Friend request removed!" })))
}

async fn accept_friend_request(
    State(state): State<AppState>,
    token: SessionToken,
    Path(from): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let from = state.authing.get_user_by_username(&from).await?;
    state.friending.accept_request(&from.id, &user).await?;
    Ok(Json(json!({ "msg": "Friend request accepted!" })))
}

async fn reject_friend_request(
    State(state): State<AppState>,
    token: SessionToken,
    Path(from): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let from = state.authing.get_user_by_username(&from).await?;
    state.friending.reject_request(&from.id, &user).await?;
    Ok(Json(json!({ "msg": "Friend request rejected!" })))
}

// ========== Badges ==========

#[derive(Debug, Deserialize)]
struct BadgesQuery {
    user: String,
}

async fn get_badges(
    State(state): State<AppState>,
    Query(query): Query<BadgesQuery>,
) -> Result<Json<Value>, ApiError> {
    let author = state.authing.get_user_by_username(&query.user).await?;
    let badges = state.badging.get_by_author(&author.id).await?;
    Ok(Json(json!(badges)))
}

#[derive(Debug, Deserialize)]
struct GiveBadgeBody {
    user: String,
    #[serde(rename = "type")]
    badge_type: String,
}

async fn give_badge(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<GiveBadgeBody>,
) -> Result<Json<Value>, ApiError> {
    let admin = state.sessioning.get_user(token.as_deref()).await?;
    state.authing.assert_user_is_admin(&admin).await?;

    let badge_type = BadgeType::parse(&body.badge_type)
        .ok_or_else(|| ApiError::BadInput(format!("Unknown badge type: {}", body.badge_type)))?;
    let badge = state.badging.give(&body.user, badge_type).await?;
    Ok(Json(json!({ "msg": "Badge successfully created!", "badge": badge })))
}

/// Shame badges are admin-adjudicated, so only admins may remove them.
/// Verified badges may be removed by anyone holding the badge id.
async fn delete_badge(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let badge = state.badging.get_badge(&id).await?;

    if badge.map(|b| b.badge_type) == Some(BadgeType::Shame.as_str().to_string()) {
        let user = state.sessioning.get_user(token.as_deref()).await?;
        state.authing.assert_user_is_admin(&user).await?;
    }

    state.badging.remove(&id).await?;
    Ok(Json(json!({ "msg": "Badge deleted successfully!" })))
}

// ========== Reports ==========

async fn get_reports(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.authing.assert_user_is_admin(&user).await?;
    let reports = state.reporting.get_reports().await?;
    Ok(Json(json!(reports)))
}

#[derive(Debug, Deserialize)]
struct CreateReportBody {
    id: String,
    info: Option<String>,
}

async fn create_report(
    State(state): State<AppState>,
    Json(body): Json<CreateReportBody>,
) -> Result<Json<Value>, ApiError> {
    require_non_empty(&body.id, "id")?;
    let report = state
        .reporting
        .create(&body.id, body.info.as_deref())
        .await?;
    Ok(Json(json!({ "msg": "Report successfully created!", "report": report })))
}

#[derive(Debug, Deserialize)]
struct AddressReportQuery {
    validity: Option<String>,
}

/// Adjudicate a report. A "true" validity grants shame badges to the item's
/// author and every current liker, then deletes the item (with its comments
/// and like tracking) and finally the report. Badges are granted before the
/// deletions because the author and liker lookups need the live item.
async fn address_report(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
    Query(query): Query<AddressReportQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.authing.assert_user_is_admin(&user).await?;

    let report = state
        .reporting
        .get_report(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Report {id} does not exist!")))?;

    let valid = query
        .validity
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    if valid {
        let item = &report.item;

        // Resolve the item's author by probing Post then Comment: item
        // references are untyped, ids never collide across collections.
        let post = state.posting.get_post(item).await?;
        let author = match &post {
            Some(p) => Some(p.author.clone()),
            None => state
                .commenting
                .get_comment(item)
                .await?
                .map(|c| c.author),
        };
        let author = author.ok_or_else(|| {
            ApiError::NotFound(format!("Reported item {item} no longer exists!"))
        })?;

        state.badging.give(&author, BadgeType::Shame).await?;
        for liker in state.liking.get_item_likers(item).await? {
            state.badging.give(&liker, BadgeType::Shame).await?;
        }

        if post.is_some() {
            state.commenting.delete_item_comments(item).await?;
            state.liking.delete_item(item).await?;
            state.posting.delete(item).await?;
        } else {
            state.commenting.delete(item).await?;
        }
    }

    state.reporting.remove(&id).await?;
    Ok(Json(json!({ "msg": "Report addressed!" })))
}

// ========== Blur filters ==========

async fn get_filters(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let filters = state.blurring.get_filters(&user).await?;
    Ok(Json(json!(filters)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddFilterBody {
    filter_user: String,
}

async fn add_filter(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<AddFilterBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    require_non_empty(&body.filter_user, "filterUser")?;
    state.blurring.add_filter(&user, &body.filter_user).await?;
    Ok(Json(json!({ "msg": "Filter successfully added!" })))
}

async fn delete_filter(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.blurring.remove_filter(&user, &id).await?;
    Ok(Json(json!({ "msg": "Filter removed!" })))
}

#[derive(Debug, Deserialize)]
struct BlurBody {
    id: String,
}

/// Return the post's image blurred if its author is in the caller's filter
/// set, otherwise the raw image URL.
async fn blur_post(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<BlurBody>,
) -> Result<Response, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    let post = state
        .posting
        .get_post(&body.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Post {} does not exist!", body.id)))?;

    if state.blurring.in_filter(&user, &post.author).await? {
        let bytes = state.blurring.blur(&post.image, None).await?;
        Ok(png_response(bytes))
    } else {
        Ok(Json(json!({ "image": post.image })).into_response())
    }
}

/// Blur the post's image at an explicit intensity, regardless of filters.
async fn blur_post_at_intensity(
    State(state): State<AppState>,
    Path(intensity): Path<String>,
    Json(body): Json<BlurBody>,
) -> Result<Response, ApiError> {
    let intensity: f32 = intensity
        .parse()
        .map_err(|_| ApiError::BadInput(format!("Invalid blur intensity: {intensity}")))?;

    let post = state
        .posting
        .get_post(&body.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Post {} does not exist!", body.id)))?;

    let bytes = state.blurring.blur(&post.image, Some(intensity)).await?;
    Ok(png_response(bytes))
}

fn png_response(bytes: Vec<u8>) -> Response {
    (AppendHeaders([(CONTENT_TYPE, "image/png")]), bytes).into_response()
}

// ========== Comments ==========

#[derive(Debug, Deserialize)]
struct CommentsQuery {
    item: Option<String>,
}

async fn get_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentsQuery>,
) -> Result<Json<Value>, ApiError> {
    let comments = if let Some(item) = query.item {
        state.commenting.get_item_comments(&item).await?
    } else {
        state.commenting.get_comments().await?
    };
    Ok(Json(json!(comments)))
}

#[derive(Debug, Deserialize)]
struct CreateCommentBody {
    item: String,
    content: String,
}

async fn create_comment(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<CreateCommentBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    require_non_empty(&body.item, "item")?;
    require_non_empty(&body.content, "content")?;

    let comment = state
        .commenting
        .create(&user, &body.item, &body.content)
        .await?;
    Ok(Json(json!({ "msg": "Comment successfully created!", "comment": comment })))
}

async fn delete_comment(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.commenting.assert_author_is_user(&id, &user).await?;
    state.commenting.delete(&id).await?;
    Ok(Json(json!({ "msg": "Comment deleted successfully!" })))
}

// ========== Likes ==========

#[derive(Debug, Deserialize)]
struct ItemLikesQuery {
    item: String,
}

async fn get_item_like_count(
    State(state): State<AppState>,
    Query(query): Query<ItemLikesQuery>,
) -> Result<Json<Value>, ApiError> {
    let count = state.liking.get_item_like_count(&query.item).await?;
    Ok(Json(json!(count)))
}

#[derive(Debug, Deserialize)]
struct UserLikesQuery {
    id: String,
}

async fn get_user_likes(
    State(state): State<AppState>,
    Query(query): Query<UserLikesQuery>,
) -> Result<Json<Value>, ApiError> {
    let likes = state.liking.get_user_likes(&query.id).await?;
    Ok(Json(json!(likes)))
}

#[derive(Debug, Deserialize)]
struct AddLikeBody {
    item: String,
}

async fn add_like(
    State(state): State<AppState>,
    token: SessionToken,
    Json(body): Json<AddLikeBody>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    require_non_empty(&body.item, "item")?;
    let like = state.liking.like(&user, &body.item).await?;
    Ok(Json(json!({ "msg": "Successfully liked!", "like": like })))
}

async fn remove_like(
    State(state): State<AppState>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state.sessioning.get_user(token.as_deref()).await?;
    state.liking.unlike(&user, &id).await?;
    Ok(Json(json!({ "msg": "Successfully removed like!" })))
}
