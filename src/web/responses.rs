//! Response formatter: maps raw records (author ids) into the enriched
//! shapes read endpoints return (author usernames).

use serde::Serialize;

use crate::concepts::friending::FriendRequest;
use crate::concepts::posting::Post;
use crate::concepts::Authenticating;
use crate::error::ApiError;

/// A post with its author id resolved to a username.
#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    pub id: String,
    pub author: String,
    pub image: String,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A friend request with both party ids resolved to usernames.
#[derive(Debug, Clone, Serialize)]
pub struct FriendRequestResponse {
    pub id: String,
    pub from_user: String,
    pub to_user: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub async fn post(authing: &Authenticating, post: Post) -> Result<PostResponse, ApiError> {
    let mut formatted = posts(authing, vec![post]).await?;
    Ok(formatted.remove(0))
}

pub async fn posts(
    authing: &Authenticating,
    posts: Vec<Post>,
) -> Result<Vec<PostResponse>, ApiError> {
    let author_ids: Vec<String> = posts.iter().map(|p| p.author.clone()).collect();
    let usernames = authing.ids_to_usernames(&author_ids).await?;

    Ok(posts
        .into_iter()
        .zip(usernames)
        .map(|(post, author)| PostResponse {
            id: post.id,
            author,
            image: post.image,
            caption: post.caption,
            background_color: post.background_color,
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
        .collect())
}

pub async fn friend_requests(
    authing: &Authenticating,
    requests: Vec<FriendRequest>,
) -> Result<Vec<FriendRequestResponse>, ApiError> {
    // One flat id list (from, to, from, to, ...) keeps a single resolution
    // round trip for the whole batch.
    let ids: Vec<String> = requests
        .iter()
        .flat_map(|r| [r.from_user.clone(), r.to_user.clone()])
        .collect();
    let usernames = authing.ids_to_usernames(&ids).await?;

    Ok(requests
        .into_iter()
        .zip(usernames.chunks(2))
        .map(|(request, pair)| FriendRequestResponse {
            id: request.id,
            from_user: pair[0].clone(),
            to_user: pair[1].clone(),
            status: request.status,
            created_at: request.created_at,
            updated_at: request.updated_at,
        })
        .collect())
}
