/// Post handlers - authoring, reads and engagement on a single post
use actix_middleware::UserId;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::services::{CreatePostRequest, UpdatePostRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

pub async fn create_post(
    state: web::Data<AppState>,
    user_id: UserId,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    let created = state.posts.create(user_id.0, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn list_posts(state: web::Data<AppState>, user_id: UserId) -> HttpResponse {
    HttpResponse::Ok().json(state.posts.list_visible(user_id.0).await)
}

pub async fn get_post(
    state: web::Data<AppState>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = state.posts.get_post(user_id.0, post_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn update_post(
    state: web::Data<AppState>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    let post = state
        .posts
        .update_content(user_id.0, post_id.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Toggle the viewer's like
pub async fn like_post(
    state: web::Data<AppState>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = state
        .engagement
        .toggle_like(user_id.0, post_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn comment_on_post(
    state: web::Data<AppState>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
    req: web::Json<CommentRequest>,
) -> Result<HttpResponse> {
    let post = state
        .engagement
        .add_comment(user_id.0, post_id.into_inner(), &req.content)
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Toggle the viewer's bookmark
pub async fn save_post(
    state: web::Data<AppState>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = state
        .engagement
        .toggle_save(user_id.0, post_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn share_post(
    state: web::Data<AppState>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = state
        .engagement
        .record_share(user_id.0, post_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn view_post(
    state: web::Data<AppState>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = state
        .engagement
        .record_view(user_id.0, post_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}
