use actix_middleware::UserId;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::services::Timeframe;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub timeframe: Option<String>,
}

/// Paginated newest-first feed
pub async fn latest(
    state: web::Data<AppState>,
    user_id: UserId,
    query: web::Query<LatestQuery>,
) -> HttpResponse {
    let page = state.feed.latest(user_id.0, query.page, query.limit).await;
    HttpResponse::Ok().json(page)
}

/// `?timeframe=day|week|month`, unknown values read as week
pub async fn trending(
    state: web::Data<AppState>,
    user_id: UserId,
    query: web::Query<TrendingQuery>,
) -> HttpResponse {
    let timeframe = Timeframe::parse(query.timeframe.as_deref());
    let posts = state.feed.trending(user_id.0, timeframe, Utc::now()).await;
    HttpResponse::Ok().json(posts)
}

pub async fn by_category(
    state: web::Data<AppState>,
    user_id: UserId,
    category: web::Path<String>,
) -> HttpResponse {
    HttpResponse::Ok().json(state.feed.by_category(user_id.0, &category).await)
}

pub async fn by_hashtag(
    state: web::Data<AppState>,
    user_id: UserId,
    tag: web::Path<String>,
) -> HttpResponse {
    HttpResponse::Ok().json(state.feed.by_hashtag(user_id.0, &tag).await)
}

pub async fn by_media_type(
    state: web::Data<AppState>,
    user_id: UserId,
    media_type: web::Path<String>,
) -> HttpResponse {
    HttpResponse::Ok().json(state.feed.by_media_type(user_id.0, &media_type).await)
}

pub async fn trending_hashtags(state: web::Data<AppState>, user_id: UserId) -> HttpResponse {
    HttpResponse::Ok().json(state.feed.trending_hashtags(user_id.0, Utc::now()).await)
}

pub async fn discover_people(state: web::Data<AppState>, user_id: UserId) -> HttpResponse {
    HttpResponse::Ok().json(state.feed.discover_people(user_id.0).await)
}
