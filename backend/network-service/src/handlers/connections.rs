/// Connection handlers - friend requests between two accounts
///
/// Path ids always name the other account; the viewer comes from the token.
use actix_middleware::UserId;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::state::AppState;

fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "message": text }))
}

/// Send a connection request to `{id}`
pub async fn send_request(
    state: web::Data<AppState>,
    user_id: UserId,
    target: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let text = state
        .connections
        .send_request(user_id.0, target.into_inner())
        .await
        .map_err(AppError::from)?;
    Ok(message(text))
}

/// Withdraw the viewer's pending request to `{id}`
pub async fn cancel_request(
    state: web::Data<AppState>,
    user_id: UserId,
    target: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let text = state
        .connections
        .cancel_request(user_id.0, target.into_inner())
        .await
        .map_err(AppError::from)?;
    Ok(message(text))
}

/// Accept the pending request sent by `{id}`
pub async fn accept_request(
    state: web::Data<AppState>,
    user_id: UserId,
    sender: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let text = state
        .connections
        .accept_request(user_id.0, sender.into_inner())
        .await
        .map_err(AppError::from)?;
    Ok(message(text))
}

/// Decline the pending request sent by `{id}`
pub async fn reject_request(
    state: web::Data<AppState>,
    user_id: UserId,
    sender: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let text = state
        .connections
        .reject_request(user_id.0, sender.into_inner())
        .await
        .map_err(AppError::from)?;
    Ok(message(text))
}

pub async fn incoming(state: web::Data<AppState>, user_id: UserId) -> HttpResponse {
    HttpResponse::Ok().json(state.connections.incoming(user_id.0).await)
}

pub async fn outgoing(state: web::Data<AppState>, user_id: UserId) -> HttpResponse {
    HttpResponse::Ok().json(state.connections.outgoing(user_id.0).await)
}

pub async fn connections(state: web::Data<AppState>, user_id: UserId) -> HttpResponse {
    HttpResponse::Ok().json(state.connections.connections(user_id.0).await)
}

pub async fn status(
    state: web::Data<AppState>,
    user_id: UserId,
    other: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let view = state
        .connections
        .status(user_id.0, other.into_inner())
        .await
        .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(view))
}
