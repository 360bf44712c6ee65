//! Route table.
//!
//! Health and metrics are public; everything else under `/api/v1` requires a
//! bearer token. Extractor failures (bad JSON, malformed ids, bad query
//! strings) answer 400 with the standard error body.

use actix_middleware::{JwtAuthMiddleware, TokenVerifier};
use actix_web::web;
use std::sync::Arc;

use crate::error::AppError;
use crate::handlers::{self, connections, feed, posts};
use crate::metrics::serve_metrics;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

pub fn configure(cfg: &mut web::ServiceConfig, verifier: Arc<TokenVerifier>) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .route("/metrics", web::get().to(serve_metrics))
        .route("/api/v1/health", web::get().to(handlers::health_summary))
        .route("/api/v1/health/live", web::get().to(handlers::liveness_check))
        .service(
            web::scope("/api/v1")
                .wrap(JwtAuthMiddleware::new(verifier))
                .service(
                    web::scope("/connections")
                        .route("/send/{id}", web::post().to(connections::send_request))
                        .route("/cancel/{id}", web::delete().to(connections::cancel_request))
                        .route("/accept/{id}", web::post().to(connections::accept_request))
                        .route("/reject/{id}", web::delete().to(connections::reject_request))
                        .route("/incoming", web::get().to(connections::incoming))
                        .route("/outgoing", web::get().to(connections::outgoing))
                        .route("/connections", web::get().to(connections::connections))
                        .route("/status/{user_id}", web::get().to(connections::status)),
                )
                .service(
                    web::scope("/feed")
                        .route("/latest", web::get().to(feed::latest))
                        .route("/trending", web::get().to(feed::trending))
                        .route("/category/{category}", web::get().to(feed::by_category))
                        .route("/hashtag/{tag}", web::get().to(feed::by_hashtag))
                        .route("/media/{media_type}", web::get().to(feed::by_media_type))
                        .route("/hashtags/trending", web::get().to(feed::trending_hashtags))
                        .route("/people", web::get().to(feed::discover_people)),
                )
                .service(
                    web::scope("/posts")
                        .service(
                            web::resource("")
                                .route(web::get().to(posts::list_posts))
                                .route(web::post().to(posts::create_post)),
                        )
                        .service(
                            web::resource("/{id}")
                                .route(web::get().to(posts::get_post))
                                .route(web::patch().to(posts::update_post)),
                        )
                        .route("/{id}/like", web::post().to(posts::like_post))
                        .route("/{id}/comment", web::post().to(posts::comment_on_post))
                        .route("/{id}/save", web::post().to(posts::save_post))
                        .route("/{id}/share", web::post().to(posts::share_post))
                        .route("/{id}/view", web::post().to(posts::view_post)),
                ),
        );
}
