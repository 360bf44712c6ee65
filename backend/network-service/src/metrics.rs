//! Prometheus metrics for network-service.
//!
//! HTTP request counters come from `actix_middleware::MetricsMiddleware`; this
//! module holds the domain collectors and the `/metrics` handler.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Connection state machine operations by op and outcome.
    pub static ref CONNECTION_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "connection_transitions_total",
        "Connection operations segmented by operation and outcome",
        &["op", "outcome"]
    )
    .expect("failed to register connection_transitions_total");

    /// Feed requests by retrieval mode; outcome is `ok` or `degraded`.
    pub static ref FEED_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_requests_total",
        "Feed requests segmented by retrieval mode and outcome",
        &["mode", "outcome"]
    )
    .expect("failed to register feed_requests_total");

    pub static ref FEED_CANDIDATE_COUNT: HistogramVec = register_histogram_vec!(
        "feed_candidate_count",
        "Number of posts returned by the store per feed request",
        &["mode"],
        vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    )
    .expect("failed to register feed_candidate_count");

    /// Likes, comments, saves, shares, views.
    pub static ref ENGAGEMENT_MUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "engagement_mutations_total",
        "Engagement mutations segmented by kind",
        &["kind"]
    )
    .expect("failed to register engagement_mutations_total");

    /// Pairs found with unmirrored relation sets. Any increase needs an operator.
    pub static ref STORE_INTEGRITY_VIOLATIONS_TOTAL: IntCounter = register_int_counter!(
        "store_integrity_violations_total",
        "Account pairs whose relation sets were found inconsistent"
    )
    .expect("failed to register store_integrity_violations_total");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
