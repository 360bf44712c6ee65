#[macro_use]
mod common;

use actix_web::{http::StatusCode, test};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{bearer, TestContext};
use network_service::domain::{Account, MediaItem, MediaType, Post, Relation, Visibility};
use network_service::repository::{AccountStore, PostRepository};

async fn seed_post(ctx: &TestContext, author: Uuid, content: &str, minutes_ago: i64) -> Post {
    let post = Post::new(
        author,
        content.to_string(),
        None,
        Vec::new(),
        network_service::services::extract_hashtags(content),
        Utc::now() - Duration::minutes(minutes_ago),
    );
    ctx.store.insert_post(&post).await.expect("seed post");
    post
}

async fn connect(ctx: &TestContext, a: &mut Account, b: &mut Account) {
    a.relations.set(b.id, Some(Relation::Connected));
    b.relations.set(a.id, Some(Relation::Connected));
    ctx.store.upsert_account(a).await.expect("seed relation");
    ctx.store.upsert_account(b).await.expect("seed relation");
}

fn ids(posts: &Value) -> Vec<String> {
    posts
        .as_array()
        .expect("array")
        .iter()
        .map(|p| p["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[actix_web::test]
async fn hashtag_and_private_latest_end_to_end() {
    let ctx = TestContext::new();
    let u1 = ctx.account("Una", Visibility::Public).await;
    let u2 = ctx.account("Vic", Visibility::Public).await;
    let u3 = ctx.account("Wes", Visibility::Private).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(u1.id))
        .set_json(json!({ "content": "hello #campus" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["tags"], json!(["campus"]));

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/hashtag/campus")
        .insert_header(bearer(u2.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ids(&body), vec![created["id"].as_str().unwrap().to_string()]);
    assert_eq!(body[0]["user"]["name"], "Una");

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(u3.id))
        .set_json(json!({ "content": "private thoughts" }))
        .to_request();
    let private: Value = test::call_and_read_body_json(&app, req).await;
    let private_id = private["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/latest")
        .insert_header(bearer(u2.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(!ids(&body["posts"]).contains(&private_id));
    assert_eq!(body["totalPosts"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/latest")
        .insert_header(bearer(u3.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(ids(&body["posts"]).contains(&private_id));
}

#[actix_web::test]
async fn latest_paginates_newest_first() {
    let ctx = TestContext::new();
    let author = ctx.account("Ana", Visibility::Public).await;
    let viewer = ctx.account("Ben", Visibility::Public).await;
    for i in 0..25 {
        seed_post(&ctx, author.id, &format!("post {}", i), 25 - i).await;
    }
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/latest?page=3&limit=10")
        .insert_header(bearer(viewer.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["currentPage"], 3);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["totalPosts"], 25);
    let posts = body["posts"].as_array().expect("posts");
    assert_eq!(posts.len(), 5);
    assert_eq!(posts[0]["content"], "post 4");
    assert_eq!(posts[4]["content"], "post 0");
}

#[actix_web::test]
async fn latest_clamps_page_and_limit() {
    let ctx = TestContext::new();
    let author = ctx.account("Ana", Visibility::Public).await;
    for i in 0..3 {
        seed_post(&ctx, author.id, &format!("post {}", i), 3 - i).await;
    }
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/latest?page=0&limit=0")
        .insert_header(bearer(author.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["currentPage"], 1);
    assert_eq!(body["posts"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["totalPages"], 3);
}

#[actix_web::test]
async fn latest_caps_oversized_page() {
    let ctx = TestContext::new();
    let author = ctx.account("Ana", Visibility::Public).await;
    seed_post(&ctx, author.id, "only post", 1).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/latest?page=9223372036854775807")
        .insert_header(bearer(author.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["currentPage"], 1_000_000);
    assert_eq!(body["totalPosts"], 1);
    assert_eq!(body["totalPages"], 1);
    assert_eq!(body["posts"], json!([]));
}

#[actix_web::test]
async fn trending_ranks_by_presentation_score() {
    let ctx = TestContext::new();
    let author = ctx.account("Ana", Visibility::Public).await;
    let fans: Vec<Account> = {
        let mut fans = Vec::new();
        for name in ["Fay", "Gus", "Hal"] {
            fans.push(ctx.account(name, Visibility::Public).await);
        }
        fans
    };

    let quiet = seed_post(&ctx, author.id, "quiet", 5).await;
    let busy = seed_post(&ctx, author.id, "busy", 10).await;
    let stale = seed_post(&ctx, author.id, "stale", 60 * 24 * 3).await;
    for fan in &fans {
        ctx.store
            .toggle_like(busy.id, fan.id, Utc::now())
            .await
            .expect("like");
        ctx.store
            .toggle_like(stale.id, fan.id, Utc::now())
            .await
            .expect("like");
    }
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/trending?timeframe=day")
        .insert_header(bearer(author.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(ids(&body), vec![busy.id.to_string(), quiet.id.to_string()]);
    assert_eq!(body[0]["likesCount"], 3);
    assert_eq!(body[0]["trendingScore"], 3);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/trending?timeframe=fortnight")
        .insert_header(bearer(author.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(3));
}

#[actix_web::test]
async fn private_author_visible_to_connections_only() {
    let ctx = TestContext::new();
    let mut private = ctx.account("Pia", Visibility::Private).await;
    let mut friend = ctx.account("Fin", Visibility::Public).await;
    let stranger = ctx.account("Sam", Visibility::Public).await;
    connect(&ctx, &mut private, &mut friend).await;
    seed_post(&ctx, private.id, "members only #club", 1).await;
    let app = test_app!(ctx);

    for (viewer, expected) in [(friend.id, 1), (stranger.id, 0), (private.id, 1)] {
        let req = test::TestRequest::get()
            .uri("/api/v1/feed/hashtag/club")
            .insert_header(bearer(viewer))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(Vec::len), Some(expected));
    }
}

#[actix_web::test]
async fn category_and_media_filters() {
    let ctx = TestContext::new();
    let author = ctx.account("Ana", Visibility::Public).await;

    let mut event = Post::new(author.id, "open day".into(), Some("event".into()), Vec::new(), Vec::new(), Utc::now());
    event.created_at -= Duration::minutes(2);
    let video = Post::new(
        author.id,
        "clip".into(),
        None,
        vec![MediaItem {
            media_type: MediaType::Video,
            url: "https://cdn.campus.dev/clip.mp4".into(),
            thumbnail: None,
            caption: None,
        }],
        Vec::new(),
        Utc::now(),
    );
    ctx.store.insert_post(&event).await.expect("seed");
    ctx.store.insert_post(&video).await.expect("seed");
    let app = test_app!(ctx);

    let get = |uri: &str| {
        test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(author.id))
            .to_request()
    };

    let body: Value = test::call_and_read_body_json(&app, get("/api/v1/feed/category/events")).await;
    assert_eq!(ids(&body), vec![event.id.to_string()]);

    let body: Value = test::call_and_read_body_json(&app, get("/api/v1/feed/category/media")).await;
    assert_eq!(ids(&body), vec![video.id.to_string()]);

    let body: Value = test::call_and_read_body_json(&app, get("/api/v1/feed/media/video")).await;
    assert_eq!(ids(&body), vec![video.id.to_string()]);

    let body: Value = test::call_and_read_body_json(&app, get("/api/v1/feed/media/image")).await;
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn trending_hashtags_and_people() {
    let ctx = TestContext::new();
    let mut ana = ctx.account("Ana", Visibility::Public).await;
    let mut ben = ctx.account("Ben", Visibility::Public).await;
    let mut cat = ctx.account("Cat", Visibility::Public).await;
    let _dan = ctx.account("Dan", Visibility::Public).await;
    connect(&ctx, &mut ana, &mut ben).await;
    connect(&ctx, &mut ben, &mut cat).await;

    seed_post(&ctx, ana.id, "#exams are close #library", 10).await;
    seed_post(&ctx, ben.id, "#exams #Exams again", 20).await;
    seed_post(&ctx, cat.id, "#library open late", 30).await;
    seed_post(&ctx, cat.id, "#exams #oldnews", 60 * 24 * 8).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/hashtags/trending")
        .insert_header(bearer(ana.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!([
            { "tag": "exams", "count": 2 },
            { "tag": "library", "count": 2 },
        ])
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/people")
        .insert_header(bearer(ana.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let people = body.as_array().expect("array");
    assert_eq!(people.len(), 3);
    assert_eq!(people[0]["name"], "Cat");
    assert_eq!(people[0]["mutualConnections"], 1);
    assert_eq!(people[0]["isConnected"], false);
    let ben_entry = people.iter().find(|p| p["name"] == "Ben").expect("ben");
    assert_eq!(ben_entry["isConnected"], true);
}

#[actix_web::test]
async fn posts_of_missing_author_stay_hidden() {
    let ctx = TestContext::new();
    let viewer = ctx.account("Ben", Visibility::Public).await;
    let gone = Uuid::new_v4();
    let orphan = seed_post(&ctx, gone, "left behind #ghost", 1).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/latest")
        .insert_header(bearer(viewer.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["totalPosts"], 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}", orphan.id))
        .insert_header(bearer(viewer.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/hashtag/ghost")
        .insert_header(bearer(gone))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ids(&body), vec![orphan.id.to_string()]);
    assert_eq!(body[0]["user"]["name"], "Unknown User");
}
