use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::PgStore;
use crate::domain::account::display_department;
use crate::domain::{AuthorSummary, Comment, MediaItem, MediaType, Post, PostWithAuthor};
use crate::error::StoreResult;
use crate::repository::r#trait::{PostFilter, PostPage, PostQuery, PostRepository};
use crate::services::engagement::recompute_score;

const POST_SELECT: &str = r#"
    SELECT p.id, p.author_id, p.content, p.post_type, p.media, p.tags,
           p.shares, p.views, p.engagement_score, p.created_at, p.updated_at,
           a.name AS author_name, a.profile_photo AS author_photo, a.role AS author_role,
           a.department AS author_department,
           a.faculty_department AS author_faculty_department,
           a.visibility AS author_visibility
    FROM posts p
    LEFT JOIN accounts a ON a.id = p.author_id
"#;

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    content: String,
    post_type: Option<String>,
    media: Json<Vec<MediaItem>>,
    tags: Vec<String>,
    shares: i64,
    views: i64,
    engagement_score: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_name: Option<String>,
    author_photo: Option<String>,
    author_role: Option<String>,
    author_department: Option<String>,
    author_faculty_department: Option<String>,
    author_visibility: Option<String>,
}

impl PostRow {
    fn author(&self) -> AuthorSummary {
        match &self.author_name {
            Some(name) => AuthorSummary {
                id: self.author_id,
                name: name.clone(),
                profile_photo: self.author_photo.clone(),
                role: self.author_role.clone().unwrap_or_else(|| "student".to_string()),
                department: display_department(
                    self.author_department.clone(),
                    self.author_faculty_department.clone(),
                ),
                is_private: self.author_visibility.as_deref() == Some("private"),
            },
            None => AuthorSummary::unknown(self.author_id),
        }
    }
}

/// Like/save rows and comments for a batch of posts
#[derive(Default)]
struct Engagement {
    likes: HashMap<Uuid, BTreeSet<Uuid>>,
    saves: HashMap<Uuid, BTreeSet<Uuid>>,
    comments: HashMap<Uuid, Vec<Comment>>,
}

async fn load_memberships(
    conn: &mut PgConnection,
    table: &'static str,
    post_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, BTreeSet<Uuid>>> {
    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(&format!(
        "SELECT post_id, user_id FROM {} WHERE post_id = ANY($1)",
        table
    ))
    .bind(post_ids.to_vec())
    .fetch_all(&mut *conn)
    .await?;

    let mut by_post: HashMap<Uuid, BTreeSet<Uuid>> = HashMap::new();
    for (post_id, user_id) in rows {
        by_post.entry(post_id).or_default().insert(user_id);
    }
    Ok(by_post)
}

async fn load_engagement(conn: &mut PgConnection, post_ids: &[Uuid]) -> StoreResult<Engagement> {
    if post_ids.is_empty() {
        return Ok(Engagement::default());
    }

    let likes = load_memberships(conn, "post_likes", post_ids).await?;
    let saves = load_memberships(conn, "post_saves", post_ids).await?;

    let rows: Vec<(Uuid, Uuid, Uuid, String, String, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT post_id, id, author_id, author_name, content, created_at
        FROM post_comments
        WHERE post_id = ANY($1)
        ORDER BY created_at, id
        "#,
    )
    .bind(post_ids.to_vec())
    .fetch_all(&mut *conn)
    .await?;

    let mut comments: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for (post_id, id, author_id, author_name, content, created_at) in rows {
        comments.entry(post_id).or_default().push(Comment {
            id,
            author_id,
            author_name,
            content,
            created_at,
        });
    }

    Ok(Engagement {
        likes,
        saves,
        comments,
    })
}

async fn assemble(conn: &mut PgConnection, rows: Vec<PostRow>) -> StoreResult<Vec<PostWithAuthor>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut engagement = load_engagement(conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let user = row.author();
            let post = Post {
                id: row.id,
                author_id: row.author_id,
                content: row.content,
                post_type: row.post_type,
                media: row.media.0,
                tags: row.tags,
                likes: engagement.likes.remove(&row.id).unwrap_or_default(),
                saves: engagement.saves.remove(&row.id).unwrap_or_default(),
                shares: row.shares,
                views: row.views,
                comments: engagement.comments.remove(&row.id).unwrap_or_default(),
                engagement_score: row.engagement_score,
                created_at: row.created_at,
                updated_at: row.updated_at,
            };
            PostWithAuthor { post, user }
        })
        .collect())
}

async fn load_post(conn: &mut PgConnection, post_id: Uuid) -> StoreResult<Option<PostWithAuthor>> {
    let rows: Vec<PostRow> = sqlx::query_as(&format!("{} WHERE p.id = $1", POST_SELECT))
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(assemble(conn, rows).await?.pop())
}

/// Lock the post row for the rest of the transaction; false if it is missing
async fn lock_post(conn: &mut PgConnection, post_id: Uuid) -> StoreResult<bool> {
    let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Recompute and store the persisted score of a locked post
async fn refresh_score(
    conn: &mut PgConnection,
    post_id: Uuid,
    now: DateTime<Utc>,
) -> StoreResult<Option<Post>> {
    let Some(PostWithAuthor { mut post, .. }) = load_post(conn, post_id).await? else {
        return Ok(None);
    };

    recompute_score(&mut post, now);
    post.updated_at = now;

    sqlx::query("UPDATE posts SET engagement_score = $2, updated_at = $3 WHERE id = $1")
        .bind(post_id)
        .bind(post.engagement_score)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(Some(post))
}

fn media_type_str(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Image => "image",
        MediaType::Video => "video",
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, query: &PostQuery) {
    qb.push(" WHERE ");
    query.scope.push_predicate(qb);

    if let Some(since) = query.since {
        qb.push(" AND p.created_at >= ");
        qb.push_bind(since);
    }

    match &query.filter {
        PostFilter::All => {}
        PostFilter::PostType(kind) => {
            qb.push(" AND p.post_type = ");
            qb.push_bind(kind.clone());
        }
        PostFilter::HasMedia => {
            qb.push(" AND jsonb_array_length(p.media) > 0");
        }
        PostFilter::MediaType(media_type) => {
            qb.push(" AND EXISTS (SELECT 1 FROM jsonb_array_elements(p.media) m WHERE m->>'type' = ");
            qb.push_bind(media_type_str(*media_type));
            qb.push(")");
        }
        PostFilter::Hashtag(tag) => {
            qb.push(" AND p.content ILIKE ");
            qb.push_bind(format!("%#{}%", escape_like(tag)));
        }
    }
}

impl PgStore {
    /// Run `mutate` against a locked post, then recompute its score, in one
    /// transaction. `mutate` returns false when the post does not exist.
    async fn mutate_post<F>(&self, post_id: Uuid, now: DateTime<Utc>, mutate: F) -> StoreResult<Option<Post>>
    where
        F: for<'c> FnOnce(
                &'c mut PgConnection,
            ) -> futures::future::BoxFuture<'c, StoreResult<bool>>
            + Send,
    {
        let mut tx = self.pool.begin().await?;

        if !mutate(&mut *tx).await? {
            return Ok(None);
        }
        let post = refresh_score(&mut *tx, post_id, now).await?;

        tx.commit().await?;
        Ok(post)
    }

    async fn toggle_membership(
        &self,
        table: &'static str,
        post_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        self.mutate_post(post_id, now, move |conn| {
            Box::pin(async move {
                if !lock_post(conn, post_id).await? {
                    return Ok(false);
                }

                let removed = sqlx::query(&format!(
                    "DELETE FROM {} WHERE post_id = $1 AND user_id = $2",
                    table
                ))
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;

                if removed.rows_affected() == 0 {
                    sqlx::query(&format!(
                        "INSERT INTO {} (post_id, user_id) VALUES ($1, $2)",
                        table
                    ))
                    .bind(post_id)
                    .bind(user_id)
                    .execute(&mut *conn)
                    .await?;
                }
                Ok(true)
            })
        })
        .await
    }

    async fn increment_counter(
        &self,
        column: &'static str,
        post_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        self.mutate_post(post_id, now, move |conn| {
            Box::pin(async move {
                let updated: Option<Uuid> = sqlx::query_scalar(&format!(
                    "UPDATE posts SET {col} = {col} + 1 WHERE id = $1 RETURNING id",
                    col = column
                ))
                .bind(post_id)
                .fetch_optional(&mut *conn)
                .await?;
                Ok(updated.is_some())
            })
        })
        .await
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, content, post_type, media, tags,
                               shares, views, engagement_score, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.content)
        .bind(&post.post_type)
        .bind(Json(&post.media))
        .bind(&post.tags)
        .bind(post.shares)
        .bind(post.views)
        .bind(post.engagement_score)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_content(
        &self,
        post_id: Uuid,
        content: &str,
        tags: &[String],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        let mut conn = self.pool.acquire().await?;

        let updated: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE posts
            SET content = $2, tags = $3, updated_at = $4
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(post_id)
        .bind(content)
        .bind(tags.to_vec())
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }
        Ok(load_post(&mut conn, post_id).await?.map(|p| p.post))
    }

    async fn get_post(&self, post_id: Uuid) -> StoreResult<Option<PostWithAuthor>> {
        let mut conn = self.pool.acquire().await?;
        load_post(&mut conn, post_id).await
    }

    async fn query_posts(&self, query: &PostQuery) -> StoreResult<PostPage> {
        let mut conn = self.pool.acquire().await?;

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM posts p LEFT JOIN accounts a ON a.id = p.author_id",
        );
        push_conditions(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await?;

        let mut page = QueryBuilder::<Postgres>::new(POST_SELECT);
        push_conditions(&mut page, query);
        page.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        page.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        page.push(" OFFSET ");
        page.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));

        let rows: Vec<PostRow> = page.build_query_as().fetch_all(&mut *conn).await?;
        let posts = assemble(&mut conn, rows).await?;

        Ok(PostPage {
            posts,
            total: total.max(0) as u64,
        })
    }

    async fn toggle_like(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        self.toggle_membership("post_likes", post_id, user_id, now)
            .await
    }

    async fn toggle_save(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        self.toggle_membership("post_saves", post_id, user_id, now)
            .await
    }

    async fn add_comment(
        &self,
        post_id: Uuid,
        comment: &Comment,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        let comment = comment.clone();
        self.mutate_post(post_id, now, move |conn| {
            Box::pin(async move {
                if !lock_post(conn, post_id).await? {
                    return Ok(false);
                }

                sqlx::query(
                    r#"
                    INSERT INTO post_comments (id, post_id, author_id, author_name, content, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(comment.id)
                .bind(post_id)
                .bind(comment.author_id)
                .bind(&comment.author_name)
                .bind(&comment.content)
                .bind(comment.created_at)
                .execute(&mut *conn)
                .await?;
                Ok(true)
            })
        })
        .await
    }

    async fn increment_shares(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Post>> {
        self.increment_counter("shares", post_id, now).await
    }

    async fn increment_views(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Post>> {
        self.increment_counter("views", post_id, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::visibility::ViewerScope;

    fn query_with(filter: PostFilter) -> PostQuery {
        PostQuery::new(ViewerScope::new(Uuid::new_v4(), []), filter, 20)
    }

    #[test]
    fn test_hashtag_filter_escapes_like_wildcards() {
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
    }

    #[test]
    fn test_conditions_for_media_type() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM posts p");
        push_conditions(&mut qb, &query_with(PostFilter::MediaType(MediaType::Video)));

        let sql = qb.sql();
        assert!(sql.contains("jsonb_array_elements(p.media)"));
        assert!(sql.ends_with("m->>'type' = $3)"));
    }

    #[test]
    fn test_conditions_for_window_and_type() {
        let mut query = query_with(PostFilter::PostType("event".to_string()));
        query.since = Some(Utc::now());

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM posts p");
        push_conditions(&mut qb, &query);

        let sql = qb.sql();
        assert!(sql.contains("p.created_at >= $3"));
        assert!(sql.contains("p.post_type = $4"));
    }
}
