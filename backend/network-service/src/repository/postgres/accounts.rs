use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::PgStore;
use crate::domain::connection::transition;
use crate::domain::{
    Account, AccountSummary, ConnectionError, ConnectionOp, PairState, Relation, Relations, Role,
    Visibility,
};
use crate::error::{StoreError, StoreResult};
use crate::repository::mirror_violation;
use crate::repository::r#trait::AccountStore;

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    email: String,
    profile_photo: Option<String>,
    role: String,
    department: Option<String>,
    faculty_department: Option<String>,
    visibility: String,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self, relations: Relations) -> Account {
        Account {
            id: self.id,
            name: self.name,
            email: self.email,
            profile_photo: self.profile_photo,
            role: Role::parse(&self.role),
            department: self.department,
            faculty_department: self.faculty_department,
            visibility: Visibility::parse(&self.visibility),
            created_at: self.created_at,
            relations,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, name, email, profile_photo, role, department, \
                               faculty_department, visibility, created_at";

fn parse_kind(owner: Uuid, other: Uuid, kind: &str) -> StoreResult<Relation> {
    Relation::parse(kind).ok_or_else(|| {
        StoreError::Integrity(format!(
            "unknown relation kind '{}' from {} to {}",
            kind, owner, other
        ))
    })
}

/// Relation sets for the given owners
async fn load_relations(
    conn: &mut PgConnection,
    owners: &[Uuid],
) -> StoreResult<HashMap<Uuid, Relations>> {
    let rows: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
        r#"
        SELECT owner_id, other_id, kind
        FROM account_relations
        WHERE owner_id = ANY($1)
        "#,
    )
    .bind(owners.to_vec())
    .fetch_all(&mut *conn)
    .await?;

    let mut relations: HashMap<Uuid, Relations> = HashMap::new();
    for (owner, other, kind) in rows {
        let relation = parse_kind(owner, other, &kind)?;
        relations.entry(owner).or_default().set(other, Some(relation));
    }

    Ok(relations)
}

async fn load_accounts(conn: &mut PgConnection, ids: &[Uuid]) -> StoreResult<Vec<Account>> {
    let rows: Vec<AccountRow> = sqlx::query_as(&format!(
        "SELECT {} FROM accounts WHERE id = ANY($1)",
        ACCOUNT_COLUMNS
    ))
    .bind(ids.to_vec())
    .fetch_all(&mut *conn)
    .await?;

    let mut relations = load_relations(conn, ids).await?;
    let mut by_id: HashMap<Uuid, Account> = rows
        .into_iter()
        .map(|row| {
            let rel = relations.remove(&row.id).unwrap_or_default();
            (row.id, row.into_account(rel))
        })
        .collect();

    // Preserve caller order
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Fails with `AccountNotFound` for the first id that has no account row.
/// With `lock`, rows are locked in id order so concurrent pair writes
/// touching the same two accounts serialise without deadlocking.
async fn ensure_accounts(
    conn: &mut PgConnection,
    actor: Uuid,
    other: Uuid,
    lock: bool,
) -> Result<(), ConnectionError> {
    let sql = if lock {
        "SELECT id FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    } else {
        "SELECT id FROM accounts WHERE id = ANY($1)"
    };

    let found: Vec<Uuid> = sqlx::query_scalar(sql)
        .bind(vec![actor, other])
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::from)?;

    for id in [actor, other] {
        if !found.contains(&id) {
            return Err(ConnectionError::AccountNotFound(id));
        }
    }
    Ok(())
}

async fn read_pair(
    conn: &mut PgConnection,
    actor: Uuid,
    other: Uuid,
) -> Result<PairState, ConnectionError> {
    let rows: Vec<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT owner_id, kind
        FROM account_relations
        WHERE (owner_id = $1 AND other_id = $2)
           OR (owner_id = $2 AND other_id = $1)
        "#,
    )
    .bind(actor)
    .bind(other)
    .fetch_all(&mut *conn)
    .await
    .map_err(StoreError::from)?;

    let mut forward = None;
    let mut backward = None;
    for (owner, kind) in rows {
        if owner == actor {
            forward = Some(parse_kind(actor, other, &kind)?);
        } else {
            backward = Some(parse_kind(other, actor, &kind)?);
        }
    }

    PairState::from_sides(forward, backward)
        .map_err(|mismatch| mirror_violation(actor, other, mismatch).into())
}

async fn write_side(
    conn: &mut PgConnection,
    owner: Uuid,
    other: Uuid,
    relation: Option<Relation>,
) -> StoreResult<()> {
    match relation {
        None => {
            sqlx::query("DELETE FROM account_relations WHERE owner_id = $1 AND other_id = $2")
                .bind(owner)
                .bind(other)
                .execute(&mut *conn)
                .await?;
        }
        Some(relation) => {
            sqlx::query(
                r#"
                INSERT INTO account_relations (owner_id, other_id, kind)
                VALUES ($1, $2, $3)
                ON CONFLICT (owner_id, other_id)
                DO UPDATE SET kind = EXCLUDED.kind, updated_at = NOW()
                "#,
            )
            .bind(owner)
            .bind(other)
            .bind(relation.as_str())
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

impl PgStore {
    async fn transition_once(
        &self,
        actor: Uuid,
        other: Uuid,
        op: ConnectionOp,
    ) -> Result<PairState, ConnectionError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        ensure_accounts(&mut *tx, actor, other, true).await?;
        let current = read_pair(&mut *tx, actor, other).await?;
        // Refusals drop the transaction, rolling back the row locks
        let next = transition(op, current)?;

        let (forward, backward) = next.sides();
        write_side(&mut *tx, actor, other, forward).await?;
        write_side(&mut *tx, other, actor, backward).await?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(next)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        Ok(load_accounts(&mut conn, &[id]).await?.pop())
    }

    async fn get_accounts(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await?;
        load_accounts(&mut conn, ids).await
    }

    /// Profile fields only; relation rows change through `apply_transition`
    async fn upsert_account(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, email, profile_photo, role, department,
                                  faculty_department, visibility, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                profile_photo = EXCLUDED.profile_photo,
                role = EXCLUDED.role,
                department = EXCLUDED.department,
                faculty_department = EXCLUDED.faculty_department,
                visibility = EXCLUDED.visibility
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.profile_photo)
        .bind(account.role.as_str())
        .bind(&account.department)
        .bind(&account.faculty_department)
        .bind(account.visibility.as_str())
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn connection_ids(&self, id: Uuid) -> StoreResult<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT other_id
            FROM account_relations
            WHERE owner_id = $1 AND kind = 'connected'
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn pair_state(&self, actor: Uuid, other: Uuid) -> Result<PairState, ConnectionError> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        ensure_accounts(&mut conn, actor, other, false).await?;
        read_pair(&mut conn, actor, other).await
    }

    async fn apply_transition(
        &self,
        actor: Uuid,
        other: Uuid,
        op: ConnectionOp,
    ) -> Result<PairState, ConnectionError> {
        self.retry_on_conflict("connection_transition", move || {
            self.transition_once(actor, other, op)
        })
        .await
    }

    async fn list_related(&self, id: Uuid, relation: Relation) -> StoreResult<Vec<AccountSummary>> {
        let rows: Vec<(Uuid, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT a.id, a.name, a.email, a.profile_photo
            FROM account_relations r
            JOIN accounts a ON a.id = r.other_id
            WHERE r.owner_id = $1 AND r.kind = $2
            ORDER BY a.name, a.id
            "#,
        )
        .bind(id)
        .bind(relation.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, email, profile_photo)| AccountSummary {
                id,
                name,
                email,
                profile_photo,
            })
            .collect())
    }

    async fn discover(&self, viewer: Uuid, limit: usize) -> StoreResult<Vec<Account>> {
        let mut conn = self.pool.acquire().await?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM accounts
            WHERE id <> $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(viewer)
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?;

        load_accounts(&mut conn, &ids).await
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
