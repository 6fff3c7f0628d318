//! # cp-db-sqlite
//!
//! This module implements the data mapping between the SQLite relational
//! model and the `cp-core` domain models. Composite operations (flag insert
//! with auto-hide, review commits with penalties) run as single
//! transactions so the engine's all-or-nothing rules hold at the database.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use cp_core::error::{EngineError, Result};
use cp_core::models::{
    ContentMeta, ContentRef, ContentStatus, ContentType, FlagReason, ModerationFlag,
    ModerationReview, Penalty, QueueItem, TrustCause, TrustEvent, User, Vote,
    VoteDirection, DEFAULT_TRUST_SCORE,
};
use cp_core::traits::{EngineStore, FlagInsertOutcome, PenaltyDraft};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id              BLOB PRIMARY KEY,
    trust_score     REAL NOT NULL DEFAULT 50.0,
    is_global_admin INTEGER NOT NULL DEFAULT 0,
    is_official     INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS content (
    content_type TEXT NOT NULL,
    content_id   BLOB NOT NULL,
    author_id    BLOB NOT NULL,
    status       TEXT NOT NULL DEFAULT 'pending',
    PRIMARY KEY (content_type, content_id)
);

CREATE TABLE IF NOT EXISTS votes (
    voter_id       BLOB NOT NULL,
    content_type   TEXT NOT NULL,
    content_id     BLOB NOT NULL,
    direction      INTEGER NOT NULL,
    quality_tags   TEXT NOT NULL DEFAULT '[]',
    weight_at_cast REAL NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (voter_id, content_type, content_id)
);

CREATE TABLE IF NOT EXISTS flags (
    id           BLOB PRIMARY KEY,
    reporter_id  BLOB NOT NULL,
    content_type TEXT NOT NULL,
    content_id   BLOB NOT NULL,
    reason       TEXT NOT NULL,
    details      TEXT,
    reviewed     INTEGER NOT NULL DEFAULT 0,
    review_id    BLOB,
    created_at   TEXT NOT NULL
);

-- One active flag per reporter per content; reviewed flags fall out of the
-- index so a later report can reopen the item.
CREATE UNIQUE INDEX IF NOT EXISTS idx_flags_active_reporter
    ON flags (reporter_id, content_type, content_id) WHERE reviewed = 0;

CREATE INDEX IF NOT EXISTS idx_flags_open
    ON flags (content_type, content_id) WHERE reviewed = 0;

CREATE TABLE IF NOT EXISTS reviews (
    id           BLOB PRIMARY KEY,
    content_type TEXT NOT NULL,
    content_id   BLOB NOT NULL,
    action       TEXT NOT NULL,
    notes        TEXT,
    reviewer_id  BLOB NOT NULL,
    penalty_id   BLOB,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS penalties (
    id          BLOB PRIMARY KEY,
    user_id     BLOB NOT NULL,
    kind        TEXT NOT NULL,
    reason      TEXT NOT NULL,
    issued_by   BLOB NOT NULL,
    trust_delta REAL NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trust_events (
    id          BLOB PRIMARY KEY,
    user_id     BLOB NOT NULL,
    delta       REAL NOT NULL,
    score_after REAL NOT NULL,
    cause       TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
"#;

pub struct SqliteEngineStore {
    pool: SqlitePool,
}

// Helpers for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

fn internal(e: sqlx::Error) -> EngineError {
    if let sqlx::Error::Database(ref db) = e {
        // SQLITE_BUSY surfaces as "database is locked"; safe to retry.
        if db.message().contains("database is locked") {
            return EngineError::ConcurrentModification(db.message().to_string());
        }
    }
    EngineError::Internal(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}

fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(EngineError::Internal)
}

fn row_content_ref(row: &SqliteRow) -> Result<ContentRef> {
    Ok(ContentRef {
        content_type: parse_enum(&row.get::<String, _>("content_type"))?,
        content_id: blob_to_uuid(row.get::<Vec<u8>, _>("content_id").as_slice()),
    })
}

fn row_to_user(row: &SqliteRow) -> User {
    User {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        trust_score: row.get("trust_score"),
        is_global_admin: row.get("is_global_admin"),
        is_official: row.get("is_official"),
        created_at: row.get("created_at"),
    }
}

fn row_to_vote(row: &SqliteRow) -> Result<Vote> {
    let direction_raw: i64 = row.get("direction");
    let tags: BTreeSet<String> =
        serde_json::from_str(&row.get::<String, _>("quality_tags")).unwrap_or_default();
    Ok(Vote {
        voter_id: blob_to_uuid(row.get::<Vec<u8>, _>("voter_id").as_slice()),
        content: row_content_ref(row)?,
        direction: VoteDirection::from_value(direction_raw).ok_or_else(|| {
            EngineError::Internal(format!("corrupt vote direction {direction_raw}"))
        })?,
        quality_tags: tags,
        weight_at_cast: row.get("weight_at_cast"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_flag(row: &SqliteRow) -> Result<ModerationFlag> {
    Ok(ModerationFlag {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        reporter_id: blob_to_uuid(row.get::<Vec<u8>, _>("reporter_id").as_slice()),
        content: row_content_ref(row)?,
        reason: parse_enum(&row.get::<String, _>("reason"))?,
        details: row.get("details"),
        reviewed: row.get("reviewed"),
        review_id: row
            .get::<Option<Vec<u8>>, _>("review_id")
            .map(|b| blob_to_uuid(b.as_slice())),
        created_at: row.get("created_at"),
    })
}

/// "?, ?, ?" for a dynamic IN clause.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl SqliteEngineStore {
    /// Connects and applies the schema. File databases are created if
    /// missing; `sqlite::memory:` is pinned to one connection so every
    /// query sees the same database.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await?;
        // Comment lines may contain semicolons, so strip them before
        // splitting the schema into statements.
        let schema: String = SCHEMA
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        for statement in schema.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Registers a user row. Registration itself is external; this is the
    /// integration point (and the test seam).
    pub async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, trust_score, is_global_admin, is_official, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(user.id))
        .bind(user.trust_score)
        .bind(user.is_global_admin)
        .bind(user.is_official)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    /// Convenience for the common case: a fresh account at baseline trust.
    pub async fn insert_default_user(&self, id: Uuid) -> Result<()> {
        self.insert_user(&User {
            id,
            trust_score: DEFAULT_TRUST_SCORE,
            is_global_admin: false,
            is_official: false,
            created_at: Utc::now(),
        })
        .await
    }

    /// Registers a content row; the content CRUD lifecycle is external.
    pub async fn insert_content(&self, meta: &ContentMeta) -> Result<()> {
        sqlx::query(
            "INSERT INTO content (content_type, content_id, author_id, status) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(meta.content.content_type.as_str())
        .bind(uuid_to_blob(meta.content.content_id))
        .bind(uuid_to_blob(meta.author_id))
        .bind(meta.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    /// Status write for the external approval workflow. Never moves an item
    /// backward out of hidden/deleted.
    pub async fn set_content_status(
        &self,
        content: ContentRef,
        status: ContentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE content SET status = ? \
             WHERE content_type = ? AND content_id = ? \
               AND status NOT IN ('hidden', 'deleted')",
        )
        .bind(status.as_str())
        .bind(content.content_type.as_str())
        .bind(uuid_to_blob(content.content_id))
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn penalties_for(&self, user_id: Uuid) -> Result<Vec<Penalty>> {
        let rows = sqlx::query(
            "SELECT * FROM penalties WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(uuid_to_blob(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.iter()
            .map(|row| {
                Ok(Penalty {
                    id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
                    user_id: blob_to_uuid(row.get::<Vec<u8>, _>("user_id").as_slice()),
                    kind: parse_enum(&row.get::<String, _>("kind"))?,
                    reason: row.get("reason"),
                    issued_by: blob_to_uuid(row.get::<Vec<u8>, _>("issued_by").as_slice()),
                    trust_delta: row.get("trust_delta"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl EngineStore for SqliteEngineStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(uuid_to_blob(user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Clamped atomic increment plus ledger event, one transaction. The
    /// score is never read-modified-written from the application side.
    async fn apply_trust_delta(
        &self,
        user_id: Uuid,
        delta: f64,
        cause: TrustCause,
    ) -> Result<f64> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let result = sqlx::query(
            "UPDATE users SET trust_score = MAX(0.0, MIN(100.0, trust_score + ?)) WHERE id = ?",
        )
        .bind(delta)
        .bind(uuid_to_blob(user_id))
        .execute(&mut *tx)
        .await
        .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound("user", user_id.to_string()));
        }

        let score: f64 = sqlx::query("SELECT trust_score FROM users WHERE id = ?")
            .bind(uuid_to_blob(user_id))
            .fetch_one(&mut *tx)
            .await
            .map_err(internal)?
            .get("trust_score");

        sqlx::query(
            "INSERT INTO trust_events (id, user_id, delta, score_after, cause, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(Uuid::now_v7()))
        .bind(uuid_to_blob(user_id))
        .bind(delta)
        .bind(score)
        .bind(cause.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;
        Ok(score)
    }

    async fn trust_events(&self, user_id: Uuid) -> Result<Vec<TrustEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM trust_events WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(uuid_to_blob(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.iter()
            .map(|row| {
                Ok(TrustEvent {
                    id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
                    user_id: blob_to_uuid(row.get::<Vec<u8>, _>("user_id").as_slice()),
                    delta: row.get("delta"),
                    score_after: row.get("score_after"),
                    cause: parse_enum(&row.get::<String, _>("cause"))?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    /// Insert-or-update on the (voter, content) primary key; re-casting
    /// keeps the original created_at.
    async fn upsert_vote(&self, vote: Vote) -> Result<Vote> {
        let tags = serde_json::to_string(&vote.quality_tags)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        sqlx::query(
            "INSERT INTO votes \
             (voter_id, content_type, content_id, direction, quality_tags, weight_at_cast, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (voter_id, content_type, content_id) DO UPDATE SET \
               direction = excluded.direction, \
               quality_tags = excluded.quality_tags, \
               weight_at_cast = excluded.weight_at_cast, \
               updated_at = excluded.updated_at",
        )
        .bind(uuid_to_blob(vote.voter_id))
        .bind(vote.content.content_type.as_str())
        .bind(uuid_to_blob(vote.content.content_id))
        .bind(vote.direction.value())
        .bind(tags)
        .bind(vote.weight_at_cast)
        .bind(vote.created_at)
        .bind(vote.updated_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        let row = sqlx::query(
            "SELECT * FROM votes WHERE voter_id = ? AND content_type = ? AND content_id = ?",
        )
        .bind(uuid_to_blob(vote.voter_id))
        .bind(vote.content.content_type.as_str())
        .bind(uuid_to_blob(vote.content.content_id))
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;
        row_to_vote(&row)
    }

    async fn remove_vote(&self, voter_id: Uuid, content: ContentRef) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM votes WHERE voter_id = ? AND content_type = ? AND content_id = ?",
        )
        .bind(uuid_to_blob(voter_id))
        .bind(content.content_type.as_str())
        .bind(uuid_to_blob(content.content_id))
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }

    async fn votes_with_trust(&self, content: ContentRef) -> Result<Vec<(Vote, f64)>> {
        let rows = sqlx::query(
            "SELECT v.*, u.trust_score AS voter_trust FROM votes v \
             JOIN users u ON u.id = v.voter_id \
             WHERE v.content_type = ? AND v.content_id = ? \
             ORDER BY v.created_at ASC",
        )
        .bind(content.content_type.as_str())
        .bind(uuid_to_blob(content.content_id))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.iter()
            .map(|row| Ok((row_to_vote(row)?, row.get::<f64, _>("voter_trust"))))
            .collect()
    }

    async fn voted_content(&self) -> Result<Vec<ContentRef>> {
        let rows = sqlx::query(
            "SELECT DISTINCT content_type, content_id FROM votes \
             ORDER BY content_type ASC, content_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        rows.iter().map(|row| row_content_ref(row)).collect()
    }

    async fn content_meta(&self, content: ContentRef) -> Result<Option<ContentMeta>> {
        let row = sqlx::query(
            "SELECT * FROM content WHERE content_type = ? AND content_id = ?",
        )
        .bind(content.content_type.as_str())
        .bind(uuid_to_blob(content.content_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.map(|row| {
            Ok(ContentMeta {
                content: row_content_ref(&row)?,
                author_id: blob_to_uuid(row.get::<Vec<u8>, _>("author_id").as_slice()),
                status: parse_enum(&row.get::<String, _>("status"))?,
            })
        })
        .transpose()
    }

    /// One transaction: insert (duplicates rejected by the partial unique
    /// index), recount distinct unreviewed reporters, auto-hide when the
    /// count reaches the threshold and the item is still visible.
    async fn insert_flag(
        &self,
        flag: ModerationFlag,
        auto_hide_threshold: u64,
    ) -> Result<FlagInsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let inserted = sqlx::query(
            "INSERT INTO flags \
             (id, reporter_id, content_type, content_id, reason, details, reviewed, review_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?)",
        )
        .bind(uuid_to_blob(flag.id))
        .bind(uuid_to_blob(flag.reporter_id))
        .bind(flag.content.content_type.as_str())
        .bind(uuid_to_blob(flag.content.content_id))
        .bind(flag.reason.as_str())
        .bind(flag.details.clone())
        .bind(flag.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(EngineError::DuplicateFlag {
                    reporter_id: flag.reporter_id,
                    content: flag.content,
                });
            }
            return Err(internal(e));
        }

        let distinct_reporters: i64 = sqlx::query(
            "SELECT COUNT(DISTINCT reporter_id) AS n FROM flags \
             WHERE content_type = ? AND content_id = ? AND reviewed = 0",
        )
        .bind(flag.content.content_type.as_str())
        .bind(uuid_to_blob(flag.content.content_id))
        .fetch_one(&mut *tx)
        .await
        .map_err(internal)?
        .get("n");

        let mut auto_hidden = false;
        if distinct_reporters as u64 >= auto_hide_threshold {
            let result = sqlx::query(
                "UPDATE content SET status = 'hidden' \
                 WHERE content_type = ? AND content_id = ? \
                   AND status NOT IN ('hidden', 'deleted')",
            )
            .bind(flag.content.content_type.as_str())
            .bind(uuid_to_blob(flag.content.content_id))
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
            auto_hidden = result.rows_affected() > 0;
        }

        tx.commit().await.map_err(internal)?;
        Ok(FlagInsertOutcome {
            flag,
            distinct_reporters: distinct_reporters as u64,
            auto_hidden,
        })
    }

    async fn flags_by_ids(&self, flag_ids: Vec<Uuid>) -> Result<Vec<ModerationFlag>> {
        if flag_ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT * FROM flags WHERE id IN ({}) ORDER BY created_at ASC",
            placeholders(flag_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in &flag_ids {
            query = query.bind(uuid_to_blob(*id));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(internal)?;
        rows.iter().map(row_to_flag).collect()
    }

    async fn open_queue(
        &self,
        content_type: Option<ContentType>,
        reason: Option<FlagReason>,
    ) -> Result<Vec<QueueItem>> {
        let mut sql = String::from("SELECT * FROM flags WHERE reviewed = 0");
        if content_type.is_some() {
            sql.push_str(" AND content_type = ?");
        }
        if reason.is_some() {
            sql.push_str(" AND reason = ?");
        }
        sql.push_str(" ORDER BY content_type ASC, content_id ASC, created_at ASC");

        let mut query = sqlx::query(&sql);
        if let Some(ct) = content_type {
            query = query.bind(ct.as_str());
        }
        if let Some(r) = reason {
            query = query.bind(r.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(internal)?;

        let mut grouped: BTreeMap<ContentRef, Vec<ModerationFlag>> = BTreeMap::new();
        for row in &rows {
            let flag = row_to_flag(row)?;
            grouped.entry(flag.content).or_default().push(flag);
        }

        let mut items = Vec::with_capacity(grouped.len());
        for (content, flags) in grouped {
            let meta_row = sqlx::query(
                "SELECT c.author_id, c.status, u.trust_score FROM content c \
                 JOIN users u ON u.id = c.author_id \
                 WHERE c.content_type = ? AND c.content_id = ?",
            )
            .bind(content.content_type.as_str())
            .bind(uuid_to_blob(content.content_id))
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;

            let status: ContentStatus = parse_enum(&meta_row.get::<String, _>("status"))?;
            let distinct_reporters = flags
                .iter()
                .map(|f| f.reporter_id)
                .collect::<BTreeSet<_>>()
                .len() as u64;
            items.push(QueueItem {
                content,
                flag_count: flags.len() as u64,
                distinct_reporters,
                is_hidden: status == ContentStatus::Hidden,
                author_id: blob_to_uuid(meta_row.get::<Vec<u8>, _>("author_id").as_slice()),
                author_trust_score: meta_row.get("trust_score"),
                flags,
            });
        }
        Ok(items)
    }

    /// One transaction covering the whole review decision.
    ///
    /// The flags are marked reviewed with an optimistic `reviewed = 0`
    /// guard: if fewer rows change than the batch names, another reviewer
    /// won the race and the entire transaction rolls back.
    async fn commit_review(
        &self,
        mut review: ModerationReview,
        new_status: Option<ContentStatus>,
        penalty: Option<PenaltyDraft>,
    ) -> Result<ModerationReview> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let sql = format!(
            "UPDATE flags SET reviewed = 1, review_id = ? WHERE id IN ({}) AND reviewed = 0",
            placeholders(review.flag_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(uuid_to_blob(review.id));
        for id in &review.flag_ids {
            query = query.bind(uuid_to_blob(*id));
        }
        let result = query.execute(&mut *tx).await.map_err(internal)?;

        if result.rows_affected() != review.flag_ids.len() as u64 {
            // Name the flag that lost the race, if we can find one.
            let sql = format!(
                "SELECT id FROM flags WHERE id IN ({}) AND reviewed = 1 LIMIT 1",
                placeholders(review.flag_ids.len())
            );
            let mut probe = sqlx::query(&sql);
            for id in &review.flag_ids {
                probe = probe.bind(uuid_to_blob(*id));
            }
            let loser = probe.fetch_optional(&mut *tx).await.map_err(internal)?;
            tx.rollback().await.map_err(internal)?;
            return match loser {
                Some(row) => Err(EngineError::AlreadyReviewed {
                    flag_id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
                }),
                None => Err(EngineError::InvalidReviewScope(
                    "batch names unknown flags".to_string(),
                )),
            };
        }

        if let Some(draft) = penalty {
            let penalty_id = Uuid::now_v7();
            let updated = sqlx::query(
                "UPDATE users SET trust_score = MAX(0.0, MIN(100.0, trust_score + ?)) WHERE id = ?",
            )
            .bind(draft.trust_delta)
            .bind(uuid_to_blob(draft.user_id))
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
            if updated.rows_affected() == 0 {
                tx.rollback().await.map_err(internal)?;
                return Err(EngineError::NotFound("user", draft.user_id.to_string()));
            }
            let score_after: f64 = sqlx::query("SELECT trust_score FROM users WHERE id = ?")
                .bind(uuid_to_blob(draft.user_id))
                .fetch_one(&mut *tx)
                .await
                .map_err(internal)?
                .get("trust_score");

            sqlx::query(
                "INSERT INTO penalties (id, user_id, kind, reason, issued_by, trust_delta, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid_to_blob(penalty_id))
            .bind(uuid_to_blob(draft.user_id))
            .bind(draft.kind.as_str())
            .bind(draft.reason.clone())
            .bind(uuid_to_blob(draft.issued_by))
            .bind(draft.trust_delta)
            .bind(review.created_at)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

            sqlx::query(
                "INSERT INTO trust_events (id, user_id, delta, score_after, cause, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid_to_blob(Uuid::now_v7()))
            .bind(uuid_to_blob(draft.user_id))
            .bind(draft.trust_delta)
            .bind(score_after)
            .bind(TrustCause::Penalty(draft.kind).as_str())
            .bind(review.created_at)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

            review.penalty_id = Some(penalty_id);
        }

        if let Some(status) = new_status {
            // Forward-only: deleted is final, hidden can only advance to
            // deleted, and an un-hide may only lift a hidden item.
            let guard = match status {
                ContentStatus::Deleted => "status != 'deleted'",
                ContentStatus::Hidden => "status NOT IN ('hidden', 'deleted')",
                _ => "status = 'hidden'",
            };
            let sql = format!(
                "UPDATE content SET status = ? WHERE content_type = ? AND content_id = ? AND {guard}"
            );
            sqlx::query(&sql)
                .bind(status.as_str())
                .bind(review.content.content_type.as_str())
                .bind(uuid_to_blob(review.content.content_id))
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
        }

        sqlx::query(
            "INSERT INTO reviews \
             (id, content_type, content_id, action, notes, reviewer_id, penalty_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(review.id))
        .bind(review.content.content_type.as_str())
        .bind(uuid_to_blob(review.content.content_id))
        .bind(review.action.as_str())
        .bind(review.notes.clone())
        .bind(uuid_to_blob(review.reviewer_id))
        .bind(review.penalty_id.map(uuid_to_blob))
        .bind(review.created_at)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;
        Ok(review)
    }
}
