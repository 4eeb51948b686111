//! Session repository — coalesce-merge upserts and aggregate counters.
//!
//! Sessions are reported repeatedly with partial, overlapping data. Every
//! merged column uses "new value if present, else keep existing", so writes
//! converge regardless of arrival order and an absent field never erases a
//! recorded one.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::row_types::{SessionCounters, SessionRow};

/// Columns merged by a session upsert. Absent fields leave stored values
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct SessionUpsert {
    /// Session id (host-supplied).
    pub id: String,
    /// Parent session id.
    pub parent_id: Option<String>,
    /// Project id.
    pub project_id: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Lifecycle status.
    pub status: Option<String>,
    /// Public share URL.
    pub share_url: Option<String>,
    /// Model provider identifier.
    pub model_provider: Option<String>,
    /// Model identifier.
    pub model_id: Option<String>,
}

/// Token and cost deltas applied once per contributing assistant message.
#[derive(Clone, Debug, Default)]
pub struct TokenApply {
    /// Input tokens to add.
    pub input_tokens: i64,
    /// Output tokens to add.
    pub output_tokens: i64,
    /// Reasoning tokens to add.
    pub reasoning_tokens: i64,
    /// Cache read tokens to add.
    pub cache_read_tokens: i64,
    /// Cache write tokens to add.
    pub cache_write_tokens: i64,
    /// Cost to add.
    pub cost: f64,
    /// Context size of *this* message (input + cache read); sets the live
    /// counter and folds into the peak.
    pub context_tokens: i64,
    /// Model provider back-filled if the session has none.
    pub model_provider: Option<String>,
    /// Model id back-filled if the session has none.
    pub model_id: Option<String>,
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert or merge a session snapshot.
    ///
    /// The status column is special-cased: a fresh insert defaults to
    /// `active`, but the conflict branch only replaces the stored status
    /// when the event actually carried one.
    pub fn upsert(conn: &Connection, up: &SessionUpsert) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO sessions (id, parent_id, project_id, title, status, share_url,
                                   model_provider, model_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, COALESCE(?5, 'active'), ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(id) DO UPDATE SET
               parent_id      = COALESCE(excluded.parent_id, parent_id),
               project_id     = COALESCE(excluded.project_id, project_id),
               title          = COALESCE(excluded.title, title),
               status         = COALESCE(?5, status),
               share_url      = COALESCE(excluded.share_url, share_url),
               model_provider = COALESCE(excluded.model_provider, model_provider),
               model_id       = COALESCE(excluded.model_id, model_id),
               updated_at     = excluded.updated_at",
            params![
                up.id,
                up.parent_id,
                up.project_id,
                up.title,
                up.status,
                up.share_url,
                up.model_provider,
                up.model_id,
                now,
            ],
        )?;
        Ok(())
    }

    /// Ensure a session row exists without touching anything it already has.
    ///
    /// Child rows carry a foreign key on `session_id`; every write-behind
    /// chain calls this before inserting children.
    pub fn ensure(conn: &Connection, session_id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO sessions (id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO NOTHING",
            params![session_id, now],
        )?;
        Ok(())
    }

    /// Set the lifecycle status.
    pub fn set_status(conn: &Connection, session_id: &str, status: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE sessions SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, status, now],
        )?;
        Ok(changed > 0)
    }

    /// Delete a session; child rows cascade.
    pub fn delete(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(changed > 0)
    }

    /// Apply token/cost deltas from one contributing assistant message.
    ///
    /// Single statement: counters accumulate, the live context counter is
    /// set to this message's context, the peak folds via `MAX`, and model
    /// identity back-fills only where unset.
    pub fn apply_tokens(conn: &Connection, session_id: &str, apply: &TokenApply) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE sessions SET
               total_input_tokens       = total_input_tokens + ?2,
               total_output_tokens      = total_output_tokens + ?3,
               total_reasoning_tokens   = total_reasoning_tokens + ?4,
               total_cache_read_tokens  = total_cache_read_tokens + ?5,
               total_cache_write_tokens = total_cache_write_tokens + ?6,
               total_cost               = total_cost + ?7,
               context_tokens           = ?8,
               peak_context_tokens      = MAX(peak_context_tokens, ?8),
               model_provider           = COALESCE(model_provider, ?9),
               model_id                 = COALESCE(model_id, ?10),
               updated_at               = ?11
             WHERE id = ?1",
            params![
                session_id,
                apply.input_tokens,
                apply.output_tokens,
                apply.reasoning_tokens,
                apply.cache_read_tokens,
                apply.cache_write_tokens,
                apply.cost,
                apply.context_tokens,
                apply.model_provider,
                apply.model_id,
                now,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Add cost reported outside token accounting (`step-finish` parts).
    pub fn add_cost(conn: &Connection, session_id: &str, cost: f64) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE sessions SET total_cost = total_cost + ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, cost, now],
        )?;
        Ok(changed > 0)
    }

    /// Snapshot the live counters. The one durable read in the pipeline.
    pub fn counters(conn: &Connection, session_id: &str) -> Result<Option<SessionCounters>> {
        let row = conn
            .query_row(
                "SELECT total_input_tokens, total_output_tokens, total_reasoning_tokens,
                        total_cache_read_tokens, total_cache_write_tokens, total_cost,
                        context_tokens
                 FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionCounters {
                        input_tokens: row.get(0)?,
                        output_tokens: row.get(1)?,
                        reasoning_tokens: row.get(2)?,
                        cache_read_tokens: row.get(3)?,
                        cache_write_tokens: row.get(4)?,
                        cost: row.get(5)?,
                        context_tokens: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Reset the live context counter after compaction.
    ///
    /// The pre-reset value folds into the peak (assignments read the
    /// pre-update row), and the compaction counter increments.
    pub fn reset_context(conn: &Connection, session_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE sessions SET
               peak_context_tokens = MAX(peak_context_tokens, context_tokens),
               context_tokens      = 0,
               compaction_count    = compaction_count + 1,
               updated_at          = ?2
             WHERE id = ?1",
            params![session_id, now],
        )?;
        Ok(changed > 0)
    }

    /// Get session by ID.
    pub fn get(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Check if session exists.
    pub fn exists(conn: &Connection, session_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get("id")?,
            parent_id: row.get("parent_id")?,
            project_id: row.get("project_id")?,
            title: row.get("title")?,
            status: row.get("status")?,
            share_url: row.get("share_url")?,
            model_provider: row.get("model_provider")?,
            model_id: row.get("model_id")?,
            total_input_tokens: row.get("total_input_tokens")?,
            total_output_tokens: row.get("total_output_tokens")?,
            total_reasoning_tokens: row.get("total_reasoning_tokens")?,
            total_cache_read_tokens: row.get("total_cache_read_tokens")?,
            total_cache_write_tokens: row.get("total_cache_write_tokens")?,
            total_cost: row.get("total_cost")?,
            context_tokens: row.get("context_tokens")?,
            peak_context_tokens: row.get("peak_context_tokens")?,
            compaction_count: row.get("compaction_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
