//! Message repository — coalesce merge with a monotonic text gate.
//!
//! Message fields only ever improve toward "more complete": longer text wins,
//! non-null wins over null, and nothing regresses to less information.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::row_types::MessageRow;

/// Columns merged by a message upsert.
#[derive(Clone, Debug, Default)]
pub struct MessageUpsert {
    /// Message id (host-supplied).
    pub id: String,
    /// Owning session id.
    pub session_id: String,
    /// Role (`user`, `assistant`).
    pub role: String,
    /// Model provider identifier.
    pub model_provider: Option<String>,
    /// Model identifier.
    pub model_id: Option<String>,
    /// Best-known text; only applied when strictly longer than stored.
    pub text: Option<String>,
    /// Raw content payload JSON.
    pub content: Option<String>,
    /// System prompt snapshot.
    pub system_prompt: Option<String>,
}

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert or merge a message snapshot.
    pub fn upsert(conn: &Connection, up: &MessageUpsert) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO messages (id, session_id, role, model_provider, model_id,
                                   text, content, system_prompt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(id) DO UPDATE SET
               role           = excluded.role,
               model_provider = COALESCE(excluded.model_provider, model_provider),
               model_id       = COALESCE(excluded.model_id, model_id),
               text           = CASE
                                  WHEN excluded.text IS NOT NULL
                                   AND (text IS NULL OR length(excluded.text) > length(text))
                                  THEN excluded.text
                                  ELSE text
                                END,
               content        = COALESCE(excluded.content, content),
               system_prompt  = COALESCE(excluded.system_prompt, system_prompt),
               updated_at     = excluded.updated_at",
            params![
                up.id,
                up.session_id,
                up.role,
                up.model_provider,
                up.model_id,
                up.text,
                up.content,
                up.system_prompt,
                now,
            ],
        )?;
        Ok(())
    }

    /// Opportunistically refresh the denormalized text from a streaming text
    /// part, under the same monotonic-length rule as the upsert.
    pub fn refresh_text(conn: &Connection, message_id: &str, text: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE messages SET text = ?2, updated_at = ?3
             WHERE id = ?1 AND (text IS NULL OR length(?2) > length(text))",
            params![message_id, text, now],
        )?;
        Ok(changed > 0)
    }

    /// Delete a message and its parts.
    ///
    /// Parts do not carry a message foreign key (they may outlive message
    /// identity races), so the removal is explicit.
    pub fn delete(conn: &Connection, message_id: &str) -> Result<bool> {
        let _ = conn.execute(
            "DELETE FROM message_parts WHERE message_id = ?1",
            params![message_id],
        )?;
        let changed = conn.execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
        Ok(changed > 0)
    }

    /// Get message by ID.
    pub fn get(conn: &Connection, message_id: &str) -> Result<Option<MessageRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM messages WHERE id = ?1",
                params![message_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            role: row.get("role")?,
            model_provider: row.get("model_provider")?,
            model_id: row.get("model_id")?,
            text: row.get("text")?,
            content: row.get("content")?,
            system_prompt: row.get("system_prompt")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
