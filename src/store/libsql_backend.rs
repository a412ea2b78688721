//! libSQL backend: async `Database` trait implementation.
//!
//! Uses libsql's native async API. Supports local file and in-memory
//! databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{ConversationMessage, Database};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Raw metadata column. `None` if the conversation is unknown.
    async fn read_metadata(&self, conversation_id: Uuid) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT metadata FROM conversations WHERE id = ?1",
                params![conversation_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_conversation_metadata: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<String>(0)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_conversation_metadata: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!(
                "get_conversation_metadata: {e}"
            ))),
        }
    }

    /// Overwrite the metadata column with arbitrary text.
    #[cfg(test)]
    pub(crate) async fn write_raw_metadata(&self, conversation_id: Uuid, raw: &str) {
        self.conn()
            .execute(
                "UPDATE conversations SET metadata = ?1 WHERE id = ?2",
                params![raw, conversation_id.to_string()],
            )
            .await
            .unwrap();
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite datetime() output
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    Utc::now()
}

fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(v) => libsql::Value::Text(v),
        None => libsql::Value::Null,
    }
}

fn row_to_message(row: &libsql::Row) -> ConversationMessage {
    let id_str: String = row.get(0).unwrap_or_default();
    let role: String = row.get(1).unwrap_or_default();
    let content: String = row.get(2).unwrap_or_default();
    let payload: Option<String> = row.get(3).ok();
    let created_str: String = row.get(4).unwrap_or_default();
    ConversationMessage {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        role,
        content,
        payload: payload.and_then(|p| serde_json::from_str(&p).ok()),
        created_at: parse_datetime(&created_str),
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::init_schema(self.conn()).await
    }

    async fn ensure_conversation(
        &self,
        conversation_id: Uuid,
        channel: &str,
        user_id: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO conversations (id, channel, user_id, started_at, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (id) DO UPDATE SET last_activity = ?4",
            params![conversation_id.to_string(), channel, user_id, now],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("ensure_conversation: {e}")))?;

        Ok(())
    }

    async fn conversation_exists(&self, conversation_id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM conversations WHERE id = ?1",
                params![conversation_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("conversation_exists: {e}")))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(DatabaseError::Query(format!("conversation_exists: {e}"))),
        }
    }

    async fn add_conversation_message(
        &self,
        conversation_id: Uuid,
        role: &str,
        content: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<ConversationMessage, DatabaseError> {
        let conn = self.conn();
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        // Fixed-width so text ordering matches time ordering.
        let created_str = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let payload_str = payload
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO conversation_messages (id, conversation_id, role, content, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                conversation_id.to_string(),
                role,
                content,
                opt_text(payload_str),
                created_str.clone()
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("add_conversation_message: {e}")))?;

        // Touch last_activity
        let _ = conn
            .execute(
                "UPDATE conversations SET last_activity = ?2 WHERE id = ?1",
                params![conversation_id.to_string(), created_str],
            )
            .await;

        Ok(ConversationMessage {
            id,
            role: role.to_string(),
            content: content.to_string(),
            payload: payload.cloned(),
            created_at,
        })
    }

    async fn list_conversation_messages(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ConversationMessage>, DatabaseError> {
        // rowid breaks ties between messages written in the same instant.
        let mut rows = self
            .conn()
            .query(
                "SELECT id, role, content, payload, created_at FROM conversation_messages
                 WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
                params![conversation_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_conversation_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_conversation_messages: {e}")))?
        {
            messages.push(row_to_message(&row));
        }
        Ok(messages)
    }

    async fn get_conversation_metadata(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let Some(meta_str) = self.read_metadata(conversation_id).await? else {
            return Ok(None);
        };
        serde_json::from_str(&meta_str)
            .map(Some)
            .map_err(|e| DatabaseError::Serialization(format!("conversation metadata: {e}")))
    }

    async fn update_conversation_metadata_field(
        &self,
        conversation_id: Uuid,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let meta_str = self
            .read_metadata(conversation_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "conversation".to_string(),
                id: conversation_id.to_string(),
            })?;

        // Writing a field over unreadable metadata starts it afresh.
        let mut metadata = serde_json::from_str(&meta_str).unwrap_or_else(|e| {
            tracing::warn!(%conversation_id, "Replacing unreadable metadata: {}", e);
            serde_json::json!({})
        });

        if !metadata.is_object() {
            metadata = serde_json::json!({});
        }
        if let serde_json::Value::Object(ref mut map) = metadata {
            map.insert(key.to_string(), value.clone());
        }

        let meta_str = serde_json::to_string(&metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "UPDATE conversations SET metadata = ?1 WHERE id = ?2",
                params![meta_str, conversation_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update metadata: {e}")))?;

        Ok(())
    }
}
