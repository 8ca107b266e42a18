//! Storage layer for Mull data.
//!
//! Each workspace gets its own data directory under
//! `~/.local/share/mull/<hash>/` (overridable via `MULL_DATA_DIR`):
//!
//! - `documents.jsonl` - append-only document log; the latest record per ID
//!   is the current version
//! - `chat.jsonl` - append-only conversation log, same latest-wins rule
//! - `cache.db` - SQLite index for listing, search, and pending-action
//!   lookup, rebuildable from the JSONL files
//!
//! Saving a document is one logical write: append the new version, refresh
//! the cache row.

use crate::models::{ActionDisposition, ChatMessage, Document};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// ID prefix for documents.
pub const DOC_ID_PREFIX: &str = "ml";

/// Storage manager for a single workspace.
pub struct Storage {
    /// Root directory for this workspace's data
    pub root: PathBuf,
    /// SQLite connection for indexed queries
    conn: Connection,
}

impl Storage {
    /// Open existing storage for the given workspace path.
    pub fn open(workspace: &Path) -> Result<Self> {
        let root = get_storage_dir(workspace)?;
        Self::open_at(root)
    }

    /// Open existing storage rooted under an explicit data directory.
    pub fn open_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        let root = storage_dir_under(workspace, data_dir)?;
        Self::open_at(root)
    }

    fn open_at(root: PathBuf) -> Result<Self> {
        if !root.join("cache.db").exists() {
            return Err(Error::NotInitialized);
        }
        let conn = Connection::open(root.join("cache.db"))?;
        Self::init_schema(&conn)?;
        Ok(Self { root, conn })
    }

    /// Initialize storage for a new workspace.
    pub fn init(workspace: &Path) -> Result<Self> {
        let root = get_storage_dir(workspace)?;
        Self::init_at(root)
    }

    /// Initialize storage rooted under an explicit data directory.
    pub fn init_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        let root = storage_dir_under(workspace, data_dir)?;
        Self::init_at(root)
    }

    fn init_at(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;

        for file in ["documents.jsonl", "chat.jsonl"] {
            let path = root.join(file);
            if !path.exists() {
                File::create(&path)?;
            }
        }

        let conn = Connection::open(root.join("cache.db"))?;
        Self::init_schema(&conn)?;

        Ok(Self { root, conn })
    }

    /// Check whether storage exists for the given workspace.
    pub fn exists(workspace: &Path) -> Result<bool> {
        let root = get_storage_dir(workspace)?;
        Ok(root.join("cache.db").exists())
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                block_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                action_state TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_chat_doc ON chat_messages(doc_id, created_at);
            "#,
        )?;
        Ok(())
    }

    // === Document operations ===

    /// Add a new document.
    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        self.append_jsonl("documents.jsonl", doc)?;
        self.cache_document(doc)
    }

    /// Get a document by ID.
    pub fn get_document(&self, id: &str) -> Result<Document> {
        // The cache knows whether the document is live; the JSONL log keeps
        // records of deleted documents too.
        let live: Option<String> = self
            .conn
            .query_row("SELECT id FROM documents WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        if live.is_none() {
            return Err(Error::NotFound(format!("document {id}")));
        }

        self.latest_record("documents.jsonl", |doc: &Document| doc.id == id)?
            .ok_or_else(|| Error::NotFound(format!("document {id}")))
    }

    /// List all documents, newest first, optionally filtered by a title
    /// substring.
    pub fn list_documents(&self, search: Option<&str>) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM documents
             WHERE (?1 IS NULL OR title LIKE '%' || ?1 || '%')
             ORDER BY updated_at DESC",
        )?;
        let ids: Vec<String> = stmt
            .query_map(params![search], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        let mut docs = Vec::new();
        for id in ids {
            if let Ok(doc) = self.get_document(&id) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Save an updated document. Exactly one write of the current version.
    pub fn update_document(&mut self, doc: &Document) -> Result<()> {
        self.get_document(&doc.id)?;
        self.append_jsonl("documents.jsonl", doc)?;
        self.cache_document(doc)
    }

    /// Delete a document by ID.
    ///
    /// The JSONL log is append-only; deletion removes the cache rows, which
    /// is what list and get consult for liveness.
    pub fn delete_document(&mut self, id: &str) -> Result<()> {
        self.get_document(id)?;
        self.conn
            .execute("DELETE FROM documents WHERE id = ?1", [id])?;
        self.conn
            .execute("DELETE FROM chat_messages WHERE doc_id = ?1", [id])?;
        Ok(())
    }

    fn cache_document(&self, doc: &Document) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO documents
            (id, title, block_count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                doc.id,
                doc.title,
                doc.blocks.len() as i64,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // === Chat operations ===

    /// Append a conversation turn.
    pub fn add_chat_message(&mut self, message: &ChatMessage) -> Result<()> {
        self.append_jsonl("chat.jsonl", message)?;
        self.cache_message(message)
    }

    /// Save a new version of an existing turn (e.g., an action disposition
    /// change). Latest record per ID wins, as with documents.
    pub fn update_chat_message(&mut self, message: &ChatMessage) -> Result<()> {
        self.append_jsonl("chat.jsonl", message)?;
        self.cache_message(message)
    }

    /// Get one conversation turn by ID.
    pub fn get_chat_message(&self, id: &str) -> Result<ChatMessage> {
        self.latest_record("chat.jsonl", |msg: &ChatMessage| msg.id == id)?
            .ok_or_else(|| Error::NotFound(format!("message {id}")))
    }

    /// All turns of a document's conversation, oldest first.
    pub fn list_chat_messages(&self, doc_id: &str) -> Result<Vec<ChatMessage>> {
        let path = self.root.join("chat.jsonl");
        let file = File::open(&path)?;
        let reader = BufReader::new(file);

        // Latest record per ID, in first-seen order.
        let mut order: Vec<String> = Vec::new();
        let mut latest: std::collections::HashMap<String, ChatMessage> =
            std::collections::HashMap::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(msg) = serde_json::from_str::<ChatMessage>(&line) {
                if msg.doc_id != doc_id {
                    continue;
                }
                if !latest.contains_key(&msg.id) {
                    order.push(msg.id.clone());
                }
                latest.insert(msg.id.clone(), msg);
            }
        }

        Ok(order.into_iter().filter_map(|id| latest.remove(&id)).collect())
    }

    /// The newest assistant turn whose suggested actions are still pending.
    pub fn pending_action_message(&self, doc_id: &str) -> Result<Option<ChatMessage>> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM chat_messages
                 WHERE doc_id = ?1 AND action_state = 'pending'
                 ORDER BY created_at DESC LIMIT 1",
                [doc_id],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => Ok(Some(self.get_chat_message(&id)?)),
            None => Ok(None),
        }
    }

    /// Mark a turn's suggested actions applied or discarded.
    pub fn set_action_disposition(
        &mut self,
        message_id: &str,
        disposition: ActionDisposition,
    ) -> Result<()> {
        let mut message = self.get_chat_message(message_id)?;
        message.action_state = Some(disposition);
        self.update_chat_message(&message)
    }

    fn cache_message(&self, message: &ChatMessage) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO chat_messages
            (id, doc_id, role, created_at, action_state)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                message.id,
                message.doc_id,
                message.role.as_str(),
                message.created_at.to_rfc3339(),
                message.action_state.map(|s| s.as_str()),
            ],
        )?;
        Ok(())
    }

    // === Cache maintenance ===

    /// Rebuild the SQLite cache from the JSONL files.
    pub fn rebuild_cache(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            DELETE FROM documents;
            DELETE FROM chat_messages;
            "#,
        )?;

        let docs_path = self.root.join("documents.jsonl");
        if docs_path.exists() {
            let reader = BufReader::new(File::open(&docs_path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                if let Ok(doc) = serde_json::from_str::<Document>(&line) {
                    self.cache_document(&doc)?;
                }
            }
        }

        let chat_path = self.root.join("chat.jsonl");
        if chat_path.exists() {
            let reader = BufReader::new(File::open(&chat_path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                if let Ok(msg) = serde_json::from_str::<ChatMessage>(&line) {
                    self.cache_message(&msg)?;
                }
            }
        }

        Ok(())
    }

    // === Helpers ===

    fn append_jsonl<T: serde::Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let path = self.root.join(file);
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        let json = serde_json::to_string(record)?;
        writeln!(f, "{}", json)?;
        Ok(())
    }

    /// Scan a JSONL file and return the last record matching the predicate.
    fn latest_record<T, F>(&self, file: &str, matches: F) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let path = self.root.join(file);
        let reader = BufReader::new(File::open(&path)?);

        let mut latest = None;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<T>(&line) {
                if matches(&record) {
                    latest = Some(record);
                }
            }
        }
        Ok(latest)
    }
}

/// Get the storage directory for a workspace.
///
/// Uses a hash of the workspace path to create a unique directory under
/// `~/.local/share/mull/` (or `MULL_DATA_DIR` when set).
pub fn get_storage_dir(workspace: &Path) -> Result<PathBuf> {
    let data_dir = match std::env::var_os("MULL_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?
            .join("mull"),
    };
    storage_dir_under(workspace, &data_dir)
}

/// Storage directory for a workspace under an explicit data directory.
pub fn storage_dir_under(workspace: &Path, data_dir: &Path) -> Result<PathBuf> {
    let canonical = workspace
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize workspace path: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(data_dir.join(&hash_hex[..12]))
}

/// Generate a unique document ID.
///
/// Format: `<prefix>-<4 hex chars>`, hashed from the seed plus the current
/// time.
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("{}-{}", prefix, &hash_hex[..4])
}

/// Validate that an ID matches the expected format.
pub fn validate_id(id: &str, prefix: &str) -> Result<()> {
    let Some(suffix) = id.strip_prefix(&format!("{prefix}-")) else {
        return Err(Error::InvalidId(format!(
            "ID must start with '{prefix}-', got: {id}"
        )));
    };

    if suffix.len() != 4 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidId(format!(
            "ID suffix must be 4 hex characters, got: {suffix}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::test_utils::TestEnv;
    use serde_json::json;

    fn sample_doc(id: &str, title: &str) -> Document {
        Document::new(id.to_string(), title.to_string())
    }

    #[test]
    fn test_init_creates_layout() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        assert!(storage.root.join("documents.jsonl").exists());
        assert!(storage.root.join("chat.jsonl").exists());
        assert!(storage.root.join("cache.db").exists());
    }

    #[test]
    fn test_reopen_sees_existing_data() {
        let env = TestEnv::new();
        {
            let mut storage = env.init_storage();
            storage.add_document(&sample_doc("ml-0001", "Persistent")).unwrap();
        }
        let storage = env.open_storage();
        assert_eq!(storage.get_document("ml-0001").unwrap().title, "Persistent");
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let env = TestEnv::new();
        let result = Storage::open_with_data_dir(env.path(), env.data_path());
        assert!(matches!(result, Err(Error::NotInitialized)));
    }

    #[test]
    fn test_document_add_get_update() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let mut doc = sample_doc("ml-a1b2", "Drones");
        storage.add_document(&doc).unwrap();
        assert_eq!(storage.get_document("ml-a1b2").unwrap().title, "Drones");

        doc.budget = "100k".into();
        storage.update_document(&doc).unwrap();
        assert_eq!(storage.get_document("ml-a1b2").unwrap().budget, "100k");
    }

    #[test]
    fn test_get_missing_document() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        assert!(matches!(
            storage.get_document("ml-ffff"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_documents_search() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        storage.add_document(&sample_doc("ml-0001", "Solar kiosk")).unwrap();
        storage.add_document(&sample_doc("ml-0002", "Drone post")).unwrap();

        assert_eq!(storage.list_documents(None).unwrap().len(), 2);
        let hits = storage.list_documents(Some("Drone")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "ml-0002");
    }

    #[test]
    fn test_delete_document_hides_it() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        storage.add_document(&sample_doc("ml-0001", "Gone soon")).unwrap();
        storage.delete_document("ml-0001").unwrap();
        assert!(matches!(
            storage.get_document("ml-0001"),
            Err(Error::NotFound(_))
        ));
        assert!(storage.list_documents(None).unwrap().is_empty());
    }

    #[test]
    fn test_chat_round_trip() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        storage.add_document(&sample_doc("ml-0001", "Idea")).unwrap();

        let user = ChatMessage::user("m1".into(), "ml-0001".into(), "hello");
        let reply = ChatMessage::assistant("m2".into(), "ml-0001".into(), "hi", vec![]);
        storage.add_chat_message(&user).unwrap();
        storage.add_chat_message(&reply).unwrap();

        let messages = storage.list_chat_messages("ml-0001").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_pending_action_lifecycle() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        storage.add_document(&sample_doc("ml-0001", "Idea")).unwrap();

        let action = json!({"action": "update_field", "field": "budget", "value": "10M"});
        let reply =
            ChatMessage::assistant("m1".into(), "ml-0001".into(), "ok", vec![action.clone()]);
        storage.add_chat_message(&reply).unwrap();

        let pending = storage.pending_action_message("ml-0001").unwrap().unwrap();
        assert_eq!(pending.id, "m1");
        assert_eq!(pending.suggested_action.unwrap(), action);

        storage
            .set_action_disposition("m1", ActionDisposition::Applied)
            .unwrap();
        assert!(storage.pending_action_message("ml-0001").unwrap().is_none());

        // The stored record reflects the new state, not just the cache.
        let stored = storage.get_chat_message("m1").unwrap();
        assert_eq!(stored.action_state, Some(ActionDisposition::Applied));
    }

    #[test]
    fn test_rebuild_cache_preserves_state() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        storage.add_document(&sample_doc("ml-0001", "Idea")).unwrap();
        let reply = ChatMessage::assistant(
            "m1".into(),
            "ml-0001".into(),
            "ok",
            vec![json!({"action": "update_field", "field": "budget", "value": "1"})],
        );
        storage.add_chat_message(&reply).unwrap();
        storage
            .set_action_disposition("m1", ActionDisposition::Discarded)
            .unwrap();

        storage.rebuild_cache().unwrap();

        assert_eq!(storage.list_documents(None).unwrap().len(), 1);
        assert!(storage.pending_action_message("ml-0001").unwrap().is_none());
    }

    #[test]
    fn test_generate_and_validate_id() {
        let id = generate_id(DOC_ID_PREFIX, "my idea");
        validate_id(&id, DOC_ID_PREFIX).unwrap();
        assert!(validate_id("ml-zzzz", DOC_ID_PREFIX).is_err());
        assert!(validate_id("xx-a1b2", DOC_ID_PREFIX).is_err());
        assert!(validate_id("ml-a1b23", DOC_ID_PREFIX).is_err());
    }

    #[test]
    fn test_storage_dir_is_stable_per_workspace() {
        let env = TestEnv::new();
        let a = storage_dir_under(env.path(), env.data_path()).unwrap();
        let b = storage_dir_under(env.path(), env.data_path()).unwrap();
        assert_eq!(a, b);
    }
}
