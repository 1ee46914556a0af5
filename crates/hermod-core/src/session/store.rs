//! Session store: append-only turn logs with a write-through memory cache.
//!
//! Disk format, one file per session key under the sessions directory
//! (`:` in keys becomes `_`, path-hostile characters are stripped):
//!
//! ```text
//! {"_type":"metadata","created_at":"…","updated_at":"…","metadata":{}}
//! {"role":"user","content":"hello","timestamp":"…"}
//! {"role":"assistant","content":"hi!","timestamp":"…"}
//! ```
//!
//! The whole file is rewritten from memory on every save. Reads scan the
//! file line by line, skipping anything unparseable.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::Message;
use crate::utils;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session io: {0}")]
    Io(#[from] std::io::Error),
    #[error("session encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────
// Turn / Session
// ─────────────────────────────────────────────

/// One record in a session log.
///
/// `extras` is flattened into the JSON line, so callers may stash
/// tool-call metadata or channel details alongside role and content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extras: HashMap<String, serde_json::Value>,
}

impl Turn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Turn {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            extras: HashMap::new(),
        }
    }
}

/// A conversation keyed by `"<channel>:<chat_id>"`.
#[derive(Clone, Debug)]
pub struct Session {
    pub key: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Session {
            key: key.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }
}

/// First line of every session file.
#[derive(Debug, Serialize, Deserialize)]
struct MetadataRecord {
    #[serde(rename = "_type")]
    record_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

// ─────────────────────────────────────────────
// SessionStore
// ─────────────────────────────────────────────

/// Write-through session cache backed by JSONL files.
pub struct SessionStore {
    sessions_dir: PathBuf,
    cache: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Open a store rooted at `sessions_dir` (default: the data directory's
    /// `sessions/`). The directory is created if missing.
    pub fn new(sessions_dir: Option<PathBuf>) -> Result<Self, SessionError> {
        let dir = sessions_dir.unwrap_or_else(utils::sessions_path);
        std::fs::create_dir_all(&dir)?;
        Ok(SessionStore {
            sessions_dir: dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Cache hit, else load from disk, else a fresh empty session.
    pub fn get_or_create(&self, key: &str) -> Session {
        if let Some(session) = self.cache.read().unwrap().get(key) {
            return session.clone();
        }

        let session = self.load(key).unwrap_or_else(|| Session::new(key));
        self.cache
            .write()
            .unwrap()
            .insert(key.to_string(), session.clone());
        session
    }

    /// Append one turn and persist.
    pub fn add_turn(&self, key: &str, role: &str, content: &str) {
        self.add_turn_with(key, role, content, HashMap::new());
    }

    /// Append one turn carrying extras and persist.
    pub fn add_turn_with(
        &self,
        key: &str,
        role: &str,
        content: &str,
        extras: HashMap<String, serde_json::Value>,
    ) {
        let mut session = self.get_or_create(key);
        let mut turn = Turn::new(role, content);
        turn.extras = extras;
        session.turns.push(turn);
        session.updated_at = Utc::now();
        self.save(&session);
    }

    /// The last `max` turns projected to role + content only. Tool-call
    /// metadata and any other extras are intentionally stripped so the
    /// result is a clean transcript in LLM message form.
    pub fn get_history(&self, key: &str, max: usize) -> Vec<Message> {
        let session = self.get_or_create(key);
        let skip = session.turns.len().saturating_sub(max);
        session.turns[skip..]
            .iter()
            .map(|t| match t.role.as_str() {
                "system" => Message::system(&t.content),
                "assistant" => Message::assistant(&t.content),
                "tool" => Message::Tool {
                    content: t.content.clone(),
                    tool_call_id: String::new(),
                    name: None,
                },
                _ => Message::user(&t.content),
            })
            .collect()
    }

    /// Drop all turns from a session, keeping the session itself.
    pub fn clear(&self, key: &str) {
        let mut session = self.get_or_create(key);
        session.turns.clear();
        session.updated_at = Utc::now();
        self.save(&session);
    }

    /// Remove a session from cache and disk. Returns whether a file existed.
    pub fn delete(&self, key: &str) -> bool {
        self.cache.write().unwrap().remove(key);
        let path = self.session_path(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(key = key, error = %e, "failed to delete session file");
                return false;
            }
            true
        } else {
            false
        }
    }

    /// Summaries of all on-disk sessions, newest first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        let entries = match std::fs::read_dir(&self.sessions_dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "failed to read sessions directory");
                return summaries;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            let mut lines = std::io::BufReader::new(file).lines();
            if let Some(Ok(first)) = lines.next() {
                if let Ok(meta) = serde_json::from_str::<MetadataRecord>(&first) {
                    let key = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(|s| s.replacen('_', ":", 1))
                        .unwrap_or_default();
                    summaries.push(SessionSummary {
                        key,
                        created_at: meta.created_at,
                        updated_at: meta.updated_at,
                        path,
                    });
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Persist a session and refresh the cache. Write failures are logged;
    /// the cached copy stays authoritative for the process lifetime.
    pub fn save(&self, session: &Session) {
        self.cache
            .write()
            .unwrap()
            .insert(session.key.clone(), session.clone());
        if let Err(e) = self.write_file(session) {
            warn!(key = %session.key, error = %e, "failed to persist session");
        }
    }

    fn session_path(&self, key: &str) -> PathBuf {
        let safe = utils::safe_filename(&key.replace(':', "_"));
        self.sessions_dir.join(format!("{safe}.jsonl"))
    }

    fn load(&self, key: &str) -> Option<Session> {
        let path = self.session_path(key);
        let file = std::fs::File::open(&path).ok()?;

        let mut session = Session::new(key);
        for line in std::io::BufReader::new(file).lines() {
            let Ok(line) = line else { continue };
            if line.trim().is_empty() {
                continue;
            }

            if let Ok(meta) = serde_json::from_str::<MetadataRecord>(&line) {
                if meta.record_type == "metadata" {
                    session.created_at = meta.created_at;
                    session.updated_at = meta.updated_at;
                    session.metadata = meta.metadata;
                    continue;
                }
            }
            if let Ok(turn) = serde_json::from_str::<Turn>(&line) {
                session.turns.push(turn);
            }
        }

        debug!(key = key, turns = session.turns.len(), "loaded session");
        Some(session)
    }

    fn write_file(&self, session: &Session) -> Result<(), SessionError> {
        let path = self.session_path(&session.key);
        let mut file = std::fs::File::create(&path)?;

        let meta = MetadataRecord {
            record_type: "metadata".into(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            metadata: session.metadata.clone(),
        };
        writeln!(file, "{}", serde_json::to_string(&meta)?)?;
        for turn in &session.turns {
            writeln!(file, "{}", serde_json::to_string(turn)?)?;
        }
        Ok(())
    }
}

/// A session listing entry.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub path: PathBuf,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserContent;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::new(Some(dir.path().to_path_buf())).unwrap()
    }

    #[test]
    fn get_or_create_starts_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let s = store.get_or_create("telegram:42");
        assert_eq!(s.key, "telegram:42");
        assert!(s.turns.is_empty());
        assert!(s.updated_at >= s.created_at);
    }

    #[test]
    fn add_turn_appends_in_order() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("t:1", "user", "first");
        store.add_turn("t:1", "assistant", "second");
        let s = store.get_or_create("t:1");
        assert_eq!(s.turns.len(), 2);
        assert_eq!(s.turns[0].content, "first");
        assert_eq!(s.turns[1].role, "assistant");
    }

    #[test]
    fn history_returns_last_n() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        for i in 0..10 {
            store.add_turn("t:1", "user", &format!("m{i}"));
        }
        let hist = store.get_history("t:1", 3);
        assert_eq!(hist.len(), 3);
        match &hist[0] {
            Message::User {
                content: UserContent::Text(t),
            } => assert_eq!(t, "m7"),
            other => panic!("expected user message, got {other:?}"),
        }
    }

    #[test]
    fn history_projection_strips_extras() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let mut extras = HashMap::new();
        extras.insert("tool_calls".into(), serde_json::json!([{"id": "c1"}]));
        extras.insert("channel".into(), serde_json::json!("telegram"));
        store.add_turn_with("t:1", "assistant", "with extras", extras);

        let hist = store.get_history("t:1", 10);
        assert_eq!(hist.len(), 1);
        let json = serde_json::to_value(&hist[0]).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "with extras");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("channel").is_none());
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn history_shorter_than_max() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("t:1", "user", "only");
        assert_eq!(store.get_history("t:1", 50).len(), 1);
    }

    #[test]
    fn file_format_metadata_then_turns() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("cli:local", "user", "ping");

        let content = std::fs::read_to_string(dir.path().join("cli_local.jsonl")).unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);

        let meta: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(meta["_type"], "metadata");
        let turn: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(turn["role"], "user");
        assert_eq!(turn["content"], "ping");
        assert!(turn["timestamp"].is_string());
    }

    #[test]
    fn turn_extras_flatten_on_disk() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let mut extras = HashMap::new();
        extras.insert("note".into(), serde_json::json!("aside"));
        store.add_turn_with("x:1", "user", "body", extras);

        let content = std::fs::read_to_string(dir.path().join("x_1.jsonl")).unwrap();
        let line = content.trim().lines().nth(1).unwrap();
        let json: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(json["note"], "aside");
    }

    #[test]
    fn persistence_survives_reload() {
        let dir = tempdir().unwrap();
        {
            let store = store_in(&dir);
            store.add_turn("telegram:7", "user", "hello");
            store.add_turn("telegram:7", "assistant", "hi!");
        }
        {
            let store = store_in(&dir);
            let s = store.get_or_create("telegram:7");
            assert_eq!(s.turns.len(), 2);
        }
    }

    #[test]
    fn turn_ordering_in_file_matches_arrival() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("s:1", "user", "m1");
        store.add_turn("s:1", "assistant", "r1");
        store.add_turn("s:1", "user", "m2");

        let content = std::fs::read_to_string(dir.path().join("s_1.jsonl")).unwrap();
        let user_lines: Vec<&str> = content
            .lines()
            .filter(|l| l.contains("\"role\":\"user\""))
            .collect();
        assert!(user_lines[0].contains("m1"));
        assert!(user_lines[1].contains("m2"));
    }

    #[test]
    fn clear_keeps_session_removes_turns() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("t:1", "user", "x");
        store.clear("t:1");
        assert!(store.get_or_create("t:1").turns.is_empty());
        // The cleared state persists too.
        let store2 = store_in(&dir);
        assert!(store2.get_or_create("t:1").turns.is_empty());
    }

    #[test]
    fn delete_removes_cache_and_file() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("t:1", "user", "x");
        assert!(store.delete("t:1"));
        assert!(!dir.path().join("t_1.jsonl").exists());
        assert!(store.get_or_create("t:1").turns.is_empty());
        assert!(!store.delete("t:1"));
    }

    #[test]
    fn list_sessions_finds_all_keys() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("telegram:1", "user", "a");
        store.add_turn("whatsapp:2", "user", "b");

        let listed = store.list_sessions();
        assert_eq!(listed.len(), 2);
        let keys: Vec<&str> = listed.iter().map(|s| s.key.as_str()).collect();
        assert!(keys.contains(&"telegram:1"));
        assert!(keys.contains(&"whatsapp:2"));
    }

    #[test]
    fn filename_sanitizes_hostile_characters() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add_turn("wa:+49/151?9*", "user", "x");
        // Exactly one file, with no path separators inside the name.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().to_string_lossy().to_string();
        assert!(!name.contains('/') && !name.contains('?') && !name.contains('*'));
    }
}
