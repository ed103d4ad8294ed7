//! Frame persistence
//!
//! Appends frames to a durable per-session log for replay and continuation.
//! Frame numbers are caller-assigned and strictly increasing from 0 per
//! session; the store trusts but does not compute them - the agent loop is
//! the single writer responsible for sequencing, which avoids any locking
//! protocol between writers.

use crate::frame::{Frame, GameAction};
use gridrun_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Records
// ============================================================================

/// One persisted frame with its replay metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_id: String,
    pub frame_number: u64,
    pub frame: Frame,
    pub action: Option<GameAction>,
    pub caption: Option<String>,
    /// Cells changed against the previous settled frame; 0 for synthetic
    /// intermediate animation frames
    pub pixels_changed: u64,
    pub recorded_at_ms: u64,
}

/// Per-session log header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub record_id: String,
    pub game_id: String,
    pub game_guid: String,
    pub win_score: i64,
    pub created_at_ms: u64,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ============================================================================
// Frame store trait
// ============================================================================

/// Trait for frame log backends.
///
/// Implement this to add new backends (filesystem, SQLite, ...).
pub trait FrameStore: Send + Sync {
    /// Create a new per-session log and return its record id
    fn create_session(&self, game_id: &str, game_guid: &str, win_score: i64) -> Result<String>;

    /// Append one frame under a caller-assigned frame number
    fn save_frame(
        &self,
        record_id: &str,
        frame_number: u64,
        frame: &Frame,
        action: Option<&GameAction>,
        caption: Option<&str>,
        pixels_changed: u64,
    ) -> Result<String>;

    /// All frames of one session, ordered by frame number
    fn frames(&self, record_id: &str) -> Result<Vec<FrameRecord>>;

    /// Session log header
    fn session(&self, record_id: &str) -> Result<SessionRecord>;

    /// List all record ids
    fn list_sessions(&self) -> Result<Vec<String>>;

    /// Get backend name for debugging
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// In-memory backend
// ============================================================================

struct MemoryLog {
    session: SessionRecord,
    frames: Vec<FrameRecord>,
}

/// In-memory frame store (tests and ephemeral runs)
pub struct MemoryFrameStore {
    logs: std::sync::RwLock<HashMap<String, MemoryLog>>,
    counter: std::sync::atomic::AtomicU64,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self {
            logs: std::sync::RwLock::new(HashMap::new()),
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl Default for MemoryFrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore for MemoryFrameStore {
    fn create_session(&self, game_id: &str, game_guid: &str, win_score: i64) -> Result<String> {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let record_id = format!("rec_{:x}_{:x}", now_ms(), n);

        let mut logs = self.logs.write().unwrap();
        logs.insert(
            record_id.clone(),
            MemoryLog {
                session: SessionRecord {
                    record_id: record_id.clone(),
                    game_id: game_id.to_string(),
                    game_guid: game_guid.to_string(),
                    win_score,
                    created_at_ms: now_ms(),
                },
                frames: Vec::new(),
            },
        );
        Ok(record_id)
    }

    fn save_frame(
        &self,
        record_id: &str,
        frame_number: u64,
        frame: &Frame,
        action: Option<&GameAction>,
        caption: Option<&str>,
        pixels_changed: u64,
    ) -> Result<String> {
        let mut logs = self.logs.write().unwrap();
        let log = logs
            .get_mut(record_id)
            .ok_or_else(|| Error::record_not_found(record_id))?;

        let frame_id = format!("{}_{:06}", record_id, frame_number);
        log.frames.push(FrameRecord {
            frame_id: frame_id.clone(),
            frame_number,
            frame: frame.clone(),
            action: action.cloned(),
            caption: caption.map(|s| s.to_string()),
            pixels_changed,
            recorded_at_ms: now_ms(),
        });
        Ok(frame_id)
    }

    fn frames(&self, record_id: &str) -> Result<Vec<FrameRecord>> {
        let logs = self.logs.read().unwrap();
        let log = logs
            .get(record_id)
            .ok_or_else(|| Error::record_not_found(record_id))?;
        let mut frames = log.frames.clone();
        frames.sort_by_key(|f| f.frame_number);
        Ok(frames)
    }

    fn session(&self, record_id: &str) -> Result<SessionRecord> {
        let logs = self.logs.read().unwrap();
        logs.get(record_id)
            .map(|l| l.session.clone())
            .ok_or_else(|| Error::record_not_found(record_id))
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let logs = self.logs.read().unwrap();
        Ok(logs.keys().cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// File-based backend (JSON files)
// ============================================================================

/// File-based frame store using JSON files
///
/// Structure:
/// ```text
/// {base_path}/
///   {record_id}/
///     session.json      # Session header
///     frames/
///       000000.json     # One file per frame, named by frame number
/// ```
pub struct FileFrameStore {
    base_path: PathBuf,
    counter: std::sync::atomic::AtomicU64,
}

impl FileFrameStore {
    /// Create a new file store rooted at `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)
            .map_err(|e| Error::storage_failed(format!("Failed to create frame log dir: {}", e)))?;
        Ok(Self {
            base_path,
            counter: std::sync::atomic::AtomicU64::new(0),
        })
    }

    fn record_dir(&self, record_id: &str) -> PathBuf {
        self.base_path.join(record_id)
    }

    fn session_path(&self, record_id: &str) -> PathBuf {
        self.record_dir(record_id).join("session.json")
    }

    fn frame_path(&self, record_id: &str, frame_number: u64) -> PathBuf {
        self.record_dir(record_id)
            .join("frames")
            .join(format!("{:06}.json", frame_number))
    }
}

impl FrameStore for FileFrameStore {
    fn create_session(&self, game_id: &str, game_guid: &str, win_score: i64) -> Result<String> {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let record_id = format!("rec_{:x}_{:x}", now_ms(), n);

        let frames_dir = self.record_dir(&record_id).join("frames");
        std::fs::create_dir_all(&frames_dir)
            .map_err(|e| Error::storage_failed(format!("Failed to create record dir: {}", e)))?;

        let session = SessionRecord {
            record_id: record_id.clone(),
            game_id: game_id.to_string(),
            game_guid: game_guid.to_string(),
            win_score,
            created_at_ms: now_ms(),
        };
        let json = serde_json::to_string_pretty(&session)
            .map_err(|e| Error::serialization_failed(e.to_string()))?;
        std::fs::write(self.session_path(&record_id), json)
            .map_err(|e| Error::storage_failed(format!("Failed to write session: {}", e)))?;

        Ok(record_id)
    }

    fn save_frame(
        &self,
        record_id: &str,
        frame_number: u64,
        frame: &Frame,
        action: Option<&GameAction>,
        caption: Option<&str>,
        pixels_changed: u64,
    ) -> Result<String> {
        if !self.session_path(record_id).exists() {
            return Err(Error::record_not_found(record_id));
        }

        let frame_id = format!("{}_{:06}", record_id, frame_number);
        let record = FrameRecord {
            frame_id: frame_id.clone(),
            frame_number,
            frame: frame.clone(),
            action: action.cloned(),
            caption: caption.map(|s| s.to_string()),
            pixels_changed,
            recorded_at_ms: now_ms(),
        };

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| Error::serialization_failed(e.to_string()))?;
        std::fs::write(self.frame_path(record_id, frame_number), json)
            .map_err(|e| Error::storage_failed(format!("Failed to write frame {}: {}", frame_number, e)))?;

        Ok(frame_id)
    }

    fn frames(&self, record_id: &str) -> Result<Vec<FrameRecord>> {
        let frames_dir = self.record_dir(record_id).join("frames");
        let entries = std::fs::read_dir(&frames_dir)
            .map_err(|_| Error::record_not_found(record_id))?;

        let mut frames = Vec::new();
        for entry in entries.flatten() {
            let json = std::fs::read_to_string(entry.path())
                .map_err(|e| Error::storage_failed(format!("Failed to read frame: {}", e)))?;
            let record: FrameRecord = serde_json::from_str(&json)
                .map_err(|e| Error::parse_failed(format!("Failed to parse frame: {}", e)))?;
            frames.push(record);
        }

        frames.sort_by_key(|f| f.frame_number);
        Ok(frames)
    }

    fn session(&self, record_id: &str) -> Result<SessionRecord> {
        let json = std::fs::read_to_string(self.session_path(record_id))
            .map_err(|_| Error::record_not_found(record_id))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::parse_failed(format!("Failed to parse session: {}", e)))
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = Vec::new();

        let entries = std::fs::read_dir(&self.base_path)
            .map_err(|e| Error::storage_failed(format!("Failed to read frame log dir: {}", e)))?;

        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    if name.starts_with("rec_") {
                        sessions.push(name.to_string());
                    }
                }
            }
        }

        Ok(sessions)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ActionName, GameState};
    use serde_json::json;
    use tempfile::TempDir;

    fn test_frame(score: i64) -> Frame {
        serde_json::from_value(json!({
            "gameGuid": "guid-1",
            "gameId": "ls20",
            "frame": [[[0, score]]],
            "score": score,
            "state": "IN_PROGRESS",
            "actionCounter": 1,
            "maxActions": 80,
            "winScore": 10
        }))
        .unwrap()
    }

    fn exercise_store(store: &dyn FrameStore) {
        let record_id = store.create_session("ls20", "guid-1", 10).unwrap();

        for n in 0..3u64 {
            let action = GameAction::simple(ActionName::Action1);
            store
                .save_frame(&record_id, n, &test_frame(n as i64), Some(&action), None, n)
                .unwrap();
        }

        let frames = store.frames(&record_id).unwrap();
        assert_eq!(frames.len(), 3);

        // strictly increasing, gap-free, starting at 0
        for (i, record) in frames.iter().enumerate() {
            assert_eq!(record.frame_number, i as u64);
        }
        assert_eq!(frames[2].pixels_changed, 2);
        assert_eq!(frames[1].frame.score, 1);

        let session = store.session(&record_id).unwrap();
        assert_eq!(session.game_id, "ls20");
        assert_eq!(session.win_score, 10);

        assert!(store.list_sessions().unwrap().contains(&record_id));
        assert!(store.frames("rec_missing").is_err());
        assert!(store
            .save_frame("rec_missing", 0, &test_frame(0), None, None, 0)
            .is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryFrameStore::new();
        assert_eq!(store.backend_name(), "memory");
        exercise_store(&store);
    }

    #[test]
    fn test_file_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileFrameStore::new(temp_dir.path()).unwrap();
        assert_eq!(store.backend_name(), "file");
        exercise_store(&store);
    }

    #[test]
    fn test_file_store_round_trips_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileFrameStore::new(temp_dir.path()).unwrap();

        let record_id = store.create_session("ft09", "guid-2", 5).unwrap();
        let action = GameAction::at(3, 3);
        store
            .save_frame(&record_id, 0, &test_frame(0), Some(&action), Some("opening move"), 4)
            .unwrap();

        let frames = store.frames(&record_id).unwrap();
        assert_eq!(frames[0].action, Some(GameAction::at(3, 3)));
        assert_eq!(frames[0].caption.as_deref(), Some("opening move"));
        assert_eq!(frames[0].pixels_changed, 4);
        assert_eq!(frames[0].frame.state, GameState::InProgress);
    }
}
