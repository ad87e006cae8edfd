//! Playbook snapshot store
//!
//! One pretty-printed JSON file per conversation in a directory. The binary
//! loads every snapshot at startup and writes them all back on shutdown,
//! dropping files for conversations that were cleared in between.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::ace::{AceManager, PlaybookData};

const SNAPSHOT_EXTENSION: &str = "json";

/// Snapshot store errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk shape; carries the id since file names are sanitized
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    conversation_id: String,
    playbook: PlaybookData,
}

/// Directory-backed playbook snapshots
#[derive(Debug, Clone)]
pub struct PlaybookSnapshotStore {
    dir: PathBuf,
}

impl PlaybookSnapshotStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", file_stem(conversation_id), SNAPSHOT_EXTENSION))
    }

    /// Write one conversation's playbook
    pub fn save(&self, conversation_id: &str, playbook: &PlaybookData) -> Result<(), SnapshotError> {
        let file = SnapshotFile {
            conversation_id: conversation_id.to_string(),
            playbook: playbook.clone(),
        };
        let data = serde_json::to_string_pretty(&file)?;

        // Write atomically via temp file
        let path = self.path_for(conversation_id);
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &data)?;
        std::fs::rename(&temp_path, &path)?;

        debug!(conversation_id, path = %path.display(), "Playbook snapshot saved");
        Ok(())
    }

    /// Read one conversation's playbook, if a snapshot exists
    pub fn load(&self, conversation_id: &str) -> Result<Option<PlaybookData>, SnapshotError> {
        let path = self.path_for(conversation_id);
        if !path.exists() {
            return Ok(None);
        }
        let file = read_snapshot(&path)?;
        Ok(Some(file.playbook))
    }

    /// Delete a conversation's snapshot. Returns whether one existed.
    pub fn remove(&self, conversation_id: &str) -> Result<bool, SnapshotError> {
        match std::fs::remove_file(self.path_for(conversation_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot every playbook the manager holds and prune snapshots of
    /// conversations it no longer has. Returns the count written.
    pub fn save_all(&self, manager: &AceManager) -> Result<usize, SnapshotError> {
        let live: HashSet<String> = manager.conversation_ids().into_iter().collect();

        let mut saved = 0;
        for id in &live {
            if let Some(data) = manager.save_playbook(id) {
                self.save(id, &data)?;
                saved += 1;
            }
        }

        let pruned = self.prune(&live)?;
        info!(saved, pruned, dir = %self.dir.display(), "Playbook snapshots written");
        Ok(saved)
    }

    /// Delete snapshots whose conversation is not in `live`
    fn prune(&self, live: &HashSet<String>) -> Result<usize, SnapshotError> {
        let mut pruned = 0;
        for path in self.snapshot_paths()? {
            // Unreadable files are left for an operator to inspect
            let Ok(file) = read_snapshot(&path) else {
                continue;
            };
            if !live.contains(&file.conversation_id) {
                std::fs::remove_file(&path)?;
                debug!(conversation_id = %file.conversation_id, "Pruned stale playbook snapshot");
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    fn snapshot_paths(&self) -> Result<Vec<PathBuf>, SnapshotError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Restore every snapshot into the manager. Unreadable files are skipped.
    pub fn load_all(&self, manager: &AceManager) -> Result<usize, SnapshotError> {
        let mut loaded = 0;
        for path in self.snapshot_paths()? {
            match read_snapshot(&path) {
                Ok(file) => {
                    manager.restore_playbook(&file.conversation_id, file.playbook);
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), "Skipping unreadable snapshot: {}", e),
            }
        }
        info!(loaded, dir = %self.dir.display(), "Playbook snapshots loaded");
        Ok(loaded)
    }
}

fn read_snapshot(path: &Path) -> Result<SnapshotFile, SnapshotError> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Filesystem-safe stem for a conversation id.
/// Bytes outside `[A-Za-z0-9-]` become `_xx`, so distinct ids never collide.
fn file_stem(conversation_id: &str) -> String {
    let mut stem = String::with_capacity(conversation_id.len());
    for byte in conversation_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            let _ = write!(stem, "_{:02x}", byte);
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::{Playbook, Polarity, Strategy};
    use crate::config::Config;
    use tempfile::TempDir;

    fn sample() -> PlaybookData {
        let mut playbook = Playbook::new();
        playbook.add_strategy(Strategy::helpful("Lead with the direct answer", 0.9));
        playbook.add_strategy(Strategy::harmful("Avoid unexplained jargon", 0.2));
        playbook.to_data()
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();
        let data = sample();

        store.save("chat-1", &data).unwrap();
        let loaded = store.load("chat-1").unwrap().unwrap();

        assert_eq!(loaded, data);
        assert_eq!(loaded.strategies[1].polarity, Polarity::Harmful);
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_file_names_are_sanitized() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();

        store.save("../escape/attempt", &sample()).unwrap();
        assert!(tmp.path().join("_2e_2e_2fescape_2fattempt.json").exists());
        assert!(store.load("../escape/attempt").unwrap().is_some());
    }

    #[test]
    fn test_similar_ids_get_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();

        let mut other = Playbook::new();
        other.add_strategy(Strategy::helpful("Only in the underscore chat", 0.8));

        store.save("chat:1", &sample()).unwrap();
        store.save("chat_1", &other.to_data()).unwrap();

        assert_eq!(store.load("chat:1").unwrap().unwrap().strategies.len(), 2);
        assert_eq!(store.load("chat_1").unwrap().unwrap().strategies.len(), 1);
    }

    #[test]
    fn test_cleared_playbook_stays_cleared_across_restarts() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();

        let first = AceManager::new(Config::default());
        first.restore_playbook("chat", sample());
        first.restore_playbook("kept", sample());
        store.save_all(&first).unwrap();

        let second = AceManager::new(Config::default());
        store.load_all(&second).unwrap();
        assert!(second.clear_playbook("chat"));
        assert_eq!(store.save_all(&second).unwrap(), 1);
        assert!(store.load("chat").unwrap().is_none());

        let third = AceManager::new(Config::default());
        assert_eq!(store.load_all(&third).unwrap(), 1);
        assert_eq!(third.get_stats("chat").total_strategies, 0);
        assert!(third.get_strategies("chat", 10).is_empty());
        assert_eq!(third.get_stats("kept").total_strategies, 2);
    }

    #[test]
    fn test_prune_removes_files_under_other_names() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();
        let legacy = SnapshotFile {
            conversation_id: "chat:1".to_string(),
            playbook: sample(),
        };
        let legacy_path = tmp.path().join("chat_1.json");
        std::fs::write(&legacy_path, serde_json::to_string(&legacy).unwrap()).unwrap();

        store.save_all(&AceManager::new(Config::default())).unwrap();
        assert!(!legacy_path.exists());
    }

    #[test]
    fn test_prune_leaves_unreadable_files() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{not json").unwrap();

        store.save_all(&AceManager::new(Config::default())).unwrap();
        assert!(tmp.path().join("broken.json").exists());
    }

    #[test]
    fn test_remove() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();

        store.save("chat-1", &sample()).unwrap();
        assert!(store.remove("chat-1").unwrap());
        assert!(!store.remove("chat-1").unwrap());
    }

    #[test]
    fn test_save_all_and_load_all() {
        let tmp = TempDir::new().unwrap();
        let store = PlaybookSnapshotStore::open(tmp.path()).unwrap();

        let source = AceManager::new(Config::default());
        source.restore_playbook("chat:1", sample());
        source.restore_playbook("chat:2", Playbook::new().to_data());
        assert_eq!(store.save_all(&source).unwrap(), 2);

        // Garbage next to the snapshots is skipped
        std::fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let target = AceManager::new(Config::default());
        assert_eq!(store.load_all(&target).unwrap(), 2);
        assert_eq!(target.conversation_ids(), vec!["chat:1", "chat:2"]);
        assert_eq!(target.get_stats("chat:1").total_strategies, 2);
        assert_eq!(target.save_playbook("chat:1"), source.save_playbook("chat:1"));
    }
}
