//! Knowledge storage backed by a JSON file per language mode
//!
//! The store is a flat map from normalized utterance to response text. It is
//! loaded once when a mode is activated and rewritten wholesale after every
//! mutation (temp file + rename, so readers never observe a partial write).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use super::normalize::normalize;

/// File name of the knowledge store inside a mode directory
pub const KNOWLEDGE_FILE: &str = "knowledge.json";

/// Errors from persisting the knowledge store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Learned responses for a single language mode
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl KnowledgeStore {
    /// Create an empty store that persists to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing, unreadable or malformed file yields an empty store. Keys are
    /// normalized on the way in so hand-edited files still obey the store
    /// invariant.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No knowledge file at {}, starting empty", path.display());
                return Self::empty(path);
            }
            Err(e) => {
                tracing::warn!("Could not read {}: {}; starting empty", path.display(), e);
                return Self::empty(path);
            }
        };

        let raw: BTreeMap<String, String> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    "Malformed knowledge file {}: {}; starting empty",
                    path.display(),
                    e
                );
                return Self::empty(path);
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            let normalized = normalize(&key);
            if entries.insert(normalized.clone(), value).is_some() {
                tracing::warn!("Duplicate knowledge key '{}' after normalization", normalized);
            }
        }

        tracing::debug!("Loaded {} entries from {}", entries.len(), path.display());
        Self { path, entries }
    }

    /// Look up the response stored for an already-normalized key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Store a response and persist the whole store immediately.
    ///
    /// If the write fails the in-memory change is undone, so the store keeps
    /// matching what is on disk.
    pub fn put(&mut self, key: &str, response: impl Into<String>) -> Result<(), StoreError> {
        let key = normalize(key);
        let previous = self.entries.insert(key.clone(), response.into());

        if let Err(e) = self.save() {
            match previous {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
            return Err(e);
        }

        tracing::info!("Learned response for '{}' ({} entries)", key, self.entries.len());
        Ok(())
    }

    /// Serialize the full store and atomically replace the backing file
    pub fn save(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(&self.entries)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| KNOWLEDGE_FILE.to_string());
        let temp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let written = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(json.as_bytes())?;
                file.write_all(b"\n")?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&temp_path, &self.path));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Io {
                path: self.path.clone(),
                source: e,
            });
        }

        tracing::debug!("Saved {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in lexicographic key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values whose key contains `topic` (already normalized), in key order
    pub fn values_for_topic(&self, topic: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(key, _)| key.contains(topic))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("en").join(KNOWLEDGE_FILE)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::load(store_path(&dir));
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(KNOWLEDGE_FILE);

        fs::write(&path, "{ not json").unwrap();
        assert!(KnowledgeStore::load(&path).is_empty());

        fs::write(&path, r#"{"hello": 42}"#).unwrap();
        assert!(KnowledgeStore::load(&path).is_empty());

        fs::write(&path, r#"["hello"]"#).unwrap();
        assert!(KnowledgeStore::load(&path).is_empty());
    }

    #[test]
    fn test_put_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        let mut store = KnowledgeStore::load(&path);
        store.put("  Hello ", "Hi there!").unwrap();
        store.put("how are you", "Great, thanks.").unwrap();

        assert_eq!(store.get("hello"), Some("Hi there!"));

        let reloaded = KnowledgeStore::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("hello"), Some("Hi there!"));
        assert_eq!(reloaded.get("how are you"), Some("Great, thanks."));
    }

    #[test]
    fn test_put_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut store = KnowledgeStore::load(store_path(&dir));

        store.put("hello", "Hi").unwrap();
        store.put("HELLO", "Hey").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("hello"), Some("Hey"));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let mut store = KnowledgeStore::load(dir.path().join(KNOWLEDGE_FILE));
        store.put("a", "b").unwrap();
        store.put("c", "d").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![KNOWLEDGE_FILE.to_string()]);
    }

    #[test]
    fn test_load_normalizes_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(KNOWLEDGE_FILE);
        fs::write(&path, r#"{"  Good Morning ": "Morning!"}"#).unwrap();

        let store = KnowledgeStore::load(&path);
        assert_eq!(store.get("good morning"), Some("Morning!"));
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let dir = TempDir::new().unwrap();
        // The target path is a directory, so the final rename fails
        let path = dir.path().join("blocked");
        fs::create_dir_all(path.join("inner")).unwrap();

        let mut store = KnowledgeStore::empty(&path);
        assert!(store.put("hello", "Hi").is_err());
        assert_eq!(store.get("hello"), None);
    }

    #[test]
    fn test_values_for_topic() {
        let dir = TempDir::new().unwrap();
        let mut store = KnowledgeStore::load(store_path(&dir));
        store.put("cats are great", "Cats are wonderful").unwrap();
        store.put("i like dogs", "Dogs are loyal").unwrap();

        assert_eq!(store.values_for_topic("cats"), vec!["Cats are wonderful"]);
        assert!(store.values_for_topic("birds").is_empty());
    }
}
