//! File-backed stores for the API credential and the download history.
//!
//! Both degrade to "no persistence" when no data directory is configured or
//! the file system refuses us: reads come back empty, writes are dropped, and
//! the failure is only logged.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const MIN_API_KEY_LENGTH: usize = 10;
const CREDENTIAL_FILE: &str = "credential.json";
const DOWNLOADS_FILE: &str = "downloads.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("APIキーを入力してください")]
    Empty,
    #[error("APIキーは10文字以上で入力してください")]
    TooShort,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("⚠️ Failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| warn!("⚠️ Ignoring unreadable {}: {}", path.display(), e))
        .ok()
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    let result = (|| -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    })();
    if let Err(e) = result {
        warn!("⚠️ Failed to persist {}: {}", path.display(), e);
    }
}

fn remove_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("⚠️ Failed to remove {}: {}", path.display(), e),
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    gemini_api_key: Option<String>,
}

/// Key-value persistence of the user's Gemini API key.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(data_dir: Option<&Path>) -> Self {
        Self { path: data_dir.map(|dir| dir.join(CREDENTIAL_FILE)) }
    }

    /// Storage-less store: every read is `None`, every write a no-op.
    pub fn unavailable() -> Self {
        Self { path: None }
    }

    pub fn validate(key: &str) -> Result<(), CredentialError> {
        if key.trim().is_empty() {
            return Err(CredentialError::Empty);
        }
        if key.chars().count() < MIN_API_KEY_LENGTH {
            return Err(CredentialError::TooShort);
        }
        Ok(())
    }

    /// Rejects invalid keys; persistence failures are swallowed.
    pub fn save(&self, key: &str) -> Result<(), CredentialError> {
        Self::validate(key)?;
        if let Some(path) = &self.path {
            write_json(path, &CredentialFile { gemini_api_key: Some(key.to_string()) });
        }
        Ok(())
    }

    pub fn get(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        read_json::<CredentialFile>(path)?.gemini_api_key
    }

    pub fn remove(&self) {
        if let Some(path) = &self.path {
            remove_file(path);
        }
    }

    pub fn exists(&self) -> bool {
        self.get().is_some_and(|key| !key.is_empty())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DownloadsFile {
    #[serde(default)]
    ids: BTreeSet<String>,
}

/// Ids of generated images the user has downloaded, kept across restarts.
#[derive(Debug)]
pub struct DownloadHistory {
    path: Option<PathBuf>,
    ids: Mutex<Option<BTreeSet<String>>>,
}

impl DownloadHistory {
    pub fn new(data_dir: Option<&Path>) -> Self {
        Self { path: data_dir.map(|dir| dir.join(DOWNLOADS_FILE)), ids: Mutex::new(None) }
    }

    fn with_ids<T>(&self, f: impl FnOnce(&mut BTreeSet<String>) -> T) -> T {
        let mut guard = self.ids.lock();
        let ids = guard.get_or_insert_with(|| {
            self.path
                .as_deref()
                .and_then(read_json::<DownloadsFile>)
                .map(|file| file.ids)
                .unwrap_or_default()
        });
        f(ids)
    }

    fn persist(&self, ids: &BTreeSet<String>) {
        if let Some(path) = &self.path {
            write_json(path, &DownloadsFile { ids: ids.clone() });
        }
    }

    pub fn mark_downloaded(&self, id: &str) {
        self.with_ids(|ids| {
            if ids.insert(id.to_string()) {
                self.persist(ids);
            }
        });
    }

    pub fn is_downloaded(&self, id: &str) -> bool {
        self.with_ids(|ids| ids.contains(id))
    }

    pub fn list_downloaded_ids(&self) -> Vec<String> {
        self.with_ids(|ids| ids.iter().cloned().collect())
    }

    pub fn clear(&self) {
        self.with_ids(|ids| ids.clear());
        if let Some(path) = &self.path {
            remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_roundtrip_on_disk() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = CredentialStore::new(Some(temp.path()));
        assert!(!store.exists());
        store.save("AIzaSyExampleKey123")?;
        assert_eq!(store.get().as_deref(), Some("AIzaSyExampleKey123"));
        assert!(CredentialStore::new(Some(temp.path())).exists());
        store.remove();
        assert!(store.get().is_none());
        assert!(!store.exists());
        Ok(())
    }

    #[test]
    fn credential_validation() {
        assert_eq!(CredentialStore::validate("   "), Err(CredentialError::Empty));
        assert_eq!(CredentialStore::validate("short"), Err(CredentialError::TooShort));
        assert_eq!(CredentialStore::validate("0123456789"), Ok(()));
        assert_eq!(CredentialStore::unavailable().save("bad"), Err(CredentialError::TooShort));
    }

    #[test]
    fn unavailable_store_degrades_silently() {
        let store = CredentialStore::unavailable();
        assert_eq!(store.save("AIzaSyExampleKey123"), Ok(()));
        assert!(store.get().is_none());
        assert!(!store.exists());
        store.remove();
    }

    #[test]
    fn unwritable_directory_is_swallowed() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "file")?;
        let store = CredentialStore::new(Some(&blocker));
        assert_eq!(store.save("AIzaSyExampleKey123"), Ok(()));
        assert!(store.get().is_none());
        Ok(())
    }

    #[test]
    fn corrupt_file_reads_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        std::fs::write(temp.path().join(CREDENTIAL_FILE), "{not json")?;
        assert!(CredentialStore::new(Some(temp.path())).get().is_none());
        Ok(())
    }

    #[test]
    fn download_history_persists_and_clears() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let history = DownloadHistory::new(Some(temp.path()));
        history.mark_downloaded("gen-b");
        history.mark_downloaded("gen-a");
        history.mark_downloaded("gen-a");
        assert!(history.is_downloaded("gen-a"));
        assert!(!history.is_downloaded("gen-c"));

        let reopened = DownloadHistory::new(Some(temp.path()));
        assert_eq!(reopened.list_downloaded_ids(), vec!["gen-a".to_string(), "gen-b".to_string()]);

        reopened.clear();
        assert!(reopened.list_downloaded_ids().is_empty());
        assert!(DownloadHistory::new(Some(temp.path())).list_downloaded_ids().is_empty());
        Ok(())
    }

    #[test]
    fn in_memory_history_without_data_dir() {
        let history = DownloadHistory::new(None);
        history.mark_downloaded("gen-1");
        assert!(history.is_downloaded("gen-1"));
    }
}
