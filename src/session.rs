//! Persistent session storage for the authenticated user.
//!
//! The API issues an opaque token on login; the token and username survive an
//! application restart so the app can open straight into the dashboard. The
//! store is an explicit trait so tests (and the API client) can run against
//! an in-memory substitute instead of the user's config directory.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::VisualizerError;

const SESSION_FILE_NAME: &str = "session.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
}

pub trait SessionStore: Send + Sync {
    /// The stored session, if any. A missing or unreadable session file is
    /// treated as logged out rather than an error.
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session) -> Result<(), VisualizerError>;
    fn clear(&self) -> Result<(), VisualizerError>;
}

/// Stores the session as a JSON file in the platform config directory.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn from_config_dir() -> Result<Self, VisualizerError> {
        let path = dirs::config_dir()
            .ok_or(VisualizerError::NoConfigDir)?
            .join("equipviz")
            .join(SESSION_FILE_NAME);
        Ok(Self { path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        let file = std::fs::File::open(&self.path).ok()?;
        serde_json::from_reader(file).ok()
    }

    fn save(&self, session: &Session) -> Result<(), VisualizerError> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| VisualizerError::SessionIo { source: e })?;
        }
        let file = std::fs::File::create(&self.path)
            .map_err(|e| VisualizerError::SessionIo { source: e })?;
        serde_json::to_writer(file, session)
            .map_err(|e| VisualizerError::SessionSerialize { source: e })
    }

    fn clear(&self) -> Result<(), VisualizerError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VisualizerError::SessionIo { source: e }),
        }
    }
}

/// In-memory store, used as the test substitute for `FileSessionStore`.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn logged_in(token: &str, username: &str) -> Self {
        Self {
            session: Mutex::new(Some(Session {
                token: token.to_string(),
                username: username.to_string(),
            })),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.session.lock().expect("session lock poisoned").clone()
    }

    fn save(&self, session: &Session) -> Result<(), VisualizerError> {
        *self.session.lock().expect("session lock poisoned") = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), VisualizerError> {
        *self.session.lock().expect("session lock poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileSessionStore {
        FileSessionStore::with_path(dir.path().join("nested").join(SESSION_FILE_NAME))
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_none());

        let session = Session {
            token: "abc123".to_string(),
            username: "alice".to_string(),
        };
        store.save(&session).unwrap();
        assert_eq!(store.load(), Some(session));
    }

    #[test]
    fn file_store_clear_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&Session {
                token: "abc123".to_string(),
                username: "alice".to_string(),
            })
            .unwrap();

        store.clear().unwrap();
        assert!(store.load().is_none());
        // clearing an already-empty store is not an error
        store.clear().unwrap();
    }

    #[test]
    fn file_store_ignores_corrupt_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE_NAME);
        std::fs::write(&path, "not json").unwrap();
        let store = FileSessionStore::with_path(path);
        assert!(store.load().is_none());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySessionStore::default();
        assert!(store.load().is_none());
        store
            .save(&Session {
                token: "t".to_string(),
                username: "u".to_string(),
            })
            .unwrap();
        assert_eq!(store.load().unwrap().username, "u");
        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
