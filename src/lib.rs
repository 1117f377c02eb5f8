// Library interface for equipviz
// This allows integration tests to access internal modules

pub mod api;
pub mod config;
pub mod errors;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use api::{ApiClient, HistoryEntry, UploadResult};
pub use errors::VisualizerError;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use ui::VisualizerApp;
