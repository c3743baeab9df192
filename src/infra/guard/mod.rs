// SQLite-backed implementations of the guard storage ports.

pub mod sqlite_list_store;
pub mod sqlite_settings_store;

pub use sqlite_list_store::SqliteListStore;
pub use sqlite_settings_store::SqliteSettingsStore;
