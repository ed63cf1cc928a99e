pub mod autosave;
pub mod database;
pub mod error;
pub mod kv_store;
pub mod persist;
pub mod settings;
