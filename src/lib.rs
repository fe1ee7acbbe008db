//! FAT protocol project store.
//!
//! Storage and HTTP API for electrical-panel projects and their Factory
//! Acceptance Test (FAT) protocol documents, plus the client-side editor
//! state and debounced persistence coordinator.
//!
//! - [`models`] — projects, panels, activities and protocol documents
//! - [`templates`] — the FAT checklist catalog and protocol normalization
//! - [`database`] — SQLite repositories (CRUD, ownership, statistics)
//! - [`api`] — axum routers over the repositories
//! - [`editor`] — optimistic in-memory editing with debounced autosave

pub mod api;
pub mod database;
pub mod editor;
pub mod error;
pub mod models;
pub mod templates;

pub use error::StoreError;
