//! Paged kanban board state with optimistic moves.
//!
//! This crate owns the client-side board model used by `cli` (and any other
//! front end): a fixed, ordered set of stage columns, each lazily loaded page
//! by page from a [`BoardSource`], plus aggregate per-stage counts.
//!
//! Cross-column moves are applied locally before the source confirms them and
//! rolled back if the source rejects. Column reorders are best-effort and are
//! never rolled back. No public operation returns an error; source failures
//! are logged and absorbed.

mod controller;
mod http;
mod source;
mod types;

pub use controller::{BoardConfig, BoardController, DEFAULT_PAGE_SIZE};
pub use http::HttpBoardSource;
pub use source::{BoardSource, SourceError};
pub use types::{BoardItem, ColumnState, Counts, Page, Pagination, Record};
