//! Domain services used by the HTTP routes.
//!
//! Route handlers stay focused on extraction and status mapping; field
//! translation and paging rules live here.

pub mod records;
