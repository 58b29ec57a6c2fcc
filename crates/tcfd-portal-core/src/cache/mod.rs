//! Local cache of service data that changes slowly.
//!
//! The `CacheManager` keeps the TCFD standards list and per-company financial
//! data and materiality issues as JSON files. Entries are considered stale
//! after 60 minutes; stale data is still shown while a refresh runs.

pub mod manager;

pub use manager::{CacheAges, CacheManager, CachedData};
