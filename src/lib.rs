//! # Mat History
//!
//! Career history for one wrestler, built from FloArena records.
//!
//! ## Architecture
//!
//! - **models**: Records, bundles, identifiers and the joined views over them
//! - **join**: Relationship joins from bouts and appearances to views
//! - **calculate**: Filters, statistics, team counts and weight history
//! - **report**: Owned report DTOs and the per-filter report cache
//! - **fetch**: Streaming JSON fetcher with download progress
//! - **sync**: Arena client and the single-flight athlete loader
//! - **storage**: CSV exports and bundle snapshots
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod join;
pub mod models;
pub mod report;
pub mod storage;
pub mod sync;

pub use models::*;

use chrono::NaiveDate;

/// Parse a `YYYY-MM-DD` date, also accepting `YYYY/MM/DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}
