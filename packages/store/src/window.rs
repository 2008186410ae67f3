//! Incremental fetch-window resolution.
//!
//! The resumable-window behavior is an explicit input here rather than a
//! side-channel read of the output file: the caller loads the dataset,
//! extracts its latest `updated` timestamp, and passes it in.

use chrono::{DateTime, Duration, Utc};
use datamill_source_models::{FetchWindow, KeyedRecord};

/// How far back a fetch reaches when the dataset is empty and no start
/// was given.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// Resolves the half-open fetch window for an incremental run.
///
/// Precedence for the start bound: an explicit `--start`, then the
/// dataset's latest `updated` timestamp, then
/// [`DEFAULT_LOOKBACK_DAYS`] before the end bound. The end bound is an
/// explicit `--end` or `now`.
#[must_use]
pub fn resolve_window(
    explicit_start: Option<DateTime<Utc>>,
    explicit_end: Option<DateTime<Utc>>,
    latest_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> FetchWindow {
    let end = explicit_end.unwrap_or(now);
    let start = explicit_start
        .or(latest_updated)
        .unwrap_or_else(|| end - Duration::days(DEFAULT_LOOKBACK_DAYS));
    FetchWindow { start, end }
}

/// The latest `updated` timestamp present in the dataset, if any.
#[must_use]
pub fn latest_updated<T: KeyedRecord>(records: &[T]) -> Option<DateTime<Utc>> {
    records.iter().filter_map(KeyedRecord::updated_at).max()
}
