#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for syncing public-API datasets to CSV files.
//!
//! Each `sync_*` function runs one source end to end: load the existing
//! dataset, resolve the fetch window, fetch, merge, write atomically, and
//! append a data card entry. Data card failures are warnings; everything
//! else aborts the run with the prior dataset intact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use datamill_source::earthquakes::{self, BoundingBox, EarthquakeQuery};
use datamill_source::holidays::{self, HolidayQuery};
use datamill_source::pageviews::{self, PageviewQuery};
use datamill_source::progress::ProgressCallback;
use datamill_source::{SourceError, http_client};
use datamill_source_models::{
    Access, Agent, Granularity, Holiday, KeyedRecord, PageviewSample, ScopedRecord, SeismicEvent,
};
use datamill_store::{StoreError, data_card, dataset, merge, window};

/// Data card file name, shared by every source writing to an output
/// directory.
pub const DATA_CARD_FILENAME: &str = "data_card.md";

const EARTHQUAKE_FIELDS: &str = "usgs_id, time, updated, mag, place, type, status, tsunami, \
                                 sig, felt, cdi, mmi, alert, lon, lat, depth_km, url, detail, \
                                 title";
const HOLIDAY_FIELDS: &str = "date, local_name, english_name, country_code, is_fixed, \
                              is_global, counties, launch_year, types, year";
const PAGEVIEW_FIELDS: &str = "project, article, granularity, timestamp, access, agent, views";

/// What one sync run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    /// Records returned by the connector.
    pub fetched: usize,
    /// Records newly appended to the dataset.
    pub added: usize,
    /// Existing records overwritten (newer revision) or discarded
    /// (replaced partition).
    pub replaced: usize,
    /// Dataset size after the run.
    pub total: usize,
}

/// Parameters for an earthquake sync run.
#[derive(Debug, Clone)]
pub struct EarthquakeRun {
    /// Explicit window start; defaults to the dataset's latest `updated`.
    pub start: Option<DateTime<Utc>>,
    /// Explicit window end; defaults to now.
    pub end: Option<DateTime<Utc>>,
    /// Minimum magnitude filter.
    pub min_magnitude: Option<f64>,
    /// Geographic bounding box filter.
    pub bounding_box: Option<BoundingBox>,
    /// Maximum total records to fetch.
    pub limit: Option<u64>,
    /// Directory holding the dataset and data card.
    pub out_dir: PathBuf,
    /// Replace the dataset with exactly this fetch instead of merging.
    pub overwrite: bool,
}

/// Parameters for a holiday sync run.
#[derive(Debug, Clone)]
pub struct HolidayRun {
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    /// Calendar years to fetch.
    pub years: Vec<i32>,
    /// Directory holding the dataset and data card.
    pub out_dir: PathBuf,
    /// Replace the dataset with exactly this fetch instead of merging.
    pub overwrite: bool,
}

/// Parameters for a page-view sync run.
#[derive(Debug, Clone)]
pub struct PageviewRun {
    /// Wiki project domain.
    pub project: String,
    /// Article titles.
    pub articles: Vec<String>,
    /// Access method filter.
    pub access: Access,
    /// Agent filter.
    pub agent: Agent,
    /// Bucket granularity.
    pub granularity: Granularity,
    /// Window start, `YYYYMMDD` or `YYYYMMDDHH`.
    pub start: String,
    /// Window end, `YYYYMMDD` or `YYYYMMDDHH`.
    pub end: String,
    /// Directory holding the dataset and data card.
    pub out_dir: PathBuf,
    /// Replace the dataset with exactly this fetch instead of merging.
    pub overwrite: bool,
}

/// Fetches, merges, and records earthquakes for the run's window.
///
/// # Errors
///
/// Returns an error if the existing dataset is unreadable, the fetch
/// fails after retries, or the merged dataset cannot be written.
#[allow(clippy::future_not_send)]
pub async fn sync_earthquakes(
    run: &EarthquakeRun,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<SyncSummary, Box<dyn std::error::Error>> {
    let started = Instant::now();
    std::fs::create_dir_all(&run.out_dir)?;
    let dataset_path = run.out_dir.join("earthquakes.csv");
    let card_path = run.out_dir.join(DATA_CARD_FILENAME);

    let existing: Vec<SeismicEvent> = if run.overwrite {
        log::info!("Earthquakes: full fetch (--overwrite)");
        Vec::new()
    } else {
        dataset::load_records(&dataset_path)?
    };

    let resume_point = window::latest_updated(&existing);
    let fetch_window = window::resolve_window(run.start, run.end, resume_point, Utc::now());
    if run.start.is_none() && resume_point.is_some() {
        log::info!(
            "Earthquakes: incremental fetch from last update {}",
            fetch_window.start.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let client = http_client()?;
    let query = EarthquakeQuery {
        window: fetch_window,
        min_magnitude: run.min_magnitude,
        bounding_box: run.bounding_box,
        limit: run.limit,
    };
    let fetched = earthquakes::fetch_earthquakes(&client, &query, progress).await?;

    let summary = commit_keyed(&dataset_path, existing, fetched)?;

    record_card(
        &card_path,
        "USGS Earthquakes",
        &[
            ("Run", Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("Source", "USGS Earthquake Catalog (FDSN API)".to_string()),
            ("Window", fetch_window.to_string()),
            ("Records fetched", summary.fetched.to_string()),
            ("Records added", summary.added.to_string()),
            ("Total records", summary.total.to_string()),
            ("Fields", EARTHQUAKE_FIELDS.to_string()),
        ],
    );

    log::info!(
        "Earthquake sync complete: +{} ({} total) in {:.1}s",
        summary.added,
        summary.total,
        started.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Fetches, merges, and records holidays for the run's country and years.
///
/// # Errors
///
/// Returns an error if the existing dataset is unreadable, the fetch
/// fails after retries, or the merged dataset cannot be written.
#[allow(clippy::future_not_send)]
pub async fn sync_holidays(
    run: &HolidayRun,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<SyncSummary, Box<dyn std::error::Error>> {
    let started = Instant::now();
    std::fs::create_dir_all(&run.out_dir)?;
    let country = run.country.to_uppercase();
    let dataset_path = run
        .out_dir
        .join(format!("public_holidays_{country}.csv"));
    let card_path = run.out_dir.join(DATA_CARD_FILENAME);

    let existing: Vec<Holiday> = if run.overwrite {
        log::info!("Holidays: full fetch (--overwrite)");
        Vec::new()
    } else {
        dataset::load_records(&dataset_path)?
    };

    let client = http_client()?;
    let query = HolidayQuery {
        country: country.clone(),
        years: run.years.clone(),
    };
    let fetched = holidays::fetch_holidays(&client, &query, progress).await?;

    let summary = commit_scoped(&dataset_path, existing, fetched)?;

    let years_label = match (run.years.iter().min(), run.years.iter().max()) {
        (Some(min), Some(max)) if min != max => format!("{min}\u{2013}{max}"),
        (Some(min), _) => min.to_string(),
        _ => String::new(),
    };
    record_card(
        &card_path,
        &format!("Public Holidays \u{2014} {country}"),
        &[
            ("Run", Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("Source", "Nager.Date Public Holidays API".to_string()),
            ("Country", country.clone()),
            ("Years", years_label),
            ("Records fetched", summary.fetched.to_string()),
            ("Records added", summary.added.to_string()),
            ("Total records", summary.total.to_string()),
            ("Fields", HOLIDAY_FIELDS.to_string()),
        ],
    );

    log::info!(
        "Holiday sync complete for {country}: +{} ({} total) in {:.1}s",
        summary.added,
        summary.total,
        started.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Fetches, merges, and records page views for the run's articles.
///
/// # Errors
///
/// Returns an error if the existing dataset is unreadable, the fetch
/// fails after retries, or the merged dataset cannot be written.
#[allow(clippy::future_not_send)]
pub async fn sync_pageviews(
    run: &PageviewRun,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<SyncSummary, Box<dyn std::error::Error>> {
    let started = Instant::now();
    std::fs::create_dir_all(&run.out_dir)?;
    let dataset_path = run
        .out_dir
        .join(format!("pageviews_{}.csv", run.project.replace('.', "_")));
    let card_path = run.out_dir.join(DATA_CARD_FILENAME);

    let existing: Vec<PageviewSample> = if run.overwrite {
        log::info!("Pageviews: full fetch (--overwrite)");
        Vec::new()
    } else {
        dataset::load_records(&dataset_path)?
    };

    let client = http_client()?;
    let query = PageviewQuery {
        project: run.project.clone(),
        articles: run.articles.clone(),
        access: run.access,
        agent: run.agent,
        granularity: run.granularity,
        start: run.start.clone(),
        end: run.end.clone(),
    };
    let fetched = pageviews::fetch_pageviews(&client, &query, progress).await?;

    let summary = commit_scoped(&dataset_path, existing, fetched)?;

    record_card(
        &card_path,
        &format!("Wikimedia Pageviews \u{2014} {}", run.project),
        &[
            ("Run", Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("Source", "Wikimedia REST pageviews API".to_string()),
            ("Window", format!("{} \u{2192} {}", run.start, run.end)),
            ("Articles", run.articles.len().to_string()),
            ("Records fetched", summary.fetched.to_string()),
            ("Records added", summary.added.to_string()),
            ("Total records", summary.total.to_string()),
            ("Fields", PAGEVIEW_FIELDS.to_string()),
        ],
    );

    log::info!(
        "Pageview sync complete for {}: +{} ({} total) in {:.1}s",
        run.project,
        summary.added,
        summary.total,
        started.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Merges key-deduplicated records into the dataset and writes it back.
///
/// An empty fetch is a no-op: the dataset file is left untouched (the
/// caller still records a count-0 data card entry).
///
/// # Errors
///
/// Returns [`StoreError`] if the merged dataset cannot be written.
pub fn commit_keyed<T: KeyedRecord>(
    dataset_path: &Path,
    existing: Vec<T>,
    fetched: Vec<T>,
) -> Result<SyncSummary, StoreError> {
    let fetched_count = fetched.len();
    if fetched_count == 0 {
        return Ok(SyncSummary {
            fetched: 0,
            added: 0,
            replaced: 0,
            total: existing.len(),
        });
    }

    let outcome = merge::merge_dedup(existing, fetched);
    dataset::write_records(dataset_path, &outcome.records)?;
    Ok(SyncSummary {
        fetched: fetched_count,
        added: outcome.added,
        replaced: outcome.replaced,
        total: outcome.records.len(),
    })
}

/// Merges scope-replaced records into the dataset and writes it back.
///
/// An empty fetch is a no-op, as in [`commit_keyed`].
///
/// # Errors
///
/// Returns [`StoreError`] if the merged dataset cannot be written.
pub fn commit_scoped<T: ScopedRecord>(
    dataset_path: &Path,
    existing: Vec<T>,
    fetched: Vec<T>,
) -> Result<SyncSummary, StoreError> {
    let fetched_count = fetched.len();
    if fetched_count == 0 {
        return Ok(SyncSummary {
            fetched: 0,
            added: 0,
            replaced: 0,
            total: existing.len(),
        });
    }

    let outcome = merge::merge_scope_replace(existing, fetched);
    dataset::write_records(dataset_path, &outcome.records)?;
    Ok(SyncSummary {
        fetched: fetched_count,
        added: outcome.added,
        replaced: outcome.replaced,
        total: outcome.records.len(),
    })
}

/// Appends a data card section, downgrading failure to a warning: the
/// card is best-effort and never rolls back a completed dataset write.
pub fn record_card(card_path: &Path, title: &str, lines: &[(&str, String)]) {
    if let Err(e) = data_card::append_section(card_path, title, lines) {
        log::warn!("Failed to update data card {}: {e}", card_path.display());
    }
}

/// Parses a CLI time argument: `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`, or
/// full RFC 3339.
///
/// # Errors
///
/// Returns [`SourceError::InvalidQuery`] for anything else.
pub fn parse_time_arg(value: &str) -> Result<DateTime<Utc>, SourceError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(SourceError::InvalidQuery {
        message: format!("unrecognized time {value:?}, expected YYYY-MM-DD or RFC 3339"),
    })
}
