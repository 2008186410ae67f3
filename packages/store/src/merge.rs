//! Reconciling freshly fetched records with the existing dataset.
//!
//! Two strategies, chosen per source:
//!
//! - [`merge_dedup`] for sources with a stable per-record identifier:
//!   existing records win unless the incoming one is demonstrably newer.
//! - [`merge_scope_replace`] for sources republished a partition at a
//!   time: each partition present in the fetch replaces its stored
//!   partition wholesale; other partitions are untouched.
//!
//! Both return the unified collection stably sorted by primary time for
//! readable diffs.

use std::collections::{BTreeSet, HashMap};

use datamill_source_models::{KeyedRecord, ScopedRecord, TabularRecord};

/// Result of a merge: the unified records plus what changed.
#[derive(Debug)]
pub struct MergeOutcome<T> {
    /// The unified, sorted dataset to write back.
    pub records: Vec<T>,
    /// Records appended that were not present before.
    pub added: usize,
    /// For [`merge_dedup`]: existing records overwritten by a newer
    /// revision. For [`merge_scope_replace`]: existing records discarded
    /// with their replaced partition.
    pub replaced: usize,
}

/// Merges by dedup key.
///
/// A fetched record whose key is absent is appended. On a key conflict
/// the fetched record wins only when both sides carry an `updated`
/// timestamp and the fetched one is strictly newer; otherwise the stored
/// record is kept (first-write-wins covers the ambiguous cases).
#[must_use]
pub fn merge_dedup<T: KeyedRecord>(existing: Vec<T>, fetched: Vec<T>) -> MergeOutcome<T> {
    let mut index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, r)| (r.dedup_key().to_string(), i))
        .collect();

    let mut records = existing;
    let mut added = 0;
    let mut replaced = 0;

    for record in fetched {
        let slot = index.get(record.dedup_key()).copied();
        match slot {
            Some(i) => {
                if let (Some(incoming), Some(stored)) =
                    (record.updated_at(), records[i].updated_at())
                {
                    if incoming > stored {
                        records[i] = record;
                        replaced += 1;
                    }
                }
            }
            None => {
                index.insert(record.dedup_key().to_string(), records.len());
                records.push(record);
                added += 1;
            }
        }
    }

    sort_by_primary_time(&mut records);
    MergeOutcome {
        records,
        added,
        replaced,
    }
}

/// Merges by replacing whole partitions.
///
/// Every scope that occurs in `fetched` has its existing records
/// discarded and the fetched ones inserted; scopes absent from the fetch
/// keep their records.
#[must_use]
pub fn merge_scope_replace<T: ScopedRecord>(existing: Vec<T>, fetched: Vec<T>) -> MergeOutcome<T> {
    let incoming_scopes: BTreeSet<T::Scope> = fetched.iter().map(ScopedRecord::scope).collect();

    let before = existing.len();
    let mut records: Vec<T> = existing
        .into_iter()
        .filter(|r| !incoming_scopes.contains(&r.scope()))
        .collect();
    let replaced = before - records.len();

    let added = fetched.len();
    records.extend(fetched);

    sort_by_primary_time(&mut records);
    MergeOutcome {
        records,
        added,
        replaced,
    }
}

/// Stable sort by the primary time field; undated records sort first and
/// keep their relative order.
fn sort_by_primary_time<T: TabularRecord>(records: &mut [T]) {
    records.sort_by_key(TabularRecord::primary_time);
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};
    use datamill_source_models::{Holiday, SeismicEvent};

    use super::*;

    fn event(id: &str, time: &str, updated: Option<&str>) -> SeismicEvent {
        SeismicEvent {
            usgs_id: id.to_string(),
            time: Some(time.parse::<DateTime<Utc>>().unwrap()),
            updated: updated.map(|u| u.parse().unwrap()),
            mag: Some(4.0),
            place: None,
            event_type: None,
            status: None,
            tsunami: None,
            sig: None,
            felt: None,
            cdi: None,
            mmi: None,
            alert: None,
            lon: None,
            lat: None,
            depth_km: None,
            url: None,
            detail: None,
            title: None,
        }
    }

    fn holiday(country: &str, year: i32, month: u32, day: u32, name: &str) -> Holiday {
        Holiday {
            date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            local_name: Some(name.to_string()),
            english_name: Some(name.to_string()),
            country_code: country.to_string(),
            is_fixed: true,
            is_global: true,
            counties: None,
            launch_year: None,
            types: Some("Public".to_string()),
            year,
        }
    }

    fn ids(records: &[SeismicEvent]) -> Vec<&str> {
        records.iter().map(|r| r.usgs_id.as_str()).collect()
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![
            event("us1", "2024-01-01T00:00:00Z", None),
            event("us2", "2024-01-02T00:00:00Z", None),
        ];

        let first = merge_dedup(Vec::new(), batch.clone());
        assert_eq!(first.added, 2);

        let second = merge_dedup(first.records, batch);
        assert_eq!(second.added, 0);
        assert_eq!(second.replaced, 0);
        assert_eq!(second.records.len(), 2);
    }

    #[test]
    fn newer_revision_replaces_stored_record() {
        let stored = vec![event("us1", "2024-01-01T00:00:00Z", Some("2024-01-01T06:00:00Z"))];
        let mut fresh = event("us1", "2024-01-01T00:00:00Z", Some("2024-01-03T00:00:00Z"));
        fresh.mag = Some(4.6);

        let outcome = merge_dedup(stored, vec![fresh]);
        assert_eq!(outcome.replaced, 1);
        assert_eq!(outcome.records[0].mag, Some(4.6));
    }

    #[test]
    fn stale_or_undated_revision_keeps_stored_record() {
        let stored = vec![event("us1", "2024-01-01T00:00:00Z", Some("2024-01-02T00:00:00Z"))];

        // Older revision loses.
        let mut older = event("us1", "2024-01-01T00:00:00Z", Some("2024-01-01T12:00:00Z"));
        older.mag = Some(9.9);
        let outcome = merge_dedup(stored, vec![older]);
        assert_eq!(outcome.replaced, 0);
        assert_eq!(outcome.records[0].mag, Some(4.0));

        // No timestamps on either side: first write wins.
        let stored = vec![event("us1", "2024-01-01T00:00:00Z", None)];
        let mut undated = event("us1", "2024-01-01T00:00:00Z", None);
        undated.mag = Some(9.9);
        let outcome = merge_dedup(stored, vec![undated]);
        assert_eq!(outcome.replaced, 0);
        assert_eq!(outcome.records[0].mag, Some(4.0));
    }

    #[test]
    fn merge_never_loses_existing_records() {
        let stored = vec![
            event("us1", "2024-01-01T00:00:00Z", None),
            event("us2", "2024-01-02T00:00:00Z", None),
        ];
        let outcome = merge_dedup(stored, vec![event("us3", "2024-01-03T00:00:00Z", None)]);
        assert_eq!(outcome.records.len(), 3);
    }

    #[test]
    fn merged_records_are_time_sorted() {
        let stored = vec![event("us2", "2024-01-05T00:00:00Z", None)];
        let outcome = merge_dedup(
            stored,
            vec![
                event("us3", "2024-01-09T00:00:00Z", None),
                event("us1", "2024-01-01T00:00:00Z", None),
            ],
        );
        assert_eq!(ids(&outcome.records), vec!["us1", "us2", "us3"]);
    }

    #[test]
    fn scope_replace_leaves_other_years_unchanged() {
        // FR 2024, then FR 2025, then a re-fetch of FR 2024.
        let first = merge_scope_replace(Vec::new(), vec![holiday("FR", 2024, 7, 14, "Bastille")]);
        let second = merge_scope_replace(
            first.records,
            vec![holiday("FR", 2025, 7, 14, "Bastille")],
        );
        assert_eq!(second.records.len(), 2);

        let refetched = vec![
            holiday("FR", 2024, 7, 14, "Bastille"),
            holiday("FR", 2024, 12, 25, "Christmas"),
        ];
        let third = merge_scope_replace(second.records, refetched);

        assert_eq!(third.replaced, 1);
        assert_eq!(third.records.len(), 3);
        assert_eq!(
            third
                .records
                .iter()
                .filter(|h| h.year == 2025)
                .count(),
            1
        );
        assert_eq!(
            third
                .records
                .iter()
                .filter(|h| h.year == 2024)
                .count(),
            2
        );
    }

    #[test]
    fn scope_replace_does_not_duplicate_refetched_partition() {
        let first = merge_scope_replace(Vec::new(), vec![holiday("FR", 2024, 7, 14, "Bastille")]);
        let again = merge_scope_replace(
            first.records,
            vec![holiday("FR", 2024, 7, 14, "Bastille")],
        );
        assert_eq!(again.records.len(), 1);
        assert_eq!(again.replaced, 1);
        assert_eq!(again.added, 1);
    }

    #[test]
    fn scope_replace_can_shrink_a_partition() {
        let stored = vec![
            holiday("FR", 2024, 7, 14, "Bastille"),
            holiday("FR", 2024, 12, 25, "Christmas"),
        ];
        let outcome = merge_scope_replace(stored, vec![holiday("FR", 2024, 7, 14, "Bastille")]);
        assert_eq!(outcome.records.len(), 1);
    }
}
