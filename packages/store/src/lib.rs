#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! On-disk dataset store for datamill.
//!
//! A dataset is one CSV file (header row = column names) exclusively
//! owned by its source's pipeline run. This crate loads existing records,
//! reconciles them with freshly fetched ones ([`merge`]), writes the
//! union back atomically ([`dataset`]), resolves incremental fetch
//! windows ([`window`]), and appends run summaries to the data card
//! ([`data_card`]).

use std::path::PathBuf;

pub mod data_card;
pub mod dataset;
pub mod merge;
pub mod window;

/// Errors that can occur while reading or writing datasets.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding error while writing.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An existing dataset file could not be read back. The pipeline
    /// refuses to overwrite it.
    #[error("corrupt dataset {}: {message}", path.display())]
    CorruptDataset {
        /// The unreadable dataset file.
        path: PathBuf,
        /// What failed while reading it.
        message: String,
    },
}
