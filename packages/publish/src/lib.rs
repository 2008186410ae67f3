#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Publish-ready dataset folder assembly.
//!
//! [`build_package`] is a pure function of its inputs: it writes a
//! `dataset-metadata.json` descriptor and copies the listed files next to
//! it, producing a folder the hosting platform's CLI can push as-is.
//! Re-running with the same inputs overwrites the target folder's
//! contents and produces a byte-identical descriptor. Credentials for the
//! push itself are the external CLI's concern, not this crate's.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the metadata descriptor the hosting platform expects.
pub const METADATA_FILENAME: &str = "dataset-metadata.json";

/// Errors that can occur while assembling a package.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// I/O error (directory creation, file copy).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata descriptor serialization failed.
    #[error("metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A listed input file does not exist.
    #[error("file not found: {}", path.display())]
    MissingFile {
        /// The missing input path.
        path: PathBuf,
    },
}

/// What to package: title, owner/slug identity, license, and the files to
/// ship.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Dataset title shown on the hosting platform.
    pub title: String,
    /// Owner account slug.
    pub owner: String,
    /// Dataset slug (lowercase-dash).
    pub slug: String,
    /// Files to copy into the package, in descriptor order.
    pub files: Vec<PathBuf>,
    /// Optional markdown description, shipped as `README.md`.
    pub description: Option<PathBuf>,
    /// License short name (e.g. `"CC0-1.0"`).
    pub license_name: String,
}

/// The `dataset-metadata.json` descriptor shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Dataset title.
    pub title: String,
    /// `owner/slug` identifier.
    pub id: String,
    /// Licenses, by short name.
    pub licenses: Vec<LicenseRef>,
    /// One entry per shipped file.
    pub resources: Vec<ResourceEntry>,
}

/// A license reference in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRef {
    /// License short name.
    pub name: String,
}

/// A shipped file in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// File name relative to the package folder.
    pub path: String,
    /// Human-readable description inferred from the file type.
    pub description: String,
}

/// Assembles the package folder: descriptor plus file copies.
///
/// Returns the package directory path.
///
/// # Errors
///
/// Returns [`PublishError::MissingFile`] if any listed file (or the
/// description file) does not exist, before anything is written.
pub fn build_package(spec: &PackageSpec, out_dir: &Path) -> Result<PathBuf, PublishError> {
    for file in &spec.files {
        if !file.exists() {
            return Err(PublishError::MissingFile { path: file.clone() });
        }
    }
    if let Some(description) = &spec.description {
        if !description.exists() {
            return Err(PublishError::MissingFile {
                path: description.clone(),
            });
        }
    }

    fs::create_dir_all(out_dir)?;

    let metadata = build_metadata(spec);
    let descriptor = serde_json::to_string_pretty(&metadata)?;
    fs::write(out_dir.join(METADATA_FILENAME), descriptor)?;

    for file in &spec.files {
        let name = file
            .file_name()
            .ok_or_else(|| PublishError::MissingFile { path: file.clone() })?;
        fs::copy(file, out_dir.join(name))?;
    }

    if let Some(description) = &spec.description {
        fs::copy(description, out_dir.join("README.md"))?;
    }

    log::info!(
        "Package prepared at {} ({} file(s))",
        out_dir.display(),
        spec.files.len()
    );
    Ok(out_dir.to_path_buf())
}

/// Builds the descriptor for a spec without touching the filesystem.
#[must_use]
pub fn build_metadata(spec: &PackageSpec) -> DatasetMetadata {
    DatasetMetadata {
        title: spec.title.clone(),
        id: format!("{}/{}", spec.owner, spec.slug),
        licenses: vec![LicenseRef {
            name: spec.license_name.clone(),
        }],
        resources: spec
            .files
            .iter()
            .map(|file| ResourceEntry {
                path: file
                    .file_name()
                    .map_or_else(|| file.display().to_string(), |n| {
                        n.to_string_lossy().into_owned()
                    }),
                description: describe_file(file),
            })
            .collect(),
    }
}

/// Infers a resource description from the file extension.
fn describe_file(path: &Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => "CSV data file".to_string(),
        Some("json") => "JSON data file".to_string(),
        Some("md") => "Markdown document".to_string(),
        Some("parquet") => "Parquet data file".to_string(),
        _ => "Data file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn spec_with(files: Vec<PathBuf>, description: Option<PathBuf>) -> PackageSpec {
        PackageSpec {
            title: "Earthquakes 2024 (USGS)".to_string(),
            owner: "quakefan".to_string(),
            slug: "earthquakes-2024".to_string(),
            files,
            description,
            license_name: "CC0-1.0".to_string(),
        }
    }

    #[test]
    fn descriptor_is_deterministic() {
        let dir = fixture_dir("datamill_publish_determinism");
        let csv = dir.join("earthquakes.csv");
        fs::write(&csv, "usgs_id,mag\nus1,4.4\n").unwrap();

        let spec = spec_with(vec![csv], None);
        let out_a = dir.join("pkg_a");
        let out_b = dir.join("pkg_b");
        build_package(&spec, &out_a).unwrap();
        build_package(&spec, &out_b).unwrap();

        let a = fs::read(out_a.join(METADATA_FILENAME)).unwrap();
        let b = fs::read(out_b.join(METADATA_FILENAME)).unwrap();
        assert_eq!(a, b);

        // And across a repeated run into the same folder.
        build_package(&spec, &out_a).unwrap();
        assert_eq!(fs::read(out_a.join(METADATA_FILENAME)).unwrap(), a);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn copies_files_and_renames_description() {
        let dir = fixture_dir("datamill_publish_copy");
        let csv = dir.join("holidays.csv");
        let card = dir.join("data_card.md");
        fs::write(&csv, "date,year\n2024-07-14,2024\n").unwrap();
        fs::write(&card, "# Data Card\n").unwrap();

        let out = dir.join("pkg");
        let spec = spec_with(vec![csv], Some(card));
        build_package(&spec, &out).unwrap();

        assert!(out.join("holidays.csv").exists());
        assert!(out.join("README.md").exists());
        assert!(out.join(METADATA_FILENAME).exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_fails_before_writing() {
        let dir = fixture_dir("datamill_publish_missing");
        let out = dir.join("pkg");

        let spec = spec_with(vec![dir.join("nope.csv")], None);
        let result = build_package(&spec, &out);

        assert!(matches!(result, Err(PublishError::MissingFile { .. })));
        assert!(!out.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn metadata_identity_and_resource_inference() {
        let spec = spec_with(
            vec![PathBuf::from("data/earthquakes.csv"), PathBuf::from("notes.md")],
            None,
        );
        let metadata = build_metadata(&spec);

        assert_eq!(metadata.id, "quakefan/earthquakes-2024");
        assert_eq!(metadata.licenses[0].name, "CC0-1.0");
        assert_eq!(metadata.resources[0].path, "earthquakes.csv");
        assert_eq!(metadata.resources[0].description, "CSV data file");
        assert_eq!(metadata.resources[1].description, "Markdown document");
    }
}
