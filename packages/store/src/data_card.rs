//! Append-only data card: a human-readable provenance log.
//!
//! One markdown section per run, appended to a shared file. Prior
//! entries are never reformatted or removed. Callers treat write
//! failures as warnings, not run failures.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use crate::StoreError;

/// Appends one `## <title>` section to the data card at `path`.
///
/// The `# Data Card` header is written once, when the file is first
/// created. `lines` are rendered as `**Label:** value`, one per line.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be opened or appended.
pub fn append_section(
    path: &Path,
    title: &str,
    lines: &[(&str, String)],
) -> Result<(), StoreError> {
    let needs_header = !path.exists();

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    if needs_header {
        writeln!(file, "# Data Card")?;
    }

    writeln!(file, "\n## {title}\n")?;
    for (label, value) in lines {
        writeln!(file, "**{label}:** {value}  ")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn appends_sections_without_touching_prior_entries() {
        let dir = std::env::temp_dir().join("datamill_data_card_append");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data_card.md");

        append_section(
            &path,
            "USGS Earthquakes",
            &[
                ("Source", "USGS Earthquake Catalog (FDSN API)".to_string()),
                ("Window", "2024-01-01 \u{2192} 2024-02-01".to_string()),
                ("Records added", "120".to_string()),
            ],
        )
        .unwrap();

        let first = fs::read_to_string(&path).unwrap();

        append_section(
            &path,
            "Public Holidays \u{2014} FR",
            &[
                ("Source", "Nager.Date Public Holidays API".to_string()),
                ("Years", "2024\u{2013}2025".to_string()),
                ("Records added", "0".to_string()),
            ],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();

        // The first entry is preserved byte-for-byte.
        assert!(content.starts_with(&first));

        assert_eq!(content.matches("# Data Card").count(), 1);
        assert!(content.contains("## USGS Earthquakes"));
        assert!(content.contains("**Records added:** 120"));
        assert!(content.contains("## Public Holidays \u{2014} FR"));
        assert!(content.contains("**Records added:** 0"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn header_written_only_on_creation() {
        let dir = std::env::temp_dir().join("datamill_data_card_header");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data_card.md");

        append_section(&path, "A", &[("Records added", "1".to_string())]).unwrap();
        append_section(&path, "B", &[("Records added", "2".to_string())]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Data Card\n"));
        assert_eq!(content.matches("# Data Card").count(), 1);

        let _ = fs::remove_dir_all(&dir);
    }
}
