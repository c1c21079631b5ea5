//! JSON export of the canonical record set

use crate::error::AggResult;
use crate::types::{CanonicalRecord, ExportedBusiness};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write `records` as a pretty-printed JSON array; returns the record count
///
/// Non-ASCII text (e.g. "Café") is written as UTF-8, not escaped.
pub fn export_json(records: &[CanonicalRecord], path: &Path) -> AggResult<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let exported: Vec<ExportedBusiness> = records.iter().map(CanonicalRecord::to_exported).collect();

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &exported)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!(count = exported.len(), path = %path.display(), "Exported businesses to JSON");
    Ok(exported.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NormalizedRecord, SourceTag};
    use tempfile::TempDir;

    #[test]
    fn test_export_writes_unescaped_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("businesses.json");
        let records = vec![CanonicalRecord::new(
            NormalizedRecord::new("Acme Café", "1 High Street"),
            SourceTag::new("osm_1"),
        )];

        let count = export_json(&records, &path).unwrap();
        assert_eq!(count, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Acme Café"));
        assert!(text.contains("\"latitude\": null"));
        assert!(text.contains("\"source_urls\": [\n      \"osm_1\"\n    ]"));
    }

    #[test]
    fn test_export_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("businesses.json");

        assert_eq!(export_json(&[], &path).unwrap(), 0);
        let parsed: Vec<ExportedBusiness> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(parsed.is_empty());
    }
}
