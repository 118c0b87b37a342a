//! Export of report rows as CSV, or pretty JSON when the target ends in `.json`.

use std::{fs::File, io::Write, path::Path};

use serde::Serialize;
use tracing::info;

use crate::errors::EstateError;

/// Writes `rows` as CSV with a header derived from the row's field names.
/// Returns the number of data rows written.
pub fn write_csv<T, W>(rows: &[T], writer: W) -> Result<usize, EstateError>
where
    T: Serialize,
    W: Write,
{
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(rows.len())
}

pub fn write_json<T, W>(rows: &[T], writer: W) -> Result<usize, EstateError>
where
    T: Serialize,
    W: Write,
{
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(rows.len())
}

pub fn export_to_path<T: Serialize>(rows: &[T], path: &Path) -> Result<usize, EstateError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let count = if json { write_json(rows, file)? } else { write_csv(rows, file)? };
    info!(path = %path.display(), rows = count, json, "exported report");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        unit: &'static str,
        rent: f64,
    }

    #[test]
    fn header_comes_from_field_names() {
        let mut buffer = Vec::new();
        let rows = [Row { unit: "A-01", rent: 1500.0 }, Row { unit: "A-02", rent: 980.5 }];
        let count = write_csv(&rows, &mut buffer).expect("write");
        assert_eq!(count, 2);
        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(text, "unit,rent\nA-01,1500.0\nA-02,980.5\n");
    }

    #[test]
    fn json_extension_selects_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("rows.JSON");
        let count = export_to_path(&[Row { unit: "B-07", rent: 720.0 }], &path).expect("export");
        assert_eq!(count, 1);
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value[0]["unit"], "B-07");
    }
}
