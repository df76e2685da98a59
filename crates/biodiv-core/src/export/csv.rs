//! Spreadsheet export as CSV

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{BiodivError, Result};
use crate::export::cell_text;
use crate::models::ResultSet;

/// Write `result` to a CSV file, header row first. Returns the row count.
pub fn write_csv(result: &ResultSet, path: &Path) -> Result<usize> {
    let file = File::create(path)?;
    let rows = write_csv_to(result, file)?;
    tracing::info!("Exported {} row(s) to {}", rows, path.display());
    Ok(rows)
}

pub fn write_csv_to<W: Write>(result: &ResultSet, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(&result.columns).map_err(csv_error)?;
    for row in &result.rows {
        wtr.write_record(row.iter().map(cell_text)).map_err(csv_error)?;
    }
    wtr.flush()?;

    Ok(result.rows.len())
}

fn csv_error(e: csv::Error) -> BiodivError {
    BiodivError::Serialization(format!("CSV write failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_and_cells() {
        let mut result = ResultSet::new(vec!["id".into(), "nom_vern".into(), "nb_donnees".into()]);
        result.rows.push(vec![json!(1), json!("Mésange bleue, commune"), json!(12)]);
        result.rows.push(vec![json!(2), json!(null), json!(0)]);

        let mut buffer = Vec::new();
        let rows = write_csv_to(&result, &mut buffer).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "id,nom_vern,nb_donnees\n1,\"Mésange bleue, commune\",12\n2,,0\n"
        );
    }

    #[test]
    fn test_empty_result_writes_header() {
        let result = ResultSet::new(vec!["id".into()]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        assert_eq!(write_csv(&result, &path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id\n");
    }
}
