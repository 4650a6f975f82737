use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::columnar::ColumnarTable;
use crate::error::{Error, Result};

#[derive(Deserialize)]
struct JsonTable {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

/// Load a `{"columns": [...], "data": [[...], ...]}` table.
pub fn load_json_table(path: &Path) -> Result<ColumnarTable> {
    let file = File::open(path)?;
    let table: JsonTable = serde_json::from_reader(file)?;

    let n_rows = table.data.len();
    let mut data: HashMap<String, Vec<f64>> = table
        .columns
        .iter()
        .map(|c| (c.trim().to_string(), Vec::with_capacity(n_rows)))
        .collect();

    for row in &table.data {
        for (idx, col) in table.columns.iter().enumerate() {
            let val = row.get(idx).copied().unwrap_or(f64::NAN);
            if let Some(values) = data.get_mut(col.trim()) {
                values.push(val);
            }
        }
    }

    Ok(ColumnarTable::new(n_rows, data, path.display().to_string()))
}

/// Load a CSV file with a header row. Header names are trimmed, so the
/// training-job dumps (`" HSSWeight"`) resolve to plain column names.
/// Non-numeric cells become NaN.
pub fn load_csv_table(path: &Path) -> Result<ColumnarTable> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_path(path)?;

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for result in rdr.records() {
        let record = result?;
        for (j, values) in columns.iter_mut().enumerate() {
            let val = record.get(j).and_then(|s| s.parse::<f64>().ok()).unwrap_or(f64::NAN);
            values.push(val);
        }
    }

    let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
    let data = headers.into_iter().zip(columns).collect();
    Ok(ColumnarTable::new(n_rows, data, path.display().to_string()))
}

/// Load by extension: `.json` or `.csv`.
pub fn load_table(path: &Path) -> Result<ColumnarTable> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json_table(path),
        Some("csv") => load_csv_table(path),
        _ => Err(Error::InvalidArgument(format!(
            "unsupported sample file type: {}",
            path.display()
        ))),
    }
}

/// Candidate file names for a sample, in lookup order.
fn sample_candidates(dir: &Path, name: &str) -> [PathBuf; 3] {
    [
        dir.join(format!("all-{name}.csv")),
        dir.join(format!("{name}.csv")),
        dir.join(format!("{name}.json")),
    ]
}

/// Locate and load one sample. `Ok(None)` when no file exists for it.
pub fn load_sample(dir: &Path, name: &str) -> Result<Option<ColumnarTable>> {
    match sample_candidates(dir, name).into_iter().find(|p| p.exists()) {
        Some(path) => {
            let table = load_table(&path)?;
            tracing::info!(sample = name, rows = table.len(), path = %path.display(), "loaded sample");
            Ok(Some(table))
        }
        None => Ok(None),
    }
}

/// Load every sample in `names`; samples with no file on disk are skipped
/// with a warning and the rest are still returned.
pub fn load_samples_from_list(dir: &Path, names: &[String]) -> Result<BTreeMap<String, ColumnarTable>> {
    let mut out = BTreeMap::new();
    for name in names {
        match load_sample(dir, name)? {
            Some(table) => {
                out.insert(name.clone(), table);
            }
            None => tracing::warn!(sample = %name, dir = %dir.display(), "no file found for sample, skipping"),
        }
    }
    Ok(out)
}

/// Load and concatenate several samples into one table (e.g. all BIB runs).
/// Missing samples are skipped; `Ok(None)` when none were found.
pub fn load_merged(dir: &Path, names: &[String]) -> Result<Option<ColumnarTable>> {
    let mut loaded = load_samples_from_list(dir, names)?;
    let mut merged: Option<ColumnarTable> = None;
    for table in names.iter().filter_map(|n| loaded.remove(n)) {
        match merged.as_mut() {
            Some(m) => m.append(table)?,
            None => merged = Some(table),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn json_table_columns_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jz.json");
        std::fs::write(&path, r#"{"columns": ["EventNumber", " Weight"], "data": [[1, 0.5], [2, 1.5]]}"#).unwrap();

        let t = load_table(&path).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.column_f64("Weight").unwrap(), &[0.5, 1.5]);
    }

    #[test]
    fn csv_headers_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all-data15.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "EventNumber, HSSWeight, BIBWeight").unwrap();
        writeln!(f, "10, 0.25, 0.75").unwrap();
        writeln!(f, "11, 0.5, x").unwrap();
        drop(f);

        let t = load_csv_table(&path).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.column_f64("HSSWeight").unwrap(), &[0.25, 0.5]);
        assert!(t.column_f64("BIBWeight").unwrap()[1].is_nan());
    }

    #[test]
    fn missing_samples_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("all-jz.csv"), "EventNumber\n1\n2\n").unwrap();

        let names = vec!["jz".to_string(), "data16".to_string()];
        let loaded = load_samples_from_list(dir.path(), &names).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("jz"));
    }

    #[test]
    fn merged_samples_concatenate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("all-data15.csv"), "EventNumber\n1\n2\n").unwrap();
        std::fs::write(dir.path().join("all-data16.csv"), "EventNumber\n3\n").unwrap();

        let names = vec!["data15".to_string(), "data16".to_string(), "data17".to_string()];
        let merged = load_merged(dir.path(), &names).unwrap().unwrap();
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn merge_follows_configured_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("all-data15.csv"), "EventNumber\n1\n2\n").unwrap();
        std::fs::write(dir.path().join("all-data16.csv"), "EventNumber\n3\n").unwrap();

        let names = vec!["data16".to_string(), "data15".to_string()];
        let merged = load_merged(dir.path(), &names).unwrap().unwrap();
        assert_eq!(merged.column_f64("EventNumber").unwrap(), &[3.0, 1.0, 2.0]);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let res = load_table(Path::new("sample.p"));
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }
}
