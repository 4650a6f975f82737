use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::metrics::roc::{CutSweepRow, RocFamily};

/// Open (or create) a results database with the `roc_family` table.
pub fn open_results(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS roc_family (
            sample TEXT, position INTEGER, cut REAL, auc REAL,
            sig_eff REAL, back_eff REAL, bib_eff REAL,
            tpr BLOB, fpr BLOB, thresholds BLOB
        );",
    )?;
    Ok(())
}

/// Replace the stored family of `sample` with `family`.
pub fn save_roc_family(conn: &mut Connection, sample: &str, family: &RocFamily) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM roc_family WHERE sample = ?1", params![sample])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO roc_family
                (sample, position, cut, auc, sig_eff, back_eff, bib_eff, tpr, fpr, thresholds)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        )?;
        for (position, row) in family.iter().enumerate() {
            stmt.execute(params![
                sample,
                position as i64,
                row.cut,
                row.auc,
                row.sig_eff,
                row.back_eff,
                row.bib_eff,
                bincode::serialize(&row.tpr)?,
                bincode::serialize(&row.fpr)?,
                bincode::serialize(&row.thresholds)?,
            ])?;
        }
    }
    tx.commit()?;
    tracing::info!(sample, rows = family.len(), "roc family stored");
    Ok(())
}

/// SQLite stores NaN as NULL; read it back as NaN.
fn real(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

/// Load the family stored for `sample`, rows in their original order.
/// Bootstrap bands are not persisted.
pub fn load_roc_family(conn: &Connection, sample: &str) -> Result<RocFamily> {
    let mut stmt = conn.prepare(
        "SELECT cut, auc, sig_eff, back_eff, bib_eff, tpr, fpr, thresholds
         FROM roc_family WHERE sample = ?1 ORDER BY position",
    )?;
    let raw = stmt.query_map(params![sample], |row| {
        Ok((
            real(row, 0)?,
            real(row, 1)?,
            real(row, 2)?,
            real(row, 3)?,
            real(row, 4)?,
            row.get::<_, Vec<u8>>(5)?,
            row.get::<_, Vec<u8>>(6)?,
            row.get::<_, Vec<u8>>(7)?,
        ))
    })?;

    let mut rows = Vec::new();
    for r in raw {
        let (cut, auc, sig_eff, back_eff, bib_eff, tpr, fpr, thresholds) = r?;
        rows.push(CutSweepRow {
            cut,
            tpr: bincode::deserialize(&tpr)?,
            fpr: bincode::deserialize(&fpr)?,
            thresholds: bincode::deserialize(&thresholds)?,
            auc,
            sig_eff,
            back_eff,
            bib_eff,
            auc_band: None,
        });
    }
    Ok(RocFamily { rows })
}

/// Every stored family, keyed by sample.
pub fn load_all(conn: &Connection) -> Result<BTreeMap<String, RocFamily>> {
    let mut stmt = conn.prepare("SELECT DISTINCT sample FROM roc_family")?;
    let samples = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    samples
        .into_iter()
        .map(|s| -> Result<(String, RocFamily)> {
            let fam = load_roc_family(conn, &s)?;
            Ok((s, fam))
        })
        .collect()
}
