use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

pub const EVENT_NUMBER: &str = "EventNumber";
pub const WEIGHT: &str = "Weight";
pub const WEIGHT_MC_EVENT: &str = "WeightMCEvent";
pub const WEIGHT_X_SECTION: &str = "WeightXSection";

/// Event class, assigned by sample origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Class {
    Bib = 0,
    Multijet = 1,
    Hss = 2,
}

impl Class {
    pub const ALL: [Class; 3] = [Class::Bib, Class::Multijet, Class::Hss];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Class> {
        Class::ALL.get(i).copied()
    }

    /// Short name used in metric keys.
    pub fn name(self) -> &'static str {
        match self {
            Class::Bib => "BIB",
            Class::Multijet => "MJ",
            Class::Hss => "HSS",
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column layout shared by every record of a table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub features: Vec<String>,
    pub scores: Vec<String>,
}

impl TableSchema {
    pub fn new(features: Vec<String>, scores: Vec<String>) -> Self {
        Self { features, scores }
    }

    pub fn feature_index(&self, name: &str) -> Result<usize> {
        self.features
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| Error::missing_column(name, "feature columns"))
    }

    pub fn score_index(&self, name: &str) -> Result<usize> {
        self.scores
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| Error::missing_column(name, "score columns"))
    }
}

/// One physics event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_number: u64,
    /// training weight
    pub weight: f64,
    pub weight_mc_event: f64,
    pub weight_x_section: f64,
    /// values aligned with `TableSchema::features`
    pub features: Vec<f64>,
    /// values aligned with `TableSchema::scores`
    pub scores: Vec<f64>,
}

impl EventRecord {
    pub fn training_weight(&self) -> f64 {
        self.weight
    }

    /// Weight used for physically normalised yields.
    pub fn evaluation_weight(&self) -> f64 {
        self.weight_mc_event * self.weight_x_section
    }
}

/// Ordered records sharing one class and one schema.
#[derive(Clone, Debug)]
pub struct EventTable {
    pub class: Class,
    pub schema: Arc<TableSchema>,
    pub rows: Vec<EventRecord>,
}

impl EventTable {
    /// Fails with SchemaMismatch when a record's feature or score values do
    /// not line up with `schema`.
    pub fn new(class: Class, schema: Arc<TableSchema>, rows: Vec<EventRecord>) -> Result<Self> {
        for (i, r) in rows.iter().enumerate() {
            let misaligned = misaligned_column(&schema.features, r.features.len(), "feature")
                .or_else(|| misaligned_column(&schema.scores, r.scores.len(), "score"));
            if let Some(column) = misaligned {
                return Err(Error::missing_column(column, format!("row {i} of {class} table")));
            }
        }
        Ok(Self { class, schema, rows })
    }

    /// Rows already checked against `schema` by a parent table.
    fn derived(&self, rows: Vec<EventRecord>) -> EventTable {
        EventTable { class: self.class, schema: Arc::clone(&self.schema), rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sub-table of rows passing `keep`, order preserved.
    pub fn filter<F>(&self, mut keep: F) -> EventTable
    where
        F: FnMut(&EventRecord) -> bool,
    {
        let rows = self.rows.iter().filter(|r| keep(r)).cloned().collect();
        self.derived(rows)
    }

    /// Copy of the table holding at most its first `n` rows; 0 keeps everything.
    pub fn head(&self, n: usize) -> EventTable {
        let rows = if n == 0 {
            self.rows.clone()
        } else {
            self.rows.iter().take(n).cloned().collect()
        };
        self.derived(rows)
    }

    /// Values of one score column, in row order.
    pub fn score_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.schema.score_index(name).map_err(|_| {
            Error::missing_column(name, format!("{} table", self.class))
        })?;
        Ok(self.rows.iter().map(|r| r.scores[idx]).collect())
    }
}

/// Name of the first column a record of `len` values cannot line up with.
fn misaligned_column(columns: &[String], len: usize, kind: &str) -> Option<String> {
    match len.cmp(&columns.len()) {
        std::cmp::Ordering::Less => Some(columns[len].clone()),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(format!("unnamed {kind} #{}", columns.len())),
    }
}

/// The three labelled tables that form one unit of work.
#[derive(Clone, Debug)]
pub struct SampleSet {
    pub bib: EventTable,
    pub multijet: EventTable,
    pub signal: EventTable,
}

impl SampleSet {
    pub fn new(bib: EventTable, multijet: EventTable, signal: EventTable) -> Result<Self> {
        let expected = [(Class::Bib, &bib), (Class::Multijet, &multijet), (Class::Hss, &signal)];
        for (class, table) in expected {
            if table.class != class {
                return Err(Error::InvalidArgument(format!(
                    "{} table passed in the {} slot",
                    table.class, class
                )));
            }
        }
        for other in [&multijet, &signal] {
            if let Some(column) = first_schema_difference(&bib.schema, &other.schema) {
                return Err(Error::missing_column(column, format!("{} table", other.class)));
            }
        }
        Ok(Self { bib, multijet, signal })
    }

    pub fn tables(&self) -> [&EventTable; 3] {
        [&self.bib, &self.multijet, &self.signal]
    }

    pub fn table(&self, class: Class) -> &EventTable {
        match class {
            Class::Bib => &self.bib,
            Class::Multijet => &self.multijet,
            Class::Hss => &self.signal,
        }
    }

    pub fn map<F>(&self, mut f: F) -> SampleSet
    where
        F: FnMut(&EventTable) -> EventTable,
    {
        SampleSet { bib: f(&self.bib), multijet: f(&self.multijet), signal: f(&self.signal) }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.bib.schema
    }
}

/// First column of `reference` absent from `other` (or vice versa).
fn first_schema_difference(reference: &TableSchema, other: &TableSchema) -> Option<String> {
    if reference == other {
        return None;
    }
    let in_ref = reference.features.iter().chain(&reference.scores);
    let in_other = other.features.iter().chain(&other.scores);
    for col in in_ref {
        if !other.features.contains(col) && !other.scores.contains(col) {
            return Some(col.clone());
        }
    }
    for col in in_other {
        if !reference.features.contains(col) && !reference.scores.contains(col) {
            return Some(col.clone());
        }
    }
    // same names, different order
    reference.features.first().or(reference.scores.first()).cloned()
}
