use std::collections::HashMap;
use std::sync::Arc;

use crate::data::event::{
    Class, EventRecord, EventTable, TableSchema, EVENT_NUMBER, WEIGHT, WEIGHT_MC_EVENT,
    WEIGHT_X_SECTION,
};
use crate::error::{Error, Result};

/// Raw name-keyed columns as read from a sample file.
#[derive(Clone, Debug, Default)]
pub struct ColumnarTable {
    pub n_rows: usize,
    pub data: HashMap<String, Vec<f64>>,
    /// where the table came from, used in error messages
    pub source: String,
}

impl ColumnarTable {
    pub fn new(n_rows: usize, data: HashMap<String, Vec<f64>>, source: impl Into<String>) -> Self {
        Self { n_rows, data, source: source.into() }
    }

    /// Slice of a scalar column, or SchemaMismatch naming it
    pub fn column_f64(&self, col: &str) -> Result<&[f64]> {
        let out = self
            .data
            .get(col)
            .map(|v| v.as_slice())
            .ok_or_else(|| Error::missing_column(col, self.source.clone()))?;
        if out.iter().any(|v| v.is_nan()) {
            tracing::debug!(column = col, source = %self.source, "column contains NaNs");
        }
        Ok(out)
    }

    pub fn has_column(&self, col: &str) -> bool {
        self.data.contains_key(col)
    }

    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Append the rows of `other`; both tables must carry the same columns.
    pub fn append(&mut self, other: ColumnarTable) -> Result<()> {
        if self.data.is_empty() {
            *self = other;
            return Ok(());
        }
        for col in self.data.keys() {
            if !other.data.contains_key(col) {
                return Err(Error::missing_column(col.clone(), other.source.clone()));
            }
        }
        let ColumnarTable { n_rows, mut data, .. } = other;
        for (col, values) in self.data.iter_mut() {
            if let Some(more) = data.remove(col) {
                values.extend(more);
            }
        }
        self.n_rows += n_rows;
        Ok(())
    }

    /// Validate against `schema` and build typed records for `class`.
    ///
    /// Every required column (event number, the three weights, each feature
    /// and score) must be present; the first absent one is reported. Event
    /// numbers must be finite non-negative integers.
    pub fn to_event_table(&self, class: Class, schema: Arc<TableSchema>) -> Result<EventTable> {
        let event_number = self
            .column_f64(EVENT_NUMBER)?
            .iter()
            .enumerate()
            .map(|(row, &v)| self.event_number(row, v))
            .collect::<Result<Vec<_>>>()?;
        let weight = self.column_f64(WEIGHT)?;
        let weight_mc = self.column_f64(WEIGHT_MC_EVENT)?;
        let weight_xs = self.column_f64(WEIGHT_X_SECTION)?;
        let features = schema
            .features
            .iter()
            .map(|c| self.column_f64(c))
            .collect::<Result<Vec<_>>>()?;
        let scores = schema
            .scores
            .iter()
            .map(|c| self.column_f64(c))
            .collect::<Result<Vec<_>>>()?;

        let rows = (0..self.n_rows)
            .map(|i| EventRecord {
                event_number: event_number[i],
                weight: weight[i],
                weight_mc_event: weight_mc[i],
                weight_x_section: weight_xs[i],
                features: features.iter().map(|c| c[i]).collect(),
                scores: scores.iter().map(|c| c[i]).collect(),
            })
            .collect();

        EventTable::new(class, schema, rows)
    }

    fn event_number(&self, row: usize, value: f64) -> Result<u64> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
            Ok(value as u64)
        } else {
            Err(Error::InvalidValue {
                column: EVENT_NUMBER.to_string(),
                row,
                value,
                context: self.source.clone(),
            })
        }
    }
}
