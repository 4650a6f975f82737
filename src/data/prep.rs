use crate::data::event::{Class, SampleSet};
use crate::error::Result;

/// Flattened BIB + MJ + HSS events, ready for an external classifier fit.
#[derive(Clone, Debug, Default)]
pub struct TrainingMatrix {
    pub variables: Vec<String>,
    /// row-major, `variables.len()` values per event
    pub features: Vec<f64>,
    pub classes: Vec<Class>,
    pub training_weights: Vec<f64>,
    pub evaluation_weights: Vec<f64>,
}

impl TrainingMatrix {
    pub fn n_events(&self) -> usize {
        self.classes.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let w = self.variables.len();
        &self.features[i * w..(i + 1) * w]
    }
}

/// Concatenate the three tables (BIB, then MJ, then HSS), keeping at most
/// `n_events` rows of each (0 keeps all) and only `training_variables`.
pub fn prep_training(samples: &SampleSet, n_events: usize, training_variables: &[String]) -> Result<TrainingMatrix> {
    let columns = training_variables
        .iter()
        .map(|v| samples.schema().feature_index(v))
        .collect::<Result<Vec<_>>>()?;

    let mut out = TrainingMatrix { variables: training_variables.to_vec(), ..Default::default() };
    for table in samples.tables() {
        for r in table.rows.iter().take(if n_events == 0 { usize::MAX } else { n_events }) {
            out.features.extend(columns.iter().map(|&c| r.features[c]));
            out.classes.push(table.class);
            out.training_weights.push(r.training_weight());
            out.evaluation_weights.push(r.evaluation_weight());
        }
    }

    tracing::debug!(events = out.n_events(), variables = columns.len(), "training matrix prepared");
    Ok(out)
}
