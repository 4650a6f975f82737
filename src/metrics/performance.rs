use std::collections::BTreeMap;

use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::data::event::{Class, EventRecord, EventTable, SampleSet, TableSchema};
use crate::error::Result;

/// External classifier boundary: one predicted class per event.
pub trait Classifier: Sync {
    fn predict(&self, schema: &TableSchema, record: &EventRecord) -> Result<Class>;
}

/// Predicts the class whose score column is largest.
///
/// Used when tables already carry the trained BDT's per-class outputs.
#[derive(Clone, Debug)]
pub struct ArgMaxScores {
    /// score column per class, indexed by `Class::index`
    pub columns: [String; 3],
}

impl Default for ArgMaxScores {
    fn default() -> Self {
        Self { columns: ["BIBWeight".into(), "MultijetWeight".into(), "HSSWeight".into()] }
    }
}

impl Classifier for ArgMaxScores {
    fn predict(&self, schema: &TableSchema, record: &EventRecord) -> Result<Class> {
        let mut best = Class::Bib;
        let mut best_score = f64::NEG_INFINITY;
        for class in Class::ALL {
            let s = record.scores[schema.score_index(&self.columns[class.index()])?];
            if s > best_score {
                best = class;
                best_score = s;
            }
        }
        Ok(best)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub class: Class,
    pub pred_class: Class,
    /// evaluation weight of the event
    pub weight: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionTable {
    pub rows: Vec<PredictionRow>,
}

impl PredictionTable {
    pub fn new(rows: Vec<PredictionRow>) -> Self {
        Self { rows }
    }

    /// Run `classifier` over every event of the given tables.
    pub fn from_classifier<C: Classifier + ?Sized>(tables: &[&EventTable], classifier: &C) -> Result<Self> {
        let mut rows = Vec::with_capacity(tables.iter().map(|t| t.len()).sum());
        for table in tables {
            for r in &table.rows {
                rows.push(PredictionRow {
                    class: table.class,
                    pred_class: classifier.predict(&table.schema, r)?,
                    weight: r.evaluation_weight(),
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn from_samples<C: Classifier + ?Sized>(samples: &SampleSet, classifier: &C) -> Result<Self> {
        Self::from_classifier(&samples.tables(), classifier)
    }

    /// Perfect classifier: `pred_class := class`.
    pub fn from_truth(tables: &[&EventTable]) -> Self {
        let rows = tables
            .iter()
            .flat_map(|t| {
                t.rows.iter().map(move |r| PredictionRow {
                    class: t.class,
                    pred_class: t.class,
                    weight: r.evaluation_weight(),
                })
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Weighted three-class performance summary.
///
/// Ratios with a zero denominator are NaN, never an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// `confusion[true][predicted]`, summed evaluation weight
    pub confusion: [[f64; 3]; 3],
    pub efficiency: [f64; 3],
    pub background: [f64; 3],
    pub significance: [f64; 3],
    pub total_weight: [f64; 3],
    pub total_count: [usize; 3],
}

impl Metrics {
    pub fn confusion(&self, truth: Class, predicted: Class) -> f64 {
        self.confusion[truth.index()][predicted.index()]
    }

    pub fn efficiency(&self, class: Class) -> f64 {
        self.efficiency[class.index()]
    }

    pub fn background(&self, class: Class) -> f64 {
        self.background[class.index()]
    }

    pub fn significance(&self, class: Class) -> f64 {
        self.significance[class.index()]
    }

    pub fn total_weight(&self, class: Class) -> f64 {
        self.total_weight[class.index()]
    }

    pub fn total_count(&self, class: Class) -> usize {
        self.total_count[class.index()]
    }

    /// Flat view keyed `"<A>in<B>"`, `"Efficiency<A>"`, `"Background<A>"`,
    /// `"Significance<A>"`, `"TotalWeight<A>"` and `"TotalCount<A>"`.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut m = BTreeMap::new();
        for (a, b) in iproduct!(Class::ALL, Class::ALL) {
            m.insert(format!("{}in{}", a.name(), b.name()), self.confusion(a, b));
        }
        for c in Class::ALL {
            m.insert(format!("Efficiency{}", c.name()), self.efficiency(c));
            m.insert(format!("Background{}", c.name()), self.background(c));
            m.insert(format!("Significance{}", c.name()), self.significance(c));
            m.insert(format!("TotalWeight{}", c.name()), self.total_weight(c));
            m.insert(format!("TotalCount{}", c.name()), self.total_count(c) as f64);
        }
        m
    }
}

pub fn evaluate(events: &PredictionTable) -> Metrics {
    let mut m = Metrics::default();

    for row in &events.rows {
        let (a, b) = (row.class.index(), row.pred_class.index());
        m.confusion[a][b] += row.weight;
        m.total_weight[a] += row.weight;
        m.total_count[a] += 1;
    }

    for c in Class::ALL {
        let i = c.index();
        let signal = m.confusion[i][i];
        m.efficiency[i] = signal / m.total_weight[i];
        m.background[i] = Class::ALL
            .iter()
            .filter(|&&other| other != c)
            .map(|other| m.confusion[other.index()][i])
            .sum();
        m.significance[i] = if m.background[i] == 0.0 { f64::NAN } else { signal / m.background[i].sqrt() };
    }

    tracing::debug!(events = events.len(), eff = ?m.efficiency, "performance evaluated");
    m
}

/// Predict with `classifier` on `samples` and evaluate in one step.
///
/// Empty tables are not an error; their ratios come out NaN.
pub fn calc_performance<C: Classifier + ?Sized>(samples: &SampleSet, classifier: &C) -> Result<Metrics> {
    let table = PredictionTable::from_samples(samples, classifier)?;
    if table.is_empty() {
        tracing::warn!("no events to evaluate, metrics are NaN");
    }
    Ok(evaluate(&table))
}
