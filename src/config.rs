use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::event::TableSchema;
use crate::error::Result;
use crate::metrics::performance::ArgMaxScores;
use crate::metrics::roc::RocFamilyConfig;

/// Training variables of the standard CalRatio BDT.
pub fn default_training_variables() -> Vec<String> {
    [
        "JetPt",
        "CalRatio",
        "NTracks",
        "SumPtOfAllTracks",
        "MaxTrackPt",
        "JetWidth",
        "EnergyDensity",
        "HadronicLayer1Fraction",
        "JetLat",
        "JetLong",
        "FirstClusterRadius",
        "ShowerCenter",
        "BIBDeltaTimingM",
        "BIBDeltaTimingP",
        "PredictedLz",
        "PredictedLxy",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Configuration of one analysis run. Every field has a default, so a
/// config file only needs to name what differs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    pub signal_samples: Vec<String>,
    pub bib_samples: Vec<String>,
    /// BIB sample whose scores place the derived ROC cuts; `None` uses
    /// every configured BIB sample merged
    pub bib_reference_sample: Option<String>,
    pub multijet_samples: Vec<String>,
    /// feature columns every table must carry
    pub training_variables: Vec<String>,
    /// score columns for BIB, MJ and HSS, in class order
    pub score_columns: [String; 3],
    /// testing rows satisfy `EventNumber % split_modulus == 0`
    pub split_modulus: i64,
    /// optional fractional thinning applied before anything else
    pub sample_fraction: Option<f64>,
    pub roc: RocFamilyConfig,
    pub output_db: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            signal_samples: strings(&["125pi25lt5m", "200pi25lt5m", "400pi50lt5m", "600pi150lt5m", "1000pi400lt5m"]),
            bib_samples: strings(&["data15", "data16"]),
            bib_reference_sample: Some("data15".into()),
            multijet_samples: strings(&["jz"]),
            training_variables: default_training_variables(),
            score_columns: ["BIBWeight".into(), "MultijetWeight".into(), "HSSWeight".into()],
            split_modulus: 3,
            sample_fraction: None,
            roc: RocFamilyConfig::default(),
            output_db: None,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Table schema implied by the configured variables and score columns.
    pub fn schema(&self) -> Arc<TableSchema> {
        Arc::new(TableSchema::new(self.training_variables.clone(), self.score_columns.to_vec()))
    }

    pub fn classifier(&self) -> ArgMaxScores {
        ArgMaxScores { columns: self.score_columns.clone() }
    }
}
