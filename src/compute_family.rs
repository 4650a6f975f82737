use std::collections::BTreeMap;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::config::AnalysisConfig;
use crate::data::columnar::ColumnarTable;
use crate::data::event::{Class, EventTable, SampleSet, TableSchema};
use crate::data::loader::{load_merged, load_sample, load_samples_from_list};
use crate::data::splitter::{split_train_test, FractionFilter};
use crate::data::sqlite::{open_results, save_roc_family};
use crate::error::{Error, Result};
use crate::metrics::performance::{calc_performance, Metrics};
use crate::metrics::roc::{roc_family, RocFamily};

/// Loaded inputs: merged backgrounds plus one table per signal sample.
pub struct Inputs {
    pub bib: EventTable,
    /// BIB population the derived ROC cuts are quantiles of
    pub bib_reference: EventTable,
    pub multijet: EventTable,
    pub signals: BTreeMap<String, EventTable>,
}

fn typed(raw: &ColumnarTable, class: Class, schema: &Arc<TableSchema>, filter: Option<&FractionFilter>) -> Result<EventTable> {
    let table = raw.to_event_table(class, Arc::clone(schema))?;
    Ok(match filter {
        Some(f) => table.thin(f),
        None => table,
    })
}

/// Load every configured sample. Missing signal samples are skipped; a
/// background with no file at all is an error since nothing can be
/// computed without it.
pub fn load_inputs(config: &AnalysisConfig) -> Result<Inputs> {
    let schema = config.schema();
    let filter = config.sample_fraction.map(FractionFilter::new).transpose()?;
    let filter = filter.as_ref();

    let bib_raw = load_merged(&config.data_dir, &config.bib_samples)?
        .ok_or_else(|| Error::InvalidArgument(format!("no BIB sample found in {}", config.data_dir.display())))?;
    let mj_raw = load_merged(&config.data_dir, &config.multijet_samples)?
        .ok_or_else(|| Error::InvalidArgument(format!("no multijet sample found in {}", config.data_dir.display())))?;

    let bib = typed(&bib_raw, Class::Bib, &schema, filter)?;
    let multijet = typed(&mj_raw, Class::Multijet, &schema, filter)?;
    let bib_reference = match &config.bib_reference_sample {
        Some(name) => {
            let raw = load_sample(&config.data_dir, name)?
                .ok_or_else(|| Error::InvalidArgument(format!("BIB reference sample {name} not found")))?;
            typed(&raw, Class::Bib, &schema, filter)?
        }
        None => bib.clone(),
    };

    let mut signals = BTreeMap::new();
    for (name, raw) in load_samples_from_list(&config.data_dir, &config.signal_samples)? {
        signals.insert(name, typed(&raw, Class::Hss, &schema, filter)?);
    }

    tracing::info!(
        bib = bib.len(),
        bib_reference = bib_reference.len(),
        multijet = multijet.len(),
        signals = signals.len(),
        "inputs loaded"
    );
    Ok(Inputs { bib, bib_reference, multijet, signals })
}

fn progress(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .map(|s| s.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Weighted performance on the testing split of each signal sample,
/// classifying events by their highest score column.
pub fn evaluate_all(config: &AnalysisConfig, inputs: &Inputs) -> Result<BTreeMap<String, Metrics>> {
    let classifier = config.classifier();
    let mut out = BTreeMap::new();
    for (name, signal) in &inputs.signals {
        let samples = SampleSet::new(inputs.bib.clone(), inputs.multijet.clone(), signal.clone())?;
        let (_, testing) = split_train_test(&samples, config.split_modulus)?;
        let metrics = calc_performance(&testing, &classifier)?;
        tracing::info!(sample = %name, eff_hss = metrics.efficiency(Class::Hss), "evaluated");
        out.insert(name.clone(), metrics);
    }
    Ok(out)
}

/// ROC family of every signal sample against the multijet background,
/// with cut values referenced to the BIB reference sample. Samples run in
/// parallel.
pub fn roc_families(config: &AnalysisConfig, inputs: &Inputs) -> Result<BTreeMap<String, RocFamily>> {
    tracing::info!("running ROC families ...");
    let pb = progress(inputs.signals.len());
    let results = inputs
        .signals
        .par_iter()
        .map(|(name, signal)| {
            let fam = roc_family(signal, &inputs.multijet, &inputs.bib_reference, &config.roc);
            pb.inc(1);
            fam.map(|f| (name.clone(), f))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    pb.finish_and_clear();

    if let Some(path) = &config.output_db {
        let mut conn = open_results(path)?;
        for (name, fam) in &results {
            save_roc_family(&mut conn, name, fam)?;
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::roc::CutValues;
    use std::fmt::Write as _;
    use std::path::Path;

    /// CSV with event numbers `0..n`; `hss` and `bib` give each row's scores.
    fn write_sample(dir: &Path, name: &str, n: usize, hss: impl Fn(usize) -> f64, bib: impl Fn(usize) -> f64) {
        let mut s = String::from("EventNumber,Weight,WeightMCEvent,WeightXSection,BIBWeight,MultijetWeight,HSSWeight\n");
        for i in 0..n {
            let (h, b) = (hss(i), bib(i));
            writeln!(s, "{i},1.0,1.0,2.0,{b},{},{h}", 1.0 - h - b).unwrap();
        }
        std::fs::write(dir.join(format!("all-{name}.csv")), s).unwrap();
    }

    fn config(dir: &Path) -> AnalysisConfig {
        AnalysisConfig {
            data_dir: dir.to_path_buf(),
            signal_samples: vec!["sigA".into(), "sigMissing".into()],
            bib_samples: vec!["data15".into(), "data16".into()],
            multijet_samples: vec!["jz".into()],
            training_variables: vec![],
            ..Default::default()
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "sigA", 60, |_| 0.8, |i| (i % 10) as f64 / 100.0);
        write_sample(dir.path(), "jz", 60, |_| 0.1, |i| (i % 10) as f64 / 100.0);
        write_sample(dir.path(), "data15", 60, |_| 0.05, |_| 0.9);
        write_sample(dir.path(), "data16", 30, |_| 0.05, |_| 0.5);
        dir
    }

    #[test]
    fn pipeline_skips_missing_signal_and_evaluates() {
        let dir = fixture();
        let cfg = config(dir.path());
        let inputs = load_inputs(&cfg).unwrap();
        assert_eq!(inputs.signals.len(), 1);

        let metrics = evaluate_all(&cfg, &inputs).unwrap();
        let m = &metrics["sigA"];
        // 20 testing events per class, evaluation weight 2 each
        assert_eq!(m.total_count(Class::Hss), 20);
        assert_eq!(m.total_weight(Class::Hss), 40.0);
        assert_eq!(m.efficiency(Class::Hss), 1.0);
        assert_eq!(m.efficiency(Class::Bib), 1.0);
    }

    #[test]
    fn families_are_stored_when_db_configured() {
        let dir = fixture();
        let mut cfg = config(dir.path());
        cfg.output_db = Some(dir.path().join("families.db"));
        cfg.roc.cuts = CutValues::Literal { values: vec![0.05, 1.0] };

        let inputs = load_inputs(&cfg).unwrap();
        let fams = roc_families(&cfg, &inputs).unwrap();
        let fam = &fams["sigA"];
        assert_eq!(fam.len(), 2);
        assert_eq!(fam.rows[0].sig_eff, 0.5);
        assert_eq!(fam.rows[1].auc, 1.0);
        assert_eq!(fam.rows[1].bib_eff, 1.0);

        let conn = open_results(cfg.output_db.as_ref().unwrap()).unwrap();
        let stored = crate::data::sqlite::load_roc_family(&conn, "sigA").unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn cut_reference_is_the_configured_bib_sample() {
        let dir = fixture();
        let mut cfg = config(dir.path());
        let inputs = load_inputs(&cfg).unwrap();
        assert_eq!(inputs.bib.len(), 90);
        assert_eq!(inputs.bib_reference.len(), 60);

        cfg.bib_reference_sample = None;
        let merged = load_inputs(&cfg).unwrap();
        assert_eq!(merged.bib_reference.len(), 90);

        cfg.bib_reference_sample = Some("data17".into());
        assert!(matches!(load_inputs(&cfg), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn missing_background_is_an_error() {
        let dir = fixture();
        let mut cfg = config(dir.path());
        cfg.multijet_samples = vec!["jz_missing".into()];
        assert!(matches!(load_inputs(&cfg), Err(Error::InvalidArgument(_))));
    }
}
