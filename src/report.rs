use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;

use crate::data::event::Class;
use crate::metrics::performance::Metrics;
use crate::metrics::roc::RocFamily;

fn num(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else {
        format!("{v:.4}")
    }
}

/// Confusion matrix (rows: true class, columns: predicted) followed by the
/// per-class summary figures.
pub fn metrics_table(m: &Metrics) -> String {
    let mut confusion = Table::new();
    confusion.load_preset(UTF8_FULL);
    let mut header = vec!["true \\ pred".to_string()];
    header.extend(Class::ALL.iter().map(|c| c.name().to_string()));
    confusion.set_header(header);
    for a in Class::ALL {
        let mut row = vec![a.name().to_string()];
        row.extend(Class::ALL.iter().map(|&b| num(m.confusion(a, b))));
        confusion.add_row(row);
    }

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL);
    summary.set_header(vec!["class", "efficiency", "background", "significance", "total weight", "events"]);
    for c in Class::ALL {
        summary.add_row(vec![
            c.name().to_string(),
            num(m.efficiency(c)),
            num(m.background(c)),
            num(m.significance(c)),
            num(m.total_weight(c)),
            m.total_count(c).to_string(),
        ]);
    }

    format!("{confusion}\n{summary}")
}

/// One line per cut: cut value, efficiencies, AUC, and the background
/// rejection at `working_point` signal efficiency.
pub fn roc_family_table(sample: &str, family: &RocFamily, working_point: f64) -> String {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(vec![
        "sample".to_string(),
        "BIB cut".to_string(),
        "sig eff".to_string(),
        "back eff".to_string(),
        "BIB eff".to_string(),
        "AUC".to_string(),
        format!("rej @ {working_point:.2}"),
    ]);
    for r in family.iter() {
        let auc = match r.auc_band {
            Some(band) => format!("{} [{}, {}]", num(r.auc), num(band.low), num(band.high)),
            None => num(r.auc),
        };
        t.add_row(vec![
            sample.to_string(),
            num(r.cut),
            num(r.sig_eff),
            num(r.back_eff),
            num(r.bib_eff),
            auc,
            num(r.background_rejection_at(working_point)),
        ]);
    }
    t.to_string()
}
