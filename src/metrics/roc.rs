use interp1d::Interp1d;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::event::EventTable;
use crate::error::{Error, Result};

/// Binary ROC curve, points ordered by descending threshold.
///
/// The first point is `(0, 0)` at threshold `+inf`. Rates are NaN when the
/// input has no positives (tpr) or no negatives (fpr).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Sweep every distinct score as a threshold (`score >= threshold` is
/// called positive). Tied scores form a single point.
pub fn roc_curve(truth: &[bool], scores: &[f64]) -> RocCurve {
    let n_pos = truth.iter().filter(|&&t| t).count() as f64;
    let n_neg = truth.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        tracing::warn!(positives = n_pos, negatives = n_neg, "degenerate ROC input, rates are NaN");
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(scores[i])));

    let mut curve = RocCurve { fpr: vec![0.0 / n_neg], tpr: vec![0.0 / n_pos], thresholds: vec![f64::INFINITY] };
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let current = scores[order[i]];
        while i < order.len() && OrderedFloat(scores[order[i]]) == OrderedFloat(current) {
            if truth[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        curve.fpr.push(fp as f64 / n_neg);
        curve.tpr.push(tp as f64 / n_pos);
        curve.thresholds.push(current);
    }
    curve
}

/// Trapezoidal area under `(x, y)`, points already ordered along `x`.
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// ROC between `signal` (truth 1) and `background` (truth 0) score sets.
pub fn roc_from_scores(signal: &[f64], background: &[f64]) -> (RocCurve, f64) {
    let truth: Vec<bool> = std::iter::repeat(true)
        .take(signal.len())
        .chain(std::iter::repeat(false).take(background.len()))
        .collect();
    let scores: Vec<f64> = signal.iter().chain(background).copied().collect();
    let curve = roc_curve(&truth, &scores);
    let area = auc(&curve.fpr, &curve.tpr);
    (curve, area)
}

/// Bootstrapped AUC spread.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AucBand {
    pub mean: f64,
    /// 5th percentile
    pub low: f64,
    /// 95th percentile
    pub high: f64,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let m = sorted.len();
    if m == 0 {
        return f64::NAN;
    }
    if m == 1 {
        return sorted[0];
    }
    let h = (m - 1) as f64 * p.clamp(0.0, 1.0);
    let i0 = h.floor() as usize;
    let i1 = h.ceil() as usize;
    let frac = h - i0 as f64;
    (1.0 - frac) * sorted[i0] + frac * sorted[i1]
}

fn resample(x: &[f64], rng: &mut impl Rng) -> Vec<f64> {
    (0..x.len()).map(|_| x[rng.gen_range(0..x.len())]).collect()
}

/// AUC band from `n_bootstrap` resamplings of both populations. Replicate
/// `i` is seeded with `seed + i`, so the band is reproducible and
/// independent of thread scheduling.
pub fn bootstrap_auc(signal: &[f64], background: &[f64], n_bootstrap: usize, seed: u64) -> AucBand {
    if signal.is_empty() || background.is_empty() || n_bootstrap == 0 {
        return AucBand { mean: f64::NAN, low: f64::NAN, high: f64::NAN };
    }
    let mut aucs: Vec<f64> = (0..n_bootstrap)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let sb = resample(signal, &mut rng);
            let bb = resample(background, &mut rng);
            roc_from_scores(&sb, &bb).1
        })
        .collect();
    aucs.sort_by_key(|&a| OrderedFloat(a));
    AucBand {
        mean: aucs.iter().sum::<f64>() / n_bootstrap as f64,
        low: percentile(&aucs, 0.05),
        high: percentile(&aucs, 0.95),
    }
}

/// How the swept cut values are chosen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CutValues {
    /// Use these cut values as given.
    Literal { values: Vec<f64> },
    /// Quantiles of the reference (BIB) score distribution at `points`
    /// log-spaced fractions in `[min_fraction, 1]`.
    LogQuantiles { points: usize, min_fraction: f64 },
}

impl Default for CutValues {
    fn default() -> Self {
        CutValues::LogQuantiles { points: 20, min_fraction: 0.001 }
    }
}

impl CutValues {
    /// `0.1, 0.2, ..., 1.0`
    pub fn decile_grid() -> Self {
        CutValues::Literal { values: (1..=10).map(|i| i as f64 / 10.0).collect() }
    }

    /// Concrete cut values, given the reference population's scores.
    pub fn resolve(&self, reference: &[f64]) -> Result<Vec<f64>> {
        match self {
            CutValues::Literal { values } => Ok(values.clone()),
            CutValues::LogQuantiles { points, min_fraction } => {
                if reference.is_empty() {
                    return Err(Error::InvalidArgument("cannot derive cuts from an empty reference sample".into()));
                }
                let fractions = log_space(*min_fraction, 1.0, *points)?;
                let mut sorted = reference.to_vec();
                sorted.sort_by_key(|&v| OrderedFloat(v));
                let last = (sorted.len() - 1) as f64;
                Ok(fractions.iter().map(|f| sorted[(f * last).floor() as usize]).collect())
            }
        }
    }
}

/// `points` values from `start` to `stop`, evenly spaced in log10.
pub fn log_space(start: f64, stop: f64, points: usize) -> Result<Vec<f64>> {
    if !(start > 0.0 && start <= stop) {
        return Err(Error::InvalidArgument(format!("log range must satisfy 0 < start <= stop, got [{start}, {stop}]")));
    }
    match points {
        0 => Ok(Vec::new()),
        1 => Ok(vec![stop]),
        n => {
            let (a, b) = (start.log10(), stop.log10());
            let step = (b - a) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|k| 10f64.powf(a + step * k as f64)).collect();
            // keep the end point exact so it indexes the last quantile
            out[n - 1] = stop;
            Ok(out)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RocFamilyConfig {
    /// auxiliary score the cut is placed on
    pub cut_column: String,
    /// score the ROC curve is built from
    pub discriminant_column: String,
    pub cuts: CutValues,
    /// bootstrap replicates per row; 0 disables the AUC band
    pub bootstrap: usize,
    pub seed: u64,
}

impl Default for RocFamilyConfig {
    fn default() -> Self {
        Self {
            cut_column: "BIBWeight".into(),
            discriminant_column: "HSSWeight".into(),
            cuts: CutValues::default(),
            bootstrap: 0,
            seed: 0,
        }
    }
}

/// One operating point of a ROC family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CutSweepRow {
    pub cut: f64,
    pub tpr: Vec<f64>,
    pub fpr: Vec<f64>,
    pub thresholds: Vec<f64>,
    pub auc: f64,
    /// unweighted fractions of each population with `cut score < cut`
    pub sig_eff: f64,
    pub back_eff: f64,
    pub bib_eff: f64,
    pub auc_band: Option<AucBand>,
}

impl CutSweepRow {
    /// ROC curve scaled by the cut's own efficiencies: `(fpr·back_eff, tpr·sig_eff)`.
    pub fn scaled_curve(&self) -> Vec<(f64, f64)> {
        self.fpr
            .iter()
            .zip(&self.tpr)
            .map(|(f, t)| (f * self.back_eff, t * self.sig_eff))
            .collect()
    }

    /// Background false-positive rate at signal efficiency `tpr`, linearly
    /// interpolated along the curve. NaN outside the curve's range.
    pub fn fpr_at_tpr(&self, tpr: f64) -> f64 {
        let mut xs: Vec<f64> = Vec::with_capacity(self.tpr.len());
        let mut ys: Vec<f64> = Vec::with_capacity(self.fpr.len());
        for (&t, &f) in self.tpr.iter().zip(&self.fpr) {
            if t.is_nan() || f.is_nan() {
                continue;
            }
            // first point at each tpr has the lowest fpr
            if xs.last().map_or(true, |&last| t > last) {
                xs.push(t);
                ys.push(f);
            }
        }
        let n = xs.len();
        if n == 0 || tpr < xs[0] || tpr > xs[n - 1] {
            return f64::NAN;
        }
        if n == 1 {
            return ys[0];
        }
        match Interp1d::new_sorted(xs, ys) {
            Ok(i) => i.interpolate(tpr),
            Err(e) => {
                tracing::warn!(error = ?e, "interpolation failed");
                f64::NAN
            }
        }
    }

    /// `1 / fpr` at signal efficiency `tpr`.
    pub fn background_rejection_at(&self, tpr: f64) -> f64 {
        1.0 / self.fpr_at_tpr(tpr)
    }

    fn compute(cut: f64, signal: &Populations, background: &Populations, bib_cut: &[f64], config: &RocFamilyConfig) -> Self {
        let (sig_scores, sig_eff) = signal.below(cut);
        let (back_scores, back_eff) = background.below(cut);
        let bib_kept = bib_cut.iter().filter(|&&v| v < cut).count();
        let bib_eff = bib_kept as f64 / bib_cut.len() as f64;

        let (curve, area) = roc_from_scores(&sig_scores, &back_scores);
        let auc_band = (config.bootstrap > 0)
            .then(|| bootstrap_auc(&sig_scores, &back_scores, config.bootstrap, config.seed));

        CutSweepRow {
            cut,
            tpr: curve.tpr,
            fpr: curve.fpr,
            thresholds: curve.thresholds,
            auc: area,
            sig_eff,
            back_eff,
            bib_eff,
            auc_band,
        }
    }
}

/// Ordered sequence of cut-sweep rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RocFamily {
    pub rows: Vec<CutSweepRow>,
}

impl RocFamily {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CutSweepRow> {
        self.rows.iter()
    }
}

/// Cut and discriminant columns of one table.
struct Populations {
    cut: Vec<f64>,
    discriminant: Vec<f64>,
}

impl Populations {
    fn extract(table: &EventTable, config: &RocFamilyConfig) -> Result<Self> {
        Ok(Self {
            cut: table.score_column(&config.cut_column)?,
            discriminant: table.score_column(&config.discriminant_column)?,
        })
    }

    /// Discriminant values of rows below the cut, plus the kept fraction.
    fn below(&self, cut: f64) -> (Vec<f64>, f64) {
        let kept: Vec<f64> = self
            .cut
            .iter()
            .zip(&self.discriminant)
            .filter(|(&c, _)| c < cut)
            .map(|(_, &d)| d)
            .collect();
        let eff = kept.len() as f64 / self.cut.len() as f64;
        (kept, eff)
    }
}

/// Build one ROC curve per cut value on `config.cut_column`.
///
/// Rows come back in cut-sequence order; with derived cuts that order is
/// by increasing cut value, hence non-decreasing `bib_eff`.
pub fn roc_family(
    signal: &EventTable,
    background: &EventTable,
    bib_reference: &EventTable,
    config: &RocFamilyConfig,
) -> Result<RocFamily> {
    let sig = Populations::extract(signal, config)?;
    let back = Populations::extract(background, config)?;
    let bib_cut = bib_reference.score_column(&config.cut_column)?;

    let cuts = config.cuts.resolve(&bib_cut)?;
    tracing::debug!(n_cuts = cuts.len(), column = %config.cut_column, "sweeping cuts");

    let rows = cuts
        .par_iter()
        .map(|&cut| CutSweepRow::compute(cut, &sig, &back, &bib_cut, config))
        .collect();
    Ok(RocFamily { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::event::tests::{record, schema};
    use crate::data::event::Class;
    use approx::assert_relative_eq;

    /// scores: [BIBWeight, MultijetWeight, HSSWeight]
    fn table(class: Class, scores: &[[f64; 3]]) -> EventTable {
        let rows = scores.iter().enumerate().map(|(i, s)| record(i as u64, *s)).collect();
        EventTable::new(class, schema(), rows).unwrap()
    }

    fn spread(class: Class, n: usize, hss_offset: f64) -> EventTable {
        let scores: Vec<[f64; 3]> = (0..n)
            .map(|i| {
                let x = i as f64 / n as f64;
                [x, 0.0, (x * 7.0 + hss_offset).fract()]
            })
            .collect();
        table(class, &scores)
    }

    #[test]
    fn separable_scores_have_unit_auc() {
        let (curve, a) = roc_from_scores(&[0.9, 0.8, 0.7], &[0.3, 0.2]);
        assert_relative_eq!(a, 1.0);
        assert_eq!(curve.thresholds[0], f64::INFINITY);
        assert_eq!((curve.fpr[0], curve.tpr[0]), (0.0, 0.0));
        assert_eq!((*curve.fpr.last().unwrap(), *curve.tpr.last().unwrap()), (1.0, 1.0));
    }

    #[test]
    fn identical_scores_have_half_auc() {
        let (curve, a) = roc_from_scores(&[0.5; 4], &[0.5; 6]);
        assert_relative_eq!(a, 0.5);
        assert_eq!(curve.tpr.len(), 2);
    }

    #[test]
    fn inverted_scores_have_zero_auc() {
        let (_, a) = roc_from_scores(&[0.1, 0.2], &[0.8, 0.9]);
        assert_relative_eq!(a, 0.0);
    }

    #[test]
    fn no_background_gives_nan() {
        let (curve, a) = roc_from_scores(&[0.1, 0.2], &[]);
        assert!(curve.fpr.iter().all(|f| f.is_nan()));
        assert!(a.is_nan());
    }

    #[test]
    fn log_space_end_points() {
        let v = log_space(0.001, 1.0, 4).unwrap();
        assert_relative_eq!(v[0], 0.001, epsilon = 1e-15);
        assert_relative_eq!(v[1], 0.01, epsilon = 1e-12);
        assert_eq!(v[3], 1.0);
        assert!(log_space(0.0, 1.0, 3).is_err());
    }

    #[test]
    fn derived_cuts_are_reference_quantiles() {
        let reference: Vec<f64> = (0..16).rev().map(|i| i as f64).collect();
        let cuts = CutValues::LogQuantiles { points: 4, min_fraction: 0.001 }.resolve(&reference).unwrap();
        // floor(f * 15) for f in [0.001, 0.01, 0.1, 1]
        assert_eq!(cuts, vec![0.0, 0.0, 1.0, 15.0]);
        assert!(CutValues::default().resolve(&[]).is_err());
    }

    #[test]
    fn literal_cuts_are_returned_in_order() {
        let sig = spread(Class::Hss, 50, 0.3);
        let back = spread(Class::Multijet, 40, 0.0);
        let bib = spread(Class::Bib, 30, 0.0);
        let config = RocFamilyConfig { cuts: CutValues::Literal { values: vec![0.9, 0.2, 0.5] }, ..Default::default() };

        let fam = roc_family(&sig, &back, &bib, &config).unwrap();
        let cuts: Vec<f64> = fam.iter().map(|r| r.cut).collect();
        assert_eq!(cuts, vec![0.9, 0.2, 0.5]);
        assert_relative_eq!(fam.rows[1].sig_eff, 0.2);
        assert_relative_eq!(fam.rows[1].back_eff, 0.2);
    }

    #[test]
    fn derived_family_efficiencies_are_monotone_and_bounded() {
        let sig = spread(Class::Hss, 200, 0.3);
        let back = spread(Class::Multijet, 150, 0.0);
        let bib = spread(Class::Bib, 120, 0.0);

        let fam = roc_family(&sig, &back, &bib, &RocFamilyConfig::default()).unwrap();
        assert_eq!(fam.len(), 20);
        for pair in fam.rows.windows(2) {
            assert!(pair[1].bib_eff >= pair[0].bib_eff);
        }
        for r in fam.iter() {
            for eff in [r.sig_eff, r.back_eff, r.bib_eff] {
                assert!((0.0..=1.0).contains(&eff));
            }
        }
    }

    #[test]
    fn missing_cut_column_is_schema_mismatch() {
        let t = spread(Class::Hss, 5, 0.0);
        let config = RocFamilyConfig { cut_column: "BIBScore".into(), ..Default::default() };
        let err = roc_family(&t, &t, &t, &config).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref column, .. } if column == "BIBScore"));
    }

    #[test]
    fn working_point_interpolation() {
        let row = CutSweepRow {
            cut: 1.0,
            tpr: vec![0.0, 0.5, 0.5, 1.0],
            fpr: vec![0.0, 0.1, 0.2, 1.0],
            thresholds: vec![f64::INFINITY, 0.8, 0.6, 0.1],
            auc: 0.0,
            sig_eff: 1.0,
            back_eff: 0.5,
            bib_eff: 1.0,
            auc_band: None,
        };
        assert_relative_eq!(row.fpr_at_tpr(0.5), 0.1, epsilon = 1e-12);
        assert_relative_eq!(row.fpr_at_tpr(0.75), 0.55, epsilon = 1e-12);
        assert_relative_eq!(row.background_rejection_at(0.5), 10.0, epsilon = 1e-9);
        assert!(row.fpr_at_tpr(1.5).is_nan());
        assert_eq!(row.scaled_curve()[3], (0.5, 1.0));
    }

    #[test]
    fn bootstrap_band_is_reproducible() {
        let sig: Vec<f64> = (0..40).map(|i| 0.3 + i as f64 / 80.0).collect();
        let back: Vec<f64> = (0..40).map(|i| i as f64 / 80.0).collect();
        let a = bootstrap_auc(&sig, &back, 50, 7);
        let b = bootstrap_auc(&sig, &back, 50, 7);
        assert_eq!(a, b);
        assert!(a.low <= a.mean && a.mean <= a.high);
        assert!(bootstrap_auc(&[], &back, 10, 0).mean.is_nan());
    }
}
