use crate::data::event::{EventRecord, EventTable, SampleSet};
use crate::error::{Error, Result};

/// Resolution of the fractional sampler: candidate moduli are searched
/// below this bound and coverage is measured over `[0, FRACTION_CEILING)`.
pub const FRACTION_CEILING: u64 = 300;

fn checked_modulus(modulus: i64) -> Result<u64> {
    if modulus <= 0 {
        return Err(Error::InvalidArgument(format!("split modulus must be positive, got {modulus}")));
    }
    Ok(modulus as u64)
}

impl EventTable {
    /// `(training, testing)`: rows with `event_number % modulus == 0` are testing.
    pub fn split_by_modulus(&self, modulus: i64) -> Result<(EventTable, EventTable)> {
        let m = checked_modulus(modulus)?;
        let training = self.filter(|r| r.event_number % m != 0);
        let testing = self.filter(|r| r.event_number % m == 0);
        Ok((training, testing))
    }

    /// Rows accepted by `filter`.
    pub fn thin(&self, filter: &FractionFilter) -> EventTable {
        self.filter(|r| filter.accepts_record(r))
    }
}

/// Split every table of a sample set by event-number modulus.
///
/// Returns `(training, testing)`. With `modulus == 1` every row is testing.
pub fn split_train_test(samples: &SampleSet, modulus: i64) -> Result<(SampleSet, SampleSet)> {
    let (bib_train, bib_test) = samples.bib.split_by_modulus(modulus)?;
    let (mj_train, mj_test) = samples.multijet.split_by_modulus(modulus)?;
    let (sig_train, sig_test) = samples.signal.split_by_modulus(modulus)?;

    for (train, test) in [(&bib_train, &bib_test), (&mj_train, &mj_test), (&sig_train, &sig_test)] {
        tracing::debug!(
            class = %train.class,
            training = train.len(),
            testing = test.len(),
            modulus,
            "sample split"
        );
    }

    let training = SampleSet { bib: bib_train, multijet: mj_train, signal: sig_train };
    let testing = SampleSet { bib: bib_test, multijet: mj_test, signal: sig_test };
    Ok((training, testing))
}

/// Deterministic event-number filter keeping roughly `goal` of all events.
///
/// Moduli are chosen greedily from `1..FRACTION_CEILING`: a candidate `i`
/// joins the set when `1/i` fits in what is still missing from the goal,
/// and the covered fraction is then recounted exactly over the first
/// `FRACTION_CEILING` integers. Later additions can overlap earlier ones, so
/// the achieved fraction may fall short of the goal by more than one
/// resolution step for some goals.
#[derive(Clone, Debug, PartialEq)]
pub struct FractionFilter {
    goal: f64,
    moduli: Vec<u64>,
    covered: f64,
}

impl FractionFilter {
    pub fn new(goal: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&goal) {
            return Err(Error::InvalidArgument(format!("fraction goal must be in [0, 1], got {goal}")));
        }

        let mut moduli: Vec<u64> = Vec::new();
        let mut covered = 0.0;
        for i in 1..FRACTION_CEILING {
            let remaining = goal - covered;
            if 1.0 / i as f64 <= remaining {
                moduli.push(i);
                covered = coverage(&moduli);
            }
        }

        tracing::debug!(goal, covered, n_moduli = moduli.len(), "fraction filter built");
        Ok(Self { goal, moduli, covered })
    }

    pub fn goal(&self) -> f64 {
        self.goal
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Fraction of `[0, FRACTION_CEILING)` the filter accepts.
    pub fn covered_fraction(&self) -> f64 {
        self.covered
    }

    pub fn accepts(&self, event_number: u64) -> bool {
        self.moduli.iter().any(|&m| event_number % m == 0)
    }

    pub fn accepts_record(&self, record: &EventRecord) -> bool {
        self.accepts(record.event_number)
    }
}

fn coverage(moduli: &[u64]) -> f64 {
    let hit = (0..FRACTION_CEILING).filter(|x| moduli.iter().any(|&m| x % m == 0)).count();
    hit as f64 / FRACTION_CEILING as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::event::tests::table;
    use crate::data::event::Class;

    fn selected(goal: f64) -> usize {
        let f = FractionFilter::new(goal).unwrap();
        (0..FRACTION_CEILING).filter(|&n| f.accepts(n)).count()
    }

    #[test]
    fn split_is_disjoint_and_total() {
        let t = table(Class::Multijet, 100);
        let (train, test) = t.split_by_modulus(3).unwrap();
        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.len(), 34);
        assert!(test.rows.iter().all(|r| r.event_number % 3 == 0));
        assert!(train.rows.iter().all(|r| r.event_number % 3 != 0));
    }

    #[test]
    fn split_preserves_order() {
        let (train, _) = table(Class::Bib, 10).split_by_modulus(3).unwrap();
        let numbers: Vec<u64> = train.rows.iter().map(|r| r.event_number).collect();
        assert_eq!(numbers, vec![1, 2, 4, 5, 7, 8]);
    }

    #[test]
    fn modulus_one_leaves_training_empty() {
        let (train, test) = table(Class::Hss, 7).split_by_modulus(1).unwrap();
        assert!(train.is_empty());
        assert_eq!(test.len(), 7);
    }

    #[test]
    fn non_positive_modulus_is_rejected() {
        assert!(matches!(table(Class::Hss, 3).split_by_modulus(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(table(Class::Hss, 3).split_by_modulus(-3), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn half_fraction_within_resolution() {
        let frac = selected(0.5) as f64 / FRACTION_CEILING as f64;
        assert!((frac - 0.5).abs() <= 1.0 / FRACTION_CEILING as f64);
    }

    #[test]
    fn zero_and_one_fractions() {
        assert_eq!(selected(0.0), 0);
        assert_eq!(selected(1.0), FRACTION_CEILING as usize);
    }

    #[test]
    fn out_of_range_goal_is_rejected() {
        assert!(matches!(FractionFilter::new(-0.1), Err(Error::InvalidArgument(_))));
        assert!(matches!(FractionFilter::new(1.5), Err(Error::InvalidArgument(_))));
        assert!(matches!(FractionFilter::new(f64::NAN), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn covered_fraction_never_exceeds_goal_by_more_than_resolution() {
        for goal in [0.05, 0.1, 0.25, 0.33, 0.5, 0.75, 0.9] {
            let f = FractionFilter::new(goal).unwrap();
            assert!(f.covered_fraction() <= goal + 1.0 / FRACTION_CEILING as f64, "goal {goal}");
        }
    }

    #[test]
    fn thinning_is_deterministic() {
        let f = FractionFilter::new(0.25).unwrap();
        let t = table(Class::Bib, 600);
        let a = t.thin(&f);
        let b = t.thin(&f);
        assert_eq!(a.rows, b.rows);
        assert!(a.len() > 0 && a.len() < 600);
    }
}
