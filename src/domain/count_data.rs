// Counting data domain models
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

/// One raw measurement of one indicator ("in", "out", "occ", ...) at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: i64,
    pub key: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl Observation {
    pub fn new(time: i64, key: impl Into<String>, value: f64) -> Self {
        Self {
            time,
            key: key.into(),
            value,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Time series of a single site, ordered by time ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSeries {
    pub id: String,
    pub data: Vec<Observation>,
}

impl SiteSeries {
    pub fn new(id: impl Into<String>, data: Vec<Observation>) -> Self {
        Self { id: id.into(), data }
    }

    /// Observations recorded for `indicator`.
    pub fn values_for<'a>(&'a self, indicator: &'a str) -> impl Iterator<Item = &'a Observation> + 'a {
        self.data.iter().filter(move |obs| obs.key == indicator)
    }

    pub fn has_indicator(&self, indicator: &str) -> bool {
        self.data.iter().any(|obs| obs.key == indicator)
    }
}

/// Site data handed to a KPI: a single site or a set of sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteSelection {
    One(SiteSeries),
    Many(Vec<SiteSeries>),
}

impl SiteSelection {
    pub fn sites(&self) -> &[SiteSeries] {
        match self {
            SiteSelection::One(site) => std::slice::from_ref(site),
            SiteSelection::Many(sites) => sites,
        }
    }

    /// All observations of all selected sites for `indicator`.
    pub fn values_for<'a>(&'a self, indicator: &'a str) -> impl Iterator<Item = &'a Observation> + 'a {
        self.sites().iter().flat_map(move |site| site.values_for(indicator))
    }
}

impl From<SiteSeries> for SiteSelection {
    fn from(site: SiteSeries) -> Self {
        SiteSelection::One(site)
    }
}

impl From<Vec<SiteSeries>> for SiteSelection {
    fn from(sites: Vec<SiteSeries>) -> Self {
        SiteSelection::Many(sites)
    }
}

/// Half-open time interval `[start_date, end_date)` in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start_date: i64,
    pub end_date: i64,
}

impl Period {
    pub fn new(start_date: i64, end_date: i64) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    /// Length in seconds, saturating at the `i64` bounds.
    pub fn seconds(&self) -> i64 {
        self.end_date.saturating_sub(self.start_date)
    }

    pub fn checked_seconds(&self) -> Option<i64> {
        self.end_date.checked_sub(self.start_date)
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start_date && timestamp < self.end_date
    }

    /// Whole days between start and end, truncated toward zero.
    pub fn diff_days(&self) -> i64 {
        self.seconds() / SECONDS_PER_DAY
    }

    /// Whole weeks between start and end, truncated toward zero.
    pub fn diff_weeks(&self) -> i64 {
        self.seconds() / SECONDS_PER_WEEK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_diffs_truncate() {
        let day = SECONDS_PER_DAY;
        let period = Period::new(0, 8 * day);
        assert_eq!(period.diff_days(), 8);
        assert_eq!(period.diff_weeks(), 1);

        let period = Period::new(0, 6 * day + 23 * 3600);
        assert_eq!(period.diff_days(), 6);
        assert_eq!(period.diff_weeks(), 0);
    }

    #[test]
    fn test_extreme_period_does_not_overflow() {
        let period = Period::new(i64::MIN, i64::MAX);
        assert_eq!(period.checked_seconds(), None);
        assert_eq!(period.seconds(), i64::MAX);
        assert_eq!(period.diff_weeks(), i64::MAX / SECONDS_PER_WEEK);

        let inverted = Period::new(i64::MAX, i64::MIN);
        assert_eq!(inverted.seconds(), i64::MIN);
        assert!(inverted.diff_days() < 0);
    }

    #[test]
    fn test_selection_flattens_sites() {
        let a = SiteSeries::new(
            "a",
            vec![Observation::new(0, "in", 1.0), Observation::new(0, "out", 2.0)],
        );
        let b = SiteSeries::new("b", vec![Observation::new(0, "in", 3.0)]);
        let selection = SiteSelection::from(vec![a, b]);

        let total: f64 = selection.values_for("in").map(|obs| obs.value).sum();
        assert_eq!(total, 4.0);
        assert_eq!(selection.sites().len(), 2);
    }

    #[test]
    fn test_selection_deserializes_single_or_many() {
        let one: SiteSelection =
            serde_json::from_str(r#"{"id":"s1","data":[{"time":10,"key":"in","value":4}]}"#).unwrap();
        assert!(matches!(one, SiteSelection::One(_)));

        let many: SiteSelection = serde_json::from_str(r#"[{"id":"s1","data":[]},{"id":"s2","data":[]}]"#).unwrap();
        assert_eq!(many.sites().len(), 2);
    }
}
