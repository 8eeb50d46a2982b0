// KPI query and result models
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::count_data::{Period, SiteSelection, SiteSeries};
use super::kpi::error::KpiError;
use super::kpi::range::{NSEC_DAY, RangeId};

/// Longest period a query may cover.
pub const MAX_PERIOD_SECONDS: i64 = 10 * 366 * NSEC_DAY;

/// Rejects empty, inverted, overlong or unrepresentable periods.
pub fn validate_period(period: Period) -> Result<Period, KpiError> {
    let seconds = period.checked_seconds().ok_or_else(|| {
        KpiError::InvalidQuery(format!(
            "period {}..{} is out of range",
            period.start_date, period.end_date
        ))
    })?;
    if seconds <= 0 {
        return Err(KpiError::InvalidQuery(format!(
            "empty period {}..{}",
            period.start_date, period.end_date
        )));
    }
    if seconds > MAX_PERIOD_SECONDS {
        return Err(KpiError::InvalidQuery(format!(
            "period of {} days exceeds the {} days limit",
            period.diff_days(),
            MAX_PERIOD_SECONDS / NSEC_DAY
        )));
    }
    for timestamp in [period.start_date, period.end_date] {
        if DateTime::from_timestamp(timestamp, 0).is_none() {
            return Err(KpiError::InvalidTimestamp(timestamp));
        }
    }
    Ok(period)
}

/// One KPI request, built per render and consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub indicator: Option<String>,
    #[serde(default)]
    pub group_by: Option<RangeId>,
    #[serde(default)]
    pub period: Option<Period>,
    pub sitedata: SiteSelection,
    #[serde(default)]
    pub compared_data: Option<SiteSelection>,
    #[serde(default)]
    pub compared_period: Option<Period>,
    #[serde(default)]
    pub allsitedata: Option<Vec<SiteSeries>>,
    /// Native sampling width used by the per-minute path.
    #[serde(default)]
    pub period_interval: Option<i64>,
}

impl Query {
    pub fn new(sitedata: impl Into<SiteSelection>) -> Self {
        Self {
            indicator: None,
            group_by: None,
            period: None,
            sitedata: sitedata.into(),
            compared_data: None,
            compared_period: None,
            allsitedata: None,
            period_interval: None,
        }
    }

    pub fn indicator(mut self, indicator: impl Into<String>) -> Self {
        self.indicator = Some(indicator.into());
        self
    }

    pub fn group_by(mut self, range: RangeId) -> Self {
        self.group_by = Some(range);
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn all_sites(mut self, sites: Vec<SiteSeries>) -> Self {
        self.allsitedata = Some(sites);
        self
    }

    pub fn compared(mut self, data: impl Into<SiteSelection>, period: Option<Period>) -> Self {
        self.compared_data = Some(data.into());
        self.compared_period = period;
        self
    }

    pub fn require_indicator(&self) -> Result<&str, KpiError> {
        self.indicator
            .as_deref()
            .ok_or_else(|| KpiError::InvalidQuery("no indicator selected".to_string()))
    }

    /// The query period, rejecting missing or unusable intervals.
    pub fn require_period(&self) -> Result<Period, KpiError> {
        match self.period {
            Some(period) => validate_period(period),
            None => Err(KpiError::InvalidQuery("missing period".to_string())),
        }
    }

    /// Sites used for cross-site aggregation, falling back to the selected ones.
    pub fn aggregation_sites(&self) -> &[SiteSeries] {
        match &self.allsitedata {
            Some(sites) => sites,
            None => self.sitedata.sites(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: i64,
    pub y: f64,
}

impl DataPoint {
    pub fn new(x: i64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeResult {
    #[serde(skip)]
    pub query: Query,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DataPoint>>,
}

impl ComputeResult {
    pub fn scalar(query: &Query, value: f64) -> Self {
        Self {
            query: query.clone(),
            value,
            data: None,
        }
    }

    pub fn series(query: &Query, value: f64, data: Vec<DataPoint>) -> Self {
        Self {
            query: query.clone(),
            value,
            data: Some(data),
        }
    }
}

/// A KPI computed for the selected period and for a compared one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub current: ComputeResult,
    pub previous: ComputeResult,
    pub delta: f64,
}

impl Comparison {
    pub fn new(current: ComputeResult, previous: ComputeResult) -> Self {
        let delta = current.value - previous.value;
        Self {
            current,
            previous,
            delta,
        }
    }
}
