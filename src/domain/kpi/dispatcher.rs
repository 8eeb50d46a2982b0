// Query dispatcher - indicator discovery and strategy routing
use serde::{Deserialize, Serialize};

use super::KpiStrategy;
use super::compute::Reducer;
use super::error::KpiError;
use super::period::{DirectKpi, PeriodKpi};
use super::range::{NSEC_HOUR, RangeCatalog, RangeDescriptor, RangeId, data_step_seconds};
use super::scalar::{MaxKpi, MaxSiteRatioKpi, MeanKpi, SumKpi};
use super::typical_day::TypicalDayKpi;
use crate::domain::count_data::{Period, SiteSeries};
use crate::domain::query::{Comparison, ComputeResult, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KpiFunc {
    #[serde(rename = "KPISum")]
    Sum,
    #[serde(rename = "KPIMean")]
    Mean,
    #[serde(rename = "KPIMax")]
    Max,
    #[serde(rename = "KPIMaxSiteRatio")]
    MaxSiteRatio,
    #[serde(rename = "KPISumGeneric")]
    SumPeriod,
    #[serde(rename = "KPIMaxPeriod")]
    MaxPeriod,
    #[serde(rename = "KPIPeriodGeneric")]
    PeriodGeneric,
    #[serde(rename = "KPITypicalDay")]
    TypicalDay,
    #[serde(rename = "KPIDirect")]
    Direct,
}

impl KpiFunc {
    /// Strategies producing a bucketed series, which need a range.
    pub fn is_periodic(&self) -> bool {
        matches!(
            self,
            KpiFunc::SumPeriod
                | KpiFunc::MaxPeriod
                | KpiFunc::PeriodGeneric
                | KpiFunc::TypicalDay
                | KpiFunc::Direct
        )
    }

    pub fn compute(&self, query: &Query, catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        match self {
            KpiFunc::Sum => SumKpi.compute(query, catalog),
            KpiFunc::Mean => MeanKpi.compute(query, catalog),
            KpiFunc::Max => MaxKpi.compute(query, catalog),
            KpiFunc::MaxSiteRatio => MaxSiteRatioKpi.compute(query, catalog),
            KpiFunc::SumPeriod => PeriodKpi::with_reducer(Reducer::Sum).compute(query, catalog),
            KpiFunc::MaxPeriod => PeriodKpi::with_reducer(Reducer::Max).compute(query, catalog),
            KpiFunc::PeriodGeneric => PeriodKpi::by_indicator().compute(query, catalog),
            KpiFunc::TypicalDay => TypicalDayKpi.compute(query, catalog),
            KpiFunc::Direct => DirectKpi.compute(query, catalog),
        }
    }
}

/// Static mapping of an indicator key to its KPI function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiParams {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub func: Option<KpiFunc>,
}

impl KpiParams {
    pub fn new(key: impl Into<String>, func: Option<KpiFunc>) -> Self {
        Self {
            key: key.into(),
            name: None,
            func,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeOption {
    pub id: RangeId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiOptions {
    pub kpis: Vec<KpiParams>,
    pub ranges: Vec<RangeOption>,
    pub default_func: KpiFunc,
    #[serde(default)]
    pub default_range: Option<RangeId>,
}

impl Default for KpiOptions {
    fn default() -> Self {
        Self {
            kpis: vec![
                KpiParams::new("in", Some(KpiFunc::SumPeriod)),
                KpiParams::new("out", Some(KpiFunc::SumPeriod)),
                KpiParams::new("occ", Some(KpiFunc::PeriodGeneric)),
            ],
            ranges: RangeId::ALL
                .iter()
                .map(|id| RangeOption { id: *id, name: None })
                .collect(),
            default_func: KpiFunc::Sum,
            default_range: Some(RangeId::Hours),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorDescriptor {
    pub id: String,
    pub name: String,
    pub func: KpiFunc,
}

/// Indicators and ranges discovered for one site selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiDescriptors {
    pub indicators: Vec<IndicatorDescriptor>,
    pub default_indicator: Option<String>,
    pub ranges: Vec<RangeDescriptor>,
    /// Width of the per-minute buckets, adapted to the data sampling step.
    pub minute_seconds: i64,
}

impl KpiDescriptors {
    pub fn indicator(&self, id: &str) -> Option<&IndicatorDescriptor> {
        self.indicators.iter().find(|indicator| indicator.id == id)
    }

    pub fn have_indicator(&self, id: &str) -> bool {
        self.indicator(id).is_some()
    }

    pub fn indicator_name(&self, id: &str) -> Option<&str> {
        self.indicator(id).map(|indicator| indicator.name.as_str())
    }

    pub fn range(&self, id: RangeId) -> Option<&RangeDescriptor> {
        self.ranges.iter().find(|range| range.id == id)
    }

    pub fn has_range(&self, id: RangeId) -> bool {
        self.range(id).is_some()
    }
}

/// Routes queries to strategies. Discovery returns a fresh [`KpiDescriptors`]
/// per site selection; anything undiscovered computes to `Ok(None)`.
#[derive(Debug, Clone)]
pub struct KpiDispatcher {
    options: KpiOptions,
    catalog: RangeCatalog,
}

impl KpiDispatcher {
    pub fn new(options: KpiOptions, catalog: RangeCatalog) -> Self {
        Self { options, catalog }
    }

    pub fn options(&self) -> &KpiOptions {
        &self.options
    }

    pub fn catalog(&self) -> &RangeCatalog {
        &self.catalog
    }

    /// Descriptors before any discovery ran.
    pub fn empty_descriptors(&self) -> KpiDescriptors {
        KpiDescriptors {
            minute_seconds: self.catalog.minute_seconds(),
            ..KpiDescriptors::default()
        }
    }

    /// Union of the indicator keys present in `sites`, in order of first
    /// appearance, restricted to the configured KPIs.
    pub fn update_indicators(&self, current: &KpiDescriptors, sites: &[SiteSeries]) -> KpiDescriptors {
        let mut keys: Vec<&str> = Vec::new();
        for obs in sites.iter().flat_map(|site| site.data.iter()) {
            if !keys.contains(&obs.key.as_str()) {
                keys.push(&obs.key);
            }
        }

        let indicators: Vec<IndicatorDescriptor> = keys
            .into_iter()
            .filter_map(|key| {
                let kpi = self.options.kpis.iter().find(|kpi| kpi.key == key)?;
                Some(IndicatorDescriptor {
                    id: kpi.key.clone(),
                    name: kpi.name.clone().unwrap_or_else(|| key.to_string()),
                    func: kpi.func.unwrap_or(self.options.default_func),
                })
            })
            .collect();

        tracing::debug!(
            "Discovered {} indicators across {} sites",
            indicators.len(),
            sites.len()
        );

        KpiDescriptors {
            default_indicator: indicators.first().map(|indicator| indicator.id.clone()),
            indicators,
            ..current.clone()
        }
    }

    /// Configured ranges whose width is at least the sampling step of `site`.
    /// A step below one hour becomes the per-minute bucket width.
    pub fn update_ranges(&self, current: &KpiDescriptors, site: &SiteSeries, indicator: &str) -> KpiDescriptors {
        let minute_seconds = if current.minute_seconds > 0 {
            current.minute_seconds
        } else {
            self.catalog.minute_seconds()
        };

        if !site.has_indicator(indicator) {
            tracing::debug!("Site {} has no {} data, no ranges available", site.id, indicator);
            return KpiDescriptors {
                ranges: Vec::new(),
                minute_seconds,
                ..current.clone()
            };
        }

        let step = data_step_seconds(site, self.catalog.minute_seconds());
        let minute_seconds = if step < NSEC_HOUR { step } else { minute_seconds };

        let ranges: Vec<RangeDescriptor> = self
            .options
            .ranges
            .iter()
            .map(|option| {
                let descriptor = self.catalog.descriptor_with_minutes(option.id, minute_seconds);
                match &option.name {
                    Some(name) => descriptor.named(name.clone()),
                    None => descriptor,
                }
            })
            .filter(|descriptor| step <= descriptor.seconds)
            .collect();

        tracing::debug!(
            "Site {} samples every {}s, {} ranges available",
            site.id,
            step,
            ranges.len()
        );

        KpiDescriptors {
            ranges,
            minute_seconds,
            ..current.clone()
        }
    }

    /// Indicators of `sites`, then ranges of the first site carrying the
    /// requested (or default) indicator.
    pub fn discover(&self, sites: &[SiteSeries], indicator: Option<&str>) -> KpiDescriptors {
        let descriptors = self.update_indicators(&self.empty_descriptors(), sites);
        let indicator = match indicator {
            Some(indicator) => Some(indicator.to_string()),
            None => descriptors.default_indicator.clone(),
        };

        let Some(indicator) = indicator else {
            return descriptors;
        };
        match sites.iter().find(|site| site.has_indicator(&indicator)) {
            Some(site) => self.update_ranges(&descriptors, site, &indicator),
            None => descriptors,
        }
    }

    pub fn indicator_func(&self, descriptors: &KpiDescriptors, id: &str) -> Option<KpiFunc> {
        descriptors.indicator(id)?;
        let kpi = self.options.kpis.iter().find(|kpi| kpi.key == id)?;
        Some(kpi.func.unwrap_or(self.options.default_func))
    }

    fn resolve(&self, descriptors: &KpiDescriptors, query: &Query) -> Option<(String, KpiFunc)> {
        let indicator = query
            .indicator
            .clone()
            .or_else(|| descriptors.default_indicator.clone())?;
        let func = self.indicator_func(descriptors, &indicator)?;
        Some((indicator, func))
    }

    pub fn compute(&self, descriptors: &KpiDescriptors, query: &Query) -> Result<Option<ComputeResult>, KpiError> {
        let Some((indicator, func)) = self.resolve(descriptors, query) else {
            tracing::debug!("Indicator {:?} is not available", query.indicator);
            return Ok(None);
        };

        let mut query = query.clone();
        query.indicator = Some(indicator);

        if query.group_by == Some(RangeId::Min) {
            if !descriptors.has_range(RangeId::Min) {
                return Ok(None);
            }
            query.period_interval = Some(descriptors.minute_seconds);
            tracing::debug!("Per-minute query at {}s resolution", descriptors.minute_seconds);
            return DirectKpi.compute(&query, &self.catalog).map(Some);
        }

        if func == KpiFunc::Direct {
            tracing::debug!("Direct series only exist per minute, not per {:?}", query.group_by);
            return Ok(None);
        }

        if func.is_periodic() {
            if query.group_by.is_none() {
                query.group_by = if func == KpiFunc::TypicalDay {
                    Some(RangeId::Days)
                } else {
                    self.options.default_range
                };
            }
            match query.group_by {
                Some(range) if descriptors.has_range(range) => {}
                range => {
                    tracing::debug!("Range {:?} is not available for {:?}", range, func);
                    return Ok(None);
                }
            }
        }

        func.compute(&query, &self.catalog).map(Some)
    }

    /// The query over its own data and over `compared_data`, when the range
    /// allows cross-period comparison.
    pub fn compare(&self, descriptors: &KpiDescriptors, query: &Query) -> Result<Option<Comparison>, KpiError> {
        let Some(compared) = &query.compared_data else {
            return Ok(None);
        };
        let Some((indicator, func)) = self.resolve(descriptors, query) else {
            return Ok(None);
        };
        if func == KpiFunc::TypicalDay {
            return Ok(None);
        }
        let range = match query.group_by {
            Some(range) => Some(range),
            None if func.is_periodic() => self.options.default_range,
            None => None,
        };
        if let Some(range) = range {
            if !self.is_period_comparable(descriptors, &indicator, range) {
                return Ok(None);
            }
        }

        let mut current_query = query.clone();
        current_query.allsitedata = None;
        current_query.compared_data = None;
        current_query.compared_period = None;

        let mut previous_query = current_query.clone();
        previous_query.sitedata = compared.clone();
        previous_query.period = query.compared_period.or(query.period);

        let Some(current) = self.compute(descriptors, &current_query)? else {
            return Ok(None);
        };
        let Some(previous) = self.compute(descriptors, &previous_query)? else {
            return Ok(None);
        };
        Ok(Some(Comparison::new(current, previous)))
    }

    pub fn is_period_computable(
        &self,
        descriptors: &KpiDescriptors,
        indicator: &str,
        period: &Period,
        range: RangeId,
    ) -> bool {
        match self.indicator_func(descriptors, indicator) {
            Some(KpiFunc::TypicalDay) => TypicalDayKpi::is_period_computable(range, period),
            _ => self.catalog.is_period_computable(period, range),
        }
    }

    /// Typical-day series are never comparable; other ranges use their static flag.
    pub fn is_period_comparable(&self, descriptors: &KpiDescriptors, indicator: &str, range: RangeId) -> bool {
        match self.indicator_func(descriptors, indicator) {
            Some(KpiFunc::TypicalDay) => false,
            _ => self.catalog.descriptor(range).comparable,
        }
    }

    pub fn time_format(
        &self,
        descriptors: &KpiDescriptors,
        indicator: &str,
        period: &Period,
        range: RangeId,
    ) -> &'static str {
        match self.indicator_func(descriptors, indicator) {
            Some(KpiFunc::TypicalDay) => TypicalDayKpi::time_format(range),
            _ => self.catalog.time_format(period, range),
        }
    }

    pub fn label(
        &self,
        descriptors: &KpiDescriptors,
        indicator: &str,
        range: RangeId,
        timestamp: i64,
    ) -> Result<String, KpiError> {
        let tz = self.catalog.tz();
        match self.indicator_func(descriptors, indicator) {
            Some(KpiFunc::TypicalDay) => TypicalDayKpi::label(range, timestamp, tz),
            _ => self
                .catalog
                .descriptor_with_minutes(range, descriptors.minute_seconds)
                .label(timestamp, tz),
        }
    }
}
