// Per-period KPIs: bucketed series over the query period
use std::collections::BTreeMap;

use super::KpiStrategy;
use super::compute::{self, Reducer, headline_value, round_half_up};
use super::error::KpiError;
use super::range::{RangeCatalog, RangeDescriptor, RangeId};
use crate::domain::query::{ComputeResult, DataPoint, Query};

/// Groups observations into the buckets of `query.group_by` and reduces
/// each bucket. Buckets without data are emitted as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodKpi {
    /// `None` picks the reducer from the indicator (mean for occupancy).
    reducer: Option<Reducer>,
}

impl PeriodKpi {
    pub fn with_reducer(reducer: Reducer) -> Self {
        Self {
            reducer: Some(reducer),
        }
    }

    pub fn by_indicator() -> Self {
        Self { reducer: None }
    }
}

impl KpiStrategy for PeriodKpi {
    fn compute(&self, query: &Query, catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        let indicator = query.require_indicator()?;
        let period = query.require_period()?;
        let range = query
            .group_by
            .ok_or_else(|| KpiError::InvalidQuery("missing group_by".to_string()))?;
        let descriptor = catalog.descriptor(range);
        let reducer = self.reducer.unwrap_or_else(|| Reducer::for_indicator(indicator));
        let tz = catalog.tz();

        let mut grouped: BTreeMap<i64, Vec<f64>> = descriptor
            .buckets(&period, tz)?
            .into_iter()
            .map(|bucket| (bucket, Vec::new()))
            .collect();

        for obs in query.sitedata.values_for(indicator) {
            if !period.contains(obs.time) {
                continue;
            }
            let bucket = descriptor.bucket_start(obs.time, tz)?;
            if let Some(values) = grouped.get_mut(&bucket) {
                values.push(obs.value);
            }
        }

        let data: Vec<DataPoint> = grouped
            .into_iter()
            .map(|(x, values)| DataPoint::new(x, reducer.apply(&values, |v| *v)))
            .collect();

        let value = match self.reducer {
            Some(Reducer::Sum) => compute::sum(&data, |p| p.y),
            Some(Reducer::Max) => compute::max(&data, |p| p.y),
            Some(Reducer::Mean) => round_half_up(compute::mean(&data, |p| p.y)),
            None => headline_value(indicator, &data),
        };

        Ok(ComputeResult::series(query, value, data))
    }
}

/// Per-minute path: emits samples at their native resolution, one slot of
/// `query.period_interval` seconds per sample, zero-filled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectKpi;

impl KpiStrategy for DirectKpi {
    fn compute(&self, query: &Query, catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        let indicator = query.require_indicator()?;
        let period = query.require_period()?;
        let interval = query
            .period_interval
            .filter(|seconds| *seconds > 0)
            .ok_or_else(|| KpiError::InvalidQuery("missing period interval".to_string()))?;
        let slots = RangeDescriptor::new(RangeId::Min, interval);
        let tz = catalog.tz();

        let mut series: BTreeMap<i64, f64> = slots
            .buckets(&period, tz)?
            .into_iter()
            .map(|slot| (slot, 0.0))
            .collect();

        for obs in query.sitedata.values_for(indicator) {
            if !period.contains(obs.time) {
                continue;
            }
            let slot = slots.bucket_start(obs.time, tz)?;
            if let Some(y) = series.get_mut(&slot) {
                *y += obs.value;
            }
        }

        let data: Vec<DataPoint> = series.into_iter().map(|(x, y)| DataPoint::new(x, y)).collect();
        let value = headline_value(indicator, &data);
        Ok(ComputeResult::series(query, value, data))
    }
}
