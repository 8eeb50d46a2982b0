// Typical day / typical week KPI
use std::collections::BTreeMap;

use chrono::{Datelike, FixedOffset, Timelike};

use super::KpiStrategy;
use super::compute::{self, Reducer, headline_value, round_half_up};
use super::dispatcher::KpiFunc;
use super::error::KpiError;
use super::range::{NSEC_DAY, NSEC_HOUR, RangeCatalog, RangeId, local_time, start_of_day, start_of_hour, start_of_week};
use crate::domain::count_data::Period;
use crate::domain::query::{ComputeResult, DataPoint, Query};

/// Noon on Sunday 1970-01-04, used when the query has no period.
const FALLBACK_REFERENCE: i64 = 3 * NSEC_DAY + 12 * NSEC_HOUR;

/// Reduces observations per historical hour (or day), then averages the
/// instances of each hour-of-day (or weekday) onto a reference week. Every
/// slot is present in the output, zero when no instance exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypicalDayKpi;

impl TypicalDayKpi {
    pub fn supports(range: RangeId) -> bool {
        matches!(range, RangeId::Days | RangeId::Week)
    }

    pub fn is_period_computable(range: RangeId, period: &Period) -> bool {
        match range {
            RangeId::Days => true,
            RangeId::Week => period.diff_weeks() >= 1,
            _ => false,
        }
    }

    pub fn time_format(range: RangeId) -> &'static str {
        if range == RangeId::Days { "%H:%M" } else { "%a" }
    }

    pub fn label(range: RangeId, timestamp: i64, tz: FixedOffset) -> Result<String, KpiError> {
        let format = if range == RangeId::Days { "%H:%M" } else { "%A" };
        Ok(local_time(timestamp, tz)?.format(format).to_string())
    }

    fn grouping_timestamp(range: RangeId, timestamp: i64, tz: FixedOffset) -> i64 {
        match range {
            RangeId::Days => start_of_hour(timestamp, tz),
            _ => start_of_day(timestamp, tz),
        }
    }

    fn normalised_timestamp(
        range: RangeId,
        reference: i64,
        timestamp: i64,
        tz: FixedOffset,
    ) -> Result<i64, KpiError> {
        let local = local_time(timestamp, tz)?;
        Ok(match range {
            RangeId::Days => reference + local.hour() as i64 * NSEC_HOUR,
            _ => reference + local.weekday().num_days_from_sunday() as i64 * NSEC_DAY,
        })
    }

    fn default_slots(range: RangeId, reference: i64) -> Vec<i64> {
        match range {
            RangeId::Days => (0..24).map(|hour| reference + hour * NSEC_HOUR).collect(),
            _ => (0..7).map(|day| reference + day * NSEC_DAY).collect(),
        }
    }
}

impl KpiStrategy for TypicalDayKpi {
    fn compute(&self, query: &Query, catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        let indicator = query.require_indicator()?;
        let range = query
            .group_by
            .ok_or_else(|| KpiError::InvalidQuery("missing group_by".to_string()))?;
        if !Self::supports(range) {
            return Err(KpiError::UnsupportedRange {
                func: KpiFunc::TypicalDay,
                range,
            });
        }

        let tz = catalog.tz();
        let reference = match query.period {
            Some(period) => start_of_week(period.start_date, tz)?,
            None => start_of_week(FALLBACK_REFERENCE, tz)?,
        };
        let reducer = Reducer::for_indicator(indicator);

        let mut instances: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for obs in query.sitedata.values_for(indicator) {
            instances
                .entry(Self::grouping_timestamp(range, obs.time, tz))
                .or_default()
                .push(obs.value);
        }

        let mut slots: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for (moment, values) in instances {
            slots
                .entry(Self::normalised_timestamp(range, reference, moment, tz)?)
                .or_default()
                .push(reducer.apply(&values, |v| *v));
        }

        let mut averages: BTreeMap<i64, f64> = slots
            .into_iter()
            .map(|(slot, values)| (slot, compute::mean(&values, |v| *v)))
            .collect();
        for slot in Self::default_slots(range, reference) {
            averages.entry(slot).or_insert(0.0);
        }

        let data: Vec<DataPoint> = averages
            .into_iter()
            .map(|(x, y)| DataPoint::new(x, round_half_up(y)))
            .collect();
        let value = headline_value(indicator, &data);

        Ok(ComputeResult::series(query, value, data))
    }
}
