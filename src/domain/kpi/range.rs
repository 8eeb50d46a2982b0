// Aggregation ranges - bucket widths, alignment and labels
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::error::KpiError;
use crate::domain::count_data::{Period, SiteSeries};

pub const NSEC_15MIN: i64 = 900;
pub const NSEC_HOUR: i64 = 3_600;
pub const NSEC_DAY: i64 = 24 * NSEC_HOUR;
pub const NSEC_WEEK: i64 = 7 * NSEC_DAY;
pub const NSEC_MONTH: i64 = 30 * NSEC_DAY;

/// Most buckets a single series may hold.
pub const MAX_BUCKETS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeId {
    Min,
    Hours,
    Days,
    Week,
    Month,
}

impl RangeId {
    pub const ALL: [RangeId; 5] = [
        RangeId::Min,
        RangeId::Hours,
        RangeId::Days,
        RangeId::Week,
        RangeId::Month,
    ];

    pub fn default_name(&self) -> &'static str {
        match self {
            RangeId::Min => "Minutes",
            RangeId::Hours => "Hours",
            RangeId::Days => "Days",
            RangeId::Week => "Week",
            RangeId::Month => "Month",
        }
    }
}

/// Bucket width of every range, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSeconds {
    pub min: i64,
    pub hours: i64,
    pub days: i64,
    pub week: i64,
    pub month: i64,
}

impl RangeSeconds {
    pub fn get(&self, id: RangeId) -> i64 {
        match id {
            RangeId::Min => self.min,
            RangeId::Hours => self.hours,
            RangeId::Days => self.days,
            RangeId::Week => self.week,
            RangeId::Month => self.month,
        }
    }
}

impl Default for RangeSeconds {
    fn default() -> Self {
        Self {
            min: NSEC_15MIN,
            hours: NSEC_HOUR,
            days: NSEC_DAY,
            week: NSEC_WEEK,
            month: NSEC_MONTH,
        }
    }
}

/// One granularity. Buckets are aligned in a fixed UTC offset: minute, hour
/// and day buckets on multiples of their width, weeks on Sunday and months on
/// the first calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeDescriptor {
    pub id: RangeId,
    pub name: String,
    pub seconds: i64,
    pub comparable: bool,
    pub hour_mode: bool,
}

impl RangeDescriptor {
    pub fn new(id: RangeId, seconds: i64) -> Self {
        Self {
            id,
            name: id.default_name().to_string(),
            seconds,
            comparable: id != RangeId::Month,
            hour_mode: matches!(id, RangeId::Min | RangeId::Hours),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether buckets of this width make sense for `period`.
    pub fn is_period_computable(&self, period: &Period, tz: FixedOffset) -> bool {
        match self.id {
            RangeId::Min => period.diff_days() <= 2,
            RangeId::Hours => period.diff_days() <= 14,
            RangeId::Days => period.diff_days() >= 1,
            RangeId::Week => period.diff_weeks() >= 1,
            RangeId::Month => diff_months(period, tz).map(|months| months >= 1).unwrap_or(false),
        }
    }

    pub fn label_format(&self) -> &'static str {
        match self.id {
            RangeId::Min | RangeId::Hours => "%H:%M",
            RangeId::Days | RangeId::Week => "%b %d",
            RangeId::Month => "%B %Y",
        }
    }

    /// Display label of a bucket starting at `timestamp`.
    pub fn label(&self, timestamp: i64, tz: FixedOffset) -> Result<String, KpiError> {
        Ok(local_time(timestamp, tz)?.format(self.label_format()).to_string())
    }

    pub fn bucket_start(&self, timestamp: i64, tz: FixedOffset) -> Result<i64, KpiError> {
        match self.id {
            RangeId::Min | RangeId::Hours | RangeId::Days => Ok(align(timestamp, self.seconds, tz)),
            RangeId::Week => start_of_week(timestamp, tz),
            RangeId::Month => start_of_month(timestamp, tz),
        }
    }

    pub fn next_bucket(&self, start: i64, tz: FixedOffset) -> Result<i64, KpiError> {
        match self.id {
            RangeId::Min | RangeId::Hours | RangeId::Days => start
                .checked_add(self.seconds)
                .ok_or(KpiError::InvalidTimestamp(start)),
            RangeId::Week => start.checked_add(NSEC_WEEK).ok_or(KpiError::InvalidTimestamp(start)),
            RangeId::Month => local_time(start, tz)?
                .checked_add_months(Months::new(1))
                .map(|dt| dt.timestamp())
                .ok_or(KpiError::InvalidTimestamp(start)),
        }
    }

    /// Start of every bucket overlapping `period`, in order.
    pub fn buckets(&self, period: &Period, tz: FixedOffset) -> Result<Vec<i64>, KpiError> {
        let mut buckets = Vec::new();
        let mut start = self.bucket_start(period.start_date, tz)?;
        while start < period.end_date {
            if buckets.len() >= MAX_BUCKETS {
                return Err(KpiError::InvalidQuery(format!(
                    "{:?} grouping of {}..{} needs more than {} buckets",
                    self.id, period.start_date, period.end_date, MAX_BUCKETS
                )));
            }
            buckets.push(start);
            let next = self.next_bucket(start, tz)?;
            if next <= start {
                return Err(KpiError::InvalidQuery(format!(
                    "{:?} buckets must have a positive width",
                    self.id
                )));
            }
            start = next;
        }
        Ok(buckets)
    }
}

/// Static catalog of granularities with their configured widths.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCatalog {
    seconds: RangeSeconds,
    tz: FixedOffset,
}

impl RangeCatalog {
    pub fn new(seconds: RangeSeconds, tz: FixedOffset) -> Self {
        Self { seconds, tz }
    }

    pub fn tz(&self) -> FixedOffset {
        self.tz
    }

    pub fn minute_seconds(&self) -> i64 {
        self.seconds.min
    }

    pub fn descriptor(&self, id: RangeId) -> RangeDescriptor {
        RangeDescriptor::new(id, self.seconds.get(id))
    }

    /// Descriptor where the minute width is replaced by the detected sampling step.
    pub fn descriptor_with_minutes(&self, id: RangeId, minute_seconds: i64) -> RangeDescriptor {
        match id {
            RangeId::Min => RangeDescriptor::new(id, minute_seconds),
            _ => self.descriptor(id),
        }
    }

    pub fn is_period_computable(&self, period: &Period, id: RangeId) -> bool {
        self.descriptor(id).is_period_computable(period, self.tz)
    }

    /// Axis format for a period grouped by `id`, depending on the period length.
    pub fn time_format(&self, period: &Period, id: RangeId) -> &'static str {
        if period.diff_weeks() > 8 {
            "%B %Y"
        } else if period.diff_days() > 2 {
            "%b %d"
        } else if self.descriptor(id).hour_mode {
            "%H:%M"
        } else {
            "%b %d"
        }
    }
}

impl Default for RangeCatalog {
    fn default() -> Self {
        Self::new(RangeSeconds::default(), Utc.fix())
    }
}

/// Sampling interval of a site: the smallest gap between distinct
/// timestamps, else the first sample duration, else `fallback`.
pub fn data_step_seconds(site: &SiteSeries, fallback: i64) -> i64 {
    let mut times: Vec<i64> = site.data.iter().map(|obs| obs.time).collect();
    times.sort_unstable();
    times.dedup();

    times
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .min()
        .or_else(|| site.data.first().and_then(|obs| obs.duration).filter(|d| *d > 0))
        .unwrap_or(fallback)
}

pub fn local_time(timestamp: i64, tz: FixedOffset) -> Result<DateTime<FixedOffset>, KpiError> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.with_timezone(&tz))
        .ok_or(KpiError::InvalidTimestamp(timestamp))
}

fn align(timestamp: i64, width: i64, tz: FixedOffset) -> i64 {
    if width <= 0 {
        return timestamp;
    }
    let offset = tz.local_minus_utc() as i64;
    timestamp.saturating_sub(timestamp.saturating_add(offset).rem_euclid(width))
}

pub fn start_of_hour(timestamp: i64, tz: FixedOffset) -> i64 {
    align(timestamp, NSEC_HOUR, tz)
}

pub fn start_of_day(timestamp: i64, tz: FixedOffset) -> i64 {
    align(timestamp, NSEC_DAY, tz)
}

/// Local Sunday 00:00 of the week containing `timestamp`.
pub fn start_of_week(timestamp: i64, tz: FixedOffset) -> Result<i64, KpiError> {
    let weekday = local_time(timestamp, tz)?.weekday().num_days_from_sunday() as i64;
    Ok(start_of_day(timestamp, tz) - weekday * NSEC_DAY)
}

fn start_of_month(timestamp: i64, tz: FixedOffset) -> Result<i64, KpiError> {
    let local = local_time(timestamp, tz)?;
    NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).single())
        .map(|dt| dt.timestamp())
        .ok_or(KpiError::InvalidTimestamp(timestamp))
}

/// Whole calendar months between the period bounds.
fn diff_months(period: &Period, tz: FixedOffset) -> Result<i64, KpiError> {
    let start = local_time(period.start_date, tz)?;
    let end = local_time(period.end_date, tz)?;
    let mut months = (end.year() - start.year()) as i64 * 12 + end.month() as i64 - start.month() as i64;
    let end_rest = (end.day(), end.num_seconds_from_midnight());
    let start_rest = (start.day(), start.num_seconds_from_midnight());
    if months > 0 && end_rest < start_rest {
        months -= 1;
    }
    Ok(months)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::count_data::Observation;

    // Sunday 2024-03-03 00:00:00 UTC
    const SUNDAY: i64 = 1_709_424_000;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_week_computable_iff_at_least_one_week() {
        let week = RangeDescriptor::new(RangeId::Week, NSEC_WEEK);
        assert!(week.is_period_computable(&Period::new(SUNDAY, SUNDAY + 8 * NSEC_DAY), utc()));
        assert!(!week.is_period_computable(&Period::new(SUNDAY, SUNDAY + 6 * NSEC_DAY), utc()));
        assert!(week.is_period_computable(&Period::new(SUNDAY, SUNDAY + NSEC_WEEK), utc()));
    }

    #[test]
    fn test_month_computable_uses_calendar_months() {
        let month = RangeDescriptor::new(RangeId::Month, NSEC_MONTH);
        // 2024-03-03 .. 2024-04-03
        assert!(month.is_period_computable(&Period::new(SUNDAY, SUNDAY + 31 * NSEC_DAY), utc()));
        // 2024-03-03 .. 2024-04-02
        assert!(!month.is_period_computable(&Period::new(SUNDAY, SUNDAY + 30 * NSEC_DAY), utc()));
    }

    #[test]
    fn test_comparability_is_static() {
        let catalog = RangeCatalog::default();
        assert!(catalog.descriptor(RangeId::Hours).comparable);
        assert!(catalog.descriptor(RangeId::Week).comparable);
        assert!(!catalog.descriptor(RangeId::Month).comparable);
    }

    #[test]
    fn test_bucket_alignment_with_offset() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let days = RangeDescriptor::new(RangeId::Days, NSEC_DAY);
        // 23:30 UTC on Sunday is 01:30 local Monday
        let ts = SUNDAY + 23 * NSEC_HOUR + 1800;
        assert_eq!(days.bucket_start(ts, plus_two).unwrap(), SUNDAY + 22 * NSEC_HOUR);
        assert_eq!(days.bucket_start(ts, utc()).unwrap(), SUNDAY);
    }

    #[test]
    fn test_week_buckets_start_on_sunday() {
        let week = RangeDescriptor::new(RangeId::Week, NSEC_WEEK);
        let wednesday = SUNDAY + 3 * NSEC_DAY + 5 * NSEC_HOUR;
        assert_eq!(week.bucket_start(wednesday, utc()).unwrap(), SUNDAY);
    }

    #[test]
    fn test_month_buckets_follow_calendar() {
        let month = RangeDescriptor::new(RangeId::Month, NSEC_MONTH);
        let buckets = month
            .buckets(&Period::new(SUNDAY, SUNDAY + 60 * NSEC_DAY), utc())
            .unwrap();
        // 2024-03-01, 2024-04-01, 2024-05-01
        assert_eq!(buckets, vec![1_709_251_200, 1_711_929_600, 1_714_521_600]);
    }

    #[test]
    fn test_hour_buckets_cover_period() {
        let hours = RangeDescriptor::new(RangeId::Hours, NSEC_HOUR);
        let buckets = hours
            .buckets(&Period::new(SUNDAY + 600, SUNDAY + 3 * NSEC_HOUR), utc())
            .unwrap();
        assert_eq!(buckets, vec![SUNDAY, SUNDAY + NSEC_HOUR, SUNDAY + 2 * NSEC_HOUR]);
    }

    #[test]
    fn test_bucket_count_is_capped() {
        let slots = RangeDescriptor::new(RangeId::Min, 60);
        let five_years = Period::new(SUNDAY, SUNDAY + 5 * 365 * NSEC_DAY);
        assert!(matches!(slots.buckets(&five_years, utc()), Err(KpiError::InvalidQuery(_))));

        let two_days = Period::new(SUNDAY, SUNDAY + 2 * NSEC_DAY);
        assert_eq!(slots.buckets(&two_days, utc()).unwrap().len(), 2 * 24 * 60);
    }

    #[test]
    fn test_alignment_at_timestamp_bounds() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let hours = RangeDescriptor::new(RangeId::Hours, NSEC_HOUR);
        assert!(hours.bucket_start(i64::MAX, plus_two).unwrap() <= i64::MAX);
        assert!(hours.bucket_start(i64::MIN, utc()).is_ok());
        assert!(hours.next_bucket(i64::MAX - 10, utc()).is_err());
    }

    #[test]
    fn test_zero_width_buckets_are_rejected() {
        let broken = RangeDescriptor::new(RangeId::Min, 0);
        assert!(broken.buckets(&Period::new(SUNDAY, SUNDAY + 60), utc()).is_err());
    }

    #[test]
    fn test_labels() {
        let catalog = RangeCatalog::default();
        let ts = SUNDAY + 13 * NSEC_HOUR + 15 * 60;
        assert_eq!(catalog.descriptor(RangeId::Hours).label(ts, utc()).unwrap(), "13:15");
        assert_eq!(catalog.descriptor(RangeId::Days).label(ts, utc()).unwrap(), "Mar 03");
        assert_eq!(catalog.descriptor(RangeId::Month).label(ts, utc()).unwrap(), "March 2024");
    }

    #[test]
    fn test_time_format_depends_on_span() {
        let catalog = RangeCatalog::default();
        let short = Period::new(SUNDAY, SUNDAY + NSEC_DAY);
        let medium = Period::new(SUNDAY, SUNDAY + 5 * NSEC_DAY);
        let long = Period::new(SUNDAY, SUNDAY + 10 * NSEC_WEEK);
        assert_eq!(catalog.time_format(&short, RangeId::Hours), "%H:%M");
        assert_eq!(catalog.time_format(&short, RangeId::Days), "%b %d");
        assert_eq!(catalog.time_format(&medium, RangeId::Hours), "%b %d");
        assert_eq!(catalog.time_format(&long, RangeId::Hours), "%B %Y");
    }

    #[test]
    fn test_data_step_seconds() {
        let site = SiteSeries::new(
            "s",
            vec![
                Observation::new(0, "in", 1.0),
                Observation::new(0, "out", 1.0),
                Observation::new(300, "in", 1.0),
                Observation::new(900, "in", 1.0),
            ],
        );
        assert_eq!(data_step_seconds(&site, NSEC_15MIN), 300);

        let single = SiteSeries::new("s", vec![Observation::new(0, "in", 1.0).with_duration(600)]);
        assert_eq!(data_step_seconds(&single, NSEC_15MIN), 600);

        assert_eq!(data_step_seconds(&SiteSeries::default(), NSEC_15MIN), NSEC_15MIN);
    }
}
