// Scalar reducers shared by every KPI strategy, 0 on empty input
use serde::{Deserialize, Serialize};

use crate::domain::query::DataPoint;

/// Indicator whose per-bucket values are averaged instead of summed.
pub const OCCUPANCY: &str = "occ";

pub fn sum<T>(data: &[T], value: impl Fn(&T) -> f64) -> f64 {
    data.iter().map(value).sum()
}

pub fn mean<T>(data: &[T], value: impl Fn(&T) -> f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    sum(data, value) / data.len() as f64
}

pub fn max<T>(data: &[T], value: impl Fn(&T) -> f64) -> f64 {
    data.iter().map(value).reduce(f64::max).unwrap_or(0.0)
}

/// Rounds halves toward positive infinity (`2.5 -> 3`, `-2.5 -> -2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Sum,
    Mean,
    Max,
}

impl Reducer {
    pub fn apply<T>(&self, data: &[T], value: impl Fn(&T) -> f64) -> f64 {
        match self {
            Reducer::Sum => sum(data, value),
            Reducer::Mean => mean(data, value),
            Reducer::Max => max(data, value),
        }
    }

    /// Flow counters add up, occupancy is averaged.
    pub fn for_indicator(indicator: &str) -> Self {
        if indicator == OCCUPANCY {
            Reducer::Mean
        } else {
            Reducer::Sum
        }
    }
}

/// Headline number for a bucketed series: the total, or the floored
/// average bucket for occupancy.
pub fn headline_value(indicator: &str, series: &[DataPoint]) -> f64 {
    let total = sum(series, |point| point.y);
    if indicator == OCCUPANCY {
        if series.is_empty() {
            0.0
        } else {
            (total / series.len() as f64).floor()
        }
    } else {
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_zero() {
        let empty: Vec<f64> = vec![];
        assert_eq!(sum(&empty, |v| *v), 0.0);
        assert_eq!(mean(&empty, |v| *v), 0.0);
        assert_eq!(max(&empty, |v| *v), 0.0);
        for reducer in [Reducer::Sum, Reducer::Mean, Reducer::Max] {
            assert_eq!(reducer.apply(&empty, |v| *v), 0.0);
        }
    }

    #[test]
    fn test_reducers() {
        let data = vec![DataPoint::new(0, 2.0), DataPoint::new(1, 7.0), DataPoint::new(2, 3.0)];
        assert_eq!(sum(&data, |p| p.y), 12.0);
        assert_eq!(mean(&data, |p| p.y), 4.0);
        assert_eq!(max(&data, |p| p.y), 7.0);
    }

    #[test]
    fn test_max_of_negative_values() {
        let data = vec![-3.0, -1.0, -2.0];
        assert_eq!(max(&data, |v| *v), -1.0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(2.49), 2.0);
        assert_eq!(round_half_up(-2.5), -2.0);
    }

    #[test]
    fn test_headline_value() {
        let series = vec![DataPoint::new(0, 3.0), DataPoint::new(1, 4.0)];
        assert_eq!(headline_value("in", &series), 7.0);
        assert_eq!(headline_value(OCCUPANCY, &series), 3.0);
        assert_eq!(headline_value(OCCUPANCY, &[]), 0.0);
    }

    #[test]
    fn test_reducer_for_indicator() {
        assert_eq!(Reducer::for_indicator("occ"), Reducer::Mean);
        assert_eq!(Reducer::for_indicator("in"), Reducer::Sum);
    }
}
