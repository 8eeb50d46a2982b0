// KPI computation errors
use thiserror::Error;

use super::dispatcher::KpiFunc;
use super::range::RangeId;

#[derive(Debug, Error, PartialEq)]
pub enum KpiError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{func:?} cannot group by {range:?}")]
    UnsupportedRange { func: KpiFunc, range: RangeId },

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}
