// KPI aggregation engine
pub mod compute;
pub mod dispatcher;
pub mod error;
pub mod period;
pub mod range;
pub mod scalar;
pub mod typical_day;

use crate::domain::query::{ComputeResult, Query};
use error::KpiError;
use range::RangeCatalog;

/// Common contract of every aggregation strategy.
pub trait KpiStrategy {
    fn compute(&self, query: &Query, catalog: &RangeCatalog) -> Result<ComputeResult, KpiError>;
}
