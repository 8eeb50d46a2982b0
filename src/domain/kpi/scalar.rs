// Scalar KPIs: one headline number per query
use super::KpiStrategy;
use super::compute::{self, Reducer, round_half_up};
use super::error::KpiError;
use super::range::RangeCatalog;
use crate::domain::count_data::SiteSeries;
use crate::domain::query::{ComputeResult, Query};

/// Applies `reducer` to the indicator values of every aggregated site.
fn per_site(sites: &[SiteSeries], indicator: &str, reducer: Reducer) -> Vec<f64> {
    sites
        .iter()
        .map(|site| {
            let values: Vec<f64> = site.values_for(indicator).map(|obs| obs.value).collect();
            reducer.apply(&values, |v| *v)
        })
        .collect()
}

/// Total of the indicator, added across sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumKpi;

impl KpiStrategy for SumKpi {
    fn compute(&self, query: &Query, _catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        let indicator = query.require_indicator()?;
        let totals = per_site(query.aggregation_sites(), indicator, Reducer::Sum);
        Ok(ComputeResult::scalar(query, compute::sum(&totals, |v| *v)))
    }
}

/// Largest single observation across sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxKpi;

impl KpiStrategy for MaxKpi {
    fn compute(&self, query: &Query, _catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        let indicator = query.require_indicator()?;
        let maxima = per_site(query.aggregation_sites(), indicator, Reducer::Max);
        Ok(ComputeResult::scalar(query, compute::max(&maxima, |v| *v)))
    }
}

/// Throughput rate: the summed indicator divided by the period length in
/// seconds, rounded to an integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanKpi;

impl KpiStrategy for MeanKpi {
    fn compute(&self, query: &Query, _catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        let indicator = query.require_indicator()?;
        let period = query.require_period()?;
        let totals = per_site(query.aggregation_sites(), indicator, Reducer::Sum);
        let total = compute::sum(&totals, |v| *v);
        Ok(ComputeResult::scalar(
            query,
            round_half_up(total / period.seconds() as f64),
        ))
    }
}

/// Share of the selected site's total relative to the busiest site, in percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxSiteRatioKpi;

impl KpiStrategy for MaxSiteRatioKpi {
    fn compute(&self, query: &Query, _catalog: &RangeCatalog) -> Result<ComputeResult, KpiError> {
        let indicator = query.require_indicator()?;
        let own = compute::sum(&per_site(query.sitedata.sites(), indicator, Reducer::Sum), |v| *v);
        let busiest = compute::max(
            &per_site(query.aggregation_sites(), indicator, Reducer::Sum),
            |v| *v,
        );

        let value = if busiest > 0.0 {
            round_half_up(100.0 * own / busiest)
        } else {
            0.0
        };
        Ok(ComputeResult::scalar(query, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::count_data::{Observation, Period};

    fn site(id: &str, rows: &[(i64, &str, f64)]) -> SiteSeries {
        SiteSeries::new(
            id,
            rows.iter()
                .map(|(time, key, value)| Observation::new(*time, *key, *value))
                .collect(),
        )
    }

    fn catalog() -> RangeCatalog {
        RangeCatalog::default()
    }

    #[test]
    fn test_sum_filters_indicator() {
        let data = site("a", &[(0, "in", 4.0), (900, "out", 10.0), (1800, "in", 6.0)]);
        let result = SumKpi.compute(&Query::new(data).indicator("in"), &catalog()).unwrap();
        assert_eq!(result.value, 10.0);
        assert!(result.data.is_none());
    }

    #[test]
    fn test_sum_adds_across_all_sites() {
        let a = site("a", &[(0, "in", 4.0)]);
        let b = site("b", &[(0, "in", 5.0), (900, "in", 1.0)]);
        let query = Query::new(a.clone()).indicator("in").all_sites(vec![a, b]);
        assert_eq!(SumKpi.compute(&query, &catalog()).unwrap().value, 10.0);
    }

    #[test]
    fn test_empty_indicator_yields_zero() {
        let data = site("a", &[(0, "out", 4.0)]);
        let period = Period::new(0, 3600);
        for strategy in [&SumKpi as &dyn KpiStrategy, &MaxKpi, &MeanKpi, &MaxSiteRatioKpi] {
            let query = Query::new(data.clone()).indicator("in").period(period);
            assert_eq!(strategy.compute(&query, &catalog()).unwrap().value, 0.0);
        }
    }

    #[test]
    fn test_max_across_sites() {
        let a = site("a", &[(0, "occ", 4.0), (900, "occ", 12.0)]);
        let b = site("b", &[(0, "occ", 9.0)]);
        let query = Query::new(a.clone()).indicator("occ").all_sites(vec![a, b]);
        assert_eq!(MaxKpi.compute(&query, &catalog()).unwrap().value, 12.0);
    }

    #[test]
    fn test_mean_is_rate_over_period_seconds() {
        let data = site("a", &[(0, "in", 4000.0), (900, "in", 3200.0)]);
        let query = Query::new(data).indicator("in").period(Period::new(0, 3600));
        // round(7200 / 3600)
        assert_eq!(MeanKpi.compute(&query, &catalog()).unwrap().value, 2.0);

        let data = site("a", &[(0, "in", 5400.0)]);
        let query = Query::new(data).indicator("in").period(Period::new(0, 3600));
        // 1.5 rounds up
        assert_eq!(MeanKpi.compute(&query, &catalog()).unwrap().value, 2.0);
    }

    #[test]
    fn test_mean_sums_all_sites_before_dividing() {
        let a = site("a", &[(0, "in", 100.0)]);
        let b = site("b", &[(0, "in", 300.0)]);
        let query = Query::new(a.clone())
            .indicator("in")
            .period(Period::new(0, 100))
            .all_sites(vec![a, b]);
        assert_eq!(MeanKpi.compute(&query, &catalog()).unwrap().value, 4.0);
    }

    #[test]
    fn test_mean_requires_period() {
        let query = Query::new(site("a", &[(0, "in", 1.0)])).indicator("in");
        assert!(matches!(
            MeanKpi.compute(&query, &catalog()),
            Err(KpiError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_max_site_ratio() {
        let a = site("a", &[(0, "in", 25.0)]);
        let b = site("b", &[(0, "in", 40.0), (900, "in", 60.0)]);
        let query = Query::new(a.clone()).indicator("in").all_sites(vec![a, b.clone()]);
        assert_eq!(MaxSiteRatioKpi.compute(&query, &catalog()).unwrap().value, 25.0);

        let query = Query::new(b.clone()).indicator("in").all_sites(vec![b]);
        assert_eq!(MaxSiteRatioKpi.compute(&query, &catalog()).unwrap().value, 100.0);
    }
}
