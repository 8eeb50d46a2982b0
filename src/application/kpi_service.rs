// KPI service - Use case for computing KPIs over a site selection
use crate::application::count_data_repository::CountDataRepository;
use crate::domain::count_data::{Period, SiteSelection, SiteSeries};
use crate::domain::kpi::dispatcher::{KpiDescriptors, KpiDispatcher};
use crate::domain::kpi::range::RangeId;
use crate::domain::query::{Comparison, ComputeResult, Query, validate_period};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct KpiRequest {
    pub site_ids: Vec<String>,
    pub period: Period,
    pub indicator: Option<String>,
    pub group_by: Option<RangeId>,
    pub compared_period: Option<Period>,
}

#[derive(Debug, Serialize)]
pub struct KpiResponse {
    pub indicator: Option<String>,
    pub indicator_name: Option<String>,
    pub group_by: Option<RangeId>,
    pub period_computable: Option<bool>,
    pub time_format: Option<&'static str>,
    /// Display label of every point of `result.data`
    pub labels: Vec<String>,
    pub result: Option<ComputeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
}

#[derive(Clone)]
pub struct KpiService {
    repository: Arc<dyn CountDataRepository>,
    dispatcher: Arc<KpiDispatcher>,
}

impl KpiService {
    pub fn new(repository: Arc<dyn CountDataRepository>, dispatcher: Arc<KpiDispatcher>) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Indicators and ranges available for the selected sites
    pub async fn descriptors(
        &self,
        site_ids: &[String],
        period: Period,
        indicator: Option<&str>,
    ) -> anyhow::Result<KpiDescriptors> {
        let period = validate_period(period)?;
        let sites = self.fetch(site_ids, period).await?;
        Ok(self.dispatcher.discover(&sites, indicator))
    }

    pub async fn compute(&self, request: &KpiRequest) -> anyhow::Result<KpiResponse> {
        let period = validate_period(request.period)?;
        let compared_period = request.compared_period.map(validate_period).transpose()?;

        let sites = self.fetch(&request.site_ids, period).await?;
        let descriptors = self.dispatcher.discover(&sites, request.indicator.as_deref());

        let mut query = Query::new(selection(&sites)).period(period);
        query.indicator = request.indicator.clone().or_else(|| descriptors.default_indicator.clone());
        query.group_by = request.group_by;
        if sites.len() > 1 {
            query = query.all_sites(sites.clone());
        }

        let result = self.dispatcher.compute(&descriptors, &query)?;
        if result.is_none() {
            tracing::warn!(
                "Nothing to compute for indicator {:?} grouped by {:?}",
                query.indicator,
                query.group_by
            );
        }

        let group_by = result
            .as_ref()
            .and_then(|result| result.query.group_by)
            .or(query.group_by);
        let (period_computable, time_format, labels) = match (query.indicator.as_deref(), group_by) {
            (Some(indicator), Some(range)) => {
                let labels = match result.as_ref().and_then(|result| result.data.as_ref()) {
                    Some(data) => data
                        .iter()
                        .map(|point| self.dispatcher.label(&descriptors, indicator, range, point.x))
                        .collect::<Result<Vec<_>, _>>()?,
                    None => Vec::new(),
                };
                (
                    Some(self.dispatcher.is_period_computable(&descriptors, indicator, &period, range)),
                    Some(self.dispatcher.time_format(&descriptors, indicator, &period, range)),
                    labels,
                )
            }
            _ => (None, None, Vec::new()),
        };

        let comparison = match compared_period {
            Some(compared_period) => {
                let compared = self.fetch(&request.site_ids, compared_period).await?;
                let query = query.clone().compared(selection(&compared), Some(compared_period));
                self.dispatcher.compare(&descriptors, &query)?
            }
            None => None,
        };

        Ok(KpiResponse {
            indicator_name: query
                .indicator
                .as_deref()
                .and_then(|id| descriptors.indicator_name(id))
                .map(str::to_string),
            indicator: query.indicator,
            group_by,
            period_computable,
            time_format,
            labels,
            result,
            comparison,
        })
    }

    async fn fetch(&self, site_ids: &[String], period: Period) -> anyhow::Result<Vec<SiteSeries>> {
        if site_ids.is_empty() {
            anyhow::bail!("No site selected");
        }
        let sites = self
            .repository
            .fetch_sites(site_ids, period)
            .await
            .context("Failed to fetch counting data")?;
        tracing::debug!(
            "Fetched {} observations for {} sites",
            sites.iter().map(|site| site.data.len()).sum::<usize>(),
            sites.len()
        );
        Ok(sites)
    }
}

fn selection(sites: &[SiteSeries]) -> SiteSelection {
    match sites {
        [site] => SiteSelection::One(site.clone()),
        _ => SiteSelection::Many(sites.to_vec()),
    }
}
