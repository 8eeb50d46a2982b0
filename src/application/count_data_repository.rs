// Repository trait for counting data access
use crate::domain::count_data::{Period, SiteSeries};
use async_trait::async_trait;
use futures::future::try_join_all;

#[async_trait]
pub trait CountDataRepository: Send + Sync {
    /// Raw counting data of one site within a period
    async fn fetch_site(&self, site_id: &str, period: Period) -> anyhow::Result<SiteSeries>;

    /// Raw counting data of a set of sites, fetched concurrently
    async fn fetch_sites(&self, site_ids: &[String], period: Period) -> anyhow::Result<Vec<SiteSeries>> {
        try_join_all(site_ids.iter().map(|id| self.fetch_site(id, period))).await
    }
}
