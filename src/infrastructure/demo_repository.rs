// Synthetic counting data, used when no counting API is configured
use crate::application::count_data_repository::CountDataRepository;
use crate::domain::count_data::{Observation, Period, SiteSeries};
use crate::domain::kpi::range::NSEC_15MIN;
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;

#[derive(Debug, Clone, Default)]
pub struct DemoCountDataRepository;

impl DemoCountDataRepository {
    pub fn new() -> Self {
        Self
    }

    /// One random "in" and "out" count every 15 minutes of the period
    fn generate(site_id: &str, period: Period) -> SiteSeries {
        let mut rng = rand::thread_rng();
        let mut data = Vec::new();
        let mut time = period.start_date;
        while time < period.end_date {
            for key in ["in", "out"] {
                let value = rng.gen_range(0..50) as f64;
                data.push(Observation::new(time, key, value).with_duration(NSEC_15MIN));
            }
            time += NSEC_15MIN;
        }
        SiteSeries::new(site_id, data)
    }
}

#[async_trait]
impl CountDataRepository for DemoCountDataRepository {
    async fn fetch_site(&self, site_id: &str, period: Period) -> Result<SiteSeries> {
        Ok(Self::generate(site_id, period))
    }
}
