// Counting data API repository implementation
use crate::application::count_data_repository::CountDataRepository;
use crate::domain::count_data::{Observation, Period, SiteSeries};
use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpCountDataRepository {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCountDataRepository {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn countdata_url(&self, site_id: &str) -> String {
        format!(
            "{}/items/{}/countdata",
            self.base_url,
            urlencoding::encode(site_id)
        )
    }
}

#[async_trait]
impl CountDataRepository for HttpCountDataRepository {
    async fn fetch_site(&self, site_id: &str, period: Period) -> Result<SiteSeries> {
        let url = self.countdata_url(site_id);
        tracing::debug!(
            "Fetching counting data from {} ({}..{})",
            url,
            period.start_date,
            period.end_date
        );

        let response = self
            .client
            .get(&url)
            .query(&[("start", period.start_date), ("end", period.end_date)])
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to counting data API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Counting data request failed with status {}: {}", status, body);
        }

        let data = response
            .json::<Vec<Observation>>()
            .await
            .context("Failed to parse counting data response")?;

        Ok(SiteSeries::new(site_id, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdata_url() {
        let repository = HttpCountDataRepository::new("http://localhost:3000/".to_string());
        assert_eq!(
            repository.countdata_url("site 1"),
            "http://localhost:3000/items/site%201/countdata"
        );
    }

    #[test]
    fn test_countdata_payload() {
        let payload = r#"[
            {"time": 1709424000, "key": "in", "value": 12, "duration": 900},
            {"time": 1709424000, "key": "occ", "value": 4.5}
        ]"#;
        let data: Vec<Observation> = serde_json::from_str(payload).unwrap();
        assert_eq!(data[0], Observation::new(1_709_424_000, "in", 12.0).with_duration(900));
        assert_eq!(data[1].duration, None);
    }
}
