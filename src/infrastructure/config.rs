use crate::domain::kpi::dispatcher::{KpiDispatcher, KpiFunc, KpiOptions, KpiParams, RangeOption};
use crate::domain::kpi::range::{RangeCatalog, RangeId, RangeSeconds};
use anyhow::Context;
use chrono::FixedOffset;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub data_source: DataSourceSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub listen: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Demo,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourceSettings {
    pub kind: DataSourceKind,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Offset of the local time used for bucketing, in minutes east of UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub range_seconds: RangeSeconds,
    pub default_func: KpiFunc,
    #[serde(default)]
    pub default_range: Option<RangeId>,
    pub ranges: Vec<RangeOption>,
    pub kpis: Vec<KpiParams>,
}

impl EngineConfig {
    pub fn into_dispatcher(self) -> anyhow::Result<KpiDispatcher> {
        let tz = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .with_context(|| format!("Invalid UTC offset: {} minutes", self.utc_offset_minutes))?;

        for id in RangeId::ALL {
            if self.range_seconds.get(id) <= 0 {
                anyhow::bail!("Range {:?} must have a positive width", id);
            }
        }

        let options = KpiOptions {
            kpis: self.kpis,
            ranges: self.ranges,
            default_func: self.default_func,
            default_range: self.default_range,
        };
        Ok(KpiDispatcher::new(options, RangeCatalog::new(self.range_seconds, tz)))
    }
}

pub fn load_engine_config() -> anyhow::Result<EngineConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/engine"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/server"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
