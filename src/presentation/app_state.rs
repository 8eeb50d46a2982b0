// Application state for HTTP handlers
use crate::application::kpi_service::KpiService;

#[derive(Clone)]
pub struct AppState {
    pub kpi_service: KpiService,
}
