// Application layer - Use cases over the KPI engine
pub mod count_data_repository;
pub mod kpi_service;
