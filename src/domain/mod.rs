// Domain layer - Counting data, queries and the KPI engine
pub mod count_data;
pub mod kpi;
pub mod query;
