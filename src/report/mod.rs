//! Output rendering for dashboard commands.

pub mod csv;
pub mod generator;

pub use csv::{daily_to_csv, kpis_to_csv, records_to_csv, templates_to_csv};
pub use generator::{
    generate_daily_markdown, generate_json, generate_kpi_markdown, generate_records_markdown,
    generate_templates_markdown,
};
