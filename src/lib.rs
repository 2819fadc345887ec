//! Subscription retention analytics.
//!
//! Turns a validated snapshot of subscription customers into revenue and
//! retention metrics, per-plan and per-cohort breakdowns, and risk-ranked
//! customer lists for outreach. Every analyzer is a pure function of a
//! [`CustomerTable`]; loading data and delivering messages live at the edges
//! (`loader`, `db`).

pub mod cohort;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod outreach;
pub mod plans;
pub mod report;
pub mod risk;
pub mod table;

pub use config::{PlanCatalog, Settings};
pub use error::{AnalyticsError, Result};
pub use models::{CustomerRecord, MetricsBundle, Status};
pub use table::CustomerTable;
