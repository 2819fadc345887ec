use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::cohort;
use crate::error::Result;
use crate::metrics::compute_metrics;
use crate::models::{CityCount, MetricsBundle, Status, StatusCount};
use crate::plans;
use crate::risk;
use crate::table::CustomerTable;

const RECENT_COHORTS: usize = 6;
const TOP_AT_RISK: usize = 10;
const TOP_CITIES: usize = 10;
const NEW_CUSTOMER_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    Full,
    Financial,
    Customers,
    Churn,
}

impl ReportKind {
    fn title(&self) -> &'static str {
        match self {
            ReportKind::Full => "Full Performance Report",
            ReportKind::Financial => "Financial Report",
            ReportKind::Customers => "Customer Report",
            ReportKind::Churn => "Churn Analysis Report",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions<'a> {
    pub threshold: f64,
    pub currency: &'a str,
    pub generated_at: DateTime<Utc>,
}

pub fn summarize_by_status(table: &CustomerTable) -> Vec<StatusCount> {
    Status::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: table.with_status(*status).count(),
        })
        .collect()
}

pub fn top_cities(table: &CustomerTable, limit: usize) -> Vec<CityCount> {
    let mut map: HashMap<&str, usize> = HashMap::new();
    for record in table {
        *map.entry(record.city.as_str()).or_insert(0) += 1;
    }

    let mut cities: Vec<CityCount> = map
        .into_iter()
        .map(|(city, count)| CityCount {
            city: city.to_string(),
            count,
        })
        .collect();
    cities.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.city.cmp(&b.city)));
    cities.truncate(limit);
    cities
}

pub fn cutoff_date(today: NaiveDate, since_days: i64) -> NaiveDate {
    today - Duration::days(since_days.max(1))
}

pub fn new_customers_since(table: &CustomerTable, cutoff: NaiveDate) -> usize {
    table.iter().filter(|r| r.start_date >= cutoff).count()
}

fn money(value: f64, currency: &str) -> String {
    format!("{value:.2} {currency}")
}

/// Writes rows as CSV with a header line taken from the field names.
pub fn write_csv<W: std::io::Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn build_report(
    kind: ReportKind,
    table: &CustomerTable,
    options: &ReportOptions<'_>,
) -> Result<String> {
    let metrics = compute_metrics(table)?;

    let mut output = String::new();
    let _ = writeln!(output, "# {}", kind.title());
    let _ = writeln!(
        output,
        "Generated {} for {} customers",
        options.generated_at.format("%Y-%m-%d %H:%M"),
        metrics.total_customers
    );

    match kind {
        ReportKind::Full => write_full(&mut output, table, &metrics, options)?,
        ReportKind::Financial => write_financial(&mut output, table, &metrics, options),
        ReportKind::Customers => write_customers(&mut output, table, &metrics, options),
        ReportKind::Churn => write_churn(&mut output, table, &metrics, options)?,
    }

    Ok(output)
}

fn write_key_metrics(output: &mut String, metrics: &MetricsBundle, currency: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Metrics");
    let _ = writeln!(output, "- Total customers: {}", metrics.total_customers);
    let _ = writeln!(output, "- Active customers: {}", metrics.active_customers);
    let _ = writeln!(output, "- Cancelled customers: {}", metrics.cancelled_customers);
    let _ = writeln!(output, "- Expired customers: {}", metrics.expired_customers);
    let _ = writeln!(output, "- Churn rate: {:.2}%", metrics.churn_rate);
    let _ = writeln!(output, "- Retention rate: {:.2}%", metrics.retention_rate);
    let _ = writeln!(output, "- MRR: {}", money(metrics.mrr, currency));
    let _ = writeln!(output, "- ARPU: {}", money(metrics.arpu, currency));
    let _ = writeln!(output, "- Estimated LTV: {}", money(metrics.ltv, currency));
}

fn write_at_risk(
    output: &mut String,
    table: &CustomerTable,
    threshold: f64,
) -> Result<usize> {
    let rows = risk::at_risk_customers(table, threshold)?;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Customers (score >= {threshold:.2})");

    if rows.is_empty() {
        let _ = writeln!(output, "No active customers at or above the threshold.");
    } else {
        let _ = writeln!(output, "{} active customers flagged.", rows.len());
        for row in rows.iter().take(TOP_AT_RISK) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) plan {} score {:.2}",
                row.name, row.id, row.email, row.plan, row.risk_score
            );
        }
    }

    Ok(rows.len())
}

fn write_full(
    output: &mut String,
    table: &CustomerTable,
    metrics: &MetricsBundle,
    options: &ReportOptions<'_>,
) -> Result<()> {
    write_key_metrics(output, metrics, options.currency);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Plans");
    for plan in plans::analyze_by_plan(table) {
        let _ = writeln!(
            output,
            "- {}: {} customers ({} active), revenue {}",
            plan.plan,
            plan.customer_count,
            plan.active_customers,
            money(plan.total_revenue, options.currency)
        );
    }

    let cohorts = cohort::analyze_cohorts(table);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Cohorts");
    for row in cohort::recent(&cohorts, RECENT_COHORTS) {
        let _ = writeln!(
            output,
            "- {}: {} of {} still active ({:.2}%)",
            row.cohort, row.active, row.total, row.retention_rate
        );
    }

    write_at_risk(output, table, options.threshold)?;
    Ok(())
}

fn write_financial(
    output: &mut String,
    table: &CustomerTable,
    metrics: &MetricsBundle,
    options: &ReportOptions<'_>,
) {
    let currency = options.currency;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue");
    let _ = writeln!(output, "- MRR: {}", money(metrics.mrr, currency));
    let _ = writeln!(output, "- ARR: {}", money(metrics.arr(), currency));
    let _ = writeln!(output, "- ARPU: {}", money(metrics.arpu, currency));
    let _ = writeln!(output, "- Estimated LTV: {}", money(metrics.ltv, currency));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Revenue by Plan");
    let revenue = plans::active_revenue_by_plan(table);
    if revenue.is_empty() {
        let _ = writeln!(output, "No active subscriptions.");
    } else {
        for row in revenue {
            let _ = writeln!(
                output,
                "- {}: {} ({:.2}% of MRR)",
                row.plan,
                money(row.active_revenue, currency),
                row.share_of_mrr
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Projections");
    let _ = writeln!(
        output,
        "- Quarterly: {}",
        money(metrics.projected_revenue(3), currency)
    );
    let _ = writeln!(output, "- Annual: {}", money(metrics.arr(), currency));
}

fn write_customers(
    output: &mut String,
    table: &CustomerTable,
    metrics: &MetricsBundle,
    options: &ReportOptions<'_>,
) {
    let cutoff = cutoff_date(options.generated_at.date_naive(), NEW_CUSTOMER_WINDOW_DAYS);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total customers: {}", metrics.total_customers);
    let _ = writeln!(
        output,
        "- New customers (last {} days): {}",
        NEW_CUSTOMER_WINDOW_DAYS,
        new_customers_since(table, cutoff)
    );
    let _ = writeln!(output, "- Lost customers: {}", metrics.cancelled_customers);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");
    for row in summarize_by_status(table) {
        let _ = writeln!(output, "- {}: {}", row.status, row.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Cities");
    for row in top_cities(table, TOP_CITIES) {
        let _ = writeln!(output, "- {}: {}", row.city, row.count);
    }
}

fn write_churn(
    output: &mut String,
    table: &CustomerTable,
    metrics: &MetricsBundle,
    options: &ReportOptions<'_>,
) -> Result<()> {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Churn Metrics");
    let _ = writeln!(output, "- Churn rate: {:.2}%", metrics.churn_rate);
    let _ = writeln!(output, "- Cancelled customers: {}", metrics.cancelled_customers);

    let flagged = write_at_risk(output, table, options.threshold)?;
    if flagged > 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recommended Actions");
        let _ = writeln!(output, "1. Contact at-risk customers within 48h");
        let _ = writeln!(output, "2. Offer tailored deals");
        let _ = writeln!(output, "3. Ask for detailed feedback");
        let _ = writeln!(output, "4. Provide temporary premium support");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cancellations by Plan");
    let churn = plans::churn_by_plan(table);
    if churn.is_empty() {
        let _ = writeln!(output, "No cancellations recorded.");
    } else {
        for row in churn {
            let _ = writeln!(output, "- {}: {}", row.plan, row.cancelled_customers);
        }
    }

    Ok(())
}

/// Plain-text KPI summary.
pub fn build_text_summary(table: &CustomerTable, options: &ReportOptions<'_>) -> Result<String> {
    let metrics = compute_metrics(table)?;
    let at_risk = risk::at_risk_count(table, options.threshold)?;
    let currency = options.currency;
    let rule = "=".repeat(43);

    let mut output = String::new();
    let _ = writeln!(output, "{rule}");
    let _ = writeln!(output, "SUBSCRIPTION MANAGEMENT REPORT");
    let _ = writeln!(output, "{rule}");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Generated: {}",
        options.generated_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "KEY METRICS");
    let _ = writeln!(output, "-----------");
    let _ = writeln!(output, "Total customers : {}", metrics.total_customers);
    let _ = writeln!(output, "Active customers : {}", metrics.active_customers);
    let _ = writeln!(output, "Cancelled customers : {}", metrics.cancelled_customers);
    let _ = writeln!(output, "Churn rate : {:.2}%", metrics.churn_rate);
    let _ = writeln!(output, "Retention rate : {:.2}%", metrics.retention_rate);
    let _ = writeln!(output);
    let _ = writeln!(output, "FINANCE");
    let _ = writeln!(output, "-------");
    let _ = writeln!(output, "MRR : {}", money(metrics.mrr, currency));
    let _ = writeln!(output, "ARPU : {}", money(metrics.arpu, currency));
    let _ = writeln!(output, "Estimated LTV : {}", money(metrics.ltv, currency));
    let _ = writeln!(output);
    let _ = writeln!(output, "AT-RISK CUSTOMERS");
    let _ = writeln!(output, "-----------------");
    let _ = writeln!(output, "Count : {at_risk}");
    let _ = writeln!(output);
    let _ = writeln!(output, "{rule}");

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::table::fixtures::{customer, in_city, on_plan, started};
    use chrono::TimeZone;

    fn options() -> ReportOptions<'static> {
        ReportOptions {
            threshold: 0.7,
            currency: "MAD",
            generated_at: Utc.with_ymd_and_hms(2025, 4, 10, 8, 0, 0).unwrap(),
        }
    }

    fn sample() -> CustomerTable {
        CustomerTable::new(vec![
            in_city(started(customer("A", Status::Active, 199.0, 0.92), 2025, 4, 1), "Rabat"),
            in_city(
                on_plan(customer("B", Status::Cancelled, 99.0, 0.4), "Basic"),
                "Casablanca",
            ),
            in_city(started(customer("C", Status::Active, 199.0, 0.3), 2025, 1, 5), "Casablanca"),
            in_city(customer("D", Status::Expired, 199.0, 0.8), "Fes"),
        ])
        .unwrap()
    }

    #[test]
    fn status_summary_lists_every_status() {
        let rows = summarize_by_status(&sample());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].status, Status::Active);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[2].count, 1);
    }

    #[test]
    fn cities_ranked_by_count_then_name() {
        let rows = top_cities(&sample(), 2);
        assert_eq!(
            rows,
            vec![
                CityCount {
                    city: "Casablanca".to_string(),
                    count: 2
                },
                CityCount {
                    city: "Fes".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn new_customers_use_start_date_cutoff() {
        let cutoff = cutoff_date(NaiveDate::from_ymd_opt(2025, 4, 10).unwrap(), 30);
        assert_eq!(cutoff, NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
        assert_eq!(new_customers_since(&sample(), cutoff), 3);
    }

    #[test]
    fn full_report_has_every_section() {
        let report = build_report(ReportKind::Full, &sample(), &options()).unwrap();
        assert!(report.starts_with("# Full Performance Report"));
        assert!(report.contains("## Key Metrics"));
        assert!(report.contains("- Churn rate: 25.00%"));
        assert!(report.contains("- MRR: 398.00 MAD"));
        assert!(report.contains("## Recent Cohorts"));
        assert!(report.contains("- Customer A (A, a@example.com) plan Pro score 0.92"));
        assert!(!report.contains("Customer D (D"));
    }

    #[test]
    fn churn_report_lists_cancellations_by_plan() {
        let report = build_report(ReportKind::Churn, &sample(), &options()).unwrap();
        assert!(report.contains("## Recommended Actions"));
        assert!(report.contains("- Basic: 1"));
    }

    #[test]
    fn financial_report_projects_revenue() {
        let report = build_report(ReportKind::Financial, &sample(), &options()).unwrap();
        assert!(report.contains("- ARR: 4776.00 MAD"));
        assert!(report.contains("- Quarterly: 1194.00 MAD"));
        assert!(report.contains("- Pro: 398.00 MAD (100.00% of MRR)"));
    }

    #[test]
    fn customers_report_counts_new_signups() {
        let report = build_report(ReportKind::Customers, &sample(), &options()).unwrap();
        assert!(report.contains("- New customers (last 30 days): 3"));
        assert!(report.contains("- cancelled: 1"));
    }

    #[test]
    fn reports_need_data() {
        let err = build_report(ReportKind::Full, &CustomerTable::default(), &options()).unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyDataset));
        assert!(build_text_summary(&CustomerTable::default(), &options()).is_err());
    }

    #[test]
    fn text_summary_counts_at_risk() {
        let summary = build_text_summary(&sample(), &options()).unwrap();
        assert!(summary.contains("Count : 1"));
        assert!(summary.contains("Retention rate : 50.00%"));
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let rows = plans::analyze_by_plan(&sample());
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &rows).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("plan,customer_count,total_revenue,active_customers")
        );
        assert_eq!(lines.next(), Some("Basic,1,99.0,0"));
    }
}
