use crate::error::{AnalyticsError, Result};
use crate::models::{MetricsBundle, Status};
use crate::table::CustomerTable;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / total * 100`, rounded to two decimals. Callers guarantee `total > 0`.
pub(crate) fn percentage(part: usize, total: usize) -> f64 {
    round2(part as f64 / total as f64 * 100.0)
}

pub fn compute_metrics(table: &CustomerTable) -> Result<MetricsBundle> {
    let total_customers = table.len();
    if total_customers == 0 {
        return Err(AnalyticsError::EmptyDataset);
    }

    let mut active_customers = 0usize;
    let mut cancelled_customers = 0usize;
    let mut expired_customers = 0usize;
    let mut mrr = 0.0;

    for record in table {
        match record.status {
            Status::Active => {
                active_customers += 1;
                mrr += record.monthly_price;
            }
            Status::Cancelled => cancelled_customers += 1,
            Status::Expired => expired_customers += 1,
        }
    }

    let arpu = if active_customers == 0 {
        0.0
    } else {
        round2(mrr / active_customers as f64)
    };

    let metrics = MetricsBundle {
        total_customers,
        active_customers,
        cancelled_customers,
        expired_customers,
        churn_rate: percentage(cancelled_customers, total_customers),
        retention_rate: percentage(active_customers, total_customers),
        mrr,
        arpu,
        ltv: round2(arpu * 12.0),
    };

    log::debug!(
        "metrics: total={} active={} cancelled={} expired={} mrr={:.2}",
        metrics.total_customers,
        metrics.active_customers,
        metrics.cancelled_customers,
        metrics.expired_customers,
        metrics.mrr
    );

    Ok(metrics)
}
