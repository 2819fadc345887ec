use crate::error::{AnalyticsError, Result};
use crate::models::{CustomerRecord, RiskRow, Status};
use crate::table::CustomerTable;

pub const DEFAULT_RISK_THRESHOLD: f64 = 0.7;

pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(AnalyticsError::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            reason: "must lie within [0, 1]".to_string(),
        })
    }
}

/// Active customers with `risk_score >= threshold`, highest score first.
///
/// The sort is stable: equal scores keep their table order.
pub fn at_risk_records(table: &CustomerTable, threshold: f64) -> Result<Vec<&CustomerRecord>> {
    let threshold = validate_threshold(threshold)?;

    let mut records: Vec<&CustomerRecord> = table
        .active()
        .filter(|record| record.risk_score >= threshold)
        .collect();
    records.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));

    log::debug!(
        "risk: {} of {} customers at or above {threshold}",
        records.len(),
        table.len()
    );
    Ok(records)
}

pub fn at_risk_customers(table: &CustomerTable, threshold: f64) -> Result<Vec<RiskRow>> {
    Ok(at_risk_records(table, threshold)?
        .into_iter()
        .map(RiskRow::from)
        .collect())
}

pub fn at_risk_count(table: &CustomerTable, threshold: f64) -> Result<usize> {
    let threshold = validate_threshold(threshold)?;
    Ok(table
        .active()
        .filter(|record| record.risk_score >= threshold)
        .count())
}

/// Cancelled or expired customers in table order, regardless of risk score.
pub fn inactive_customers(table: &CustomerTable) -> Vec<&CustomerRecord> {
    table
        .iter()
        .filter(|record| matches!(record.status, Status::Cancelled | Status::Expired))
        .collect()
}
