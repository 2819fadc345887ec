use std::collections::HashSet;

use crate::config::PlanCatalog;
use crate::error::{AnalyticsError, Result};
use crate::models::{CustomerRecord, Status};

/// A validated snapshot of customer records.
///
/// Construction is the only place records are checked. Every analyzer takes
/// `&CustomerTable` and never mutates it, so one table can be shared freely
/// across threads and repeated calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerTable {
    records: Vec<CustomerRecord>,
}

impl CustomerTable {
    /// Validates the structural invariants of every record.
    pub fn new(records: Vec<CustomerRecord>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            validate_record(index + 1, record)?;
            if !seen.insert(record.id.as_str()) {
                return Err(AnalyticsError::schema(index + 1, &record.id, "duplicate id"));
            }
        }

        Ok(Self { records })
    }

    /// Like [`CustomerTable::new`], and also checks each price against the
    /// catalog for plans the catalog knows about.
    pub fn with_catalog(records: Vec<CustomerRecord>, catalog: &PlanCatalog) -> Result<Self> {
        for (index, record) in records.iter().enumerate() {
            if let Some(expected) = catalog.price_of(&record.plan) {
                if (record.monthly_price - expected).abs() > f64::EPSILON {
                    return Err(AnalyticsError::schema(
                        index + 1,
                        &record.id,
                        format!(
                            "monthly_price {} does not match plan {} price {}",
                            record.monthly_price, record.plan, expected
                        ),
                    ));
                }
            }
        }

        Self::new(records)
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomerRecord> {
        self.records.iter()
    }

    pub fn with_status(&self, status: Status) -> impl Iterator<Item = &CustomerRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }

    pub fn active(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.with_status(Status::Active)
    }
}

impl<'a> IntoIterator for &'a CustomerTable {
    type Item = &'a CustomerRecord;
    type IntoIter = std::slice::Iter<'a, CustomerRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn validate_record(row: usize, record: &CustomerRecord) -> Result<()> {
    if record.id.trim().is_empty() {
        return Err(AnalyticsError::schema(row, &record.id, "id is empty"));
    }
    if record.plan.trim().is_empty() {
        return Err(AnalyticsError::schema(row, &record.id, "plan is empty"));
    }
    if !record.monthly_price.is_finite() || record.monthly_price <= 0.0 {
        return Err(AnalyticsError::schema(
            row,
            &record.id,
            format!("monthly_price {} must be > 0", record.monthly_price),
        ));
    }
    if !(0.0..=1.0).contains(&record.risk_score) {
        return Err(AnalyticsError::schema(
            row,
            &record.id,
            format!("risk_score {} outside [0, 1]", record.risk_score),
        ));
    }
    match (record.status, record.end_date) {
        (Status::Active, Some(_)) => Err(AnalyticsError::schema(
            row,
            &record.id,
            "end_date set on an active customer",
        )),
        (status, None) if !status.is_active() => Err(AnalyticsError::schema(
            row,
            &record.id,
            format!("end_date missing on a {status} customer"),
        )),
        _ => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn accepts_valid_records() {
        let table = CustomerTable::new(vec![
            customer("A", Status::Active, 100.0, 0.2),
            customer("B", Status::Cancelled, 200.0, 0.9),
            customer("C", Status::Expired, 300.0, 0.4),
        ])
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.active().count(), 1);
    }

    #[test]
    fn empty_table_is_valid() {
        let table = CustomerTable::new(Vec::new()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn rejects_risk_score_out_of_range() {
        let err = CustomerTable::new(vec![customer("A", Status::Active, 100.0, 1.2)]).unwrap_err();
        assert!(matches!(err, AnalyticsError::SchemaViolation { row: 1, .. }));

        let err =
            CustomerTable::new(vec![customer("A", Status::Active, 100.0, f64::NAN)]).unwrap_err();
        assert!(matches!(err, AnalyticsError::SchemaViolation { .. }));
    }

    #[test]
    fn rejects_end_date_mismatch() {
        let mut active = customer("A", Status::Active, 100.0, 0.1);
        active.end_date = chrono::NaiveDate::from_ymd_opt(2025, 6, 1);
        assert!(CustomerTable::new(vec![active]).is_err());

        let mut cancelled = customer("B", Status::Cancelled, 100.0, 0.1);
        cancelled.end_date = None;
        let err = CustomerTable::new(vec![cancelled]).unwrap_err();
        match err {
            AnalyticsError::SchemaViolation { id, reason, .. } => {
                assert_eq!(id, "B");
                assert!(reason.contains("cancelled"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_ids_and_bad_prices() {
        let err = CustomerTable::new(vec![
            customer("A", Status::Active, 100.0, 0.1),
            customer("A", Status::Active, 100.0, 0.1),
        ])
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::SchemaViolation { row: 2, .. }));

        assert!(CustomerTable::new(vec![customer("A", Status::Active, 0.0, 0.1)]).is_err());
    }

    #[test]
    fn catalog_checks_known_plans_only() {
        let catalog = PlanCatalog::default();
        let ok = CustomerTable::with_catalog(
            vec![
                customer("A", Status::Active, 199.0, 0.1),
                on_plan(customer("B", Status::Active, 45.0, 0.1), "Student"),
            ],
            &catalog,
        );
        assert!(ok.is_ok());

        let err = CustomerTable::with_catalog(
            vec![customer("A", Status::Active, 150.0, 0.1)],
            &catalog,
        )
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::SchemaViolation { .. }));
    }
}
