use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::metrics::percentage;
use crate::models::{CohortKey, CohortSummary};
use crate::table::CustomerTable;

pub fn cohort_key(start_date: NaiveDate) -> CohortKey {
    CohortKey {
        year: start_date.year(),
        month: start_date.month(),
    }
}

/// Cohort of every record, keyed by customer id. Derived on demand and never
/// written back into the table.
pub fn cohort_keys(table: &CustomerTable) -> BTreeMap<&str, CohortKey> {
    table
        .iter()
        .map(|record| (record.id.as_str(), cohort_key(record.start_date)))
        .collect()
}

/// Groups customers by signup month, oldest cohort first.
pub fn analyze_cohorts(table: &CustomerTable) -> Vec<CohortSummary> {
    let mut map: BTreeMap<CohortKey, (usize, usize)> = BTreeMap::new();

    for record in table {
        let entry = map.entry(cohort_key(record.start_date)).or_insert((0, 0));
        entry.0 += 1;
        if record.status.is_active() {
            entry.1 += 1;
        }
    }

    let cohorts: Vec<CohortSummary> = map
        .into_iter()
        .map(|(cohort, (total, active))| CohortSummary {
            cohort,
            total,
            active,
            retention_rate: percentage(active, total),
        })
        .collect();

    log::debug!("cohorts: {} signup months", cohorts.len());
    cohorts
}

/// The `count` most recent cohorts, still in chronological order.
pub fn recent(cohorts: &[CohortSummary], count: usize) -> &[CohortSummary] {
    &cohorts[cohorts.len().saturating_sub(count)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use crate::table::fixtures::{customer, started};

    fn sample() -> CustomerTable {
        CustomerTable::new(vec![
            started(customer("A", Status::Active, 99.0, 0.1), 2025, 3, 28),
            started(customer("B", Status::Cancelled, 99.0, 0.1), 2024, 11, 2),
            started(customer("C", Status::Active, 99.0, 0.1), 2025, 3, 1),
            started(customer("D", Status::Expired, 99.0, 0.1), 2025, 3, 31),
            started(customer("E", Status::Active, 99.0, 0.1), 2025, 1, 15),
            started(customer("F", Status::Active, 99.0, 0.1), 2024, 11, 30),
        ])
        .unwrap()
    }

    #[test]
    fn cohorts_are_chronological() {
        let cohorts = analyze_cohorts(&sample());
        let keys: Vec<String> = cohorts.iter().map(|c| c.cohort.to_string()).collect();
        assert_eq!(keys, vec!["2024-11", "2025-01", "2025-03"]);
    }

    #[test]
    fn day_of_month_is_discarded() {
        let cohorts = analyze_cohorts(&sample());
        let march = &cohorts[2];
        assert_eq!(march.total, 3);
        assert_eq!(march.active, 2);
        assert_eq!(march.retention_rate, 66.67);

        let november = &cohorts[0];
        assert_eq!(november.retention_rate, 50.0);
    }

    #[test]
    fn cohort_totals_match_table_size() {
        let table = sample();
        let cohorts = analyze_cohorts(&table);
        let total: usize = cohorts.iter().map(|c| c.total).sum();
        assert_eq!(total, table.len());
        assert!(cohorts
            .iter()
            .all(|c| (0.0..=100.0).contains(&c.retention_rate)));
        assert_eq!(cohorts, analyze_cohorts(&table));
    }

    #[test]
    fn year_boundary_orders_before_later_months() {
        let table = CustomerTable::new(vec![
            started(customer("A", Status::Active, 99.0, 0.1), 2025, 1, 1),
            started(customer("B", Status::Active, 99.0, 0.1), 2024, 12, 31),
        ])
        .unwrap();
        let cohorts = analyze_cohorts(&table);
        assert_eq!(cohorts[0].cohort, CohortKey { year: 2024, month: 12 });
        assert_eq!(cohorts[1].cohort, CohortKey { year: 2025, month: 1 });
    }

    #[test]
    fn cohort_keys_leave_table_untouched() {
        let table = sample();
        let before = table.clone();
        let keys = cohort_keys(&table);
        assert_eq!(keys["A"], CohortKey { year: 2025, month: 3 });
        assert_eq!(keys.len(), 6);
        assert_eq!(table, before);
    }

    #[test]
    fn recent_keeps_the_latest_cohorts() {
        let cohorts = analyze_cohorts(&sample());
        let last_two = recent(&cohorts, 2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].cohort.to_string(), "2025-01");
        assert_eq!(recent(&cohorts, 10).len(), 3);
    }
}
