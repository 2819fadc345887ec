use std::collections::BTreeMap;

use crate::metrics::round2;
use crate::models::{PlanChurn, PlanRevenue, PlanSummary, Status};
use crate::table::CustomerTable;

/// One row per plan present in the table, sorted by plan name.
///
/// `total_revenue` sums every record on the plan, cancelled and expired included.
pub fn analyze_by_plan(table: &CustomerTable) -> Vec<PlanSummary> {
    let mut map: BTreeMap<&str, PlanSummary> = BTreeMap::new();

    for record in table {
        let entry = map
            .entry(record.plan.as_str())
            .or_insert_with(|| PlanSummary {
                plan: record.plan.clone(),
                customer_count: 0,
                total_revenue: 0.0,
                active_customers: 0,
            });
        entry.customer_count += 1;
        entry.total_revenue += record.monthly_price;
        if record.status.is_active() {
            entry.active_customers += 1;
        }
    }

    map.into_values().collect()
}

/// Active monthly revenue per plan and its share of MRR.
pub fn active_revenue_by_plan(table: &CustomerTable) -> Vec<PlanRevenue> {
    let mut map: BTreeMap<&str, f64> = BTreeMap::new();
    for record in table.active() {
        *map.entry(record.plan.as_str()).or_insert(0.0) += record.monthly_price;
    }

    let mrr: f64 = map.values().sum();
    map.into_iter()
        .map(|(plan, active_revenue)| PlanRevenue {
            plan: plan.to_string(),
            active_revenue,
            share_of_mrr: if mrr > 0.0 {
                round2(active_revenue / mrr * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}

/// Cancelled customers per plan; plans without cancellations are omitted.
pub fn churn_by_plan(table: &CustomerTable) -> Vec<PlanChurn> {
    let mut map: BTreeMap<&str, usize> = BTreeMap::new();
    for record in table.with_status(Status::Cancelled) {
        *map.entry(record.plan.as_str()).or_insert(0) += 1;
    }

    map.into_iter()
        .map(|(plan, cancelled_customers)| PlanChurn {
            plan: plan.to_string(),
            cancelled_customers,
        })
        .collect()
}
