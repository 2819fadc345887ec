use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Cancelled,
    Expired,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Active, Status::Cancelled, Status::Expired];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Cancelled => "cancelled",
            Status::Expired => "expired",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Status::Active)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "cancelled" => Ok(Status::Cancelled),
            "expired" => Ok(Status::Expired),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub plan: String,
    pub monthly_price: f64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: Status,
    pub city: String,
    pub risk_score: f64,
}

/// Scalar KPIs for one snapshot of the customer table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsBundle {
    pub total_customers: usize,
    pub active_customers: usize,
    pub cancelled_customers: usize,
    pub expired_customers: usize,
    pub churn_rate: f64,
    pub retention_rate: f64,
    pub mrr: f64,
    pub arpu: f64,
    pub ltv: f64,
}

impl MetricsBundle {
    pub fn arr(&self) -> f64 {
        self.projected_revenue(12)
    }

    pub fn projected_revenue(&self, months: u32) -> f64 {
        self.mrr * months as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub plan: String,
    pub customer_count: usize,
    /// Sum of prices over every record on the plan, inactive ones included.
    pub total_revenue: f64,
    pub active_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRevenue {
    pub plan: String,
    pub active_revenue: f64,
    pub share_of_mrr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanChurn {
    pub plan: String,
    pub cancelled_customers: usize,
}

/// Signup month of a customer. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CohortKey {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for CohortKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Retention here is the share of the cohort that is active today, not a
/// survival curve: the table carries no history of status changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    pub cohort: CohortKey,
    pub total: usize,
    pub active: usize,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub plan: String,
    pub risk_score: f64,
}

impl From<&CustomerRecord> for RiskRow {
    fn from(record: &CustomerRecord) -> Self {
        RiskRow {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            plan: record.plan.clone(),
            risk_score: record.risk_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutreachMessage {
    pub customer_id: String,
    pub recipient: String,
    pub name: String,
    pub risk_score: f64,
    pub subject: String,
    pub body: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: Status,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityCount {
    pub city: String,
    pub count: usize,
}
