use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::PlanCatalog;
use crate::error::{AnalyticsError, Result};
use crate::models::{CustomerRecord, Status};
use crate::table::CustomerTable;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    id: String,
    name: String,
    email: String,
    plan: String,
    monthly_price: f64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    status: String,
    city: String,
    risk_score: f64,
}

/// Parses customer rows without table-level checks.
pub fn parse_records<R: Read>(reader: R) -> Result<Vec<CustomerRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row_number = index + 1;
        let row = result.map_err(|err| {
            if matches!(err.kind(), csv::ErrorKind::Deserialize { .. }) {
                AnalyticsError::schema(row_number, "", err.to_string())
            } else {
                AnalyticsError::from(err)
            }
        })?;
        let status: Status = row
            .status
            .parse()
            .map_err(|reason: String| AnalyticsError::schema(row_number, &row.id, reason))?;

        records.push(CustomerRecord {
            id: row.id,
            name: row.name,
            email: row.email,
            plan: row.plan,
            monthly_price: row.monthly_price,
            start_date: row.start_date,
            end_date: row.end_date,
            status,
            city: row.city,
            risk_score: row.risk_score,
        });
    }

    Ok(records)
}

pub fn load_csv_reader<R: Read>(reader: R, catalog: &PlanCatalog) -> Result<CustomerTable> {
    CustomerTable::with_catalog(parse_records(reader)?, catalog)
}

/// Loads and validates a customer CSV. A missing file is reported as
/// [`AnalyticsError::MissingInput`], distinct from a file with no rows.
pub fn load_csv_path(path: &Path, catalog: &PlanCatalog) -> Result<CustomerTable> {
    if !path.is_file() {
        return Err(AnalyticsError::MissingInput {
            source_name: path.display().to_string(),
        });
    }

    let file = std::fs::File::open(path)?;
    let table = load_csv_reader(file, catalog)?;
    log::info!("loaded {} customers from {}", table.len(), path.display());
    Ok(table)
}
