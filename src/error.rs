use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("No customer data available from {source_name}")]
    MissingInput { source_name: String },

    #[error("Customer table is empty; metrics need at least one record")]
    EmptyDataset,

    #[error("Schema violation at row {row} (id '{id}'): {reason}")]
    SchemaViolation {
        row: usize,
        id: String,
        reason: String,
    },

    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    pub(crate) fn schema(row: usize, id: &str, reason: impl Into<String>) -> Self {
        AnalyticsError::SchemaViolation {
            row,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
