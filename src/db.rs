use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::PlanCatalog;
use crate::loader;
use crate::models::{CustomerRecord, Status};
use crate::table::CustomerTable;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_customer(pool: &PgPool, record: &CustomerRecord) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO subscription_retention.customers
        (id, full_name, email, plan, monthly_price, start_date, end_date, status, city, risk_score)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            email = EXCLUDED.email,
            plan = EXCLUDED.plan,
            monthly_price = EXCLUDED.monthly_price,
            start_date = EXCLUDED.start_date,
            end_date = EXCLUDED.end_date,
            status = EXCLUDED.status,
            city = EXCLUDED.city,
            risk_score = EXCLUDED.risk_score
        "#,
    )
    .bind(&record.id)
    .bind(&record.name)
    .bind(&record.email)
    .bind(&record.plan)
    .bind(record.monthly_price)
    .bind(record.start_date)
    .bind(record.end_date)
    .bind(record.status.as_str())
    .bind(&record.city)
    .bind(record.risk_score)
    .execute(pool)
    .await
    .with_context(|| format!("failed to store customer {}", record.id))?;

    Ok(result.rows_affected())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).context("invalid date");

    let customers = vec![
        (
            "CUS0001",
            "Salma Idrissi",
            "salma.idrissi@example.com",
            "Pro",
            date(2025, 4, 12)?,
            None,
            Status::Active,
            "Rabat",
            0.82,
        ),
        (
            "CUS0002",
            "Yassine Amrani",
            "yassine.amrani@example.com",
            "Basic",
            date(2024, 12, 1)?,
            Some(date(2025, 6, 1)?),
            Status::Expired,
            "Fes",
            0.31,
        ),
        (
            "CUS0003",
            "Nadia Benali",
            "nadia.benali@example.com",
            "Premium",
            date(2025, 1, 20)?,
            Some(date(2025, 8, 14)?),
            Status::Cancelled,
            "Casablanca",
            0.77,
        ),
        (
            "CUS0004",
            "Omar Tazi",
            "omar.tazi@example.com",
            "Premium",
            date(2025, 1, 3)?,
            None,
            Status::Active,
            "Marrakech",
            0.18,
        ),
    ];

    let catalog = PlanCatalog::default();
    let mut records = Vec::with_capacity(customers.len());
    for (id, name, email, plan, start_date, end_date, status, city, risk_score) in customers {
        let monthly_price = catalog
            .price_of(plan)
            .with_context(|| format!("plan {plan} missing from catalog"))?;
        records.push(CustomerRecord {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            plan: plan.to_string(),
            monthly_price,
            start_date,
            end_date,
            status,
            city: city.to_string(),
            risk_score,
        });
    }

    let table = CustomerTable::with_catalog(records, &catalog)?;
    for record in table.iter() {
        upsert_customer(pool, record).await?;
    }
    log::info!("seeded {} customers", table.len());

    Ok(())
}

pub async fn fetch_customers(pool: &PgPool, catalog: &PlanCatalog) -> anyhow::Result<CustomerTable> {
    let rows = sqlx::query(
        "SELECT id, full_name, email, plan, monthly_price, start_date, end_date, status, \
         city, risk_score \
         FROM subscription_retention.customers \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch customers")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.get("status");
        records.push(CustomerRecord {
            id: row.get("id"),
            name: row.get("full_name"),
            email: row.get("email"),
            plan: row.get("plan"),
            monthly_price: row.get("monthly_price"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            status: status.parse().map_err(anyhow::Error::msg)?,
            city: row.get("city"),
            risk_score: row.get("risk_score"),
        });
    }

    let table = CustomerTable::with_catalog(records, catalog)?;
    log::info!("fetched {} customers from Postgres", table.len());
    Ok(table)
}

/// Validates the whole file before writing anything, then upserts each row.
/// Rows without an id are given a generated `import-<uuid>` id.
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    catalog: &PlanCatalog,
) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut records = loader::parse_records(file)?;

    for record in records.iter_mut().filter(|r| r.id.trim().is_empty()) {
        record.id = format!("import-{}", Uuid::new_v4());
    }

    let table = CustomerTable::with_catalog(records, catalog)?;
    let mut stored = 0usize;
    for record in table.iter() {
        if upsert_customer(pool, record).await? > 0 {
            stored += 1;
        } else {
            log::warn!("customer {} was not stored", record.id);
        }
    }

    Ok(stored)
}
