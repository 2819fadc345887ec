use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use subscription_retention::report::{self, ReportKind, ReportOptions};
use subscription_retention::{
    cohort, db, loader, metrics, outreach, plans, risk, AnalyticsError, CustomerTable, Settings,
};

#[derive(Parser)]
#[command(name = "subscription-retention")]
#[command(about = "Subscription retention metrics, cohorts and churn-risk outreach", long_about = None)]
struct Cli {
    /// Read customers from a CSV file instead of Postgres
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample customers
    Seed,
    /// Import customers from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Headline KPIs: counts, churn, retention, MRR, ARPU, LTV
    Metrics,
    /// Customers and revenue per plan
    Plans,
    /// Retention per signup month
    Cohorts,
    /// Active customers at or above a risk threshold
    Risk {
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Prepare win-back emails or churn alerts
    Outreach {
        #[arg(long, value_enum)]
        kind: OutreachKind,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a report
    Report {
        #[arg(long, value_enum, default_value_t = ReportKind::Full)]
        kind: ReportKind,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export a table as CSV
    Export {
        #[arg(long, value_enum)]
        table: ExportTable,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutreachKind {
    Winback,
    Alerts,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Text,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportTable {
    Customers,
    Plans,
    Cohorts,
    Risk,
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database_url = settings
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_table(data: Option<&Path>, settings: &Settings) -> anyhow::Result<CustomerTable> {
    match data {
        Some(path) => Ok(loader::load_csv_path(path, &settings.catalog)?),
        None => {
            let pool = connect(settings).await?;
            db::fetch_customers(&pool, &settings.catalog).await
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match run(cli, &settings).await {
        Err(err) => match err.downcast_ref::<AnalyticsError>() {
            Some(AnalyticsError::MissingInput { source_name }) => {
                println!("No customer data found at {source_name}. Import or seed data first.");
                Ok(())
            }
            Some(AnalyticsError::EmptyDataset) => {
                println!("The customer table is empty; nothing to analyze.");
                Ok(())
            }
            _ => Err(err),
        },
        ok => ok,
    }
}

async fn run(cli: Cli, settings: &Settings) -> anyhow::Result<()> {
    let data = cli.data.as_deref();
    let threshold_or_default = |threshold: Option<f64>| {
        risk::validate_threshold(threshold.unwrap_or(settings.risk_threshold))
    };

    match cli.command {
        Commands::InitDb => {
            let pool = connect(settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(settings).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(settings).await?;
            let stored = db::import_csv(&pool, &csv, &settings.catalog).await?;
            println!("Stored {stored} customers from {}.", csv.display());
        }
        Commands::Metrics => {
            let table = load_table(data, settings).await?;
            let metrics = metrics::compute_metrics(&table)?;
            if cli.json {
                return print_json(&metrics);
            }

            let currency = &settings.currency;
            println!("Total customers:   {}", metrics.total_customers);
            println!(
                "Active customers:  {} ({:.2}% retention)",
                metrics.active_customers, metrics.retention_rate
            );
            println!(
                "Cancelled:         {} ({:.2}% churn)",
                metrics.cancelled_customers, metrics.churn_rate
            );
            println!("Expired:           {}", metrics.expired_customers);
            println!("MRR:               {:.2} {currency}", metrics.mrr);
            println!("ARPU:              {:.2} {currency}", metrics.arpu);
            println!("Estimated LTV:     {:.2} {currency}", metrics.ltv);
        }
        Commands::Plans => {
            let table = load_table(data, settings).await?;
            let rows = plans::analyze_by_plan(&table);
            if cli.json {
                return print_json(&rows);
            }
            if rows.is_empty() {
                println!("No customers found.");
            }
            for row in rows {
                println!(
                    "- {}: {} customers ({} active), revenue {:.2} {}",
                    row.plan,
                    row.customer_count,
                    row.active_customers,
                    row.total_revenue,
                    settings.currency
                );
            }
        }
        Commands::Cohorts => {
            let table = load_table(data, settings).await?;
            let rows = cohort::analyze_cohorts(&table);
            if cli.json {
                return print_json(&rows);
            }
            if rows.is_empty() {
                println!("No customers found.");
            }
            for row in rows {
                println!(
                    "- {}: {} of {} active ({:.2}%)",
                    row.cohort, row.active, row.total, row.retention_rate
                );
            }
        }
        Commands::Risk { threshold, limit } => {
            let threshold = threshold_or_default(threshold)?;
            let table = load_table(data, settings).await?;
            let rows = risk::at_risk_customers(&table, threshold)?;
            if cli.json {
                return print_json(&rows);
            }

            if rows.is_empty() {
                println!("No active customers at or above {threshold:.2}.");
                return Ok(());
            }

            println!("{} customers at or above {threshold:.2}:", rows.len());
            for row in rows.iter().take(limit) {
                println!(
                    "- {} ({}, {}) plan {} score {:.2}",
                    row.name, row.id, row.email, row.plan, row.risk_score
                );
            }
        }
        Commands::Outreach {
            kind,
            threshold,
            out,
        } => {
            let table = load_table(data, settings).await?;
            let now = Utc::now();
            let messages = match kind {
                OutreachKind::Winback => {
                    outreach::build_winback_batch(&table, &settings.currency, now)
                }
                OutreachKind::Alerts => {
                    outreach::build_alert_batch(&table, threshold_or_default(threshold)?, now)?
                }
            };

            if let Some(out) = out {
                let file = std::fs::File::create(&out)
                    .with_context(|| format!("failed to create {}", out.display()))?;
                report::write_csv(file, &messages)?;
                println!("{} messages written to {}.", messages.len(), out.display());
            } else if cli.json {
                return print_json(&messages);
            } else {
                println!("{} messages prepared.", messages.len());
                for message in messages.iter().take(3) {
                    println!();
                    println!("To: {}", message.recipient);
                    println!("Subject: {}", message.subject);
                    println!("{}", message.body);
                }
            }
        }
        Commands::Report {
            kind,
            format,
            threshold,
            out,
        } => {
            let options = ReportOptions {
                threshold: threshold_or_default(threshold)?,
                currency: &settings.currency,
                generated_at: Utc::now(),
            };
            let table = load_table(data, settings).await?;
            let report = match format {
                ReportFormat::Markdown => report::build_report(kind, &table, &options)?,
                ReportFormat::Text => report::build_text_summary(&table, &options)?,
            };
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            table: which,
            threshold,
            out,
        } => {
            let threshold = threshold_or_default(threshold)?;
            let table = load_table(data, settings).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            match which {
                ExportTable::Customers => report::write_csv(file, table.records())?,
                ExportTable::Plans => report::write_csv(file, &plans::analyze_by_plan(&table))?,
                ExportTable::Cohorts => {
                    report::write_csv(file, &cohort::analyze_cohorts(&table))?
                }
                ExportTable::Risk => {
                    report::write_csv(file, &risk::at_risk_customers(&table, threshold)?)?
                }
            }
            println!("Export written to {}.", out.display());
        }
    }

    Ok(())
}
