//! Message payloads for win-back emails and churn alerts. Delivery happens elsewhere.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{CustomerRecord, OutreachMessage};
use crate::risk;
use crate::table::CustomerTable;

pub fn winback_message(record: &CustomerRecord, currency: &str) -> (String, String) {
    let subject = format!("{}, your subscription needs your attention", record.name);
    let body = format!(
        "Hello {name},\n\
         \n\
         We noticed that your {plan} subscription is currently inactive.\n\
         We would love to welcome you back.\n\
         \n\
         Special offer: 20% off your next renewal.\n\
         \n\
         To reactivate your account, follow the link: [LINK]\n\
         \n\
         Best regards,\n\
         The Subscriptions Team\n\
         \n\
         ---\n\
         Monthly price: {price} {currency}\n",
        name = record.name,
        plan = record.plan,
        price = record.monthly_price,
    );
    (subject, body)
}

pub fn churn_alert_message(record: &CustomerRecord) -> (String, String) {
    let subject = format!("ALERT: {} shows a high churn risk", record.name);
    let body = format!(
        "MARKETING TEAM ALERT\n\
         \n\
         At-risk customer detected:\n\
         \n\
         Name: {name}\n\
         Email: {email}\n\
         Plan: {plan}\n\
         Risk score: {score:.2}/1.0\n\
         \n\
         Recommended actions:\n\
         - Contact the customer within 48h\n\
         - Offer a tailored deal\n\
         - Ask for feedback\n\
         \n\
         This message was generated automatically.\n",
        name = record.name,
        email = record.email,
        plan = record.plan,
        score = record.risk_score,
    );
    (subject, body)
}

fn to_message(
    record: &CustomerRecord,
    (subject, body): (String, String),
    generated_at: DateTime<Utc>,
) -> OutreachMessage {
    OutreachMessage {
        customer_id: record.id.clone(),
        recipient: record.email.clone(),
        name: record.name.clone(),
        risk_score: record.risk_score,
        subject,
        body,
        generated_at,
    }
}

/// One win-back email per cancelled or expired customer.
pub fn build_winback_batch(
    table: &CustomerTable,
    currency: &str,
    generated_at: DateTime<Utc>,
) -> Vec<OutreachMessage> {
    let messages: Vec<OutreachMessage> = risk::inactive_customers(table)
        .into_iter()
        .map(|record| to_message(record, winback_message(record, currency), generated_at))
        .collect();
    log::info!("outreach: {} win-back messages prepared", messages.len());
    messages
}

/// One alert per active customer at or above `threshold`, highest risk first.
pub fn build_alert_batch(
    table: &CustomerTable,
    threshold: f64,
    generated_at: DateTime<Utc>,
) -> Result<Vec<OutreachMessage>> {
    let messages: Vec<OutreachMessage> = risk::at_risk_records(table, threshold)?
        .into_iter()
        .map(|record| to_message(record, churn_alert_message(record), generated_at))
        .collect();
    log::info!(
        "outreach: {} churn alerts prepared at threshold {threshold}",
        messages.len()
    );
    Ok(messages)
}
