use std::{collections::HashMap, io::Write};

use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::{Member, MemberId, Transaction};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Serialize)]
pub struct HistoryRow<'a> {
    pub date: String,
    pub description: &'a str,
    pub category: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub amount: Decimal,
    pub status: &'static str,
    pub member: &'a str,
}

/// Writes transaction history as CSV, one row per transaction in the given order.
pub fn write_history<W>(
    output: &mut W,
    transactions: &[Transaction],
    members: &[Member],
) -> anyhow::Result<()>
where
    W: Write,
{
    let names: HashMap<MemberId, &str> = members
        .iter()
        .map(|member| (member.id, member.name.as_str()))
        .collect();

    let mut writer = Writer::from_writer(output);
    for tx in transactions {
        let row = HistoryRow {
            date: tx.timestamp.format(DATE_FORMAT).to_string(),
            description: &tx.description,
            category: &tx.category,
            kind: tx.kind.label(),
            amount: tx.amount,
            status: tx.status.label(),
            member: names.get(&tx.from_member_id).copied().unwrap_or("Unknown"),
        };
        if let Err(err) = writer.serialize(row) {
            anyhow::bail!("Failed to write to CSV: {err}")
        }
    }
    // Ensure all data is flushed to the output
    if let Err(err) = writer.flush() {
        anyhow::bail!("Failed to flush CSV writer: {err}")
    }
    Ok(())
}
