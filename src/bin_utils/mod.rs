//! Bootstraps [`crate::processor::engine::LedgerEngine`] for the command line: seeds a wallet,
//! replays an operations file and prints the resulting history.

use std::{
    collections::HashMap,
    io::{Read, Write},
};

use anyhow::Result;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    config::AppConfig,
    model::{MemberId, WalletId},
    processor::{ProcessError, engine::LedgerEngine},
    provider::PaymentProvider,
    store::{RecordStore, in_memory::InMemoryStore},
};
use csv_parser::{CsvOperationParser, OperationKind, OperationRow};
use csv_printer::write_history;
pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Malformed row: {0}")]
    MalformedRow(#[from] csv::Error),
    #[error("Unknown member `{email}`")]
    UnknownMember { email: String },
    #[error("`{field}` is required for {kind:?}")]
    MissingField {
        kind: OperationKind,
        field: &'static str,
    },
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ServiceError {
    /// A wallet rule turned the operation down. The engine already logs these, so they are
    /// not worth printing as errors.
    pub fn is_rule_rejection(&self) -> bool {
        matches!(
            self,
            ServiceError::Process(
                ProcessError::WalletErr(_) | ProcessError::TopUpSessionExpired { .. }
            )
        )
    }
}

pub struct Service<'w, R, W: 'w, P> {
    pub config: AppConfig,
    pub input: R,
    pub output: &'w mut W,
    pub provider: P,
    pub error_printer: Box<dyn FnMut(u64, ServiceError)>,
}

impl<'w, R, W, P> Service<'w, R, W, P>
where
    R: Read,
    W: Write + 'w,
    P: PaymentProvider,
{
    pub fn run(mut self) -> Result<()> {
        let engine = LedgerEngine::new(InMemoryStore::new(), self.config.settings.clone());
        let ledger = engine.create_wallet(&self.config.wallet)?;
        let wallet_id = ledger.wallet.id;
        let members: HashMap<String, MemberId> = ledger
            .members
            .iter()
            .map(|member| (member.email.to_lowercase(), member.id))
            .collect();

        let parser = CsvOperationParser::new(self.input);
        for (line, row) in parser {
            let result = row.map_err(ServiceError::from).and_then(|row| {
                apply_operation(&engine, wallet_id, &members, &mut self.provider, row)
            });
            if let Err(err) = result {
                (self.error_printer)(line, err);
            }
        }

        let ledger = engine.load(wallet_id)?;
        tracing::info!(
            wallet_id = %wallet_id,
            balance = %ledger.wallet.balance,
            transactions = ledger.transactions.len(),
            "replay finished"
        );
        write_history(self.output, &ledger.transactions, &ledger.members)
    }
}

fn apply_operation<S, P>(
    engine: &LedgerEngine<S>,
    wallet_id: WalletId,
    members: &HashMap<String, MemberId>,
    provider: &mut P,
    row: OperationRow,
) -> Result<(), ServiceError>
where
    S: RecordStore,
    P: PaymentProvider,
{
    let lookup = |email: &str| {
        members
            .get(&email.to_lowercase())
            .copied()
            .ok_or_else(|| ServiceError::UnknownMember {
                email: email.to_string(),
            })
    };
    let kind = row.kind;
    let required = |value: Option<Decimal>, field: &'static str| {
        value.ok_or(ServiceError::MissingField { kind, field })
    };
    let member_id = lookup(&row.member)?;
    let category = row.category.as_deref().unwrap_or_default();
    let description = row.description.as_deref().unwrap_or_default();

    match kind {
        OperationKind::Expense => {
            engine.submit_expense(
                wallet_id,
                member_id,
                required(row.amount, "amount")?,
                category,
                description,
            )?;
        }
        OperationKind::Payment => {
            engine.submit_payment(
                wallet_id,
                member_id,
                required(row.amount, "amount")?,
                category,
                description,
                provider,
            )?;
        }
        OperationKind::Transfer => {
            let to = row.to.as_deref().ok_or(ServiceError::MissingField {
                kind,
                field: "to",
            })?;
            engine.submit_transfer(
                wallet_id,
                member_id,
                lookup(to)?,
                required(row.amount, "amount")?,
                row.description.as_deref(),
            )?;
        }
        OperationKind::Topup => {
            let method = row.method.as_deref().ok_or(ServiceError::MissingField {
                kind,
                field: "method",
            })?;
            engine.top_up(
                wallet_id,
                member_id,
                required(row.amount, "amount")?,
                method,
                provider,
            )?;
        }
        OperationKind::Limits => {
            let to = row.to.as_deref().ok_or(ServiceError::MissingField {
                kind,
                field: "to",
            })?;
            engine.update_member_limits(
                wallet_id,
                member_id,
                lookup(to)?,
                required(row.amount, "amount")?,
                required(row.monthly_limit, "monthly_limit")?,
            )?;
        }
    }
    Ok(())
}
