use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, prelude::Zero};
use thiserror::Error;

use crate::{
    config::LedgerSettings,
    model::{MemberId, TopUpMethod, TransactionId, TransactionKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendKind {
    Expense,
    Payment,
}

impl From<SpendKind> for TransactionKind {
    fn from(kind: SpendKind) -> Self {
        match kind {
            SpendKind::Expense => TransactionKind::Expense,
            SpendKind::Payment => TransactionKind::Payment,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Amount must be positive for {kind:?}")]
    NonPositiveAmount { kind: TransactionKind },
    #[error("Top up amount {amount} is below the minimum of {minimum}")]
    BelowMinimumTopUp { amount: Decimal, minimum: Decimal },
    #[error("Top up method `{method_id}` is not available")]
    UnknownMethod { method_id: String },
    #[error("Limits must not be negative")]
    NegativeLimit,
    #[error("A member cannot transfer to themselves")]
    SelfTransfer,
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("A wallet needs an admin member")]
    MissingAdmin,
    #[error("Initial balance must not be negative")]
    NegativeBalance,
    #[error("Phone number must have at least {min_digits} digits")]
    InvalidPhoneNumber { min_digits: usize },
    #[error("Top up session lifetime of {minutes} minutes is out of range")]
    SessionTtlOutOfRange { minutes: i64 },
}

fn positive(amount: Decimal, kind: TransactionKind) -> Result<Decimal, CommandError> {
    if amount > Decimal::zero() {
        Ok(amount)
    } else {
        Err(CommandError::NonPositiveAmount { kind })
    }
}

fn required(value: &str, field: &'static str) -> Result<String, CommandError> {
    let value = value.trim();
    if value.is_empty() {
        Err(CommandError::MissingField { field })
    } else {
        Ok(value.to_string())
    }
}

/// Money leaving the family pool, either a manual expense or a scanned payment.
#[derive(Debug, Clone)]
pub struct SpendCommand {
    pub tx_id: TransactionId,
    pub member_id: MemberId,
    pub kind: SpendKind,
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    pub at: DateTime<Utc>,
}

impl SpendCommand {
    pub fn new(
        tx_id: TransactionId,
        member_id: MemberId,
        kind: SpendKind,
        amount: Decimal,
        category: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<Self, CommandError> {
        Ok(Self {
            tx_id,
            member_id,
            kind,
            amount: positive(amount, kind.into())?,
            category: required(category, "Category")?,
            description: description.trim().to_string(),
            at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub tx_id: TransactionId,
    pub from_member_id: MemberId,
    pub to_member_id: MemberId,
    pub amount: Decimal,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

impl TransferCommand {
    pub fn new(
        tx_id: TransactionId,
        from_member_id: MemberId,
        to_member_id: MemberId,
        amount: Decimal,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Self, CommandError> {
        if from_member_id == to_member_id {
            return Err(CommandError::SelfTransfer);
        }
        Ok(Self {
            tx_id,
            from_member_id,
            to_member_id,
            amount: positive(amount, TransactionKind::Transfer)?,
            note: note
                .map(str::trim)
                .filter(|note| !note.is_empty())
                .map(ToOwned::to_owned),
            at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TopUpCommand {
    pub tx_id: TransactionId,
    pub member_id: MemberId,
    pub amount: Decimal,
    pub method: TopUpMethod,
    pub at: DateTime<Utc>,
}

impl TopUpCommand {
    pub fn new(
        tx_id: TransactionId,
        member_id: MemberId,
        amount: Decimal,
        method_id: &str,
        settings: &LedgerSettings,
        at: DateTime<Utc>,
    ) -> Result<Self, CommandError> {
        let amount = positive(amount, TransactionKind::TopUp)?;
        if amount < settings.min_top_up {
            return Err(CommandError::BelowMinimumTopUp {
                amount,
                minimum: settings.min_top_up,
            });
        }
        let method = settings
            .method(method_id)
            .filter(|method| method.is_active)
            .ok_or_else(|| CommandError::UnknownMethod {
                method_id: method_id.to_string(),
            })?;
        Ok(Self {
            tx_id,
            member_id,
            amount,
            method: method.clone(),
            at,
        })
    }

    /// What the member pays to the provider. Only `amount` reaches the wallet.
    pub fn total_charge(&self) -> Decimal {
        self.amount + self.method.fee
    }
}

#[derive(Debug, Clone)]
pub struct LimitsCommand {
    pub caller_id: MemberId,
    pub member_id: MemberId,
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
}

impl LimitsCommand {
    pub fn new(
        caller_id: MemberId,
        member_id: MemberId,
        daily_limit: Decimal,
        monthly_limit: Decimal,
    ) -> Result<Self, CommandError> {
        if daily_limit < Decimal::zero() || monthly_limit < Decimal::zero() {
            return Err(CommandError::NegativeLimit);
        }
        Ok(Self {
            caller_id,
            member_id,
            daily_limit,
            monthly_limit,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AddMemberCommand {
    pub member_id: MemberId,
    pub name: String,
    pub email: String,
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
    pub at: DateTime<Utc>,
}

impl AddMemberCommand {
    pub fn new(
        member_id: MemberId,
        name: &str,
        email: &str,
        daily_limit: Decimal,
        monthly_limit: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Self, CommandError> {
        if daily_limit < Decimal::zero() || monthly_limit < Decimal::zero() {
            return Err(CommandError::NegativeLimit);
        }
        Ok(Self {
            member_id,
            name: required(name, "Name")?,
            email: required(email, "Email")?,
            daily_limit,
            monthly_limit,
            at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConnectExternalCommand {
    pub phone_number: String,
}

impl ConnectExternalCommand {
    pub fn new(phone_number: &str, settings: &LedgerSettings) -> Result<Self, CommandError> {
        let phone_number = phone_number.trim();
        let digits = phone_number.chars().filter(char::is_ascii_digit).count();
        if digits < settings.min_phone_digits {
            return Err(CommandError::InvalidPhoneNumber {
                min_digits: settings.min_phone_digits,
            });
        }
        Ok(Self {
            phone_number: phone_number.to_string(),
        })
    }
}
