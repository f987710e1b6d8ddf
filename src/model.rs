use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, prelude::Zero};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type WalletId = Uuid;
pub type MemberId = Uuid;
pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Payment,
    Transfer,
    #[serde(rename = "topup")]
    TopUp,
}

impl TransactionKind {
    pub fn label(self) -> &'static str {
        match self {
            TransactionKind::Expense => "Expense",
            TransactionKind::Payment => "Payment",
            TransactionKind::Transfer => "Transfer",
            TransactionKind::TopUp => "Top Up",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
}

impl TransactionStatus {
    pub fn label(self) -> &'static str {
        match self {
            TransactionStatus::Completed => "Completed",
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: MemberId,
    pub wallet_id: WalletId,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Ignored for admins.
    pub daily_limit: Decimal,
    /// Ignored for admins.
    pub monthly_limit: Decimal,
    /// Never reset: there is no day rollover yet.
    pub current_daily_spent: Decimal,
    /// Never reset: there is no month rollover yet.
    pub current_monthly_spent: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Limit usage of a member, in percent, clamped to `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitProgress {
    pub daily_percent: Decimal,
    pub monthly_percent: Decimal,
}

impl Member {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn limit_progress(&self) -> LimitProgress {
        LimitProgress {
            daily_percent: percent_of(self.current_daily_spent, self.daily_limit),
            monthly_percent: percent_of(self.current_monthly_spent, self.monthly_limit),
        }
    }

    pub fn remaining_daily_limit(&self) -> Decimal {
        (self.daily_limit - self.current_daily_spent).max(Decimal::zero())
    }
}

fn percent_of(spent: Decimal, limit: Decimal) -> Decimal {
    if limit <= Decimal::zero() {
        return Decimal::zero();
    }
    (spent / limit * Decimal::ONE_HUNDRED).clamp(Decimal::zero(), Decimal::ONE_HUNDRED)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub from_member_id: MemberId,
    /// Only set for transfers.
    pub to_member_id: Option<MemberId>,
    /// Always a positive magnitude, direction follows `kind`.
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category: String,
    pub description: String,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExternalFlow {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalTransaction {
    pub id: String,
    pub amount: Decimal,
    pub flow: ExternalFlow,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub merchant: Option<String>,
}

/// Mirror of a third party e-wallet. Its balance is never reconciled with the wallet balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalWalletLink {
    pub phone_number: String,
    pub account_name: String,
    pub balance: Decimal,
    pub last_sync: DateTime<Utc>,
    pub transactions: Vec<ExternalTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wallet {
    pub id: WalletId,
    pub name: String,
    pub balance: Decimal,
    pub currency: String,
    pub admin_id: MemberId,
    pub created_at: DateTime<Utc>,
    /// `None` while no external wallet is connected.
    pub external: Option<ExternalWalletLink>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Bank,
    Ewallet,
    Card,
}

/// Funding source for top ups. The fee is charged externally on top of the amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopUpMethod {
    pub id: String,
    pub name: String,
    pub kind: MethodKind,
    pub fee: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::FromPrimitive;

    use super::*;

    fn member(daily_limit: u32, daily_spent: u32) -> Member {
        Member {
            id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            name: "Ibu".to_string(),
            email: "ibu@example.com".to_string(),
            role: Role::Member,
            daily_limit: Decimal::from_u32(daily_limit).unwrap(),
            monthly_limit: Decimal::from_u32(5_000_000).unwrap(),
            current_daily_spent: Decimal::from_u32(daily_spent).unwrap(),
            current_monthly_spent: Decimal::from_u32(daily_spent).unwrap(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn limit_progress_is_a_percentage() {
        let progress = member(300_000, 75_000).limit_progress();
        assert_eq!(progress.daily_percent, Decimal::from_u32(25).unwrap());
        assert_eq!(
            progress.monthly_percent,
            Decimal::from_f64(1.5).unwrap()
        );
    }

    #[test]
    fn limit_progress_is_clamped() {
        // admins are not limited, so spending can go past the configured value
        let mut admin = member(100_000, 250_000);
        admin.role = Role::Admin;
        assert_eq!(admin.limit_progress().daily_percent, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn zero_limit_yields_zero_percent() {
        let progress = member(0, 10_000).limit_progress();
        assert_eq!(progress.daily_percent, Decimal::zero());
    }

    #[test]
    fn remaining_daily_limit_never_negative() {
        assert_eq!(
            member(300_000, 100_000).remaining_daily_limit(),
            Decimal::from_u32(200_000).unwrap()
        );
        assert_eq!(member(100_000, 150_000).remaining_daily_limit(), Decimal::zero());
    }

    #[test]
    fn labels() {
        assert_eq!(TransactionKind::TopUp.label(), "Top Up");
        assert_eq!(TransactionStatus::Failed.label(), "Failed");
    }
}
