use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    command::{
        AddMemberCommand, ConnectExternalCommand, LimitsCommand, SpendCommand, TopUpCommand,
        TransferCommand,
    },
    model::{
        ExternalWalletLink, Member, MemberId, Role, Transaction, TransactionId, TransactionKind,
        TransactionStatus, Wallet,
    },
    provider::ExternalAccount,
};

pub const TRANSFER_CATEGORY: &str = "Transfer";
pub const TOP_UP_CATEGORY: &str = "Top Up";

#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    Spent(Transaction),
    Transferred(Transaction),
    ToppedUp(Transaction),
    LimitsChanged {
        member_id: MemberId,
        daily_limit: Decimal,
        monthly_limit: Decimal,
    },
    MemberJoined(Member),
    ExternalLinked(ExternalWalletLink),
    ExternalSynced {
        balance: Decimal,
        at: DateTime<Utc>,
    },
    ExternalUnlinked,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Member {member_id} not found in this wallet")]
    MemberNotFound { member_id: MemberId },
    #[error("Member {member_id} is not active")]
    MemberInactive { member_id: MemberId },
    #[error("Member {member_id} is not allowed to manage this wallet")]
    NotAuthorized { member_id: MemberId },
    #[error("Email `{email}` is already used by another member")]
    DuplicateEmail { email: String },
    #[error("Daily limit exceeded: {spent} spent of {limit}, attempted {amount}")]
    LimitExceeded {
        limit: Decimal,
        spent: Decimal,
        amount: Decimal,
    },
    #[error("Insufficient funds: balance is {balance}, attempted {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },
    #[error("Transaction {tx_id} is already recorded")]
    DuplicateTransaction { tx_id: TransactionId },
    #[error("No external wallet is connected")]
    ExternalWalletNotConnected,
}

/// A wallet together with everything it owns.
///
/// Commands are validated by the `handle_*` methods, which never mutate, and the resulting
/// event is the only way to change state through [`WalletLedger::apply`].
#[derive(Debug, Clone)]
pub struct WalletLedger {
    pub wallet: Wallet,
    pub members: Vec<Member>,
    /// Newest first.
    pub transactions: Vec<Transaction>,
}

impl WalletLedger {
    pub fn member(&self, member_id: MemberId) -> Option<&Member> {
        self.members.iter().find(|member| member.id == member_id)
    }

    fn active_member(&self, member_id: MemberId) -> Result<&Member, WalletError> {
        let member = self
            .member(member_id)
            .ok_or(WalletError::MemberNotFound { member_id })?;
        if member.is_active {
            Ok(member)
        } else {
            Err(WalletError::MemberInactive { member_id })
        }
    }

    fn ensure_new_transaction(&self, tx_id: TransactionId) -> Result<(), WalletError> {
        if self.transactions.iter().any(|tx| tx.id == tx_id) {
            Err(WalletError::DuplicateTransaction { tx_id })
        } else {
            Ok(())
        }
    }

    fn ensure_funds(&self, amount: Decimal) -> Result<(), WalletError> {
        if amount > self.wallet.balance {
            Err(WalletError::InsufficientFunds {
                balance: self.wallet.balance,
                amount,
            })
        } else {
            Ok(())
        }
    }

    pub fn apply(&mut self, event: &WalletEvent) {
        match event {
            WalletEvent::Spent(tx) => {
                self.wallet.balance -= tx.amount;
                if let Some(member) = self.member_mut(tx.from_member_id) {
                    member.current_daily_spent += tx.amount;
                    member.current_monthly_spent += tx.amount;
                }
                self.transactions.insert(0, tx.clone());
            }
            WalletEvent::Transferred(tx) => {
                self.wallet.balance -= tx.amount;
                self.transactions.insert(0, tx.clone());
            }
            WalletEvent::ToppedUp(tx) => {
                self.wallet.balance += tx.amount;
                self.transactions.insert(0, tx.clone());
            }
            WalletEvent::LimitsChanged {
                member_id,
                daily_limit,
                monthly_limit,
            } => {
                if let Some(member) = self.member_mut(*member_id) {
                    member.daily_limit = *daily_limit;
                    member.monthly_limit = *monthly_limit;
                }
            }
            WalletEvent::MemberJoined(member) => {
                self.members.push(member.clone());
            }
            WalletEvent::ExternalLinked(link) => {
                self.wallet.external = Some(link.clone());
            }
            WalletEvent::ExternalSynced { balance, at } => {
                if let Some(link) = self.wallet.external.as_mut() {
                    link.balance = *balance;
                    link.last_sync = *at;
                }
            }
            WalletEvent::ExternalUnlinked => {
                self.wallet.external = None;
            }
        }
    }

    fn member_mut(&mut self, member_id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|member| member.id == member_id)
    }

    /// Expenses and payments. Only the daily limit is enforced, the monthly one is informational.
    pub fn handle_spend(&self, command: SpendCommand) -> Result<WalletEvent, WalletError> {
        self.ensure_new_transaction(command.tx_id)?;
        let member = self.active_member(command.member_id)?;

        if member.role != Role::Admin
            && member.current_daily_spent + command.amount > member.daily_limit
        {
            return Err(WalletError::LimitExceeded {
                limit: member.daily_limit,
                spent: member.current_daily_spent,
                amount: command.amount,
            });
        }
        self.ensure_funds(command.amount)?;

        Ok(WalletEvent::Spent(Transaction {
            id: command.tx_id,
            wallet_id: self.wallet.id,
            from_member_id: member.id,
            to_member_id: None,
            amount: command.amount,
            kind: command.kind.into(),
            category: command.category,
            description: command.description,
            status: TransactionStatus::Completed,
            timestamp: command.at,
        }))
    }

    /// Transfers stay inside the family pool, so neither limits nor spend counters are involved.
    pub fn handle_transfer(&self, command: TransferCommand) -> Result<WalletEvent, WalletError> {
        self.ensure_new_transaction(command.tx_id)?;
        let sender = self.active_member(command.from_member_id)?;
        let recipient = self.active_member(command.to_member_id)?;
        self.ensure_funds(command.amount)?;

        let description = command
            .note
            .unwrap_or_else(|| format!("Transfer to {}", recipient.name));
        Ok(WalletEvent::Transferred(Transaction {
            id: command.tx_id,
            wallet_id: self.wallet.id,
            from_member_id: sender.id,
            to_member_id: Some(recipient.id),
            amount: command.amount,
            kind: TransactionKind::Transfer,
            category: TRANSFER_CATEGORY.to_string(),
            description,
            status: TransactionStatus::Completed,
            timestamp: command.at,
        }))
    }

    pub fn handle_top_up(&self, command: &TopUpCommand) -> Result<WalletEvent, WalletError> {
        self.ensure_new_transaction(command.tx_id)?;
        let member = self.active_member(command.member_id)?;

        Ok(WalletEvent::ToppedUp(Transaction {
            id: command.tx_id,
            wallet_id: self.wallet.id,
            from_member_id: member.id,
            to_member_id: None,
            amount: command.amount,
            kind: TransactionKind::TopUp,
            category: TOP_UP_CATEGORY.to_string(),
            description: format!("Top up via {}", command.method.name),
            status: TransactionStatus::Completed,
            timestamp: command.at,
        }))
    }

    pub fn handle_limits(&self, command: LimitsCommand) -> Result<WalletEvent, WalletError> {
        let caller = self.active_member(command.caller_id)?;
        if caller.role != Role::Admin {
            return Err(WalletError::NotAuthorized {
                member_id: caller.id,
            });
        }
        let member = self
            .member(command.member_id)
            .ok_or(WalletError::MemberNotFound {
                member_id: command.member_id,
            })?;

        Ok(WalletEvent::LimitsChanged {
            member_id: member.id,
            daily_limit: command.daily_limit,
            monthly_limit: command.monthly_limit,
        })
    }

    pub fn handle_add_member(&self, command: AddMemberCommand) -> Result<WalletEvent, WalletError> {
        if self
            .members
            .iter()
            .any(|member| member.email.eq_ignore_ascii_case(&command.email))
        {
            return Err(WalletError::DuplicateEmail {
                email: command.email,
            });
        }

        Ok(WalletEvent::MemberJoined(Member {
            id: command.member_id,
            wallet_id: self.wallet.id,
            name: command.name,
            email: command.email,
            role: Role::Member,
            daily_limit: command.daily_limit,
            monthly_limit: command.monthly_limit,
            current_daily_spent: Decimal::ZERO,
            current_monthly_spent: Decimal::ZERO,
            is_active: true,
            created_at: command.at,
        }))
    }

    /// Connecting again replaces the current link.
    pub fn handle_connect_external(
        &self,
        command: ConnectExternalCommand,
        account: ExternalAccount,
        at: DateTime<Utc>,
    ) -> WalletEvent {
        WalletEvent::ExternalLinked(ExternalWalletLink {
            phone_number: command.phone_number,
            account_name: account.account_name,
            balance: account.balance,
            last_sync: at,
            transactions: account.transactions,
        })
    }

    pub fn handle_sync_external(
        &self,
        balance: Decimal,
        at: DateTime<Utc>,
    ) -> Result<WalletEvent, WalletError> {
        self.external_link()?;
        Ok(WalletEvent::ExternalSynced { balance, at })
    }

    pub fn handle_disconnect_external(&self) -> Result<WalletEvent, WalletError> {
        self.external_link()?;
        Ok(WalletEvent::ExternalUnlinked)
    }

    pub fn external_link(&self) -> Result<&ExternalWalletLink, WalletError> {
        self.wallet
            .external
            .as_ref()
            .ok_or(WalletError::ExternalWalletNotConnected)
    }
}
