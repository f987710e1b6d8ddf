use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    command::TopUpCommand,
    model::{
        MemberId, TopUpMethod, Transaction, TransactionId, TransactionKind, TransactionStatus,
        WalletId,
    },
    wallet::TOP_UP_CATEGORY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    /// The provider approved the charge but the wallet was not credited yet.
    Charged,
    Completed,
    /// Last provider attempt was declined, the session can be submitted again.
    Failed,
    Expired,
}

/// A top up waiting for the external provider.
///
/// The session id doubles as the id of the transaction it commits, so a session can credit the
/// wallet at most once no matter how often it is submitted.
#[derive(Debug, Clone)]
pub struct TopUpSession {
    pub wallet_id: WalletId,
    pub(crate) command: TopUpCommand,
    pub status: SessionStatus,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_decline: Option<String>,
}

impl TopUpSession {
    pub(crate) fn new(wallet_id: WalletId, command: TopUpCommand, expires_at: DateTime<Utc>) -> Self {
        Self {
            wallet_id,
            command,
            status: SessionStatus::Pending,
            attempts: 0,
            expires_at,
            completed_at: None,
            last_decline: None,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.command.tx_id
    }

    pub fn member_id(&self) -> MemberId {
        self.command.member_id
    }

    pub fn amount(&self) -> Decimal {
        self.command.amount
    }

    pub fn method(&self) -> &TopUpMethod {
        &self.command.method
    }

    pub fn total_charge(&self) -> Decimal {
        self.command.total_charge()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Expired || now > self.expires_at
    }

    /// How the session looks as a transaction, without touching the ledger.
    pub fn transaction(&self) -> Transaction {
        let status = match self.status {
            SessionStatus::Pending | SessionStatus::Charged => TransactionStatus::Pending,
            SessionStatus::Completed => TransactionStatus::Completed,
            SessionStatus::Failed | SessionStatus::Expired => TransactionStatus::Failed,
        };
        Transaction {
            id: self.command.tx_id,
            wallet_id: self.wallet_id,
            from_member_id: self.command.member_id,
            to_member_id: None,
            amount: self.command.amount,
            kind: TransactionKind::TopUp,
            category: TOP_UP_CATEGORY.to_string(),
            description: format!("Top up via {}", self.command.method.name),
            status,
            timestamp: self.completed_at.unwrap_or(self.command.at),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use crate::config::LedgerSettings;

    use super::*;

    fn session() -> TopUpSession {
        let now = Utc::now();
        let command = TopUpCommand::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decimal::from(50_000),
            "dana",
            &LedgerSettings::default(),
            now,
        )
        .unwrap();
        TopUpSession::new(Uuid::new_v4(), command, now + Duration::minutes(30))
    }

    #[test]
    fn new_session_is_pending() {
        let session = session();
        assert_eq!(session.status, SessionStatus::Pending);
        let tx = session.transaction();
        assert_eq!(tx.id, session.id());
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.description, "Top up via Dana");
    }

    #[test]
    fn expiry() {
        let mut session = session();
        assert!(!session.is_expired(Utc::now()));
        assert!(session.is_expired(Utc::now() + Duration::minutes(31)));
        session.status = SessionStatus::Expired;
        assert!(session.is_expired(Utc::now()));
        assert_eq!(session.transaction().status, TransactionStatus::Failed);
    }
}
