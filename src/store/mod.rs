use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::{
    model::{Member, MemberId, Transaction, TransactionId, Wallet, WalletId},
    query::TransactionFilter,
};

pub mod in_memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Wallet {wallet_id} not found")]
    WalletNotFound { wallet_id: WalletId },
    #[error("Wallet {wallet_id} does not exist for {record}")]
    UnknownParent { wallet_id: WalletId, record: String },
    #[error("{record} is already stored and cannot be replaced")]
    Conflict { record: String },
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Persistence the ledger reads from and writes back to.
///
/// Transactions are listed newest first. Implementations may be remote, the ledger only
/// needs each call to be visible to the next one made under the same wallet lock.
pub trait RecordStore {
    fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, StoreError>;
    fn put_wallet(&self, wallet: &Wallet) -> Result<(), StoreError>;
    fn list_members(&self, wallet_id: WalletId) -> Result<Vec<Member>, StoreError>;
    fn put_member(&self, member: &Member) -> Result<(), StoreError>;
    fn list_transactions(
        &self,
        wallet_id: WalletId,
        filter: Option<&TransactionFilter>,
    ) -> Result<Vec<Transaction>, StoreError>;
    fn put_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Writes every record of `changes` or none of them.
    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError>;
}

/// Records touched by one ledger event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub wallet: Option<Wallet>,
    pub members: Vec<Member>,
    pub transaction: Option<Transaction>,
}

impl ChangeSet {
    /// Notices in write order: transaction, members, wallet.
    pub fn notices(&self, wallet_id: WalletId) -> Vec<ChangeNotice> {
        self.transaction
            .iter()
            .map(|tx| ChangedRecord::Transaction(tx.id))
            .chain(self.members.iter().map(|member| ChangedRecord::Member(member.id)))
            .chain(self.wallet.iter().map(|_| ChangedRecord::Wallet))
            .map(|record| ChangeNotice { wallet_id, record })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedRecord {
    Wallet,
    Member(MemberId),
    Transaction(TransactionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    pub wallet_id: WalletId,
    pub record: ChangedRecord,
}

/// Fan-out of committed changes, for views that cache wallet state.
///
/// Best effort: subscribers that hung up are dropped on the next publish.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Mutex<Vec<mpsc::Sender<ChangeNotice>>>,
}

impl ChangeFeed {
    pub fn subscribe(&self) -> mpsc::Receiver<ChangeNotice> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn publish(&self, notice: ChangeNotice) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            tracing::warn!(wallet_id = %notice.wallet_id, "change feed lock poisoned");
            return;
        };
        subscribers.retain(|tx| tx.send(notice).is_ok());
    }
}
