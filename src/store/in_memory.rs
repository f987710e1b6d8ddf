use std::{collections::HashMap, sync::RwLock};

use crate::{
    model::{Member, Transaction, Wallet, WalletId},
    query::TransactionFilter,
};

use super::{ChangeSet, RecordStore, StoreError};

#[derive(Debug, Default)]
struct Records {
    wallets: HashMap<WalletId, Wallet>,
    /// Insertion order.
    members: HashMap<WalletId, Vec<Member>>,
    /// Newest first.
    transactions: HashMap<WalletId, Vec<Transaction>>,
}

impl Records {
    /// `pending` is a wallet written in the same change set.
    fn check_parent(
        &self,
        wallet_id: WalletId,
        pending: Option<&Wallet>,
        record: impl FnOnce() -> String,
    ) -> Result<(), StoreError> {
        if self.wallets.contains_key(&wallet_id) || pending.is_some_and(|w| w.id == wallet_id) {
            Ok(())
        } else {
            Err(StoreError::UnknownParent {
                wallet_id,
                record: record(),
            })
        }
    }

    fn check_new_transaction(
        &self,
        tx: &Transaction,
        pending: Option<&Wallet>,
    ) -> Result<(), StoreError> {
        self.check_parent(tx.wallet_id, pending, || format!("transaction {}", tx.id))?;
        let stored = self.transactions.get(&tx.wallet_id);
        if stored.is_some_and(|stored| stored.iter().any(|stored| stored.id == tx.id)) {
            return Err(StoreError::Conflict {
                record: format!("transaction {}", tx.id),
            });
        }
        Ok(())
    }

    fn upsert_member(&mut self, member: &Member) {
        let members = self.members.entry(member.wallet_id).or_default();
        match members.iter_mut().find(|stored| stored.id == member.id) {
            Some(stored) => *stored = member.clone(),
            None => members.push(member.clone()),
        }
    }

    fn insert_transaction(&mut self, tx: &Transaction) {
        self.transactions
            .entry(tx.wallet_id)
            .or_default()
            .insert(0, tx.clone());
    }
}

/// Store used by tests and the command line replay. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Records>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryStore {
    fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        records
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or(StoreError::WalletNotFound { wallet_id })
    }

    fn put_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    fn list_members(&self, wallet_id: WalletId) -> Result<Vec<Member>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.members.get(&wallet_id).cloned().unwrap_or_default())
    }

    fn put_member(&self, member: &Member) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.check_parent(member.wallet_id, None, || format!("member {}", member.id))?;
        records.upsert_member(member);
        Ok(())
    }

    fn list_transactions(
        &self,
        wallet_id: WalletId,
        filter: Option<&TransactionFilter>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let Some(transactions) = records.transactions.get(&wallet_id) else {
            return Ok(Vec::new());
        };
        Ok(match filter {
            Some(filter) => filter.apply(transactions).into_inner(),
            None => transactions.clone(),
        })
    }

    fn put_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.check_new_transaction(tx, None)?;
        records.insert_transaction(tx);
        Ok(())
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let pending = changes.wallet.as_ref();
        for member in &changes.members {
            records.check_parent(member.wallet_id, pending, || format!("member {}", member.id))?;
        }
        if let Some(tx) = &changes.transaction {
            records.check_new_transaction(tx, pending)?;
        }

        if let Some(wallet) = pending {
            records.wallets.insert(wallet.id, wallet.clone());
        }
        for member in &changes.members {
            records.upsert_member(member);
        }
        if let Some(tx) = &changes.transaction {
            records.insert_transaction(tx);
        }
        Ok(())
    }
}
