use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use thiserror::Error;

use crate::{
    command::CommandError,
    model::{TransactionId, WalletId},
    provider::GatewayError,
    store::StoreError,
    wallet::WalletError,
};

pub mod engine;
pub mod top_up;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    CommandErr(#[from] CommandError),
    #[error(transparent)]
    WalletErr(#[from] WalletError),
    #[error(transparent)]
    StoreErr(#[from] StoreError),
    #[error(transparent)]
    GatewayErr(#[from] GatewayError),
    #[error("Top up session {session_id} has expired")]
    TopUpSessionExpired { session_id: TransactionId },
    #[error("Wallet lock poisoned")]
    LockPoisoned,
}

/// Coarse classification of failures, for callers that only need to tell the user what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAmount,
    InvalidInput,
    LimitExceeded,
    InsufficientFunds,
    MemberNotFound,
    WalletNotFound,
    NotAuthorized,
    DuplicateEmail,
    Conflict,
    ExternalWallet,
    SessionExpired,
    Internal,
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::CommandErr(err) => match err {
                CommandError::NonPositiveAmount { .. } | CommandError::BelowMinimumTopUp { .. } => {
                    ErrorKind::InvalidAmount
                }
                CommandError::UnknownMethod { .. }
                | CommandError::NegativeLimit
                | CommandError::SelfTransfer
                | CommandError::MissingField { .. }
                | CommandError::MissingAdmin
                | CommandError::NegativeBalance
                | CommandError::InvalidPhoneNumber { .. }
                | CommandError::SessionTtlOutOfRange { .. } => ErrorKind::InvalidInput,
            },
            ProcessError::WalletErr(err) => match err {
                WalletError::MemberNotFound { .. } | WalletError::MemberInactive { .. } => {
                    ErrorKind::MemberNotFound
                }
                WalletError::NotAuthorized { .. } => ErrorKind::NotAuthorized,
                WalletError::DuplicateEmail { .. } => ErrorKind::DuplicateEmail,
                WalletError::LimitExceeded { .. } => ErrorKind::LimitExceeded,
                WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
                WalletError::DuplicateTransaction { .. } => ErrorKind::Conflict,
                WalletError::ExternalWalletNotConnected => ErrorKind::ExternalWallet,
            },
            ProcessError::StoreErr(StoreError::WalletNotFound { .. }) => ErrorKind::WalletNotFound,
            ProcessError::StoreErr(StoreError::Conflict { .. }) => ErrorKind::Conflict,
            ProcessError::StoreErr(_) | ProcessError::LockPoisoned => ErrorKind::Internal,
            ProcessError::GatewayErr(_) => ErrorKind::ExternalWallet,
            ProcessError::TopUpSessionExpired { .. } => ErrorKind::SessionExpired,
        }
    }
}

/// One mutex per wallet. Every balance or counter mutation of a wallet runs while holding it.
#[derive(Debug, Default)]
pub(crate) struct WalletLocks {
    locks: Mutex<HashMap<WalletId, Arc<Mutex<()>>>>,
}

impl WalletLocks {
    pub(crate) fn for_wallet(&self, wallet_id: WalletId) -> Result<Arc<Mutex<()>>, ProcessError> {
        let mut locks = self.locks.lock().map_err(|_| ProcessError::LockPoisoned)?;
        Ok(locks.entry(wallet_id).or_default().clone())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn error_kinds() {
        let err: ProcessError = CommandError::BelowMinimumTopUp {
            amount: Decimal::from(9_999),
            minimum: Decimal::from(10_000),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let err: ProcessError = WalletError::MemberInactive {
            member_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::MemberNotFound);

        let err: ProcessError = StoreError::WalletNotFound {
            wallet_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::WalletNotFound);

        assert_eq!(ProcessError::LockPoisoned.kind(), ErrorKind::Internal);
    }

    #[test]
    fn same_wallet_shares_a_lock() {
        let locks = WalletLocks::default();
        let wallet_id = Uuid::new_v4();
        let first = locks.for_wallet(wallet_id).unwrap();
        let second = locks.for_wallet(wallet_id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &locks.for_wallet(Uuid::new_v4()).unwrap()));
    }
}
