use std::sync::mpsc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    command::{
        AddMemberCommand, CommandError, ConnectExternalCommand, LimitsCommand, SpendCommand,
        SpendKind, TopUpCommand, TransferCommand,
    },
    config::{LedgerSettings, WalletSeed},
    model::{
        ExternalWalletLink, LimitProgress, Member, MemberId, Role, Transaction,
        TransactionStatus, Wallet, WalletId,
    },
    provider::{ChargeOutcome, ChargeRequest, ExternalWalletGateway, PaymentProvider},
    query::{FilteredTransactions, TransactionFilter},
    store::{ChangeFeed, ChangeNotice, ChangeSet, ChangedRecord, RecordStore},
    wallet::{WalletError, WalletEvent, WalletLedger},
};

use super::{
    ProcessError, WalletLocks,
    top_up::{SessionStatus, TopUpSession},
};

/// Entry point for every wallet operation.
///
/// Mutations of a wallet are serialized through a per-wallet lock: the aggregate is loaded,
/// the command is validated into an event, the event is applied and the touched records are
/// written back before the lock is released. A rejected command writes nothing.
pub struct LedgerEngine<S> {
    store: S,
    settings: LedgerSettings,
    locks: WalletLocks,
    feed: ChangeFeed,
}

impl<S> LedgerEngine<S>
where
    S: RecordStore,
{
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self {
            store,
            settings,
            locks: WalletLocks::default(),
            feed: ChangeFeed::default(),
        }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receives a notice for every record written by this engine.
    pub fn subscribe(&self) -> mpsc::Receiver<ChangeNotice> {
        self.feed.subscribe()
    }

    pub fn create_wallet(&self, seed: &WalletSeed) -> Result<WalletLedger, ProcessError> {
        if seed.initial_balance < Decimal::ZERO {
            return Err(CommandError::NegativeBalance.into());
        }
        let admin_seed = seed
            .members
            .iter()
            .find(|member| member.role == Role::Admin)
            .ok_or(CommandError::MissingAdmin)?;

        let now = Utc::now();
        let mut ledger = WalletLedger {
            wallet: Wallet {
                id: Uuid::new_v4(),
                name: seed.name.clone(),
                balance: seed.initial_balance,
                currency: seed.currency.clone(),
                admin_id: Uuid::nil(),
                created_at: now,
                external: None,
            },
            members: Vec::with_capacity(seed.members.len()),
            transactions: Vec::new(),
        };
        for member_seed in &seed.members {
            let command = AddMemberCommand::new(
                Uuid::new_v4(),
                &member_seed.name,
                &member_seed.email,
                member_seed.daily_limit,
                member_seed.monthly_limit,
                now,
            )?;
            let WalletEvent::MemberJoined(mut member) = ledger.handle_add_member(command)? else {
                unreachable!("adding a member always yields MemberJoined");
            };
            member.role = member_seed.role;
            if std::ptr::eq(member_seed, admin_seed) {
                ledger.wallet.admin_id = member.id;
            }
            ledger.apply(&WalletEvent::MemberJoined(member));
        }

        self.store.commit(&ChangeSet {
            wallet: Some(ledger.wallet.clone()),
            members: ledger.members.clone(),
            transaction: None,
        })?;
        info!(
            wallet_id = %ledger.wallet.id,
            members = ledger.members.len(),
            balance = %ledger.wallet.balance,
            "wallet created"
        );
        self.feed.publish(ChangeNotice {
            wallet_id: ledger.wallet.id,
            record: ChangedRecord::Wallet,
        });
        Ok(ledger)
    }

    /// Snapshot of a wallet with its members and history.
    pub fn load(&self, wallet_id: WalletId) -> Result<WalletLedger, ProcessError> {
        Ok(WalletLedger {
            wallet: self.store.get_wallet(wallet_id)?,
            members: self.store.list_members(wallet_id)?,
            transactions: self.store.list_transactions(wallet_id, None)?,
        })
    }

    pub fn wallet(&self, wallet_id: WalletId) -> Result<Wallet, ProcessError> {
        Ok(self.store.get_wallet(wallet_id)?)
    }

    pub fn members(&self, wallet_id: WalletId) -> Result<Vec<Member>, ProcessError> {
        Ok(self.store.list_members(wallet_id)?)
    }

    pub fn submit_expense(
        &self,
        wallet_id: WalletId,
        member_id: MemberId,
        amount: Decimal,
        category: &str,
        description: &str,
    ) -> Result<Transaction, ProcessError> {
        let command = SpendCommand::new(
            Uuid::new_v4(),
            member_id,
            SpendKind::Expense,
            amount,
            category,
            description,
            Utc::now(),
        )?;
        let (ledger, event) =
            self.commit(wallet_id, |ledger| Ok(Some(ledger.handle_spend(command)?)))?;
        let tx = committed_transaction(event);
        info!(
            wallet_id = %wallet_id,
            member_id = %member_id,
            amount = %tx.amount,
            balance = %ledger.wallet.balance,
            "expense recorded"
        );
        Ok(tx)
    }

    /// Scan-and-pay flow. The provider is charged while the wallet is locked, after the
    /// command passed validation. A declined charge returns a `failed` transaction and
    /// leaves the ledger untouched.
    pub fn submit_payment(
        &self,
        wallet_id: WalletId,
        member_id: MemberId,
        amount: Decimal,
        category: &str,
        description: &str,
        provider: &mut impl PaymentProvider,
    ) -> Result<Transaction, ProcessError> {
        let command = SpendCommand::new(
            Uuid::new_v4(),
            member_id,
            SpendKind::Payment,
            amount,
            category,
            description,
            Utc::now(),
        )?;
        let request = ChargeRequest {
            reference: command.tx_id,
            member_id,
            amount: command.amount,
            method_id: None,
        };
        let mut declined = None;
        let (_, event) = self.commit(wallet_id, |ledger| {
            let event = ledger.handle_spend(command)?;
            match provider.charge(&request) {
                ChargeOutcome::Approved => Ok(Some(event)),
                ChargeOutcome::Declined { reason } => {
                    declined = Some((event, reason));
                    Ok(None)
                }
            }
        })?;

        if let Some((event, reason)) = declined {
            warn!(wallet_id = %wallet_id, member_id = %member_id, %reason, "payment declined");
            let mut tx = committed_transaction(Some(event));
            tx.status = TransactionStatus::Failed;
            return Ok(tx);
        }
        let tx = committed_transaction(event);
        info!(wallet_id = %wallet_id, member_id = %member_id, amount = %tx.amount, "payment recorded");
        Ok(tx)
    }

    pub fn submit_transfer(
        &self,
        wallet_id: WalletId,
        from_member_id: MemberId,
        to_member_id: MemberId,
        amount: Decimal,
        note: Option<&str>,
    ) -> Result<Transaction, ProcessError> {
        let command = TransferCommand::new(
            Uuid::new_v4(),
            from_member_id,
            to_member_id,
            amount,
            note,
            Utc::now(),
        )?;
        let (_, event) =
            self.commit(wallet_id, |ledger| Ok(Some(ledger.handle_transfer(command)?)))?;
        let tx = committed_transaction(event);
        info!(
            wallet_id = %wallet_id,
            from = %from_member_id,
            to = %to_member_id,
            amount = %tx.amount,
            "transfer recorded"
        );
        Ok(tx)
    }

    /// Validates a top up and opens a pending session for it. Nothing is written yet.
    pub fn start_top_up(
        &self,
        wallet_id: WalletId,
        member_id: MemberId,
        amount: Decimal,
        method_id: &str,
    ) -> Result<TopUpSession, ProcessError> {
        let now = Utc::now();
        let command =
            TopUpCommand::new(Uuid::new_v4(), member_id, amount, method_id, &self.settings, now)
                .inspect_err(|err| warn!(wallet_id = %wallet_id, error = %err, "top up rejected"))?;
        // fail early for unknown members, the commit checks again
        self.load(wallet_id)?
            .handle_top_up(&command)
            .inspect_err(|err| warn!(wallet_id = %wallet_id, error = %err, "top up rejected"))?;

        let minutes = self.settings.top_up_session_ttl_minutes;
        let expires_at = Duration::try_minutes(minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(CommandError::SessionTtlOutOfRange { minutes })?;
        Ok(TopUpSession::new(wallet_id, command, expires_at))
    }

    /// Charges the provider for the session and credits the wallet once it is approved.
    ///
    /// The charge happens under the wallet lock and only when the session id is not in the
    /// log yet, so a stale copy of a completed session is never billed again. Declined sessions
    /// end up `Failed` and may be submitted again. A session that was charged but could not be
    /// committed stays `Charged` and the next submit commits it without charging.
    pub fn submit_top_up(
        &self,
        session: &mut TopUpSession,
        provider: &mut impl PaymentProvider,
    ) -> Result<Transaction, ProcessError> {
        match session.status {
            SessionStatus::Completed => return Ok(session.transaction()),
            SessionStatus::Expired => {
                return Err(ProcessError::TopUpSessionExpired {
                    session_id: session.id(),
                });
            }
            SessionStatus::Pending | SessionStatus::Failed => {
                if session.is_expired(Utc::now()) {
                    session.status = SessionStatus::Expired;
                    warn!(session_id = %session.id(), "top up session expired");
                    return Err(ProcessError::TopUpSessionExpired {
                        session_id: session.id(),
                    });
                }
            }
            SessionStatus::Charged => {}
        }

        let session_id = session.id();
        let needs_charge = session.status != SessionStatus::Charged;
        let request = ChargeRequest {
            reference: session_id,
            member_id: session.member_id(),
            amount: session.total_charge(),
            method_id: Some(session.method().id.clone()),
        };
        let mut outcome = None;
        let committed = self.commit(session.wallet_id, |ledger| {
            if ledger.transactions.iter().any(|tx| tx.id == session_id) {
                return Ok(None);
            }
            let event = ledger.handle_top_up(&session.command)?;
            if needs_charge {
                let charge = provider.charge(&request);
                let approved = charge == ChargeOutcome::Approved;
                outcome = Some(charge);
                if !approved {
                    return Ok(None);
                }
            }
            Ok(Some(event))
        });

        match outcome {
            Some(ChargeOutcome::Approved) => {
                session.attempts += 1;
                session.status = SessionStatus::Charged;
            }
            Some(ChargeOutcome::Declined { reason }) => {
                session.attempts += 1;
                warn!(
                    session_id = %session_id,
                    attempts = session.attempts,
                    %reason,
                    "top up declined"
                );
                session.status = SessionStatus::Failed;
                session.last_decline = Some(reason);
                return Ok(session.transaction());
            }
            None => {}
        }

        let (ledger, _) = committed.inspect_err(|err| {
            if session.status == SessionStatus::Charged {
                warn!(session_id = %session_id, error = %err, "top up charged but not credited");
            }
        })?;
        let tx = ledger
            .transactions
            .iter()
            .find(|tx| tx.id == session_id)
            .cloned()
            .ok_or(WalletError::DuplicateTransaction { tx_id: session_id })?;

        session.status = SessionStatus::Completed;
        session.completed_at = Some(tx.timestamp);
        info!(
            wallet_id = %session.wallet_id,
            session_id = %session_id,
            amount = %tx.amount,
            fee = %session.method().fee,
            balance = %ledger.wallet.balance,
            "top up completed"
        );
        Ok(tx)
    }

    /// Single shot top up: opens a session and submits it once.
    pub fn top_up(
        &self,
        wallet_id: WalletId,
        member_id: MemberId,
        amount: Decimal,
        method_id: &str,
        provider: &mut impl PaymentProvider,
    ) -> Result<Transaction, ProcessError> {
        let mut session = self.start_top_up(wallet_id, member_id, amount, method_id)?;
        self.submit_top_up(&mut session, provider)
    }

    /// `caller_id` must belong to an admin of the wallet.
    pub fn update_member_limits(
        &self,
        wallet_id: WalletId,
        caller_id: MemberId,
        member_id: MemberId,
        daily_limit: Decimal,
        monthly_limit: Decimal,
    ) -> Result<Member, ProcessError> {
        let command = LimitsCommand::new(caller_id, member_id, daily_limit, monthly_limit)?;
        let (ledger, _) = self.commit(wallet_id, |ledger| Ok(Some(ledger.handle_limits(command)?)))?;
        let member = ledger
            .member(member_id)
            .cloned()
            .ok_or(WalletError::MemberNotFound { member_id })?;
        info!(
            wallet_id = %wallet_id,
            member_id = %member_id,
            %daily_limit,
            %monthly_limit,
            "member limits updated"
        );
        Ok(member)
    }

    pub fn add_member(
        &self,
        wallet_id: WalletId,
        name: &str,
        email: &str,
        daily_limit: Decimal,
        monthly_limit: Decimal,
    ) -> Result<Member, ProcessError> {
        let command =
            AddMemberCommand::new(Uuid::new_v4(), name, email, daily_limit, monthly_limit, Utc::now())?;
        let (_, event) =
            self.commit(wallet_id, |ledger| Ok(Some(ledger.handle_add_member(command)?)))?;
        let Some(WalletEvent::MemberJoined(member)) = event else {
            unreachable!("adding a member always yields MemberJoined");
        };
        info!(wallet_id = %wallet_id, member_id = %member.id, "member added");
        Ok(member)
    }

    pub fn query_transactions(
        &self,
        wallet_id: WalletId,
        filter: &TransactionFilter,
    ) -> Result<FilteredTransactions, ProcessError> {
        Ok(FilteredTransactions(
            self.store.list_transactions(wallet_id, Some(filter))?,
        ))
    }

    pub fn limit_progress(
        &self,
        wallet_id: WalletId,
        member_id: MemberId,
    ) -> Result<LimitProgress, ProcessError> {
        self.store
            .list_members(wallet_id)?
            .iter()
            .find(|member| member.id == member_id)
            .map(Member::limit_progress)
            .ok_or_else(|| WalletError::MemberNotFound { member_id }.into())
    }

    pub fn connect_external_wallet(
        &self,
        wallet_id: WalletId,
        phone_number: &str,
        gateway: &mut impl ExternalWalletGateway,
    ) -> Result<ExternalWalletLink, ProcessError> {
        let command = ConnectExternalCommand::new(phone_number, &self.settings)?;
        let account = gateway.open_account(&command.phone_number)?;
        let (ledger, _) = self.commit(wallet_id, |ledger| {
            Ok(Some(ledger.handle_connect_external(command, account, Utc::now())))
        })?;
        let link = ledger.external_link()?.clone();
        info!(wallet_id = %wallet_id, balance = %link.balance, "external wallet connected");
        Ok(link)
    }

    /// Refreshes the mirrored balance. The shared wallet balance is not affected.
    pub fn sync_external_wallet(
        &self,
        wallet_id: WalletId,
        gateway: &mut impl ExternalWalletGateway,
    ) -> Result<ExternalWalletLink, ProcessError> {
        let (ledger, _) = self.commit(wallet_id, |ledger| {
            let phone_number = ledger.external_link()?.phone_number.clone();
            let balance = gateway.fetch_balance(&phone_number)?;
            Ok(Some(ledger.handle_sync_external(balance, Utc::now())?))
        })?;
        let link = ledger.external_link()?.clone();
        info!(wallet_id = %wallet_id, balance = %link.balance, "external wallet synced");
        Ok(link)
    }

    pub fn disconnect_external_wallet(&self, wallet_id: WalletId) -> Result<(), ProcessError> {
        self.commit(wallet_id, |ledger| {
            Ok(Some(ledger.handle_disconnect_external()?))
        })?;
        info!(wallet_id = %wallet_id, "external wallet disconnected");
        Ok(())
    }

    /// Runs `handle` against a fresh copy of the wallet inside its critical section and
    /// persists the returned event, if any.
    fn commit<F>(
        &self,
        wallet_id: WalletId,
        handle: F,
    ) -> Result<(WalletLedger, Option<WalletEvent>), ProcessError>
    where
        F: FnOnce(&WalletLedger) -> Result<Option<WalletEvent>, ProcessError>,
    {
        let lock = self.locks.for_wallet(wallet_id)?;
        let _guard = lock.lock().map_err(|_| ProcessError::LockPoisoned)?;

        let mut ledger = self.load(wallet_id)?;
        let event = handle(&ledger)
            .inspect_err(|err| warn!(wallet_id = %wallet_id, error = %err, "operation rejected"))?;
        if let Some(event) = &event {
            ledger.apply(event);
            self.persist(&ledger, event)?;
        }
        Ok((ledger, event))
    }

    fn persist(&self, ledger: &WalletLedger, event: &WalletEvent) -> Result<(), ProcessError> {
        let changes = match event {
            WalletEvent::Spent(tx) => ChangeSet {
                wallet: Some(ledger.wallet.clone()),
                members: ledger.member(tx.from_member_id).cloned().into_iter().collect(),
                transaction: Some(tx.clone()),
            },
            WalletEvent::Transferred(tx) | WalletEvent::ToppedUp(tx) => ChangeSet {
                wallet: Some(ledger.wallet.clone()),
                members: Vec::new(),
                transaction: Some(tx.clone()),
            },
            WalletEvent::LimitsChanged { member_id, .. } => ChangeSet {
                members: ledger.member(*member_id).cloned().into_iter().collect(),
                ..Default::default()
            },
            WalletEvent::MemberJoined(member) => ChangeSet {
                members: vec![member.clone()],
                ..Default::default()
            },
            WalletEvent::ExternalLinked(_)
            | WalletEvent::ExternalSynced { .. }
            | WalletEvent::ExternalUnlinked => ChangeSet {
                wallet: Some(ledger.wallet.clone()),
                ..Default::default()
            },
        };
        self.store.commit(&changes)?;
        for notice in changes.notices(ledger.wallet.id) {
            self.feed.publish(notice);
        }
        Ok(())
    }
}

fn committed_transaction(event: Option<WalletEvent>) -> Transaction {
    match event {
        Some(
            WalletEvent::Spent(tx) | WalletEvent::Transferred(tx) | WalletEvent::ToppedUp(tx),
        ) => tx,
        _ => unreachable!("money movements always commit a transaction"),
    }
}
