use std::collections::VecDeque;

use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{ExternalFlow, ExternalTransaction, MemberId, TransactionId};

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    /// Stable across retries of the same top up or payment.
    pub reference: TransactionId,
    pub member_id: MemberId,
    pub amount: Decimal,
    pub method_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved,
    Declined { reason: String },
}

/// Whoever moves money from outside into (or out of) the family wallet.
pub trait PaymentProvider {
    fn charge(&mut self, request: &ChargeRequest) -> ChargeOutcome;
}

/// Replays queued outcomes, then approves everything.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    outcomes: VecDeque<ChargeOutcome>,
    pub requests: Vec<ChargeRequest>,
}

impl ScriptedProvider {
    pub fn new(outcomes: impl IntoIterator<Item = ChargeOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            requests: Vec::new(),
        }
    }
}

impl PaymentProvider for ScriptedProvider {
    fn charge(&mut self, request: &ChargeRequest) -> ChargeOutcome {
        self.requests.push(request.clone());
        self.outcomes.pop_front().unwrap_or(ChargeOutcome::Approved)
    }
}

/// Approves a charge with the given probability.
#[derive(Debug)]
pub struct SimulatedProvider<R> {
    success_rate: f64,
    rng: R,
}

impl<R: Rng> SimulatedProvider<R> {
    pub fn new(success_rate: f64, rng: R) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            rng,
        }
    }
}

impl<R: Rng> PaymentProvider for SimulatedProvider<R> {
    fn charge(&mut self, request: &ChargeRequest) -> ChargeOutcome {
        if self.rng.gen_bool(self.success_rate) {
            ChargeOutcome::Approved
        } else {
            tracing::debug!(reference = %request.reference, "simulated charge declined");
            ChargeOutcome::Declined {
                reason: "Provider declined the charge".to_string(),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("External wallet `{phone_number}` is unavailable: {reason}")]
    Unavailable {
        phone_number: String,
        reason: String,
    },
}

/// Account data returned when an external wallet is connected.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalAccount {
    pub account_name: String,
    pub balance: Decimal,
    pub transactions: Vec<ExternalTransaction>,
}

pub trait ExternalWalletGateway {
    fn open_account(&mut self, phone_number: &str) -> Result<ExternalAccount, GatewayError>;
    fn fetch_balance(&mut self, phone_number: &str) -> Result<Decimal, GatewayError>;
}

/// Always reports the same account.
#[derive(Debug, Clone)]
pub struct FixedGateway {
    pub account: ExternalAccount,
}

impl ExternalWalletGateway for FixedGateway {
    fn open_account(&mut self, _phone_number: &str) -> Result<ExternalAccount, GatewayError> {
        Ok(self.account.clone())
    }

    fn fetch_balance(&mut self, _phone_number: &str) -> Result<Decimal, GatewayError> {
        Ok(self.account.balance)
    }
}

/// Random balances between 1,000,000 and 6,000,000 and a short canned history.
#[derive(Debug)]
pub struct SimulatedGateway<R> {
    rng: R,
}

impl<R: Rng> SimulatedGateway<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn random_balance(&mut self) -> Decimal {
        Decimal::from(self.rng.gen_range(1_000_000u32..6_000_000))
    }
}

impl<R: Rng> ExternalWalletGateway for SimulatedGateway<R> {
    fn open_account(&mut self, _phone_number: &str) -> Result<ExternalAccount, GatewayError> {
        let now = Utc::now();
        Ok(ExternalAccount {
            account_name: "E-Wallet User".to_string(),
            balance: self.random_balance(),
            transactions: vec![
                ExternalTransaction {
                    id: "1".to_string(),
                    amount: Decimal::from(50_000),
                    flow: ExternalFlow::Out,
                    description: "Transfer to bank".to_string(),
                    timestamp: now - Duration::days(1),
                    merchant: Some("Bank BCA".to_string()),
                },
                ExternalTransaction {
                    id: "2".to_string(),
                    amount: Decimal::from(100_000),
                    flow: ExternalFlow::In,
                    description: "Top up from bank".to_string(),
                    timestamp: now - Duration::days(2),
                    merchant: Some("Bank Mandiri".to_string()),
                },
            ],
        })
    }

    fn fetch_balance(&mut self, _phone_number: &str) -> Result<Decimal, GatewayError> {
        Ok(self.random_balance())
    }
}
