use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::model::{MethodKind, Role, TopUpMethod};

/// Ledger wide rules that are not stored with the wallet.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub min_top_up: Decimal,
    pub top_up_methods: Vec<TopUpMethod>,
    pub top_up_session_ttl_minutes: i64,
    pub min_phone_digits: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            min_top_up: Decimal::from(10_000),
            top_up_methods: vec![
                TopUpMethod {
                    id: "bank_transfer".to_string(),
                    name: "Bank Transfer".to_string(),
                    kind: MethodKind::Bank,
                    fee: Decimal::ZERO,
                    is_active: true,
                },
                TopUpMethod {
                    id: "dana".to_string(),
                    name: "Dana".to_string(),
                    kind: MethodKind::Ewallet,
                    fee: Decimal::ZERO,
                    is_active: true,
                },
                TopUpMethod {
                    id: "credit_card".to_string(),
                    name: "Credit Card".to_string(),
                    kind: MethodKind::Card,
                    fee: Decimal::from(2_500),
                    is_active: true,
                },
            ],
            top_up_session_ttl_minutes: 30,
            min_phone_digits: 10,
        }
    }
}

impl LedgerSettings {
    pub fn method(&self, id: &str) -> Option<&TopUpMethod> {
        self.top_up_methods.iter().find(|method| method.id == id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberSeed {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
}

fn default_role() -> Role {
    Role::Member
}

/// Initial state of a wallet. The first admin in `members` becomes the wallet admin.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletSeed {
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub initial_balance: Decimal,
    pub members: Vec<MemberSeed>,
}

fn default_currency() -> String {
    "IDR".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: LedgerSettings,
    pub wallet: WalletSeed,
    /// Probability for the simulated payment provider to approve a charge.
    #[serde(default = "default_success_rate")]
    pub provider_success_rate: f64,
}

fn default_success_rate() -> f64 {
    1.0
}

impl AppConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Invalid wallet configuration")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open `{}`", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid wallet configuration in `{}`", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_missing() {
        let config = AppConfig::from_json(
            r#"{
                "wallet": {
                    "name": "Keluarga",
                    "initial_balance": "5000000",
                    "members": [
                        {"name": "Bapak", "email": "bapak@example.com", "role": "admin",
                         "daily_limit": "500000", "monthly_limit": "10000000"}
                    ]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.settings.min_top_up, Decimal::from(10_000));
        assert_eq!(config.settings.top_up_methods.len(), 3);
        assert_eq!(config.wallet.currency, "IDR");
        assert_eq!(config.wallet.members[0].role, Role::Admin);
        assert_eq!(config.provider_success_rate, 1.0);
    }

    #[test]
    fn partial_settings_keep_other_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "settings": {"min_top_up": "20000"},
                "wallet": {"name": "Keluarga", "initial_balance": "0", "members": []}
            }"#,
        )
        .unwrap();
        assert_eq!(config.settings.min_top_up, Decimal::from(20_000));
        assert_eq!(config.settings.min_phone_digits, 10);
        assert_eq!(
            config.settings.method("credit_card").unwrap().fee,
            Decimal::from(2_500)
        );
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(AppConfig::from_json(r#"{"wallet": {}}"#).is_err());
    }
}
