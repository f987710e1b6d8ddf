/// Wallets, members and transactions as stored records.
pub mod model;

/// Validated commands. Building one is the first step of every operation and
/// never touches wallet state.
pub mod command;

/// The wallet aggregate: turns commands into events and applies them.
/// All balance, limit and spend-counter rules live here.
pub mod wallet;

/// Filters and aggregates over transaction history.
pub mod query;

/// Record store interface, an in memory implementation and the change feed.
pub mod store;

/// Payment providers and external e-wallet gateways, with deterministic and
/// simulated implementations.
pub mod provider;

/// Ledger settings and the wallet seed read by the binary.
pub mod config;

/// Ledger engine: loads a wallet, runs a command under the wallet lock and
/// writes the result back to the store.
pub mod processor;

/// Replays an operations file against a seeded wallet and exports its history.
/// Lives in the library so the integration tests can drive it.
pub mod bin_utils;
