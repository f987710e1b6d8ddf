use std::fs::File;

use anyhow::{Context, Result};
use family_ledger::{
    bin_utils::{Service, ServiceError},
    config::AppConfig,
    provider::SimulatedProvider,
};
use rand::{SeedableRng, rngs::StdRng};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .context("Expected a wallet configuration file as the first argument")?;
    let operations_path = args
        .next()
        .context("Expected an operations file as the second argument")?;

    let config = AppConfig::from_path(&config_path)?;
    let file = File::open(&operations_path)
        .with_context(|| format!("Failed to open `{operations_path}`"))?;
    let provider = SimulatedProvider::new(config.provider_success_rate, StdRng::from_entropy());

    let service = Service {
        config,
        input: file,
        output: &mut std::io::stdout(),
        provider,
        error_printer: Box::new(|line, err: ServiceError| {
            if !err.is_rule_rejection() {
                eprintln!("Error at line {line}: {err}");
            }
        }),
    };
    service.run()
}
