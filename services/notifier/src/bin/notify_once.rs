//! services/notifier/src/bin/notify_once.rs
//!
//! Runs a single notification pass for today's date and exits.

use notifier_lib::{
    bootstrap::{build_runner, init_tracing, log_delivery_settings},
    config::Config,
    error::NotifierError,
    scheduler::Trigger,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), NotifierError> {
    let config = Config::from_env()?;
    init_tracing(&config);
    log_delivery_settings(&config);

    let runner = build_runner(&config).await?;
    let report = runner.run_now(Trigger::Manual).await?;

    info!("Pass finished");
    println!("{}", report.summary());
    Ok(())
}
