#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Surge rollup node: proposes L2 batches to the L1 inbox and proves them.
//!
//! Authors: Chainbound Developers <dev@chainbound.io>

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use surge_chainio::tx_manager::{AlloyTxManager, TransactionManager};
use surge_config::Opts;
use surge_primitives::{
    shutdown::{ShutdownSignal, run_until_shutdown},
    task::CriticalTasks,
};
use surge_proposer::Proposer;
use surge_prover::Prover;

mod allocator;
use allocator::{Allocator, new_allocator};

#[global_allocator]
static ALLOC: Allocator = new_allocator();

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        // Try from custom env file, and abort if it fails
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try from default .env file, and ignore if it fails. It might
        // be that the user isn't using it.
        dotenvy::dotenv().ok();
    }

    let opts = Opts::parse();

    let tracer_provider = opts.telemetry.setup(&opts.instance_name)?;

    info!(mode = ?opts.mode, "👨‍🚀 Surge node starting...");

    let shutdown_signal = ShutdownSignal::new();
    let on_shutdown = || {
        info!("👋 Surge node shutting down...");
        tracer_provider.shutdown();
    };

    let run_node = run(opts, shutdown_signal.clone());

    run_until_shutdown(run_node, shutdown_signal, on_shutdown).await
}

/// Starts the components of the configured mode, and runs them until one of them exits or
/// the node shuts down. Every component is joined before returning.
async fn run(opts: Opts, shutdown_signal: ShutdownSignal) -> eyre::Result<()> {
    let proposer_cfg = surge_proposer::RuntimeConfig::from_opts(opts.clone()).await?;

    // Both components share the operator account, and so the nonce manager.
    let tx_manager: Arc<dyn TransactionManager> = Arc::new(AlloyTxManager::new(
        opts.l1.el_url.clone(),
        opts.operator.private_key.clone(),
        proposer_cfg.tx_manager_config(),
    ));
    info!(operator = %tx_manager.sender(), "Transaction manager ready");

    let mut tasks = CriticalTasks::new();

    if opts.mode.runs_prover() {
        let cfg = surge_prover::RuntimeConfig::from_opts(opts.clone()).await?;
        let prover = Prover::new(cfg, Arc::clone(&tx_manager), shutdown_signal.token()).await?;
        tasks.add_task(prover.start(), "prover");
    }

    if opts.mode.runs_proposer() {
        let proposer =
            Proposer::new(proposer_cfg, Arc::clone(&tx_manager), shutdown_signal.token()).await?;
        tasks.add_task(proposer.start(), "proposer");
    }

    let Some(exited) = (&mut tasks).await else { return Ok(()) };
    let failed = !shutdown_signal.is_triggered();
    let name = exited.name().to_owned();
    let message = exited.error_message();
    if failed {
        error!(task = %name, %message, "Critical task exited");
        shutdown_signal.trigger();
    }

    // Let the other components drain their in-flight work.
    for res in tasks.join_all().await {
        info!(task = %res.name(), "Task stopped");
    }

    if failed {
        eyre::bail!("critical task {name} exited unexpectedly: {message}")
    }
    Ok(())
}
