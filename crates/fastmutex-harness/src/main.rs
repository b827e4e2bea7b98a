use clap::Parser;
use fastmutex_harness::config::{Cli, Command, HarnessConfig};
use fastmutex_harness::harness::{open_store, run_participant, run_race};
use fastmutex_harness::metrics::{init_metrics, record_verdict};
use fastmutex_harness::startup::{LoggingConfig, init_logging};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = HarnessConfig::load(&cli)?;

    let logging_guard = init_logging(&LoggingConfig::from(&config.logging))?;
    let prometheus = init_metrics(config.metrics)?;

    info!(
        store = config.store.kind.as_str(),
        timeout_ms = config.mutex.timeout_ms,
        "fastmutex harness starting"
    );

    let store = open_store(&config.store);
    let passed = match &cli.command {
        Command::Race(args) => {
            let report = run_race(&store, &config.mutex, args).await?;
            record_verdict(report.passed());
            if report.passed() {
                info!(counter = report.counter, "Race passed");
            } else {
                error!(counter = report.counter, "Race failed");
            }
            println!("{}", report);
            report.passed()
        }
        Command::Run(args) => run_participant(&store, &config.mutex, args).await?,
    };

    if let Some(handle) = prometheus {
        println!("{}", handle.render());
    }

    if !passed {
        // exit() skips destructors; flush file logs first
        drop(logging_guard);
        std::process::exit(1);
    }
    Ok(())
}
