mod app;
mod cli;
pub use app::App;
pub use cli::Cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env.as_deref(), &cli.log_level))
        .with_target(false)
        .init();

    let app = App::new(cli)?;
    let summary = app.run()?;

    if summary.completed {
        println!("\nExperiment completed.");
    } else {
        println!("\nExperiment aborted after {} trials.", summary.trials_completed);
    }
    println!(
        "Total earnings: {}",
        mid_experiment::earnings::total_cash_string(summary.total_earnings)
    );

    Ok(())
}

/// `RUST_LOG` wins when set and valid, then `--log-level`, then `info`.
fn log_filter(env: Option<&str>, cli: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(cli).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
