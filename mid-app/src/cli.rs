use clap::Parser;
use mid_core::Condition;
use std::path::PathBuf;

/// Monetary incentive delay task.
#[derive(Debug, Clone, Parser)]
#[command(name = "mid", version)]
pub struct Cli {
    /// JSON configuration; missing fields take their defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of trial order CSV files.
    #[arg(long, default_value = "orders")]
    pub orders: PathBuf,

    #[arg(long, default_value_t = 0)]
    pub participant: u64,

    #[arg(long, default_value_t = 1)]
    pub session: u64,

    /// Where the JSON-lines data file is written.
    #[arg(long, default_value = "data")]
    pub output: PathBuf,

    /// Pace frames in wall-clock time instead of a virtual clock.
    #[arg(long)]
    pub realtime: bool,

    /// Display refresh rate (Hz). Unknown or implausible rates fall back to 60.
    #[arg(long)]
    pub refresh_hz: Option<f64>,

    /// Simulated participant presses escape at this trial (1-based).
    #[arg(long)]
    pub abort_after: Option<usize>,

    /// Seed for the simulated participant and reward draws.
    #[arg(long)]
    pub seed: Option<u64>,

    /// tracing filter directive, e.g. `info` or `mid_experiment=debug`.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Staircase start level, e.g. `reward.high=12`. Repeatable.
    #[arg(long = "start-level", value_parser = parse_start_level)]
    pub start_levels: Vec<(Condition, f64)>,
}

fn parse_start_level(s: &str) -> Result<(Condition, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected `condition=level`, got `{s}`"))?;
    let condition = key.trim().parse::<Condition>().map_err(|e| e.to_string())?;
    let level = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("`{}` is not a number", value.trim()))?;
    Ok((condition, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["mid"]).unwrap();
        assert_eq!(cli.orders, PathBuf::from("orders"));
        assert_eq!(cli.session, 1);
        assert!(!cli.realtime);
        assert!(cli.start_levels.is_empty());
    }

    #[test]
    fn start_levels_repeat() {
        let cli = Cli::try_parse_from([
            "mid",
            "--start-level",
            "reward.high=12",
            "--start-level",
            "neutral = 20.5",
        ])
        .unwrap();
        assert_eq!(
            cli.start_levels,
            vec![(Condition::RewardHigh, 12.0), (Condition::Neutral, 20.5)]
        );
    }

    #[test]
    fn malformed_start_level_is_rejected() {
        assert!(parse_start_level("reward.high").is_err());
        assert!(parse_start_level("jackpot=3").is_err());
        assert!(parse_start_level("loss.low=abc").is_err());
        assert!(Cli::try_parse_from(["mid", "--start-level", "x"]).is_err());
    }
}
