use crate::cli::Cli;
use anyhow::{Context, Result};
use mid_experiment::{
    CancelToken, ExperimentConfig, FramePresenter, JsonLinesSink, ParticipantProfile,
    RunOrchestrator, SessionSummary, SimulatedParticipant, TrialOrder, orders,
};
use mid_timing::{HighPrecisionTimer, Timer, VirtualTimer, frame_duration_for_rate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct App {
    config: ExperimentConfig,
    orders: Vec<TrialOrder>,
    output: PathBuf,
    frame_duration: f64,
    realtime: bool,
    abort_after: Option<usize>,
    seed: u64,
    cancel: CancelToken,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => load_config(path)?,
            None => ExperimentConfig::default(),
        };
        for (condition, level) in &cli.start_levels {
            config.set_initial_level(*condition, *level);
        }
        config.validate()?;

        let runs = config.effective_run_count();
        let seed = orders::selection_seed(cli.participant, cli.session);
        let available = orders::discover(&cli.orders)?;
        let orders = orders::select(&available, runs, seed)?
            .iter()
            .map(|path| orders::load(path))
            .collect::<Result<Vec<_>, _>>()?;
        for order in &orders {
            info!(order = %order.path.display(), trials = order.trials.len(), "selected order");
        }

        fs::create_dir_all(&cli.output)
            .with_context(|| format!("failed to create {}", cli.output.display()))?;
        let output = cli.output.join(data_file_name(&config, cli.participant, cli.session));

        Ok(Self {
            config,
            orders,
            output,
            frame_duration: frame_duration_for_rate(cli.refresh_hz),
            realtime: cli.realtime,
            abort_after: cli.abort_after,
            seed: cli.seed.unwrap_or_else(|| rand::rng().random()),
            cancel: CancelToken::new(),
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Token that stops the session at the next frame.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run(self) -> Result<SessionSummary> {
        info!(
            seed = self.seed,
            frame_ms = self.frame_duration * 1e3,
            realtime = self.realtime,
            output = %self.output.display(),
            "starting session"
        );
        if self.realtime {
            self.run_with(HighPrecisionTimer::new())
        } else {
            self.run_with(VirtualTimer::new())
        }
    }

    fn run_with<T: Timer<Timestamp = u64>>(self, timer: T) -> Result<SessionSummary> {
        let participant = SimulatedParticipant::new(
            self.profile(),
            StdRng::seed_from_u64(self.seed.wrapping_add(1)),
        );
        let presenter = FramePresenter::new(timer, participant, self.frame_duration);

        let file = File::create(&self.output)
            .with_context(|| format!("failed to create {}", self.output.display()))?;
        let sink = JsonLinesSink::new(BufWriter::new(file));

        let mut session = RunOrchestrator::new(
            self.config,
            self.frame_duration,
            presenter,
            sink,
            StdRng::seed_from_u64(self.seed),
            self.cancel,
        )?;
        let summary = session.run(&self.orders)?;
        info!(
            frames = session.presenter().frames_presented(),
            output = %self.output.display(),
            "session finished"
        );
        Ok(summary)
    }

    /// Simulated participant using the first configured key of each kind.
    fn profile(&self) -> ParticipantProfile {
        let mut profile = ParticipantProfile {
            abort_on_trial: self.abort_after,
            ..ParticipantProfile::default()
        };
        if let Some(key) = self.config.response_keys.first() {
            profile.response_key = key.clone();
        }
        if let Some(key) = self.config.escape_keys.first() {
            profile.escape_key = key.clone();
        }
        profile.trigger = self
            .config
            .trigger_keys
            .first()
            .map(|key| (0.5, key.clone()));
        profile
    }
}

fn load_config(path: &Path) -> Result<ExperimentConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn data_file_name(config: &ExperimentConfig, participant: u64, session: u64) -> String {
    let mode = if config.single_run {
        "single"
    } else if config.scanner {
        "fmri"
    } else {
        "behavioral"
    };
    format!("MID_{mode}_{participant:04}_s{session}.jsonl")
}
