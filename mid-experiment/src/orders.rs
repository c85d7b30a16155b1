//! Trial order files: pre-generated CSVs, one per run.
//!
//! Expected header (extra columns are ignored):
//! ```csv
//! trial.type,fix.after.cue,fix.after.stim,fix.after.feedback
//! reward.high,1.5,2.0,4.0
//! neutral,2.5,1.0,3.0
//! ```

use crate::error::OrderError;
use mid_core::{Condition, TrialSpec};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};

const TRIAL_TYPE: &str = "trial.type";
const FIX_AFTER_CUE: &str = "fix.after.cue";
const FIX_AFTER_STIM: &str = "fix.after.stim";
const FIX_AFTER_FEEDBACK: &str = "fix.after.feedback";

/// One loaded order file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOrder {
    pub path: PathBuf,
    pub trials: Vec<TrialSpec>,
}

/// Seed for order selection, stable for a participant/session pair.
pub fn selection_seed(participant: u64, session: u64) -> u64 {
    participant.wrapping_mul(session.wrapping_add(1000))
}

/// All `*.csv` files in `dir`, sorted so selection is reproducible.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, OrderError> {
    let io = |source| OrderError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Picks `runs` distinct files uniformly at random, seeded.
pub fn select(paths: &[PathBuf], runs: usize, seed: u64) -> Result<Vec<PathBuf>, OrderError> {
    if paths.len() < runs {
        return Err(OrderError::OrderExhausted {
            available: paths.len(),
            required: runs,
        });
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(rand::seq::index::sample(&mut rng, paths.len(), runs)
        .into_iter()
        .map(|i| paths[i].clone())
        .collect())
}

pub fn load(path: &Path) -> Result<TrialOrder, OrderError> {
    let text = fs::read_to_string(path).map_err(|source| OrderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let trials = parse(path, &text)?;
    Ok(TrialOrder {
        path: path.to_path_buf(),
        trials,
    })
}

/// Parses order CSV text; `path` is only used in error messages.
pub fn parse(path: &Path, text: &str) -> Result<Vec<TrialSpec>, OrderError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(OrderError::MissingColumn {
            path: path.to_path_buf(),
            column: TRIAL_TYPE,
        });
    };
    let columns: Vec<&str> = header.split(',').map(|c| c.trim().trim_matches('"')).collect();
    let find = |column: &'static str| {
        columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| OrderError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
    };
    let type_col = find(TRIAL_TYPE)?;
    let cue_col = find(FIX_AFTER_CUE)?;
    let stim_col = find(FIX_AFTER_STIM)?;
    let feedback_col = find(FIX_AFTER_FEEDBACK)?;

    let mut trials = Vec::new();
    for (line, row) in lines {
        let fields: Vec<&str> = row.split(',').map(|f| f.trim().trim_matches('"')).collect();
        let parse_err = |message: String| OrderError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };
        let field = |idx: usize, name: &str| {
            fields
                .get(idx)
                .copied()
                .ok_or_else(|| parse_err(format!("missing `{name}` field")))
        };
        let seconds = |idx: usize, name: &str| -> Result<f64, OrderError> {
            let raw = field(idx, name)?;
            let value: f64 = raw
                .parse()
                .map_err(|_| parse_err(format!("`{name}` is not a number: `{raw}`")))?;
            if !value.is_finite() || value < 0.0 {
                return Err(parse_err(format!("`{name}` must be >= 0, got {value}")));
            }
            Ok(value)
        };

        let condition = field(type_col, TRIAL_TYPE)?
            .parse::<Condition>()
            .map_err(|e| parse_err(e.to_string()))?;
        trials.push(TrialSpec {
            condition,
            fix_after_cue: seconds(cue_col, FIX_AFTER_CUE)?,
            fix_after_target: seconds(stim_col, FIX_AFTER_STIM)?,
            fix_after_feedback: seconds(feedback_col, FIX_AFTER_FEEDBACK)?,
        });
    }
    Ok(trials)
}
