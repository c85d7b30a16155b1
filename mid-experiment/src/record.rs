use crate::error::Result;
use mid_core::{Condition, TrialRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

/// Written once per run, before its first trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    pub run: usize,
    pub order_file: PathBuf,
    pub nudge: bool,
    pub epoch_seconds: f64,
}

/// Final state, written on normal termination and on cancellation alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub completed: bool,
    pub trials_completed: usize,
    pub staircase_end: BTreeMap<Condition, f64>,
    pub total_earnings: i64,
}

/// Destination for trial data.
pub trait RecordSink {
    fn begin_run(&mut self, header: &RunHeader) -> Result<()>;
    fn record(&mut self, record: &TrialRecord) -> Result<()>;
    fn finish(&mut self, summary: &SessionSummary) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Run(&'a RunHeader),
    Trial(&'a TrialRecord),
    Summary(&'a SessionSummary),
}

/// One JSON object per line, flushed after every write.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, line: &Line<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn begin_run(&mut self, header: &RunHeader) -> Result<()> {
        self.write(&Line::Run(header))
    }

    fn record(&mut self, record: &TrialRecord) -> Result<()> {
        self.write(&Line::Trial(record))
    }

    fn finish(&mut self, summary: &SessionSummary) -> Result<()> {
        self.write(&Line::Summary(summary))
    }
}

/// Keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub runs: Vec<RunHeader>,
    pub records: Vec<TrialRecord>,
    pub summary: Option<SessionSummary>,
}

impl RecordSink for MemorySink {
    fn begin_run(&mut self, header: &RunHeader) -> Result<()> {
        self.runs.push(header.clone());
        Ok(())
    }

    fn record(&mut self, record: &TrialRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &SessionSummary) -> Result<()> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}
