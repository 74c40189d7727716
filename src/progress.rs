//! Rebuild progress reporting.
//!
//! `story rebuild` reports which phase is running and how many units are
//! left. Progress goes to **stderr** so stdout stays parseable for scripts.

use std::io::Write;
use std::str::FromStr;

use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RebuildPhase {
    LoadingTables,
    Scanning,
    Indexing,
    Done,
}

impl RebuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebuildPhase::LoadingTables => "loading_tables",
            RebuildPhase::Scanning => "scanning",
            RebuildPhase::Indexing => "indexing",
            RebuildPhase::Done => "done",
        }
    }
}

/// A single progress event for a rebuild.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RebuildProgressEvent {
    /// Reading metadata tables.
    LoadingTables,
    /// Walking the story corpus. Total unknown.
    Scanning,
    /// Reading bodies: n units processed out of total.
    Indexing { n: u64, total: u64 },
    /// Generation assembled, not yet published.
    Done {
        units: u64,
        unresolved: u64,
        elapsed_ms: u64,
    },
}

impl RebuildProgressEvent {
    pub fn phase(&self) -> RebuildPhase {
        match self {
            RebuildProgressEvent::LoadingTables => RebuildPhase::LoadingTables,
            RebuildProgressEvent::Scanning => RebuildPhase::Scanning,
            RebuildProgressEvent::Indexing { .. } => RebuildPhase::Indexing,
            RebuildProgressEvent::Done { .. } => RebuildPhase::Done,
        }
    }
}

/// Receives rebuild progress. Called from blocking build tasks.
pub trait RebuildProgressReporter: Send + Sync {
    fn report(&self, event: RebuildProgressEvent);
}

/// "rebuild  indexing  1,234 / 5,000 units (24%)"
pub fn render_human(event: &RebuildProgressEvent) -> String {
    match event {
        RebuildProgressEvent::LoadingTables => "rebuild  loading tables...".to_string(),
        RebuildProgressEvent::Scanning => "rebuild  scanning corpus...".to_string(),
        RebuildProgressEvent::Indexing { n, total } => {
            let pct = if *total > 0 { n * 100 / total } else { 100 };
            format!(
                "rebuild  indexing  {} / {} units ({}%)",
                group_thousands(*n),
                group_thousands(*total),
                pct
            )
        }
        RebuildProgressEvent::Done {
            units,
            unresolved,
            elapsed_ms,
        } => format!(
            "rebuild  done  {} units, {} unresolved in {:.1}s",
            group_thousands(*units),
            group_thousands(*unresolved),
            *elapsed_ms as f64 / 1000.0
        ),
    }
}

/// One JSON object per event: `{"event":"progress","phase":...}` plus the
/// event's counts.
pub fn render_json(event: &RebuildProgressEvent) -> Value {
    let mut obj = json!({
        "event": "progress",
        "phase": event.phase().as_str(),
    });
    let extra = match event {
        RebuildProgressEvent::Indexing { n, total } => json!({ "n": n, "total": total }),
        RebuildProgressEvent::Done {
            units,
            unresolved,
            elapsed_ms,
        } => json!({ "units": units, "unresolved": unresolved, "elapsed_ms": elapsed_ms }),
        _ => return obj,
    };
    if let (Some(target), Value::Object(fields)) = (obj.as_object_mut(), extra) {
        target.extend(fields);
    }
    obj
}

fn write_stderr_line(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "{}", line);
    let _ = err.flush();
}

pub struct StderrProgress;

impl RebuildProgressReporter for StderrProgress {
    fn report(&self, event: RebuildProgressEvent) {
        write_stderr_line(&render_human(&event));
    }
}

pub struct JsonProgress;

impl RebuildProgressReporter for JsonProgress {
    fn report(&self, event: RebuildProgressEvent) {
        write_stderr_line(&render_json(&event).to_string());
    }
}

pub struct NoProgress;

impl RebuildProgressReporter for NoProgress {
    fn report(&self, _event: RebuildProgressEvent) {}
}

/// Emit an `Indexing` event every this many units (and on the last one).
pub const INDEXING_REPORT_EVERY: u64 = 500;

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn RebuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "Unknown progress mode: {}. Use off, human, or json.",
                other
            )),
        }
    }
}
