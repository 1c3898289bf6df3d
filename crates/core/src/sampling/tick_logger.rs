use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting observer for sampling-loop events.
///
/// Keeps the loop free of any particular output mechanism: the CLI
/// wants stdout logging and an end-of-session report, embedders and
/// tests usually want silence.
pub trait TickLogger: Send {
    /// A tick was scheduled (whether or not it later commits).
    fn tick(&mut self, seq: u64);

    /// How long a named stage of one tick took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time metric (e.g. faces per tick).
    fn metric(&mut self, name: &str, value: f64);

    /// Human-readable status message.
    fn info(&mut self, message: &str);

    /// End-of-session report. Default: no-op.
    fn summary(&self) {}
}

/// Logger that discards everything.
pub struct NullTickLogger;

impl TickLogger for NullTickLogger {
    fn tick(&mut self, _seq: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger backed by the `log` crate, accumulating per-stage timings and
/// metrics for a session summary.
///
/// Tick announcements go out at debug level every `announce_every`
/// ticks so a 10 Hz loop doesn't flood the log.
pub struct StdoutTickLogger {
    announce_every: u64,
    started: Instant,
    ticks_seen: u64,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
}

impl StdoutTickLogger {
    pub fn new(announce_every: u64) -> Self {
        Self {
            announce_every: announce_every.max(1),
            started: Instant::now(),
            ticks_seen: 0,
            timings: HashMap::new(),
            metrics: HashMap::new(),
        }
    }

    /// Formatted session report, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.ticks_seen == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_s = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({} ticks, {elapsed_s:.1}s):",
            self.ticks_seen
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let samples = &self.timings[stage];
            let avg = samples.iter().sum::<f64>() / samples.len() as f64;
            lines.push(format!("  {stage:10}: avg {avg:6.1}ms  ({} samples)", samples.len()));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let samples = &self.metrics[name];
            let avg = samples.iter().sum::<f64>() / samples.len() as f64;
            lines.push(format!("  {name}: avg {avg:.2}"));
        }

        if elapsed_s > 0.0 && self.ticks_seen > 0 {
            lines.push(format!(
                "  Rate: {:.1} ticks/s",
                self.ticks_seen as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

impl Default for StdoutTickLogger {
    fn default() -> Self {
        Self::new(50)
    }
}

impl TickLogger for StdoutTickLogger {
    fn tick(&mut self, seq: u64) {
        self.ticks_seen += 1;
        if seq % self.announce_every == 0 {
            log::debug!("tick {seq}");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
