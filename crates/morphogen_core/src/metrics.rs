//! Simulation health figures gathered by the world each tick.
//!
//! Besides timing, the world reports how much of its wiring is live: links
//! carrying signal, outputs nobody listens to, and how often organisms were
//! rewired after an edit. Logging setup lives here too.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Ticks between periodic summary lines.
pub const DEFAULT_LOG_INTERVAL: u64 = 1000;

/// Population and wiring events counted by [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Event {
    Spawned,
    Despawned,
    /// An organism left edit mode with freshly resolved wiring.
    Rewired,
    /// A physiology update failed and aborted the tick.
    PartFailed,
}

/// What one world tick looked like.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TickSample {
    pub duration: Duration,
    pub organisms: usize,
    pub parts: usize,
    /// Channel links across every organism.
    pub links: usize,
    /// Outputs whose signal reaches no consumer.
    pub dangling: usize,
    pub contacts: usize,
    /// Archetypes currently cached by the library.
    pub archetypes: usize,
}

/// Snapshot of [`Metrics`] for reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub elapsed: Duration,
    pub mean_tick: Duration,
    pub slowest_tick: Duration,
    pub total_contacts: u64,
    pub last: TickSample,
    pub events: BTreeMap<Event, u64>,
}

pub struct Metrics {
    ticks: u64,
    last: TickSample,
    busy: Duration,
    slowest: Duration,
    total_contacts: u64,
    events: BTreeMap<Event, u64>,
    log_interval: u64,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::with_log_interval(DEFAULT_LOG_INTERVAL)
    }

    /// Logs a summary every `interval` ticks; 0 disables it.
    #[must_use]
    pub fn with_log_interval(interval: u64) -> Self {
        Self {
            ticks: 0,
            last: TickSample::default(),
            busy: Duration::ZERO,
            slowest: Duration::ZERO,
            total_contacts: 0,
            events: BTreeMap::new(),
            log_interval: interval,
            start_time: Instant::now(),
        }
    }

    pub fn record_tick(&mut self, sample: TickSample) {
        self.ticks += 1;
        self.busy += sample.duration;
        self.slowest = self.slowest.max(sample.duration);
        self.total_contacts += sample.contacts as u64;
        if sample.dangling > self.last.dangling {
            tracing::debug!(
                tick = self.ticks,
                dangling = sample.dangling,
                "Outputs left without consumers"
            );
        }
        self.last = sample;

        if self.log_interval > 0 && self.ticks % self.log_interval == 0 {
            tracing::info!(
                tick = self.ticks,
                organisms = sample.organisms,
                parts = sample.parts,
                links = sample.links,
                archetypes = sample.archetypes,
                mean_us = self.mean_tick().as_micros() as u64,
                "Simulation tick"
            );
        }
    }

    pub fn record(&mut self, event: Event) {
        *self.events.entry(event).or_insert(0) += 1;
    }

    #[must_use]
    pub fn count(&self, event: Event) -> u64 {
        self.events.get(&event).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// The most recent tick, or an all-zero sample before the first.
    #[must_use]
    pub fn last(&self) -> &TickSample {
        &self.last
    }

    #[must_use]
    pub fn mean_tick(&self) -> Duration {
        match u32::try_from(self.ticks) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.busy / n,
            Err(_) => Duration::from_secs_f64(self.busy.as_secs_f64() / self.ticks as f64),
        }
    }

    #[must_use]
    pub fn slowest_tick(&self) -> Duration {
        self.slowest
    }

    #[must_use]
    pub fn total_contacts(&self) -> u64 {
        self.total_contacts
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            ticks: self.ticks,
            elapsed: self.elapsed(),
            mean_tick: self.mean_tick(),
            slowest_tick: self.slowest,
            total_contacts: self.total_contacts,
            last: self.last,
            events: self.events.clone(),
        }
    }
}

/// Installs a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
/// Later calls are no-ops.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .finish(),
    )
    .ok();
}
