use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;

use crate::event::LogEvent;
use crate::metrics::window::{MetricsSample, MetricsWindow};
use crate::observer::ObserverSlot;

/// Delay before the first sample, so the CPU reading has a baseline
pub const DEFAULT_WARMUP: Duration = Duration::from_millis(100);

/// Delay between samples
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Source of resource readings for one process
pub trait Probe: Send + 'static {
    /// Take a reading, or `None` if the process cannot be queried this tick
    fn sample(&mut self) -> Option<MetricsSample>;
}

/// Probe backed by sysinfo process statistics
pub struct SysinfoProbe {
    system: System,
    pid: Pid,
    cores: f32,
}

impl SysinfoProbe {
    /// Create a probe for `pid` and take the baseline CPU reading
    pub fn new(pid: u32) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as f32;
        let mut probe = Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
            cores,
        };
        probe.refresh();
        probe
    }

    fn refresh(&mut self) {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
    }
}

impl Probe for SysinfoProbe {
    fn sample(&mut self) -> Option<MetricsSample> {
        self.refresh();
        let process = self.system.process(self.pid)?;
        Some(MetricsSample {
            cpu_percent: process.cpu_usage() / self.cores,
            ram_mb: process.memory() / 1024 / 1024,
        })
    }
}

/// Sampler timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerTiming {
    pub warmup: Duration,
    pub interval: Duration,
}

impl Default for SamplerTiming {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Sample `probe` until `exited` is cancelled
///
/// Every reading is recorded in `window` whether or not an observer is
/// attached, then emitted as a `stats` event. A tick whose reading fails
/// records nothing, keeping both series the same length.
pub async fn run_sampler<P: Probe>(
    mut probe: P,
    window: Arc<Mutex<MetricsWindow>>,
    observers: Arc<ObserverSlot>,
    exited: CancellationToken,
    timing: SamplerTiming,
) {
    tokio::select! {
        _ = exited.cancelled() => return,
        _ = tokio::time::sleep(timing.warmup) => {}
    }

    let mut ticker = tokio::time::interval(timing.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = exited.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(sample) = probe.sample() else {
            tracing::debug!("skipping metrics tick, process not readable");
            continue;
        };
        window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample);
        observers.emit(LogEvent::Stats {
            cpu: sample.cpu_percent,
            ram_mb: sample.ram_mb,
        });
    }
    tracing::debug!("metrics sampler finished");
}
