mod sampler;
mod window;

pub use sampler::{
    DEFAULT_INTERVAL, DEFAULT_WARMUP, Probe, SamplerTiming, SysinfoProbe, run_sampler,
};
pub use window::{MetricPoint, MetricsSample, MetricsWindow, SAMPLE_STRIDE_SECS, WINDOW_CAPACITY};
