use std::collections::VecDeque;

use serde::Serialize;

/// Number of samples kept per series
pub const WINDOW_CAPACITY: usize = 30;

/// Seconds between two consecutive samples, used for point labels
pub const SAMPLE_STRIDE_SECS: usize = 2;

/// One CPU/RAM reading of the server process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSample {
    /// CPU usage normalized by the logical core count
    pub cpu_percent: f32,
    /// Resident memory in megabytes
    pub ram_mb: u64,
}

/// Point of the padded series returned by the metrics query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub label: String,
    pub cpu: f32,
    pub ram_mb: u64,
}

/// Rolling history of resource samples
///
/// CPU and RAM are stored as two series that are always pushed together,
/// so both have the same length. Once capacity is reached the oldest pair
/// is dropped.
#[derive(Debug)]
pub struct MetricsWindow {
    cpu: VecDeque<f32>,
    ram: VecDeque<u64>,
    capacity: usize,
}

impl Default for MetricsWindow {
    fn default() -> Self {
        Self::new(WINDOW_CAPACITY)
    }
}

impl MetricsWindow {
    /// Create a window holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            cpu: VecDeque::with_capacity(capacity),
            ram: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full
    pub fn push(&mut self, sample: MetricsSample) {
        if self.capacity == 0 {
            return;
        }
        if self.cpu.len() >= self.capacity {
            self.cpu.pop_front();
            self.ram.pop_front();
        }
        self.cpu.push_back(sample.cpu_percent);
        self.ram.push_back(sample.ram_mb);
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    /// Check if no sample has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    /// Recorded CPU percentages, oldest first
    pub fn cpu(&self) -> impl Iterator<Item = f32> + '_ {
        self.cpu.iter().copied()
    }

    /// Recorded resident memory in MB, oldest first
    pub fn ram(&self) -> impl Iterator<Item = u64> + '_ {
        self.ram.iter().copied()
    }

    /// Return exactly `capacity` points, oldest first
    ///
    /// Missing leading samples are padded with zeros. Point `i` is labelled
    /// with its age, e.g. `-60s` for the first point of a 30-sample window.
    pub fn points(&self) -> Vec<MetricPoint> {
        let offset = self.capacity - self.len();
        (0..self.capacity)
            .map(|i| {
                let label = format!("-{}s", (self.capacity - i) * SAMPLE_STRIDE_SECS);
                if i < offset {
                    MetricPoint {
                        label,
                        cpu: 0.0,
                        ram_mb: 0,
                    }
                } else {
                    MetricPoint {
                        label,
                        cpu: self.cpu[i - offset],
                        ram_mb: self.ram[i - offset],
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f32, ram: u64) -> MetricsSample {
        MetricsSample {
            cpu_percent: cpu,
            ram_mb: ram,
        }
    }

    #[test]
    fn metrics_window_push_adds_paired_sample() {
        let mut window = MetricsWindow::default();
        window.push(sample(1.5, 512));

        assert_eq!(window.len(), 1);
        assert!(!window.is_empty());
        assert_eq!(window.cpu().collect::<Vec<_>>(), vec![1.5]);
        assert_eq!(window.ram().collect::<Vec<_>>(), vec![512]);
    }

    #[test]
    fn metrics_window_never_exceeds_capacity_and_stays_paired() {
        let mut window = MetricsWindow::default();
        for i in 0..100u64 {
            window.push(sample(i as f32, i));
            assert!(window.len() <= WINDOW_CAPACITY);
            assert_eq!(window.cpu().count(), window.ram().count());
        }

        assert_eq!(window.len(), WINDOW_CAPACITY);
        // Oldest surviving sample is number 70
        assert_eq!(window.ram().next(), Some(70));
        assert_eq!(window.ram().last(), Some(99));
    }

    #[test]
    fn metrics_window_zero_capacity_stores_nothing() {
        let mut window = MetricsWindow::new(0);
        window.push(sample(1.0, 1));
        assert!(window.is_empty());
        assert!(window.points().is_empty());
    }

    #[test]
    fn metrics_window_points_pads_leading_zeros() {
        let mut window = MetricsWindow::default();
        window.push(sample(10.0, 100));
        window.push(sample(20.0, 200));

        let points = window.points();
        assert_eq!(points.len(), WINDOW_CAPACITY);
        assert!(points[..28].iter().all(|p| p.cpu == 0.0 && p.ram_mb == 0));
        assert_eq!(points[28].cpu, 10.0);
        assert_eq!(points[29].ram_mb, 200);
    }

    #[test]
    fn metrics_window_points_labels_use_two_second_stride() {
        let points = MetricsWindow::default().points();
        assert_eq!(points[0].label, "-60s");
        assert_eq!(points[1].label, "-58s");
        assert_eq!(points[29].label, "-2s");
    }
}
