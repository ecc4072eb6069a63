mod portable;
#[cfg(target_os = "linux")]
mod procfs;

pub use portable::SystemMeasurements;
#[cfg(target_os = "linux")]
pub use procfs::ProcessMeasurements;
/// Default measurement source for the current platform.
#[cfg(not(target_os = "linux"))]
pub type ProcessMeasurements = SystemMeasurements;

/// Provides the periodic heap and CPU readings the ticker fans out.
/// A `None` reading skips that channel for the tick.
pub trait MeasurementSource {
    fn heap_statistics(&mut self) -> Option<HeapStatistics>;
    fn cpu_times(&mut self) -> Option<Vec<CpuTimes>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStatistics {
    /// Bytes
    pub used_heap_size: u64,
    /// Bytes
    pub total_heap_size: u64,
}

/// Cumulative time one core has spent in each state, in arbitrary but
/// consistent units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub sys: u64,
    pub idle: u64,
    pub irq: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.sys)
            .saturating_add(self.idle)
            .saturating_add(self.irq)
    }
}

/// Share of non-idle time across all cores, in `[0, 1]`.
/// Negative, infinite and NaN results (e.g. no cores reported) read as 0.
pub fn cpu_load(cpus: &[CpuTimes]) -> f64 {
    let (total, idle) = cpus.iter().fold((0u64, 0u64), |(total, idle), cpu| {
        (total.saturating_add(cpu.total()), idle.saturating_add(cpu.idle))
    });
    let load = 1.0 - idle as f64 / total as f64;
    if load.is_finite() && load >= 0.0 {
        load
    } else {
        0.0
    }
}
