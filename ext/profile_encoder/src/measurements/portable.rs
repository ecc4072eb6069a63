use sysinfo::{
    CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System,
};

use super::{CpuTimes, HeapStatistics, MeasurementSource};

// Per-core usage is reported as a percentage; it is spread over this many
// units so `cpu_load` sees the same busy/idle split.
const USAGE_SCALE: f32 = 10_000.0;

/// Process memory and per-core CPU usage through `sysinfo`, for platforms
/// without procfs.
pub struct SystemMeasurements {
    system: System,
    pid: Option<Pid>,
}

impl Default for SystemMeasurements {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMeasurements {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        let pid = sysinfo::get_current_pid()
            .map_err(|e| log::debug!("Failed to get current pid: {}", e))
            .ok();
        Self { system, pid }
    }
}

impl MeasurementSource for SystemMeasurements {
    fn heap_statistics(&mut self) -> Option<HeapStatistics> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let process = self.system.process(pid)?;
        Some(HeapStatistics {
            used_heap_size: process.memory(),
            total_heap_size: process.virtual_memory(),
        })
    }

    fn cpu_times(&mut self) -> Option<Vec<CpuTimes>> {
        self.system.refresh_cpu_usage();
        let cpus: Vec<CpuTimes> = self
            .system
            .cpus()
            .iter()
            .map(|cpu| usage_to_times(cpu.cpu_usage()))
            .collect();
        if cpus.is_empty() {
            None
        } else {
            Some(cpus)
        }
    }
}

fn usage_to_times(percent: f32) -> CpuTimes {
    let busy = if percent.is_finite() {
        (percent.clamp(0.0, 100.0) / 100.0 * USAGE_SCALE) as u64
    } else {
        0
    };
    CpuTimes {
        user: busy,
        idle: USAGE_SCALE as u64 - busy,
        ..Default::default()
    }
}
