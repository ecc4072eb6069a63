use std::fs;

use super::{CpuTimes, HeapStatistics, MeasurementSource};

const FALLBACK_PAGE_SIZE: u64 = 4096;

/// Reads resident memory from `/proc/self/statm` and per-core CPU times
/// from `/proc/stat`.
#[derive(Debug)]
pub struct ProcessMeasurements {
    page_size: u64,
}

impl Default for ProcessMeasurements {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMeasurements {
    pub fn new() -> Self {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        Self {
            page_size: u64::try_from(page_size)
                .ok()
                .filter(|size| *size > 0)
                .unwrap_or(FALLBACK_PAGE_SIZE),
        }
    }
}

impl MeasurementSource for ProcessMeasurements {
    fn heap_statistics(&mut self) -> Option<HeapStatistics> {
        let statm = fs::read_to_string("/proc/self/statm")
            .map_err(|e| log::trace!("Failed to read /proc/self/statm: {}", e))
            .ok()?;
        parse_statm(&statm, self.page_size)
    }

    fn cpu_times(&mut self) -> Option<Vec<CpuTimes>> {
        let stat = fs::read_to_string("/proc/stat")
            .map_err(|e| log::trace!("Failed to read /proc/stat: {}", e))
            .ok()?;
        let cpus = parse_proc_stat(&stat);
        if cpus.is_empty() {
            None
        } else {
            Some(cpus)
        }
    }
}

// statm: size resident shared text lib data dt (in pages)
fn parse_statm(contents: &str, page_size: u64) -> Option<HeapStatistics> {
    let mut fields = contents.split_whitespace();
    let size: u64 = fields.next()?.parse().ok()?;
    let resident: u64 = fields.next()?.parse().ok()?;
    Some(HeapStatistics {
        used_heap_size: resident.saturating_mul(page_size),
        total_heap_size: size.saturating_mul(page_size),
    })
}

// cpuN user nice system idle iowait irq softirq ...
fn parse_proc_stat(contents: &str) -> Vec<CpuTimes> {
    contents
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("cpu")?;
            if !rest.starts_with(|c: char| c.is_ascii_digit()) {
                // Aggregate "cpu" line
                return None;
            }
            let fields: Vec<u64> = rest
                .split_whitespace()
                .skip(1)
                .map(|field| field.parse().unwrap_or(0))
                .collect();
            let field = |i: usize| fields.get(i).copied().unwrap_or(0);
            Some(CpuTimes {
                user: field(0),
                nice: field(1),
                sys: field(2),
                idle: field(3),
                irq: field(5),
            })
        })
        .collect()
}
