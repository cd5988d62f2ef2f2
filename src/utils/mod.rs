pub mod errors;
pub mod graph_utils;
pub mod logging;

use std::sync::{atomic::AtomicUsize, OnceLock};

#[derive(Debug, Clone, Copy)]
pub struct MemoryStatsRecord {
    pub allocated: usize,
    pub resident: usize,
}

pub struct MemoryStats {
    allocated: AtomicUsize,
    resident: AtomicUsize,
}

impl MemoryStats {
    /// Get memory usage, `(allocated, resident)`.
    pub fn record(&self) -> MemoryStatsRecord {
        let r = match Self::get_allocated_and_resident_mem_of_app() {
            Ok(r) => r,
            Err(_) => {
                // if failed to get mem stats, just load previous value.
                return MemoryStatsRecord {
                    allocated: self.allocated.load(std::sync::atomic::Ordering::Relaxed),
                    resident: self.resident.load(std::sync::atomic::Ordering::Relaxed),
                };
            }
        };

        // save mem stats
        self.allocated
            .store(r.allocated, std::sync::atomic::Ordering::Relaxed);
        self.resident
            .store(r.resident, std::sync::atomic::Ordering::Relaxed);

        r
    }

    fn get_allocated_and_resident_mem_of_app() -> Result<MemoryStatsRecord, anyhow::Error> {
        let e = tikv_jemalloc_ctl::epoch::mib().map_err(|err| anyhow::anyhow!("{:?}", err))?;

        let allocated =
            tikv_jemalloc_ctl::stats::allocated::mib().map_err(|err| anyhow::anyhow!("{:?}", err))?;

        let resident =
            tikv_jemalloc_ctl::stats::resident::mib().map_err(|err| anyhow::anyhow!("{:?}", err))?;

        e.advance().map_err(|err| anyhow::anyhow!("{:?}", err))?;

        Ok(MemoryStatsRecord {
            allocated: allocated
                .read()
                .map_err(|err| anyhow::anyhow!("{:?}", err))?,
            resident: resident
                .read()
                .map_err(|err| anyhow::anyhow!("{:?}", err))?,
        })
    }
}

pub fn mem_stats() -> &'static MemoryStats {
    #[allow(non_upper_case_globals)]
    static mem_stats: OnceLock<MemoryStats> = OnceLock::new();

    mem_stats.get_or_init(|| MemoryStats {
        allocated: AtomicUsize::new(0),
        resident: AtomicUsize::new(0),
    })
}

#[inline]
pub fn human_readable_byte_count(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let exp = (((bytes as f64).ln() / 1024_f64.ln()) as usize).min(6);

    format!(
        "{:.1} {}B",
        bytes as f64 / 1024_f64.powi(exp as i32),
        &"kMGTPE"[(exp - 1)..exp]
    )
}
