use serde::Serialize;
use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, ProcessesToUpdate, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Resource usage of this process and host. Blocks for
/// [`MINIMUM_CPU_UPDATE_INTERVAL`] to measure CPU; call from a blocking task.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ResourceUsage {
    pub memory_used_mb: f64,
    /// Process resident memory as a share of total host memory.
    pub memory_percent: f64,
    /// Host-wide CPU usage.
    pub cpu_percent: f64,
}

/// Resident memory of this process in megabytes, or 0 when unavailable.
pub fn process_memory_mb() -> f64 {
    let mut system = System::new();
    process_memory_bytes(&mut system) as f64 / BYTES_PER_MB
}

pub fn resource_usage() -> ResourceUsage {
    let mut system = System::new();
    system.refresh_cpu_usage();
    system.refresh_memory();

    let memory = process_memory_bytes(&mut system);
    let total = system.total_memory();
    let memory_percent = if total == 0 {
        0.0
    } else {
        memory as f64 / total as f64 * 100.0
    };

    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();

    ResourceUsage {
        memory_used_mb: memory as f64 / BYTES_PER_MB,
        memory_percent,
        cpu_percent: f64::from(system.global_cpu_usage()),
    }
}

fn process_memory_bytes(system: &mut System) -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let _ = system.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
    system.process(pid).map_or(0, sysinfo::Process::memory)
}

pub fn cpu_cores() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
