//! Host information and load metrics

use std::net::IpAddr;
use std::path::Path;

use sysinfo::{Disks, Networks, System, MINIMUM_CPU_UPDATE_INTERVAL};

/// Host load as percentages (0-100)
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_percent: f32,

    /// Usage of the root filesystem
    pub disk_percent: f32,
}

/// Identity of the host the agent runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub ip_addresses: Vec<String>,
}

fn percent(used: u64, total: u64) -> f32 {
    if total > 0 {
        (used as f32 / total as f32) * 100.0
    } else {
        0.0
    }
}

/// Used and total bytes of the disk mounted at `/`, or of all disks when
/// none is
fn root_disk_usage(disks: &Disks) -> (u64, u64) {
    let usage = |disk: &sysinfo::Disk| {
        (
            disk.total_space().saturating_sub(disk.available_space()),
            disk.total_space(),
        )
    };

    if let Some(root) = disks.iter().find(|d| d.mount_point() == Path::new("/")) {
        return usage(root);
    }
    disks.iter().map(usage).fold((0, 0), |(used, total), (u, t)| (used + u, total + t))
}

/// Collect host load. CPU usage needs two samples, so this waits for the
/// minimum sampling interval.
pub async fn collect_metrics() -> SystemMetrics {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let (disk_used, disk_total) = root_disk_usage(&disks);

    SystemMetrics {
        cpu_percent: sys.global_cpu_usage(),
        memory_percent: percent(sys.used_memory(), sys.total_memory()),
        disk_percent: percent(disk_used, disk_total),
    }
}

/// Non-loopback addresses, deduplicated, in stable order
fn external_addresses(addrs: impl IntoIterator<Item = IpAddr>) -> Vec<String> {
    let mut addrs: Vec<IpAddr> = addrs.into_iter().filter(|a| !a.is_loopback()).collect();
    addrs.sort();
    addrs.dedup();
    addrs.into_iter().map(|a| a.to_string()).collect()
}

/// Hostname, OS description and addresses of this host
pub fn host_info() -> HostInfo {
    let networks = Networks::new_with_refreshed_list();
    let addrs = networks
        .iter()
        .flat_map(|(_, data)| data.ip_networks().iter().map(|net| net.addr));

    HostInfo {
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        os: System::long_os_version()
            .or_else(System::name)
            .unwrap_or_else(|| std::env::consts::OS.to_string()),
        ip_addresses: external_addresses(addrs),
    }
}
