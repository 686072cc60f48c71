use serde::{Deserialize, Serialize};

/// Response of the protected `/live-data` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct LiveData {
    pub server_time: String,
    pub counter: u64,
    pub last_updated: String,
    pub system_metrics: SystemMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SystemMetrics {
    pub go_version: String,
    pub num_goroutines: u64,
    pub num_cpu: u64,
    pub memory_alloc_mb: f64,
    pub memory_total_mb: f64,
    pub memory_sys_mb: f64,
    pub gc_runs: u64,
    pub uptime: String,
    pub goos: String,
    pub goarch: String,
}

impl SystemMetrics {
    /// "linux/amd64" style platform label
    pub fn platform(&self) -> String {
        format!("{}/{}", self.goos, self.goarch)
    }
}
