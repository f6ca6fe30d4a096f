#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

/// 每個階段（串流、深度分析、匯出）結束時記錄一次資源使用
#[cfg(feature = "cli")]
pub struct RunMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    peak_memory: Mutex<u64>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if enabled && pid.is_none() {
            tracing::warn!("Could not resolve current PID, run monitoring disabled");
        }

        Self {
            system: Mutex::new(System::new()),
            pid,
            start_time: Instant::now(),
            peak_memory: Mutex::new(0),
            enabled: enabled && pid.is_some(),
        }
    }

    pub fn stats(&self) -> Option<PhaseStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        let process = system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;

        let mut peak = self.peak_memory.lock().ok()?;
        *peak = (*peak).max(memory_mb);

        Some(PhaseStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: *peak,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    pub fn log_phase(&self, phase: &str) {
        if let Some(stats) = self.stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(not(feature = "cli"))]
pub struct RunMonitor;

#[cfg(not(feature = "cli"))]
impl RunMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_phase(&self, _phase: &str) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = RunMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.stats().is_none());
    }
}
