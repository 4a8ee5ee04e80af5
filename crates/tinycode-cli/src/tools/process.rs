//! Tracking and teardown of child processes started by tools

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// How long a terminated process group gets before it is killed
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Process groups of running commands. Clones share the same set.
#[derive(Clone, Default)]
pub struct ProcessTracker {
    pids: Arc<Mutex<HashSet<u32>>>,
}

impl ProcessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, pid: u32) {
        self.pids.lock().insert(pid);
    }

    pub fn untrack(&self, pid: u32) {
        self.pids.lock().remove(&pid);
    }

    pub fn len(&self) -> usize {
        self.pids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.lock().is_empty()
    }

    /// SIGTERM every tracked process group, then SIGKILL whatever is still
    /// alive after the grace period.
    pub async fn terminate_all(&self) {
        let pids: Vec<u32> = self.pids.lock().drain().collect();
        if pids.is_empty() {
            return;
        }

        tracing::info!("cleaning up {} active processes", pids.len());
        for &pid in &pids {
            terminate_group(pid);
        }

        tokio::time::sleep(KILL_GRACE).await;
        for pid in pids {
            if group_alive(pid) {
                tracing::debug!(pid, "process ignored SIGTERM, killing");
                kill_group(pid);
            }
        }
    }
}

/// Resolves with the exit status once the process is asked to stop:
/// 130 for Ctrl+C, 143 for SIGTERM.
#[cfg(unix)]
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = i32> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => 130,
            _ = terminate.recv() => 143,
        }
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = i32> + Send + 'static> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => 130,
            Err(e) => {
                tracing::warn!("failed to listen for Ctrl+C: {}", e);
                std::future::pending().await
            }
        }
    })
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // Negative pid addresses the whole process group
    unsafe { libc::kill(-pid, signal) == 0 }
}

/// Ask a process group to exit
#[cfg(unix)]
pub fn terminate_group(pid: u32) -> bool {
    signal_group(pid, libc::SIGTERM)
}

#[cfg(unix)]
pub fn kill_group(pid: u32) -> bool {
    signal_group(pid, libc::SIGKILL)
}

#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    signal_group(pid, 0)
}

#[cfg(not(unix))]
pub fn terminate_group(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub fn kill_group(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
fn group_alive(_pid: u32) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_all_stops_tracked_groups() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let tracker = ProcessTracker::new();
        tracker.track(pid);
        assert_eq!(tracker.len(), 1);

        tracker.terminate_all().await;
        assert!(tracker.is_empty());

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_shutdown_signal_resolves_on_sigterm() {
        let shutdown = shutdown_signal().unwrap();
        unsafe {
            libc::kill(libc::getpid(), libc::SIGTERM);
        }
        let code = tokio::time::timeout(Duration::from_secs(2), shutdown)
            .await
            .unwrap();
        assert_eq!(code, 143);
    }

    #[tokio::test]
    async fn test_terminate_all_without_processes_returns_immediately() {
        let tracker = ProcessTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.terminate_all())
            .await
            .unwrap();
    }
}
