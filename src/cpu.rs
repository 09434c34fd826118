//! CPU count detection.
//!
//! Shells out to the platform's introspection command and falls back to a
//! single CPU whenever detection is unsupported or fails.

use crate::command::{CommandRunner, SystemCommandRunner};

/// Platforms with a known CPU introspection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// sysctl-style query (`hw.ncpu`).
    Bsd,
    /// `/proc/cpuinfo` listing.
    Linux,
    /// No known strategy.
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`.
    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" | "freebsd" => Platform::Bsd,
            "linux" => Platform::Linux,
            _ => Platform::Other,
        }
    }
}

const SYSCTL_NCPU: &[&str] = &["/usr/sbin/sysctl", "-n", "hw.ncpu"];
const CAT_CPUINFO: &[&str] = &["/bin/cat", "/proc/cpuinfo"];

/// Detect the number of CPUs on this machine. Always returns at least 1.
pub fn detect_cpu_count() -> usize {
    detect_cpu_count_with(&SystemCommandRunner, Platform::current())
}

/// Detect the number of CPUs using the given runner and platform strategy.
pub fn detect_cpu_count_with(runner: &dyn CommandRunner, platform: Platform) -> usize {
    let count = match platform {
        Platform::Bsd => runner
            .run(SYSCTL_NCPU)
            .ok()
            .and_then(|output| output.trim().parse::<usize>().ok())
            .unwrap_or(0),
        Platform::Linux => runner
            .run(CAT_CPUINFO)
            .map(|output| count_processors(&output))
            .unwrap_or(0),
        Platform::Other => 0,
    };

    if count == 0 {
        tracing::debug!(?platform, "cpu detection failed, assuming a single cpu");
        return 1;
    }
    count
}

/// Count `processor` entries in a `/proc/cpuinfo` listing.
fn count_processors(cpuinfo: &str) -> usize {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("processor"))
        .count()
}

/// Worker-thread hint for a machine with `cpu_count` CPUs.
pub fn concurrency_hint(cpu_count: usize) -> usize {
    cpu_count.max(1) * 2
}
