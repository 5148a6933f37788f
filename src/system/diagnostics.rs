//! CPU, memory and disk usage snapshot for `/api/diagnostics`.
//!
//! Memory and CPU come from `/proc`; disk figures are for the filesystem holding the
//! media root. Sizes are reported in GiB rounded to two decimals, percentages to one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub usage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub used: f64,
    pub total: f64,
    pub percent: f64,
}

impl UsageStats {
    pub fn from_bytes(used: u64, total: u64) -> Self {
        let percent = if total == 0 { 0.0 } else { used as f64 / total as f64 * 100.0 };
        Self { used: round_to(used as f64 / GIB, 2), total: round_to(total as f64 / GIB, 2), percent: round_to(percent, 1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub cpu: CpuStats,
    pub memory: UsageStats,
    pub disk: UsageStats,
}

#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn snapshot(&self, disk_path: &Path) -> Result<Diagnostics>;

    /// Time `snapshot` deliberately spends sampling, on top of any I/O.
    fn sampling_time(&self) -> Duration { Duration::ZERO }
}

/// Linux probe: two `/proc/stat` samples `sample_interval` apart, `/proc/meminfo`,
/// and `statvfs` on the disk path.
#[derive(Debug, Clone)]
pub struct ProcProbe {
    pub sample_interval: Duration,
    proc_root: PathBuf,
}

impl Default for ProcProbe {
    fn default() -> Self { Self { sample_interval: Duration::from_secs(1), proc_root: PathBuf::from("/proc") } }
}

#[async_trait]
impl SystemProbe for ProcProbe {
    fn sampling_time(&self) -> Duration { self.sample_interval }

    async fn snapshot(&self, disk_path: &Path) -> Result<Diagnostics> {
        let stat = self.proc_root.join("stat");
        let first = parse_cpu_times(&tokio::fs::read_to_string(&stat).await.context("reading /proc/stat")?)?;
        tokio::time::sleep(self.sample_interval).await;
        let second = parse_cpu_times(&tokio::fs::read_to_string(&stat).await.context("reading /proc/stat")?)?;
        let meminfo = tokio::fs::read_to_string(self.proc_root.join("meminfo")).await.context("reading /proc/meminfo")?;
        let memory = parse_meminfo(&meminfo)?;

        let disk_path = disk_path.to_path_buf();
        let disk = tokio::task::spawn_blocking(move || -> Result<UsageStats> {
            let total = fs2::total_space(&disk_path).with_context(|| format!("statvfs {}", disk_path.display()))?;
            let free = fs2::free_space(&disk_path).with_context(|| format!("statvfs {}", disk_path.display()))?;
            Ok(UsageStats::from_bytes(total.saturating_sub(free), total))
        })
        .await??;

        Ok(Diagnostics { cpu: CpuStats { usage: cpu_usage(first, second) }, memory, disk })
    }
}

/// Probe that always reports the same numbers.
#[derive(Debug, Clone)]
pub struct StaticProbe(pub Diagnostics);

#[async_trait]
impl SystemProbe for StaticProbe {
    async fn snapshot(&self, _disk_path: &Path) -> Result<Diagnostics> { Ok(self.0) }
}

/// (busy, total) jiffies from the aggregate `cpu` line.
fn parse_cpu_times(stat: &str) -> Result<(u64, u64)> {
    let line = stat.lines().find(|l| l.starts_with("cpu ")).ok_or_else(|| anyhow!("no aggregate cpu line"))?;
    let fields: Vec<u64> = line.split_whitespace().skip(1).map(|f| f.parse::<u64>()).collect::<Result<_, _>>()?;
    if fields.len() < 4 {
        return Err(anyhow!("short cpu line: {line}"));
    }
    let total: u64 = fields.iter().take(8).sum();
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok((total - idle, total))
}

fn cpu_usage(first: (u64, u64), second: (u64, u64)) -> f64 {
    let busy = second.0.saturating_sub(first.0) as f64;
    let total = second.1.saturating_sub(first.1) as f64;
    if total <= 0.0 { return 0.0; }
    round_to(busy / total * 100.0, 1)
}

fn parse_meminfo(meminfo: &str) -> Result<UsageStats> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find_map(|l| l.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };
    let total = field("MemTotal").ok_or_else(|| anyhow!("MemTotal missing"))?;
    let available = field("MemAvailable")
        .or_else(|| Some(field("MemFree")? + field("Buffers").unwrap_or(0) + field("Cached").unwrap_or(0)))
        .ok_or_else(|| anyhow!("MemAvailable missing"))?;
    Ok(UsageStats::from_bytes(total.saturating_sub(available), total))
}

fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT_A: &str = "cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 50 0 50 400 0 0 0 0 0 0\n";
    const STAT_B: &str = "cpu  150 0 150 900 0 0 0 0 0 0\ncpu0 75 0 75 450 0 0 0 0 0 0\n";

    #[test]
    fn cpu_usage_from_two_samples() {
        let a = parse_cpu_times(STAT_A).unwrap();
        let b = parse_cpu_times(STAT_B).unwrap();
        assert_eq!(a, (200, 1000));
        assert_eq!(cpu_usage(a, b), 50.0);
        assert_eq!(cpu_usage(a, a), 0.0);
    }

    #[test]
    fn bad_stat_is_an_error() {
        assert!(parse_cpu_times("intr 1 2 3").is_err());
        assert!(parse_cpu_times("cpu  1 x 3 4").is_err());
    }

    #[test]
    fn meminfo_uses_available() {
        let info = "MemTotal:       16777216 kB\nMemFree:         1000000 kB\nMemAvailable:    8388608 kB\n";
        let m = parse_meminfo(info).unwrap();
        assert_eq!(m.total, 16.0);
        assert_eq!(m.used, 8.0);
        assert_eq!(m.percent, 50.0);
    }

    #[test]
    fn meminfo_without_available() {
        let info = "MemTotal: 4194304 kB\nMemFree: 1048576 kB\nBuffers: 0 kB\nCached: 1048576 kB\n";
        let m = parse_meminfo(info).unwrap();
        assert_eq!(m.used, 2.0);
        assert_eq!(m.percent, 50.0);
    }

    #[test]
    fn usage_rounding() {
        let u = UsageStats::from_bytes(1_234_567_890, 3_000_000_000);
        assert_eq!(u.used, 1.15);
        assert_eq!(u.total, 2.79);
        assert_eq!(u.percent, 41.2);
        assert_eq!(UsageStats::from_bytes(0, 0).percent, 0.0);
    }

    #[tokio::test]
    async fn static_probe_round_trips_json_shape() {
        let d = Diagnostics {
            cpu: CpuStats { usage: 12.5 },
            memory: UsageStats { used: 1.0, total: 2.0, percent: 50.0 },
            disk: UsageStats { used: 3.0, total: 4.0, percent: 75.0 },
        };
        let snap = StaticProbe(d).snapshot(Path::new("/")).await.unwrap();
        let v = serde_json::to_value(snap).unwrap();
        assert_eq!(v["cpu"]["usage"], 12.5);
        assert_eq!(v["disk"]["percent"], 75.0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn proc_probe_reads_host() {
        let probe = ProcProbe { sample_interval: Duration::from_millis(50), ..ProcProbe::default() };
        let d = probe.snapshot(Path::new("/")).await.unwrap();
        assert!(d.memory.total > 0.0);
        assert!((0.0..=100.0).contains(&d.cpu.usage));
    }
}
