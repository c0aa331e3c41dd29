//! Host identification for the `info` command.

use std::path::Path;

use serde::Serialize;

/// Static facts about the host plus its current load average.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub os: String,
    pub hostname: String,
    pub arch: String,
    pub distro: Option<String>,
    pub kernel: Option<String>,
    pub cpu_count: usize,
    pub loadavg: Option<[f64; 3]>,
}

/// Collect [`HostInfo`] for the running machine.
pub fn detect_host_info() -> HostInfo {
    HostInfo {
        os: std::env::consts::OS.to_string(),
        hostname: hostname().unwrap_or_else(|| "unknown".to_string()),
        arch: std::env::consts::ARCH.to_string(),
        distro: distro(Path::new("/etc")),
        kernel: kernel_release(),
        cpu_count: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        loadavg: loadavg(),
    }
}

fn hostname() -> Option<String> {
    #[cfg(unix)]
    {
        let mut buf = [0u8; 256];
        // SAFETY: the buffer is valid for `buf.len()` bytes.
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
        if rc != 0 {
            return None;
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
        (!name.is_empty()).then_some(name)
    }
    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").ok()
    }
}

/// Distribution name from `<etc>/os-release`; Arch ships `arch-release` and
/// may leave `os-release` generic.
fn distro(etc: &Path) -> Option<String> {
    if etc.join("arch-release").exists() {
        return Some("Arch Linux".to_string());
    }
    let raw = std::fs::read_to_string(etc.join("os-release")).ok()?;
    parse_os_release(&raw)
}

fn parse_os_release(raw: &str) -> Option<String> {
    raw.lines()
        .find_map(|l| l.strip_prefix("PRETTY_NAME="))
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

fn kernel_release() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .ok()
            .map(|s| s.trim().to_string())
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn loadavg() -> Option<[f64; 3]> {
    #[cfg(unix)]
    {
        let mut values = [0.0_f64; 3];
        // SAFETY: `getloadavg` writes up to 3 doubles to a valid buffer.
        let n = unsafe { libc::getloadavg(values.as_mut_ptr(), 3) };
        (n == 3).then_some(values)
    }
    #[cfg(not(unix))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_release_pretty_name() {
        let raw = "NAME=\"Debian\"\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nID=debian\n";
        assert_eq!(
            parse_os_release(raw).as_deref(),
            Some("Debian GNU/Linux 12 (bookworm)")
        );
        assert_eq!(parse_os_release("ID=alpine\n"), None);
    }

    #[test]
    fn arch_release_wins() {
        let etc = tempfile::tempdir().unwrap();
        std::fs::write(etc.path().join("arch-release"), "").unwrap();
        std::fs::write(etc.path().join("os-release"), "PRETTY_NAME=\"Linux\"\n").unwrap();
        assert_eq!(distro(etc.path()).as_deref(), Some("Arch Linux"));
    }

    #[test]
    fn detect_fills_basics() {
        let info = detect_host_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
        assert!(info.cpu_count >= 1);
    }
}
