//! Shared parsing helpers for procfs-backed sources.

use std::collections::BTreeMap;

/// Diff two keyed readings entry by entry. Keys present on only one side
/// (a device that appeared or vanished between samples) produce nothing.
pub fn keyed_delta<V, D>(
    old: &BTreeMap<String, V>,
    new: &BTreeMap<String, V>,
    diff: impl Fn(&V, &V) -> D,
) -> BTreeMap<String, D> {
    new.iter()
        .filter_map(|(key, new_value)| {
            old.get(key)
                .map(|old_value| (key.clone(), diff(old_value, new_value)))
        })
        .collect()
}

/// Kernel clock ticks per second, used to turn `/proc/stat` ticks into seconds.
pub fn clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: `sysconf` is thread-safe for this query and has no side effects.
        let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if hz > 0 { hz as f64 } else { 100.0 }
    }
    #[cfg(not(unix))]
    {
        100.0
    }
}

/// Parse every whitespace-separated token as `T`, stopping at the first
/// token that does not parse.
pub fn leading_numbers<T: std::str::FromStr>(raw: &str) -> Vec<T> {
    raw.split_whitespace()
        .map_while(|token| token.parse::<T>().ok())
        .collect()
}

/// Decode the octal escapes (`\040` for space, `\011` for tab, ...) the
/// kernel uses for mount points and device names in `/proc/mounts`.
pub fn decode_octal_escapes(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_delta_only_covers_shared_keys() {
        let old: BTreeMap<String, i64> =
            [("eth0".to_string(), 10), ("wlan0".to_string(), 5)].into();
        let new: BTreeMap<String, i64> =
            [("eth0".to_string(), 25), ("usb0".to_string(), 7)].into();
        let d = keyed_delta(&old, &new, |o, n| n - o);
        assert_eq!(d.len(), 1);
        assert_eq!(d["eth0"], 15);
    }

    #[test]
    fn clk_tck_is_positive() {
        assert!(clk_tck() > 0.0);
    }

    #[test]
    fn leading_numbers_stops_at_garbage() {
        assert_eq!(leading_numbers::<u64>("1 2 3 x 4"), vec![1, 2, 3]);
        assert!(leading_numbers::<u64>("").is_empty());
    }

    #[test]
    fn octal_escapes_decode() {
        assert_eq!(decode_octal_escapes("/mnt/my\\040disk"), "/mnt/my disk");
        assert_eq!(decode_octal_escapes("/a\\011b"), "/a\tb");
        assert_eq!(decode_octal_escapes("/plain"), "/plain");
        assert_eq!(decode_octal_escapes("/trailing\\04"), "/trailing\\04");
    }
}
