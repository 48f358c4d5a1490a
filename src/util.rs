//! Small formatting helper used only for log output, never for any
//! wire or on-disk representation.

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Formats a byte count as a human-readable `"<value> <unit>"` string,
/// ported from the reference implementation's `convert_size`.
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }

    let unit_idx = ((size_bytes as f64).log(1024.0).floor() as usize).min(UNITS.len() - 1);
    let power = 1024f64.powi(unit_idx as i32);
    let value = size_bytes as f64 / power;

    format!("{:.2} {}", value, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bytes() {
        assert_eq!(format_size(0), "0 B");
    }

    #[test]
    fn small_values_stay_in_bytes() {
        assert_eq!(format_size(512), "512.00 B");
    }

    #[test]
    fn kilobyte_boundary() {
        assert_eq!(format_size(1024), "1.00 KB");
    }

    #[test]
    fn megabytes() {
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
