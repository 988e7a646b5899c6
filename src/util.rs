//! Size and file-name helpers

const BYTE_UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Smallest value ever shown
const MIN_VALUE: f64 = 0.1;

/// Human readable size, never below `1 KB`.
///
/// Kilobytes are rounded up to a whole number; larger units keep one
/// decimal.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    loop {
        size /= 1024.0;
        if size <= 1024.0 || unit == BYTE_UNITS.len() - 1 {
            break;
        }
        unit += 1;
    }

    let size = size.max(MIN_VALUE);
    if unit == 0 {
        format!("{} {}", size.ceil(), BYTE_UNITS[unit])
    } else {
        let rounded = (size * 10.0).round() / 10.0;
        format!("{} {}", rounded, BYTE_UNITS[unit])
    }
}

/// `"report.final.zip"` -> `"report.final"`. Names that are nothing but an
/// extension are returned unchanged.
pub fn trim_file_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) if pos + 1 == name.len() => name,
        Some(pos) => &name[..pos],
    }
}
