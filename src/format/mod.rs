//! Listing order and display formatting.

use crate::model::RemoteEntry;
use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;

const KB: u64 = 1_000;
const MB: u64 = 1_000_000;
const GB: u64 = 1_000_000_000;

/// Input pattern accepted by [`format_date`].
const TIMESTAMP_PATTERN: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Output pattern of [`format_date`], e.g. `May 01, 2023`.
const DISPLAY_PATTERN: &str = "%b %d, %Y";

/// A timestamp did not match `yyyy-MM-ddTHH:mm:ss.SSSZ`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable date: {input:?}")]
pub struct DateFormatError {
    /// The rejected input.
    pub input: String,
}

/// Sorts folders before files, then by name. Stable.
pub fn order_for_display(entries: &mut [RemoteEntry]) {
    entries.sort_by(|a, b| a.kind().cmp(&b.kind()).then_with(|| a.name().cmp(b.name())));
}

/// Owned variant of [`order_for_display`].
pub fn ordered_for_display(mut entries: Vec<RemoteEntry>) -> Vec<RemoteEntry> {
    order_for_display(&mut entries);
    entries
}

/// Renders a byte count with decimal units.
///
/// Zero renders as an empty string. Kilobytes are whole numbers (truncated);
/// megabytes and gigabytes have two decimals.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return String::new();
    }
    if bytes < MB {
        return format!("{} KB", bytes / KB);
    }

    // The unit is picked after rounding so 999_999_999 reads 1.00 GB.
    let megabytes = hundredths(bytes, MB);
    if megabytes < 100 * (GB / MB) {
        format!("{}.{:02} MB", megabytes / 100, megabytes % 100)
    } else {
        let gigabytes = hundredths(bytes, GB);
        format!("{}.{:02} GB", gigabytes / 100, gigabytes % 100)
    }
}

/// `bytes / unit` in hundredths, rounded half up.
fn hundredths(bytes: u64, unit: u64) -> u64 {
    let step = unit / 100;
    bytes.saturating_add(step / 2) / step
}

/// Renders a Drive timestamp as `MMM dd, yyyy`.
pub fn format_date(iso: &str) -> Result<String, DateFormatError> {
    let bytes = iso.as_bytes();
    let well_shaped = bytes.len() == 24
        && bytes[19] == b'.'
        && bytes[20..23].iter().all(u8::is_ascii_digit)
        && bytes[23] == b'Z';
    if !well_shaped {
        return Err(DateFormatError {
            input: iso.to_string(),
        });
    }

    NaiveDateTime::parse_from_str(iso, TIMESTAMP_PATTERN)
        .map(|parsed| parsed.format(DISPLAY_PATTERN).to_string())
        .map_err(|_| DateFormatError {
            input: iso.to_string(),
        })
}

/// [`format_date`], with unparseable input rendered as an empty string.
pub fn display_date(iso: &str) -> String {
    format_date(iso).unwrap_or_else(|e| {
        debug!(error = %e, "rendering blank date");
        String::new()
    })
}
