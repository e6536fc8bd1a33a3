//! Display helpers shared by the views.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};

const JEDEC_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Milliseconds rendered as `1h 2m 3s`, rounded to whole seconds.
pub fn duration_ms(millis: u64) -> String {
    let seconds = millis.saturating_add(500) / 1000;
    humantime::format_duration(Duration::from_secs(seconds)).to_string()
}

pub fn optional_duration_ms(millis: Option<u64>) -> String {
    millis.map(duration_ms).unwrap_or_else(|| "-".to_string())
}

/// Byte count in base-1024 JEDEC units with the given number of decimals.
pub fn bytes(value: u64, decimals: usize) -> String {
    if value == 0 {
        return "0 B".to_string();
    }
    let mut scaled = value as f64;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < JEDEC_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value} B")
    } else {
        format!("{scaled:.decimals$} {}", JEDEC_UNITS[unit])
    }
}

pub fn optional_bytes(value: Option<u64>) -> String {
    value.map(|v| bytes(v, 2)).unwrap_or_else(|| "-".to_string())
}

pub fn datetime(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| {
            ts.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

/// CPU time in milliseconds as hours with one decimal.
pub fn cpu_hours(cpu_time_ms: u64) -> String {
    format!("{:.1}", cpu_time_ms as f64 / 3_600_000.0)
}

pub fn percent(value: f64) -> String {
    format!("{value:.1}%")
}
