/// 秒數轉為 `HH:MM:SS`
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// 位元組轉為 MB 字串
#[must_use]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// 位元率轉為 Mbps 字串
#[must_use]
pub fn format_bitrate(bits_per_second: u64) -> String {
    format!("{:.2} Mbps", bits_per_second as f64 / 1_000_000.0)
}
