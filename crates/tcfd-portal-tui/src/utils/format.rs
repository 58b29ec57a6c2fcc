use chrono::{DateTime, Local, Utc};

/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if needed. Counts characters, not bytes, so Hangul names are safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a materiality score with one decimal, or a dash when absent.
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{:.1}", value),
        None => "-".to_string(),
    }
}

/// Format a UTC timestamp in local time, e.g. "2024-03-05 14:07".
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
