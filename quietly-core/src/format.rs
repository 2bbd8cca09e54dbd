//! Formatting helpers shared across front ends.

/// Format seconds as a running timer (e.g., "4:05" or "1:02:03").
pub fn format_timer(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Format minutes for summaries (e.g., "45m" or "3h 20m").
pub fn format_minutes(total_mins: i64) -> String {
    let hours = total_mins / 60;
    let mins = total_mins % 60;
    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Render a fixed-width progress bar for a 0.0-1.0 fraction.
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0)) * width as f64).floor() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
