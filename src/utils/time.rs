use std::time::Duration;

use chrono::Local;

pub fn current_human_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M").to_string()
}

/// Compact `1m 05.2s` / `3.4s` rendering for run summaries.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = (elapsed.as_secs_f64() * 10.0).round() / 10.0;
    if secs >= 60.0 {
        let minutes = (secs / 60.0).floor();
        format!("{}m {:04.1}s", minutes as u64, secs - minutes * 60.0)
    } else {
        format!("{secs:.1}s")
    }
}
