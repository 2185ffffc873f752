pub mod jobs;
pub mod maintenance;
pub mod schedules;
pub mod status;

use chrono::{DateTime, Utc};

pub(crate) fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
