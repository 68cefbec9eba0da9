use chrono::{DateTime, Local, Utc};

/// Layout of the audit timestamps stored in a chain's additional info.
pub const AUDIT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

/// Current local time in [`AUDIT_TIME_FORMAT`].
pub fn now_str() -> String {
    Local::now().format(AUDIT_TIME_FORMAT).to_string()
}
