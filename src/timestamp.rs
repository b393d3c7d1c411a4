use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Convert a [`SystemTime`] to whole milliseconds since `UNIX_EPOCH`.
///
/// Times before the epoch clamp to zero and times past `u64::MAX`
/// milliseconds saturate, so the result is always representable in the
/// record's integer `timestamp` field.
pub fn system_time_to_millis(time: SystemTime) -> u64 {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis();

    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Current wall-clock time in milliseconds since `UNIX_EPOCH`.
pub fn now_millis() -> u64 {
    system_time_to_millis(SystemTime::now())
}
