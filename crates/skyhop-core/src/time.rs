/// Milliseconds since the Unix epoch, as carried in every wire message.
pub fn timestamp_ms() -> u64 {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis() as u64
}
