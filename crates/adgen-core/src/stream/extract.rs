//! Payload extraction from decoded lines

/// Prefix that marks a line as carrying a record
pub const PAYLOAD_PREFIX: &str = "data: ";

/// Strip the payload prefix from a line.
///
/// Lines without the prefix (blank SSE separators, comments, stray output)
/// are noise and yield `None`, as do prefixed lines with nothing after them.
pub fn extract_payload(line: &str) -> Option<&str> {
    let payload = line.strip_prefix(PAYLOAD_PREFIX)?.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}
