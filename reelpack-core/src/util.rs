use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Progress callback type: (items_completed, total_items)
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Deterministic video id derived from a store key.
///
/// First 16 hex chars of SHA-256 of the key, so the same object always maps
/// to the same id across listings.
pub fn stable_video_id(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Lowercase, dash-separated slug for use in object keys and file names.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "package".to_string()
    } else {
        slug
    }
}

/// Format a duration in seconds as HH:MM:SS.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Compact ISO 8601 timestamp (e.g. `20260807T101500Z`) for archive keys.
pub fn compact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Returns true if `s` looks like a compact ISO 8601 timestamp.
pub fn is_compact_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 16
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'T'
        && bytes[9..15].iter().all(u8::is_ascii_digit)
        && bytes[15] == b'Z'
}

/// File name without its terminal extension.
pub fn filename_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Content type for a video file, by extension.
pub fn video_content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
