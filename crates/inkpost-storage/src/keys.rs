//! Shared key generation for media files.

use chrono::{DateTime, Datelike, Utc};

/// Build the storage key for an upload: `{yyyy}/{mm}/{hash}.{ext}`.
///
/// The extension is lowercased so that `a.PNG` and `a.png` dedupe to the same key.
pub fn media_key(hash: &str, extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "{:04}/{:02}/{}.{}",
        now.year(),
        now.month(),
        hash,
        extension.to_ascii_lowercase()
    )
}
