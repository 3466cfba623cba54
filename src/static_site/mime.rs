use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

pub const FALLBACK_KEY: &str = "*";

/// Extensions the default table is seeded with, typed by `mime_guess`.
const KNOWN_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "mjs", "json", "map", "xml", "txt", "csv", "md", "svg",
    "png", "jpg", "jpeg", "gif", "webp", "avif", "ico", "bmp", "woff", "woff2", "ttf",
    "otf", "wasm", "pdf", "zip", "gz", "mp3", "mp4", "webm", "ogg", "wav",
];

/// Extension → content type table with a `"*"` fallback entry.
///
/// Lookup never guesses: an extension missing from the table gets the
/// `"*"` type.
#[derive(Debug, Clone)]
pub struct MimeTable {
    entries: HashMap<String, String>,
}

impl Default for MimeTable {
    /// Common web extensions plus `* = application/octet-stream`.
    fn default() -> Self {
        let mut table = Self::fallback_only("application/octet-stream");
        for &ext in KNOWN_EXTENSIONS {
            if let Some(ty) = mime_guess::from_ext(ext).first_raw() {
                table.insert(ext, ty);
            }
        }
        table
    }
}

impl MimeTable {
    /// Table holding only the fallback entry.
    pub fn fallback_only(fallback: &str) -> Self {
        let mut entries = HashMap::new();
        entries.insert(FALLBACK_KEY.to_string(), fallback.to_string());
        Self { entries }
    }

    /// Extensions are matched without the leading dot and case-insensitively.
    pub fn insert(&mut self, extension: &str, content_type: &str) {
        let key = extension.trim_start_matches('.').to_lowercase();
        self.entries.insert(key, content_type.to_string());
    }

    /// Parses an `EXT=TYPE` mapping as given on the command line.
    pub fn insert_mapping(&mut self, mapping: &str) -> Result<(), ConfigError> {
        match mapping.split_once('=') {
            Some((ext, ty)) if !ext.trim().is_empty() && !ty.trim().is_empty() => {
                self.insert(ext.trim(), ty.trim());
                Ok(())
            }
            _ => Err(ConfigError::InvalidMimeMapping(mapping.to_string())),
        }
    }

    pub fn lookup(&self, path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| self.entries.get(&ext))
            .or_else(|| self.entries.get(FALLBACK_KEY))
            .cloned()
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// Default compressible content types.
pub fn default_compressible_types() -> Vec<String> {
    [
        "text/html",
        "text/css",
        "text/plain",
        "text/xml",
        "text/javascript",
        "application/javascript",
        "application/json",
        "application/xml",
        "image/svg+xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Compares the media type only, ignoring parameters such as `charset`.
pub fn is_compressible(content_type: &str, allowlist: &[String]) -> bool {
    let media = content_type.split(';').next().unwrap_or("").trim();
    allowlist.iter().any(|t| t.eq_ignore_ascii_case(media))
}
