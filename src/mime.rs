//! Static extension table driving `Content-Type`, `Cache-Control` and server side includes.

/// How a file extension is served.
#[derive(Debug, PartialEq)]
pub struct MimeEntry {
    /// File extension without the dot, matched case-insensitively
    pub extension: &'static str,
    /// Content-Type value
    pub mime: &'static str,
    /// Whether clients may cache the response
    pub cacheable: bool,
    /// Whether the body is scanned for `<% name %>` tags
    pub ssi: bool,
}

const fn entry(extension: &'static str, mime: &'static str, cacheable: bool, ssi: bool) -> MimeEntry {
    MimeEntry {
        extension,
        mime,
        cacheable,
        ssi,
    }
}

/// Used when the extension is missing or unknown.
pub const DEFAULT_ENTRY: MimeEntry = entry("", "application/octet-stream", false, false);

static MIME_TABLE: &[MimeEntry] = &[
    entry("html", "text/html", false, false),
    entry("htm", "text/html", false, false),
    entry("shtml", "text/html", false, true),
    entry("shtm", "text/html", false, true),
    entry("ssi", "text/html", false, true),
    entry("css", "text/css", true, false),
    entry("js", "application/javascript", true, false),
    entry("mjs", "application/javascript", true, false),
    entry("json", "application/json", false, false),
    entry("xml", "text/xml", false, false),
    entry("txt", "text/plain", false, false),
    entry("png", "image/png", true, false),
    entry("jpg", "image/jpeg", true, false),
    entry("jpeg", "image/jpeg", true, false),
    entry("gif", "image/gif", true, false),
    entry("ico", "image/x-icon", true, false),
    entry("svg", "image/svg+xml", true, false),
    entry("woff", "font/woff", true, false),
    entry("woff2", "font/woff2", true, false),
    entry("wasm", "application/wasm", true, false),
    entry("pdf", "application/pdf", true, false),
];

/// Cache-Control value for cacheable resources.
pub const CACHE_FOREVER: &str = "max-age=31536000";
/// Cache-Control value for everything else.
pub const CACHE_NONE: &str = "no-store, no-cache, must-revalidate";

/// Look up the table entry for `path`'s extension.
pub fn lookup(path: &str) -> &'static MimeEntry {
    match crate::uri::extension(path) {
        Some(ext) => MIME_TABLE
            .iter()
            .find(|e| e.extension.eq_ignore_ascii_case(ext))
            .unwrap_or(&DEFAULT_ENTRY),
        None => &DEFAULT_ENTRY,
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("/index.html").mime, "text/html");
        assert_eq!(lookup("/INDEX.HTM").mime, "text/html");
        assert!(lookup("/status.shtml").ssi);
        assert!(lookup("/app.css").cacheable);
        assert_eq!(lookup("/blob"), &DEFAULT_ENTRY);
        assert_eq!(lookup("/archive.tar.zst"), &DEFAULT_ENTRY);
    }
}
